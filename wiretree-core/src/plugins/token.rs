//! JSON web token and bearer token decoders.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use bytes::Bytes;
use ring::{hmac, signature};
use serde_json::Value;
use tracing::{debug, trace};

use crate::convert::{ConversionContext, ConverterPlugin};
use crate::error::ConversionError;
use crate::facets::{BearerTokenFacet, JwtFacet, JwtSignatureFacet};
use crate::key::{Key, KeyKind, KeyManager, PRECEDENCE_X5C_HEADER_VALUE};
use crate::node::{NodeId, NodeRef};

const BEARER_PREFIX: &str = "Bearer ";

/// Reported as the verifying key when the token's own certificate matched.
pub const X5C_HEADER_KEY: &str = "x5c-header certificate";

/// Three base64url segments; the signature may be empty (`alg: none`).
fn looks_like_jws(text: &str) -> bool {
    let segments: Vec<&str> = text.split('.').collect();
    let base64url = |s: &str| {
        s.trim_end_matches('=')
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    };
    segments.len() == 3
        && !segments[0].is_empty()
        && !segments[1].is_empty()
        && segments.iter().all(|s| base64url(s))
}

fn decode_segment(segment: &str) -> Option<Vec<u8>> {
    URL_SAFE_NO_PAD.decode(segment.trim_end_matches('=')).ok()
}

/// How a JWS `alg` value is checked.
enum SignatureAlgorithm {
    Hmac(hmac::Algorithm),
    Public {
        kind: KeyKind,
        verification: &'static dyn signature::VerificationAlgorithm,
    },
}

impl SignatureAlgorithm {
    fn public(kind: KeyKind, verification: &'static dyn signature::VerificationAlgorithm) -> Option<Self> {
        Some(Self::Public { kind, verification })
    }

    fn from_header(header: &Value) -> Option<Self> {
        match header.get("alg")?.as_str()? {
            "HS256" => Some(Self::Hmac(hmac::HMAC_SHA256)),
            "HS384" => Some(Self::Hmac(hmac::HMAC_SHA384)),
            "HS512" => Some(Self::Hmac(hmac::HMAC_SHA512)),
            "RS256" => Self::public(KeyKind::Rsa, &signature::RSA_PKCS1_2048_8192_SHA256),
            "RS384" => Self::public(KeyKind::Rsa, &signature::RSA_PKCS1_2048_8192_SHA384),
            "RS512" => Self::public(KeyKind::Rsa, &signature::RSA_PKCS1_2048_8192_SHA512),
            "PS256" => Self::public(KeyKind::Rsa, &signature::RSA_PSS_2048_8192_SHA256),
            "PS384" => Self::public(KeyKind::Rsa, &signature::RSA_PSS_2048_8192_SHA384),
            "PS512" => Self::public(KeyKind::Rsa, &signature::RSA_PSS_2048_8192_SHA512),
            "ES256" => Self::public(KeyKind::EcP256, &signature::ECDSA_P256_SHA256_FIXED),
            "ES384" => Self::public(KeyKind::EcP384, &signature::ECDSA_P384_SHA384_FIXED),
            _ => None,
        }
    }

    fn verifies(&self, key: &Key, signing_input: &[u8], tag: &[u8]) -> bool {
        match self {
            Self::Hmac(algorithm) => {
                key.kind() == KeyKind::Secret
                    && hmac::verify(&hmac::Key::new(*algorithm, key.material()), signing_input, tag).is_ok()
            }
            Self::Public { kind, verification } => {
                key.kind() == *kind
                    && signature::UnparsedPublicKey::new(*verification, key.material())
                        .verify(signing_input, tag)
                        .is_ok()
            }
        }
    }
}

/// Leaf certificate of the header's `x5c` chain.
fn header_certificate(header: &Value) -> Option<Key> {
    let encoded = header.get("x5c")?.get(0)?.as_str()?;
    let der = STANDARD.decode(encoded.trim()).ok()?;
    match Key::from_certificate(X5C_HEADER_KEY, &der, PRECEDENCE_X5C_HEADER_VALUE) {
        Ok(key) => Some(key),
        Err(err) => {
            debug!(%err, "ignoring x5c header");
            None
        }
    }
}

/// Decodes compact-serialized JWS tokens and checks their signatures.
///
/// HMAC tokens are checked against every secret key, public-key tokens
/// against every key of the matching kind and finally against the leaf
/// certificate of the header's `x5c` chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct JwtPlugin;

impl JwtPlugin {
    pub fn new() -> Self {
        Self
    }

    /// Try every key, highest precedence first.
    fn verify(keys: &KeyManager, header: &Value, signing_input: &[u8], signature: &[u8]) -> JwtSignatureFacet {
        let Some(algorithm) = SignatureAlgorithm::from_header(header) else {
            return JwtSignatureFacet::default();
        };
        let candidates = keys.all_keys().into_iter().chain(header_certificate(header));
        for key in candidates {
            if algorithm.verifies(&key, signing_input, signature) {
                debug!(key = key.name(), "verified JWT signature");
                return JwtSignatureFacet {
                    verified: true,
                    verified_using: Some(key.name().to_string()),
                };
            }
        }
        JwtSignatureFacet::default()
    }
}

impl ConverterPlugin for JwtPlugin {
    fn name(&self) -> &'static str {
        "jwt"
    }

    fn can_convert(&self, node: NodeRef<'_>) -> bool {
        looks_like_jws(node.text().trim())
    }

    fn convert(&self, node: NodeId, ctx: &mut ConversionContext<'_>) -> Result<(), ConversionError> {
        let text = ctx.node(node).text().trim().to_string();
        let mut segments = text.splitn(3, '.');
        let (Some(header_b64), Some(body_b64), Some(signature_b64)) =
            (segments.next(), segments.next(), segments.next())
        else {
            return Ok(());
        };

        // Anything whose first segment is not a JSON object is not a token
        let Some(header_raw) = decode_segment(header_b64) else {
            return Ok(());
        };
        let header_json = match serde_json::from_slice::<Value>(&header_raw) {
            Ok(value) if value.is_object() => value,
            _ => {
                trace!("first segment is not a JSON object");
                return Ok(());
            }
        };

        let body_raw = decode_segment(body_b64).ok_or_else(|| ConversionError::Malformed {
            format: "jwt",
            reason: "body is not base64url".to_string(),
        })?;
        let signature_raw = decode_segment(signature_b64).ok_or_else(|| ConversionError::Malformed {
            format: "jwt",
            reason: "signature is not base64url".to_string(),
        })?;

        let header = ctx.convert(header_raw, Some(node));
        let body = ctx.convert(body_raw, Some(node));
        let signature = ctx.add_node(Some(Bytes::from(signature_raw.clone())), Some(node));

        let signing_input = format!("{header_b64}.{body_b64}");
        let verification = Self::verify(ctx.key_manager(), &header_json, signing_input.as_bytes(), &signature_raw);
        ctx.add_facet(signature, verification)?;
        ctx.add_facet(node, JwtFacet { header, body, signature })
    }
}

/// Decodes `Bearer <token>` values.
#[derive(Debug, Clone, Copy, Default)]
pub struct BearerTokenPlugin;

impl BearerTokenPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl ConverterPlugin for BearerTokenPlugin {
    fn name(&self) -> &'static str {
        "bearer"
    }

    fn can_convert(&self, node: NodeRef<'_>) -> bool {
        node.raw().is_some_and(|raw| raw.starts_with(BEARER_PREFIX.as_bytes()))
    }

    fn convert(&self, node: NodeId, ctx: &mut ConversionContext<'_>) -> Result<(), ConversionError> {
        let Some(raw) = ctx.node(node).raw_bytes().cloned() else {
            return Ok(());
        };
        let token = ctx.convert(raw.slice(BEARER_PREFIX.len()..), Some(node));
        ctx.add_facet(node, BearerTokenFacet { token })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::{Converter, ConverterConfig};
    use crate::facets::MapFacet;
    use crate::key::Key;

    fn b64(data: &[u8]) -> String {
        URL_SAFE_NO_PAD.encode(data)
    }

    fn sign_hs256(header: &str, body: &str, secret: &[u8]) -> String {
        let signing_input = format!("{}.{}", b64(header.as_bytes()), b64(body.as_bytes()));
        let key = hmac::Key::new(hmac::HMAC_SHA256, secret);
        let tag = hmac::sign(&key, signing_input.as_bytes());
        format!("{signing_input}.{}", b64(tag.as_ref()))
    }

    #[test]
    fn test_decode_and_verify() {
        let config = ConverterConfig::default().with_key(Key::new("shared", b"secret".to_vec(), 110));
        let converter = Converter::with_config(config);
        let token = sign_hs256(r#"{"alg":"HS256","typ":"JWT"}"#, r#"{"sub":"alice"}"#, b"secret");

        let doc = converter.convert(token);
        let root = doc.root();
        assert!(root.has_facet::<JwtFacet>());
        assert!(root.is_boundary());

        let header = root.first("header").unwrap();
        assert!(header.has_facet::<MapFacet>());
        assert_eq!(header.first("alg").unwrap().text(), "HS256");
        assert_eq!(root.first("body").unwrap().first("sub").unwrap().text(), "alice");

        let signature = root.first("signature").unwrap().facet::<JwtSignatureFacet>().unwrap();
        assert!(signature.verified);
        assert_eq!(signature.verified_using.as_deref(), Some("shared"));
    }

    #[test]
    fn test_wrong_key_not_verified() {
        let config = ConverterConfig::default().with_key(Key::new("other", b"nope".to_vec(), 110));
        let converter = Converter::with_config(config);
        let token = sign_hs256(r#"{"alg":"HS256"}"#, r#"{"sub":"alice"}"#, b"secret");

        let doc = converter.convert(token);
        let signature = doc.root().first("signature").unwrap().facet::<JwtSignatureFacet>().unwrap();
        assert!(!signature.verified);
        assert!(signature.verified_using.is_none());
    }

    fn idp_key(name: &str) -> Key {
        let der = STANDARD
            .decode(include_str!("../../tests/data/idp_cert.b64").trim())
            .unwrap();
        Key::from_certificate(name, &der, 110).unwrap()
    }

    fn signature_of(doc: &crate::node::Document) -> JwtSignatureFacet {
        doc.root()
            .first("signature")
            .unwrap()
            .facet::<JwtSignatureFacet>()
            .unwrap()
            .clone()
    }

    #[test]
    fn test_rs256_with_certificate_key() {
        let config = ConverterConfig::default().with_key(idp_key("idp-sig"));
        let converter = Converter::with_config(config);
        let doc = converter.convert(include_str!("../../tests/data/idp_token.jwt").trim().to_string());
        assert_eq!(doc.root().first("header").unwrap().first("alg").unwrap().text(), "RS256");

        let signature = signature_of(&doc);
        assert!(signature.verified);
        assert_eq!(signature.verified_using.as_deref(), Some("idp-sig"));
    }

    #[test]
    fn test_rs256_without_key_not_verified() {
        let doc = Converter::new().convert(include_str!("../../tests/data/idp_token.jwt").trim().to_string());
        assert!(doc.root().has_facet::<JwtFacet>());
        assert!(!signature_of(&doc).verified);
    }

    #[test]
    fn test_rs256_with_x5c_header() {
        let doc = Converter::new().convert(include_str!("../../tests/data/idp_token_x5c.jwt").trim().to_string());
        let signature = signature_of(&doc);
        assert!(signature.verified);
        assert_eq!(signature.verified_using.as_deref(), Some(X5C_HEADER_KEY));
    }

    #[test]
    fn test_hmac_never_uses_public_keys() {
        let rsa = idp_key("idp-sig");
        let token = sign_hs256(r#"{"alg":"HS256"}"#, r#"{"sub":"mallory"}"#, rsa.material());
        let converter = Converter::with_config(ConverterConfig::default().with_key(rsa));
        assert!(!signature_of(&converter.convert(token)).verified);
    }

    #[test]
    fn test_es256() {
        use ring::rand::SystemRandom;
        use ring::signature::{EcdsaKeyPair, KeyPair, ECDSA_P256_SHA256_FIXED_SIGNING};

        let rng = SystemRandom::new();
        let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, &rng).unwrap();
        let pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, pkcs8.as_ref(), &rng).unwrap();
        let signing_input = format!("{}.{}", b64(br#"{"alg":"ES256"}"#), b64(br#"{"sub":"carol"}"#));
        let tag = pair.sign(&rng, signing_input.as_bytes()).unwrap();
        let token = format!("{signing_input}.{}", b64(tag.as_ref()));

        let key = Key::with_kind("ec", KeyKind::EcP256, pair.public_key().as_ref().to_vec(), 110);
        let converter = Converter::with_config(ConverterConfig::default().with_key(key));
        let signature = signature_of(&converter.convert(token.clone()));
        assert!(signature.verified);
        assert_eq!(signature.verified_using.as_deref(), Some("ec"));

        // Same point labelled as the wrong curve is never tried
        let key = Key::with_kind("ec", KeyKind::EcP384, pair.public_key().as_ref().to_vec(), 110);
        let converter = Converter::with_config(ConverterConfig::default().with_key(key));
        assert!(!signature_of(&converter.convert(token)).verified);
    }

    #[test]
    fn test_dotted_text_is_not_a_token() {
        let converter = Converter::new();
        let doc = converter.convert("www.example.com");
        assert!(!doc.root().has_facet::<JwtFacet>());
    }

    #[test]
    fn test_bearer_token() {
        let converter = Converter::new();
        let token = sign_hs256(r#"{"alg":"HS256"}"#, r#"{"scope":"openid"}"#, b"k");
        let doc = converter.convert(format!("Bearer {token}"));
        let root = doc.root();
        let inner = root.first("BearerToken").unwrap();
        assert_eq!(inner.text(), token);
        assert!(inner.has_facet::<JwtFacet>());
        assert_eq!(inner.first("body").unwrap().first("scope").unwrap().text(), "openid");
    }

    #[test]
    fn test_token_in_header() {
        let converter = Converter::new();
        let token = sign_hs256(r#"{"alg":"HS256"}"#, r#"{"sub":"bob"}"#, b"k");
        let doc = converter.convert(format!(
            "GET /userinfo HTTP/1.1\r\nAuthorization: Bearer {token}\r\n\r\n"
        ));
        let members = doc.root().nested_members();
        let paths: Vec<_> = members.iter().map(|(path, _)| path.as_str()).collect();
        assert_eq!(paths, vec!["header.Authorization.BearerToken"]);
    }
}
