//! Key material available to decoders.
//!
//! The [`KeyManager`] is a keyed lookup service shared by the converter and
//! its plugins. Keys carry a precedence: higher values are tried first.

mod jwk;
mod x5c;

pub use jwk::JwkKeyReader;
pub use x5c::X5cKeyReader;

use std::collections::HashMap;
use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use parking_lot::RwLock;
use serde_json::Value;

use crate::error::KeyError;

const OID_RSA_ENCRYPTION: &str = "1.2.840.113549.1.1.1";
const OID_EC_PUBLIC_KEY: &str = "1.2.840.10045.2.1";

/// Precedence of keys found in messages (certificates, JWKs).
pub const PRECEDENCE_X5C_HEADER_VALUE: i32 = 100;

/// Precedence of keys supplied by the user.
pub const PRECEDENCE_KEY_FOLDER: i32 = 110;

/// What the material of a [`Key`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum KeyKind {
    /// Shared secret, used for HMAC
    #[default]
    Secret,
    /// DER `RSAPublicKey`
    Rsa,
    /// Uncompressed P-256 point
    EcP256,
    /// Uncompressed P-384 point
    EcP384,
}

/// A named key: a shared secret or a public key.
#[derive(Clone, PartialEq, Eq)]
pub struct Key {
    name: String,
    kind: KeyKind,
    material: Vec<u8>,
    precedence: i32,
}

impl Key {
    /// A shared secret.
    pub fn new(name: impl Into<String>, material: Vec<u8>, precedence: i32) -> Self {
        Self::with_kind(name, KeyKind::Secret, material, precedence)
    }

    pub fn with_kind(name: impl Into<String>, kind: KeyKind, material: Vec<u8>, precedence: i32) -> Self {
        Self {
            name: name.into(),
            kind,
            material,
            precedence,
        }
    }

    pub fn kind(&self) -> KeyKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn material(&self) -> &[u8] {
        &self.material
    }

    pub fn precedence(&self) -> i32 {
        self.precedence
    }

    /// Build a key from a symmetric JSON web key (`kty` = `oct`).
    ///
    /// The key is named by its `kid` and gets
    /// [`PRECEDENCE_X5C_HEADER_VALUE`].
    pub fn from_jwk(jwk: &Value) -> Result<Self, KeyError> {
        let member = |name: &str| {
            jwk.get(name)
                .and_then(Value::as_str)
                .ok_or_else(|| KeyError::InvalidJwk {
                    reason: format!("missing string member '{name}'"),
                })
        };
        let kty = member("kty")?;
        if kty != "oct" {
            return Err(KeyError::InvalidJwk {
                reason: format!("unsupported key type '{kty}'"),
            });
        }
        let kid = member("kid")?;
        let material = decode_base64url(kid, member("k")?)?;
        Ok(Self::new(kid, material, PRECEDENCE_X5C_HEADER_VALUE))
    }

    /// Take the public key out of a DER-encoded X.509 certificate.
    ///
    /// RSA and P-256/P-384 keys are supported. The certificate's validity
    /// and issuer are not checked.
    pub fn from_certificate(name: impl Into<String>, der: &[u8], precedence: i32) -> Result<Self, KeyError> {
        let (_, certificate) =
            x509_parser::parse_x509_certificate(der).map_err(|err| KeyError::InvalidCertificate {
                reason: err.to_string(),
            })?;
        let spki = certificate.public_key();
        let material = spki.subject_public_key.data.to_vec();
        let kind = match spki.algorithm.algorithm.to_id_string().as_str() {
            OID_RSA_ENCRYPTION => KeyKind::Rsa,
            OID_EC_PUBLIC_KEY => match material.len() {
                65 => KeyKind::EcP256,
                97 => KeyKind::EcP384,
                len => {
                    return Err(KeyError::InvalidCertificate {
                        reason: format!("unsupported EC point of {len} bytes"),
                    })
                }
            },
            oid => {
                return Err(KeyError::InvalidCertificate {
                    reason: format!("unsupported key algorithm {oid}"),
                })
            }
        };
        Ok(Self::with_kind(name, kind, material, precedence))
    }
}

/// Decode base64url key material, tolerating trailing padding.
pub(crate) fn decode_base64url(name: &str, value: &str) -> Result<Vec<u8>, KeyError> {
    URL_SAFE_NO_PAD
        .decode(value.trim().trim_end_matches('='))
        .map_err(|_| KeyError::InvalidEncoding {
            name: name.to_string(),
        })
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Key")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("material", &format_args!("<{} bytes>", self.material.len()))
            .field("precedence", &self.precedence)
            .finish()
    }
}

/// Thread-safe key store, keyed by name.
#[derive(Debug, Default)]
pub struct KeyManager {
    keys: RwLock<HashMap<String, Key>>,
}

impl KeyManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a key, replacing any key of the same name.
    pub fn add_key(&self, name: impl Into<String>, material: Vec<u8>, precedence: i32) {
        self.add(Key::new(name, material, precedence));
    }

    pub fn add(&self, key: Key) {
        tracing::debug!(name = %key.name, precedence = key.precedence, "registered key");
        self.keys.write().insert(key.name.clone(), key);
    }

    /// All keys, highest precedence first, ties by name.
    pub fn all_keys(&self) -> Vec<Key> {
        let mut keys: Vec<Key> = self.keys.read().values().cloned().collect();
        keys.sort_by(|a, b| b.precedence.cmp(&a.precedence).then_with(|| a.name.cmp(&b.name)));
        keys
    }

    pub fn find_by_name(&self, name: &str) -> Option<Key> {
        self.keys.read().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.keys.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.read().is_empty()
    }
}
