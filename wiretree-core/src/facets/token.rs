use crate::node::{Edges, Facet, NodeId};

/// A compact-serialized JSON web token.
#[derive(Debug, Clone, Copy)]
pub struct JwtFacet {
    pub header: NodeId,
    pub body: NodeId,
    pub signature: NodeId,
}

impl Facet for JwtFacet {
    fn name(&self) -> &'static str {
        "JwtFacet"
    }

    fn edges(&self) -> Edges<'_> {
        smallvec::smallvec![
            ("header", self.header),
            ("body", self.body),
            ("signature", self.signature),
        ]
    }

    fn is_boundary(&self) -> bool {
        true
    }

    crate::facet_any!();
}

/// Outcome of checking a JWT signature against the known keys.
#[derive(Debug, Clone, Default)]
pub struct JwtSignatureFacet {
    pub verified: bool,
    /// Name of the key that verified the signature
    pub verified_using: Option<String>,
}

impl Facet for JwtSignatureFacet {
    fn name(&self) -> &'static str {
        "JwtSignatureFacet"
    }

    crate::facet_any!();
}

/// `Authorization: Bearer <token>` value.
#[derive(Debug, Clone, Copy)]
pub struct BearerTokenFacet {
    pub token: NodeId,
}

impl Facet for BearerTokenFacet {
    fn name(&self) -> &'static str {
        "BearerTokenFacet"
    }

    fn edges(&self) -> Edges<'_> {
        smallvec::smallvec![("BearerToken", self.token)]
    }

    crate::facet_any!();
}
