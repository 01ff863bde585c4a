use chrono::{DateTime, Utc};

use crate::node::{Edges, Facet, Hostname, NodeId};

/// Transport metadata of a top-level message.
#[derive(Debug, Clone, Default)]
pub struct TcpIpFacet {
    pub sender: Option<NodeId>,
    pub receiver: Option<NodeId>,
    /// Assigned when the message is appended to history
    pub sequence_number: Option<u64>,
    pub transmission_time: Option<DateTime<Utc>>,
}

impl Facet for TcpIpFacet {
    fn name(&self) -> &'static str {
        "TcpIpFacet"
    }

    fn edges(&self) -> Edges<'_> {
        let mut edges = Edges::new();
        if let Some(sender) = self.sender {
            edges.push(("sender", sender));
        }
        if let Some(receiver) = self.receiver {
            edges.push(("receiver", receiver));
        }
        edges
    }

    crate::facet_any!();
}

/// An endpoint node: `domain` and optional `port` children.
#[derive(Debug, Clone)]
pub struct HostnameFacet {
    pub domain: NodeId,
    pub port: Option<NodeId>,
    pub hostname: Hostname,
}

impl Facet for HostnameFacet {
    fn name(&self) -> &'static str {
        "HostnameFacet"
    }

    fn edges(&self) -> Edges<'_> {
        let mut edges: Edges<'_> = smallvec::smallvec![("domain", self.domain)];
        if let Some(port) = self.port {
            edges.push(("port", port));
        }
        edges
    }

    crate::facet_any!();
}
