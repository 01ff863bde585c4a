//! Message history with size-bounded eviction.
//!
//! Appends, sequence assignment, request/response pairing and eviction
//! all happen under one mutex, so concurrent capture sources never observe
//! a torn total size or interleave an append with an eviction scan.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::facets::{HttpRequestFacet, TcpIpFacet};
use crate::node::Document;

struct Entry {
    sequence: u64,
    message: Arc<Document>,
    size: usize,
    /// Request not yet linked to a response
    awaiting_response: bool,
}

#[derive(Default)]
struct HistoryInner {
    entries: VecDeque<Entry>,
    total_bytes: usize,
    next_sequence: u64,
    evicted: u64,
}

/// Statistics about a [`MessageHistory`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryStats {
    pub messages: usize,
    pub total_bytes: usize,
    pub evicted: u64,
}

/// Insertion-ordered list of finished messages.
pub struct MessageHistory {
    inner: Mutex<HistoryInner>,
    /// Upper bound on total raw bytes, if managed
    limit: Option<usize>,
}

impl MessageHistory {
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            inner: Mutex::new(HistoryInner::default()),
            limit,
        }
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Publish `message`, assigning the next sequence number.
    ///
    /// Evicts the oldest messages while the bound is exceeded, never the
    /// one just appended.
    pub(crate) fn append(&self, mut message: Document) -> Arc<Document> {
        let root = message.root_id();
        let awaiting_response = message.root().has_facet::<HttpRequestFacet>();
        let size = message.raw_size();

        let mut inner = self.inner.lock();
        let sequence = inner.next_sequence;
        inner.next_sequence += 1;

        match message.facet_mut::<TcpIpFacet>(root) {
            Some(facet) => facet.sequence_number = Some(sequence),
            None => {
                let facet = TcpIpFacet {
                    sequence_number: Some(sequence),
                    ..TcpIpFacet::default()
                };
                if let Err(err) = message.add_facet(root, facet) {
                    debug!(%err, "failed to attach sequence number");
                }
            }
        }

        let message = Arc::new(message);
        inner.entries.push_back(Entry {
            sequence,
            message: Arc::clone(&message),
            size,
            awaiting_response,
        });
        inner.total_bytes += size;

        if let Some(limit) = self.limit {
            let mut evicted = 0u64;
            while inner.total_bytes > limit && inner.entries.len() > 1 {
                if let Some(oldest) = inner.entries.pop_front() {
                    inner.total_bytes -= oldest.size;
                    evicted += 1;
                }
            }
            if evicted > 0 {
                inner.evicted += evicted;
                debug!(
                    evicted,
                    total_bytes = inner.total_bytes,
                    limit,
                    "evicted messages from history"
                );
            }
        }

        message
    }

    /// Claim the most recent request that has no response yet.
    pub(crate) fn pair_with_latest_request(&self) -> Option<Arc<Document>> {
        let mut inner = self.inner.lock();
        let entry = inner
            .entries
            .iter_mut()
            .rev()
            .find(|entry| entry.awaiting_response)?;
        entry.awaiting_response = false;
        Some(Arc::clone(&entry.message))
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.inner.lock().total_bytes
    }

    /// Snapshot of all retained messages, oldest first.
    pub fn messages(&self) -> Vec<Arc<Document>> {
        self.inner
            .lock()
            .entries
            .iter()
            .map(|entry| Arc::clone(&entry.message))
            .collect()
    }

    pub fn last(&self) -> Option<Arc<Document>> {
        self.inner
            .lock()
            .entries
            .back()
            .map(|entry| Arc::clone(&entry.message))
    }

    /// Message with the given sequence number, if still retained.
    pub fn get(&self, sequence: u64) -> Option<Arc<Document>> {
        self.inner
            .lock()
            .entries
            .iter()
            .find(|entry| entry.sequence == sequence)
            .map(|entry| Arc::clone(&entry.message))
    }

    pub fn stats(&self) -> HistoryStats {
        let inner = self.inner.lock();
        HistoryStats {
            messages: inner.entries.len(),
            total_bytes: inner.total_bytes,
            evicted: inner.evicted,
        }
    }

    /// Drop all messages. Sequence numbers keep increasing.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.total_bytes = 0;
    }
}

impl Default for MessageHistory {
    fn default() -> Self {
        Self::new(None)
    }
}

impl std::fmt::Debug for MessageHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageHistory")
            .field("limit", &self.limit)
            .field("stats", &self.stats())
            .finish()
    }
}
