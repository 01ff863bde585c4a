//! Captured traffic sources.
//!
//! Capture and TCP reassembly happen upstream; the converter only sees
//! [`CapturedMessage`]s pulled from a [`MessageSource`]. [`TrafficFileReader`]
//! replays JSON-lines traffic files.

mod file;

pub use file::{record_line, write_traffic_file, TrafficFileReader, TrafficRecord};

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::error::CaptureError;
use crate::node::Hostname;

/// One reassembled message with its transport metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedMessage {
    pub content: Bytes,
    pub sender: Option<Hostname>,
    pub receiver: Option<Hostname>,
    pub transmission_time: Option<DateTime<Utc>>,
}

impl CapturedMessage {
    pub fn new(content: impl Into<Bytes>) -> Self {
        Self {
            content: content.into(),
            sender: None,
            receiver: None,
            transmission_time: None,
        }
    }

    pub fn with_endpoints(mut self, sender: Option<Hostname>, receiver: Option<Hostname>) -> Self {
        self.sender = sender;
        self.receiver = receiver;
        self
    }
}

/// Producer of captured messages, in capture order.
pub trait MessageSource {
    /// The next message, `None` once the source is exhausted.
    fn next_message(&mut self) -> Option<Result<CapturedMessage, CaptureError>>;
}

impl MessageSource for std::vec::IntoIter<CapturedMessage> {
    fn next_message(&mut self) -> Option<Result<CapturedMessage, CaptureError>> {
        self.next().map(Ok)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::convert::Converter;
    use crate::facets::{HttpResponseFacet, TcpIpFacet};

    #[test]
    fn test_consume_in_memory_source() {
        let client: Hostname = "client:5000".parse().unwrap();
        let server: Hostname = "server:80".parse().unwrap();
        let mut source = vec![
            CapturedMessage::new("GET / HTTP/1.1\r\n\r\n").with_endpoints(Some(client.clone()), Some(server.clone())),
            CapturedMessage::new("HTTP/1.1 204 No Content\r\n\r\n").with_endpoints(Some(server), Some(client)),
        ]
        .into_iter();

        let converter = Converter::new();
        assert_eq!(converter.consume(&mut source).unwrap(), 2);

        let messages = converter.history().messages();
        assert_eq!(messages.len(), 2);
        let response = messages[1].root();
        let linked = response.facet::<HttpResponseFacet>().unwrap().request.as_ref().unwrap();
        assert!(Arc::ptr_eq(linked, &messages[0]));
        assert_eq!(response.facet::<TcpIpFacet>().unwrap().sequence_number, Some(1));
        assert_eq!(response.find_element("$.sender.domain").unwrap().unwrap().text(), "server");
    }
}
