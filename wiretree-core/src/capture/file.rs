//! JSON-lines traffic files.
//!
//! One record per line:
//!
//! ```text
//! {"rawMessageContent":"R0VUIC8gSFRUUC8xLjENCg0K","senderHostname":"client:5000","receiverHostname":"server:80","sequenceNumber":"0"}
//! ```
//!
//! `sequenceNumber` is informational on read; the converter assigns its
//! own sequence numbers when messages are appended to history.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::{CapturedMessage, MessageSource};
use crate::error::CaptureError;
use crate::facets::{HostnameFacet, TcpIpFacet};
use crate::node::{Document, Hostname, NodeId};

/// Wire form of one traffic file line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficRecord {
    pub raw_message_content: String,
    #[serde(default)]
    pub sender_hostname: String,
    #[serde(default)]
    pub receiver_hostname: String,
    #[serde(default)]
    pub sequence_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transmission_time: Option<DateTime<Utc>>,
}

impl TrafficRecord {
    fn into_message(self, line: usize) -> Result<CapturedMessage, CaptureError> {
        let content = STANDARD
            .decode(self.raw_message_content.trim())
            .map_err(|e| CaptureError::InvalidRecord {
                line,
                message: format!("rawMessageContent is not base64: {e}"),
            })?;
        let endpoint = |value: &str| {
            Hostname::parse_optional(value).map_err(|source| CaptureError::InvalidEndpoint { line, source })
        };
        Ok(CapturedMessage {
            content: content.into(),
            sender: endpoint(&self.sender_hostname)?,
            receiver: endpoint(&self.receiver_hostname)?,
            transmission_time: self.transmission_time,
        })
    }
}

/// Replays a traffic file as a [`MessageSource`].
pub struct TrafficFileReader<R> {
    reader: R,
    line: usize,
    buf: String,
}

impl<R: BufRead> TrafficFileReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            buf: String::new(),
        }
    }
}

impl TrafficFileReader<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CaptureError> {
        Ok(Self::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: BufRead> MessageSource for TrafficFileReader<R> {
    fn next_message(&mut self) -> Option<Result<CapturedMessage, CaptureError>> {
        loop {
            self.buf.clear();
            match self.reader.read_line(&mut self.buf) {
                Ok(0) => return None,
                Ok(_) => self.line += 1,
                Err(e) => return Some(Err(e.into())),
            }
            let text = self.buf.trim();
            if text.is_empty() {
                continue;
            }
            trace!(line = self.line, "reading traffic record");
            let line = self.line;
            let record = serde_json::from_str::<TrafficRecord>(text).map_err(|e| CaptureError::InvalidRecord {
                line,
                message: e.to_string(),
            });
            return Some(record.and_then(|record| record.into_message(line)));
        }
    }
}

impl<R: BufRead> Iterator for TrafficFileReader<R> {
    type Item = Result<CapturedMessage, CaptureError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_message()
    }
}

fn endpoint_of(doc: &Document, id: Option<NodeId>) -> String {
    id.and_then(|id| doc.node(id).facet::<HostnameFacet>())
        .map(|facet| facet.hostname.to_string())
        .unwrap_or_default()
}

/// Traffic record for a converted message.
pub fn record_line(doc: &Document) -> TrafficRecord {
    let root = doc.root();
    let transport = root.facet::<TcpIpFacet>();
    TrafficRecord {
        raw_message_content: STANDARD.encode(root.raw().unwrap_or_default()),
        sender_hostname: endpoint_of(doc, transport.and_then(|t| t.sender)),
        receiver_hostname: endpoint_of(doc, transport.and_then(|t| t.receiver)),
        sequence_number: transport
            .and_then(|t| t.sequence_number)
            .map(|n| n.to_string())
            .unwrap_or_default(),
        transmission_time: transport.and_then(|t| t.transmission_time),
    }
}

/// Write `messages` as a traffic file, one line each.
pub fn write_traffic_file<W: Write>(mut writer: W, messages: &[Arc<Document>]) -> Result<usize, CaptureError> {
    for message in messages {
        let line = serde_json::to_string(&record_line(message)).map_err(std::io::Error::from)?;
        writeln!(writer, "{line}")?;
    }
    writer.flush()?;
    Ok(messages.len())
}
