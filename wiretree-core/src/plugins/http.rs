//! HTTP/1.x message decoder using httparse.
//!
//! Decorates a complete request or response with:
//! - `HttpRequestFacet` (`method`, `path`) or `HttpResponseFacet`
//!   (`responseCode`, `reasonPhrase`)
//! - `HttpMessageFacet` (`header`, `body`)
//! - `HttpHeaderFacet` on the header node, one converted value per line
//!
//! The body is de-chunked, bounded by Content-Length, inflated for
//! gzip/deflate content encodings and tagged with the Content-Type charset
//! before it is converted itself.

use std::io::Read;

use bytes::Bytes;
use compact_str::CompactString;
use encoding_rs::Encoding;
use flate2::read::{DeflateDecoder, GzDecoder, ZlibDecoder};
use httparse::{Header, Request, Response, Status, EMPTY_HEADER};
use tracing::trace;

use crate::convert::{ConversionContext, ConverterPlugin};
use crate::error::ConversionError;
use crate::facets::{
    HttpHeaderFacet, HttpMessageFacet, HttpRequestFacet, HttpResponseFacet, NoteStyle,
};
use crate::node::{NodeId, NodeRef};

/// Maximum number of headers to parse per message.
const MAX_HEADERS: usize = 100;

/// Decoder for HTTP/1.x requests and responses.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpPlugin;

/// Header fields the body decoding depends on.
#[derive(Debug, Default)]
struct BodyFraming {
    chunked: bool,
    content_length: Option<usize>,
    content_encoding: Option<String>,
    charset: Option<&'static Encoding>,
}

enum StartLine {
    Request { method: Bytes, path: Bytes },
    Response { code: Bytes, reason: Option<Bytes> },
}

impl HttpPlugin {
    pub fn new() -> Self {
        Self
    }

    /// Whether `data` starts with a status line or a request line.
    fn looks_like_http(data: &[u8]) -> bool {
        if data.starts_with(b"HTTP/") {
            return true;
        }
        let line_end = data.iter().position(|&b| b == b'\n').unwrap_or(data.len());
        let Ok(line) = std::str::from_utf8(&data[..line_end]) else {
            return false;
        };
        let mut parts = line.trim_end_matches('\r').splitn(3, ' ');
        let method = parts.next().unwrap_or_default();
        let target = parts.next().unwrap_or_default();
        let version = parts.next().unwrap_or_default();
        !method.is_empty()
            && method.bytes().all(|b| b.is_ascii_uppercase() || b == b'-' || b == b'_')
            && !target.is_empty()
            && version.starts_with("HTTP/")
    }

    fn framing(headers: &[Header<'_>]) -> BodyFraming {
        let mut framing = BodyFraming::default();
        for header in headers {
            let value = String::from_utf8_lossy(header.value);
            if header.name.eq_ignore_ascii_case("transfer-encoding") {
                framing.chunked |= value.to_ascii_lowercase().contains("chunked");
            } else if header.name.eq_ignore_ascii_case("content-length") {
                framing.content_length = value.trim().parse().ok();
            } else if header.name.eq_ignore_ascii_case("content-encoding") {
                framing.content_encoding = Some(value.trim().to_ascii_lowercase());
            } else if header.name.eq_ignore_ascii_case("content-type") {
                framing.charset = Self::charset_of(&value);
            }
        }
        framing
    }

    /// Encoding named by the `charset=` parameter of a Content-Type value.
    fn charset_of(content_type: &str) -> Option<&'static Encoding> {
        content_type.split(';').skip(1).find_map(|param| {
            let (name, value) = param.split_once('=')?;
            if !name.trim().eq_ignore_ascii_case("charset") {
                return None;
            }
            Encoding::for_label(value.trim().trim_matches('"').as_bytes())
        })
    }

    /// Concatenate the chunks of a chunked body.
    ///
    /// Returns `None` if the framing is malformed or truncated.
    fn decode_chunked(data: &[u8]) -> Option<Vec<u8>> {
        let mut body = Vec::new();
        let mut pos = 0;

        loop {
            let line_end = data[pos..]
                .windows(2)
                .position(|w| w == b"\r\n")
                .map(|p| pos + p)?;

            let size_str = std::str::from_utf8(&data[pos..line_end]).ok()?;
            // Chunk extensions follow a semicolon
            let size_part = size_str.split(';').next().unwrap_or(size_str);
            let chunk_size = usize::from_str_radix(size_part.trim(), 16).ok()?;

            pos = line_end + 2;

            if chunk_size == 0 {
                return Some(body);
            }

            let end = pos.checked_add(chunk_size)?;
            let after = end.checked_add(2)?;
            if data.get(end..after) != Some(b"\r\n".as_slice()) {
                return None;
            }

            body.extend_from_slice(&data[pos..end]);
            pos = after;
        }
    }

    fn inflate(encoding: &str, data: &[u8]) -> Result<Option<Vec<u8>>, ConversionError> {
        let mut out = Vec::new();
        let result = match encoding {
            "gzip" | "x-gzip" => GzDecoder::new(data).read_to_end(&mut out),
            // "deflate" is zlib-wrapped in practice, but raw streams exist
            "deflate" => match ZlibDecoder::new(data).read_to_end(&mut out) {
                Ok(n) => Ok(n),
                Err(_) => {
                    out.clear();
                    DeflateDecoder::new(data).read_to_end(&mut out)
                }
            },
            _ => return Ok(None),
        };
        result
            .map(|_| Some(out))
            .map_err(|source| ConversionError::Decompression {
                encoding: encoding.to_string(),
                source,
            })
    }
}

/// Parsed head of a message: start line, header fields and the offset at
/// which the body starts.
struct Head {
    start: StartLine,
    fields: Vec<(CompactString, Bytes)>,
    framing: BodyFraming,
    body_start: usize,
}

/// Parse the head of a message. `Ok(None)` means the head is incomplete.
fn parse_head(content: &Bytes) -> Result<Option<Head>, httparse::Error> {
    let mut headers = [EMPTY_HEADER; MAX_HEADERS];

    if content.starts_with(b"HTTP/") {
        let mut response = Response::new(&mut headers);
        let body_start = match response.parse(content)? {
            Status::Complete(len) => len,
            Status::Partial => return Ok(None),
        };
        let code = response.code.unwrap_or_default().to_string();
        let reason = response
            .reason
            .filter(|r| !r.is_empty())
            .map(|r| content.slice_ref(r.as_bytes()));
        return Ok(Some(Head {
            start: StartLine::Response {
                code: Bytes::from(code),
                reason,
            },
            fields: collect_fields(content, response.headers),
            framing: HttpPlugin::framing(response.headers),
            body_start,
        }));
    }

    let mut request = Request::new(&mut headers);
    let body_start = match request.parse(content)? {
        Status::Complete(len) => len,
        Status::Partial => return Ok(None),
    };
    let method = request.method.unwrap_or_default();
    let path = request.path.unwrap_or_default();
    Ok(Some(Head {
        start: StartLine::Request {
            method: Bytes::copy_from_slice(method.as_bytes()),
            path: content.slice_ref(path.as_bytes()),
        },
        fields: collect_fields(content, request.headers),
        framing: HttpPlugin::framing(request.headers),
        body_start,
    }))
}

fn collect_fields(content: &Bytes, headers: &[Header<'_>]) -> Vec<(CompactString, Bytes)> {
    headers
        .iter()
        .filter(|h| !h.name.is_empty())
        .map(|h| (CompactString::new(h.name), content.slice_ref(h.value)))
        .collect()
}

impl ConverterPlugin for HttpPlugin {
    fn name(&self) -> &'static str {
        "http"
    }

    fn can_convert(&self, node: NodeRef<'_>) -> bool {
        node.raw().is_some_and(Self::looks_like_http)
    }

    fn convert(&self, node: NodeId, ctx: &mut ConversionContext<'_>) -> Result<(), ConversionError> {
        let Some(content) = ctx.node(node).raw_bytes().cloned() else {
            return Ok(());
        };
        let head = match parse_head(&content) {
            Ok(Some(head)) => head,
            Ok(None) => {
                trace!("incomplete HTTP head, leaving node raw");
                return Ok(());
            }
            Err(e) => {
                return Err(ConversionError::Malformed {
                    format: "http",
                    reason: e.to_string(),
                })
            }
        };

        // Header block without the start line
        let header_start = content
            .iter()
            .position(|&b| b == b'\n')
            .map_or(head.body_start, |p| p + 1)
            .min(head.body_start);
        let header = ctx.add_node(Some(content.slice(header_start..head.body_start)), Some(node));
        let mut entries = Vec::with_capacity(head.fields.len());
        for (name, value) in head.fields {
            let value = ctx.convert(value, Some(header));
            entries.push((name, value));
        }
        ctx.add_facet(header, HttpHeaderFacet::from_entries(entries))?;

        match head.start {
            StartLine::Request { method, path } => {
                let method = ctx.add_node(Some(method), Some(node));
                let path = ctx.convert(path, Some(node));
                ctx.add_facet(node, HttpRequestFacet { method, path })?;
            }
            StartLine::Response { code, reason } => {
                let code = ctx.add_node(Some(code), Some(node));
                let reason = reason.map(|reason| ctx.add_node(Some(reason), Some(node)));
                ctx.add_facet(node, HttpResponseFacet::new(code, reason))?;
            }
        }

        let framing = head.framing;
        let mut raw_body = content.slice(head.body_start..);
        let mut body_note = None;
        if framing.chunked {
            match Self::decode_chunked(&raw_body) {
                Some(decoded) => raw_body = Bytes::from(decoded),
                None => body_note = Some("malformed chunked encoding, body kept as sent".to_string()),
            }
        } else if let Some(length) = framing.content_length {
            raw_body.truncate(length);
        }
        if let Some(encoding) = framing.content_encoding.as_deref() {
            match Self::inflate(encoding, &raw_body) {
                Ok(Some(inflated)) => raw_body = Bytes::from(inflated),
                Ok(None) => {}
                Err(err) => body_note = Some(err.to_string()),
            }
        }

        let body = ctx.add_node(Some(raw_body), Some(node));
        if let Some(charset) = framing.charset {
            ctx.doc_mut().set_charset(body, charset);
        }
        if let Some(note) = body_note {
            ctx.push_note(body, note, NoteStyle::Warn);
        }
        ctx.add_facet(node, HttpMessageFacet { header, body })?;

        let converted = ctx.convert_node(body);
        if converted != body {
            ctx.add_facet(node, HttpMessageFacet { header, body: converted })?;
        }
        Ok(())
    }
}
