//! Fuzz target for the full conversion pipeline.
//!
//! Feeds arbitrary bytes through every built-in plugin:
//! - HTTP request/response heads, chunked bodies, gzip/deflate bodies
//! - URI and form-encoded parameters
//! - JSON documents, JWT and bearer tokens
//!
//! The first byte selects a framing so the HTTP plugin sees plausible
//! heads more often than raw noise would give it.

#![no_main]

use libfuzzer_sys::fuzz_target;
use wiretree_core::{Converter, TreePrinter};

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    let selector = data[0] % 4;
    let payload = &data[1..];

    let mut message = Vec::with_capacity(payload.len() + 64);
    match selector {
        0 => message.extend_from_slice(b"HTTP/1.1 200 OK\r\n"),
        1 => message.extend_from_slice(b"POST /fuzz?a=1 HTTP/1.1\r\nContent-Type: application/json\r\n\r\n"),
        2 => message.extend_from_slice(b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n"),
        _ => {}
    }
    message.extend_from_slice(payload);

    let converter = Converter::new();
    let doc = converter.parse_message(message, None, None);

    // Walking the result must not panic either
    let root = doc.root();
    let _ = root.nested_members();
    let _ = TreePrinter::new().with_max_depth(8).render(root);
});
