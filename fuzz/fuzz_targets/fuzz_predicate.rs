//! Fuzz target for the predicate compiler and evaluator.
//!
//! Compilation may fail; evaluation of anything that compiles must return
//! a boolean without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use wiretree_core::{Converter, Predicate};

fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(predicate) = Predicate::compile(source) else {
        return;
    };

    let doc = Converter::new().convert("HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\r\n{\"k\":[\"v\",2]}");
    let root = doc.root();
    for node in std::iter::once(root).chain(root.descendants()) {
        let _ = predicate.matches(node, None);
        let _ = predicate.matches(node, Some("k"));
    }
});
