//! Fuzz target for the path expression parser and executor.

#![no_main]

use libfuzzer_sys::fuzz_target;
use wiretree_core::{Converter, PathExpression};

const MESSAGE: &str = "POST /login?user=alice HTTP/1.1\r\n\
                       Host: example.com\r\n\
                       Set-Cookie: a=1\r\n\
                       Content-Type: application/json\r\n\
                       \r\n\
                       {\"items\":[1,\"two\",{\"three\":3}],\"a.b\":null}";

fuzz_target!(|data: &[u8]| {
    let Ok(expression) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(path) = PathExpression::parse(expression) else {
        return;
    };

    let doc = Converter::new().convert(MESSAGE);
    let first = path.execute(doc.root());
    let second = path.execute(doc.root());
    assert_eq!(first, second);
});
