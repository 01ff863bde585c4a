//! Integration tests for wiretree-core.
//!
//! Exercises the full pipeline: conversion, history, path queries and
//! predicates, using synthetic HTTP traffic.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ring::hmac;
use wiretree_core::facets::{HttpRequestFacet, HttpResponseFacet, JwtSignatureFacet, NoteFacet, TcpIpFacet};
use wiretree_core::key::PRECEDENCE_KEY_FOLDER;
use wiretree_core::predicate::{self, Predicate};
use wiretree_core::{Converter, ConverterConfig, Document, Hostname, NodeRef, PathError, PathExpression};

fn texts(nodes: &[NodeRef<'_>]) -> Vec<String> {
    nodes.iter().map(|n| n.text().into_owned()).collect()
}

fn sign_hs256(body: &str, secret: &[u8]) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let signing_input = format!("{header}.{}", URL_SAFE_NO_PAD.encode(body));
    let tag = hmac::sign(&hmac::Key::new(hmac::HMAC_SHA256, secret), signing_input.as_bytes());
    format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(tag.as_ref()))
}

fn sequence(doc: &Document) -> u64 {
    doc.root()
        .facet::<TcpIpFacet>()
        .and_then(|t| t.sequence_number)
        .unwrap_or(u64::MAX)
}

#[test]
fn test_minimal_response() {
    let converter = Converter::new();
    let message = converter.parse_message("HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello", None, None);
    let root = message.root();

    assert_eq!(texts(&root.find_all("$.responseCode").unwrap()), vec!["200"]);
    assert_eq!(texts(&root.find_all("$.reasonPhrase").unwrap()), vec!["OK"]);
    assert_eq!(texts(&root.find_all("$.body").unwrap()), vec!["hello"]);
    assert!(root.has_facet::<HttpResponseFacet>());
}

#[test]
fn test_repeated_header_keys() {
    let converter = Converter::new();
    let message = converter.parse_message(
        "HTTP/1.1 200 OK\r\nSet-Cookie: a=1\r\nSet-Cookie: b=2\r\nContent-Length: 0\r\n\r\n",
        None,
        None,
    );
    let header = message.root().first("header").unwrap();
    assert_eq!(texts(&header.all("Set-Cookie")), vec!["a=1", "b=2"]);
    assert_eq!(header.first("Set-Cookie").unwrap().text(), "a=1");
}

#[test]
fn test_key_predicate() {
    let converter = Converter::new();
    let message = converter.parse_message(r#"{"foo":1}"#, None, None);
    let root = message.root();
    assert!(predicate::matches("key == 'foo'", root, Some("foo")));
    assert!(!predicate::matches("key == 'foo'", root, Some("bar")));
    assert_eq!(root.find_all("$[?(key == 'foo')]").unwrap().len(), 1);
}

#[test]
fn test_idempotent_requery() {
    let converter = Converter::new();
    let message = converter.parse_message(
        "POST /api?a=1&b=2 HTTP/1.1\r\nContent-Type: application/json\r\n\r\n{\"list\":[1,2,{\"a\":3}]}",
        None,
        None,
    );
    let root = message.root();
    for expression in ["$..a", "$.body.list[*]", "$..[?(content =~ '\\d')]", "$.path.*"] {
        let path = PathExpression::parse(expression).unwrap();
        let first = path.execute(root);
        let second = path.execute(root);
        assert_eq!(first, second, "{expression}");
    }
}

#[test]
fn test_recursive_descent_superset() {
    let converter = Converter::new();
    let message = converter.parse_message(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\r\n{\"a\":{\"id\":1},\"b\":[{\"id\":2}],\"id\":3}",
        None,
        None,
    );
    let root = message.root();
    let deep = root.find_all("$..id").unwrap();
    for direct in ["$.body.id", "$.body.a.id", "$.body.b.[0].id"] {
        for node in root.find_all(direct).unwrap() {
            assert!(deep.contains(&node), "{direct} not in $..id");
        }
    }
    assert_eq!(texts(&deep).len(), 3);
}

#[test]
fn test_predicates_never_throw() {
    let converter = Converter::new();
    let message = converter.parse_message("GET / HTTP/1.1\r\n\r\n", None, None);
    let root = message.root();
    let nodes: Vec<_> = std::iter::once(root).chain(root.descendants()).collect();
    let expressions = [
        "parent.parent.parent.parent == 1",
        "content > 3",
        "element.foo.bar =~ 'x'",
        "request.body.x in 3",
        "facets && true",
        "$..missing.thing",
        "key =~ '('",
    ];
    for expression in expressions {
        for node in &nodes {
            // must return, never panic
            let _ = predicate::matches(expression, *node, None);
        }
    }
    // malformed expressions are rejected at compile time
    assert!(Predicate::compile("content =~ '('").is_err());
}

#[test]
fn test_request_response_linking() {
    let converter = Converter::new();
    let client = Hostname::new("client", Some(40000));
    let server = Hostname::new("api.example.com", Some(443));

    let request = converter.parse_message(
        "GET /users/7 HTTP/1.1\r\nHost: api.example.com\r\n\r\n",
        Some(client.clone()),
        Some(server.clone()),
    );
    let response = converter.parse_message(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\r\n{\"id\":7}",
        Some(server),
        Some(client),
    );

    let linked = response
        .root()
        .facet::<HttpResponseFacet>()
        .and_then(|f| f.request.clone())
        .unwrap();
    assert!(Arc::ptr_eq(&linked, &request));
    assert!(linked.root().has_facet::<HttpRequestFacet>());

    let code = response.root().first("responseCode").unwrap();
    assert!(predicate::matches("request.url.basicPath == '/users/7'", code, None));
    assert!(predicate::matches("message.body.id == 7", code, None));
    assert_eq!(
        response.root().find_element("$.sender.domain").unwrap().unwrap().text(),
        "api.example.com"
    );
    assert_eq!(response.root().find_element("$.receiver.port").unwrap().unwrap().text(), "40000");
}

#[test]
fn test_history_ordering_across_threads() {
    let converter = Arc::new(Converter::new());
    std::thread::scope(|scope| {
        for worker in 0..4 {
            let converter = Arc::clone(&converter);
            scope.spawn(move || {
                for i in 0..25 {
                    converter.parse_message(format!("GET /w{worker}/{i} HTTP/1.1\r\n\r\n"), None, None);
                }
            });
        }
    });

    let messages = converter.history().messages();
    assert_eq!(messages.len(), 100);
    let sequences: Vec<_> = messages.iter().map(|m| sequence(m)).collect();
    assert!(sequences.windows(2).all(|w| w[0] < w[1]));

    // each worker's own messages stay in submission order
    for worker in 0..4 {
        let prefix = format!("/w{worker}/");
        let own: Vec<String> = messages
            .iter()
            .filter_map(|m| m.root().find_element("$.path.basicPath").ok().flatten().map(|n| n.text().into_owned()))
            .filter(|p| p.starts_with(&prefix))
            .collect();
        let expected: Vec<String> = (0..25).map(|i| format!("{prefix}{i}")).collect();
        assert_eq!(own, expected);
    }
}

#[test]
fn test_eviction_keeps_newest() {
    let converter = Converter::with_config(ConverterConfig::default().with_buffer_limit_bytes(200));
    for i in 0..20 {
        let message = converter.parse_message(format!("GET /item/{i} HTTP/1.1\r\nX-Pad: {}\r\n\r\n", "x".repeat(40)), None, None);
        let last = converter.history().last().unwrap();
        assert!(Arc::ptr_eq(&last, &message));
    }
    let stats = converter.history().stats();
    assert!(stats.evicted > 0);
    assert!(stats.messages < 20);

    // a message larger than the bound is still kept
    let big = converter.parse_message(format!("HTTP/1.1 200 OK\r\n\r\n{}", "y".repeat(1000)), None, None);
    let messages = converter.history().messages();
    assert_eq!(messages.len(), 1);
    assert!(Arc::ptr_eq(&messages[0], &big));
}

#[test]
fn test_jwk_then_bearer_token() {
    let converter = Converter::new();
    let secret = b"0123456789abcdef0123456789abcdef";
    let jwk = format!(
        r#"HTTP/1.1 200 OK
Content-Type: application/json

{{"keys":[{{"kty":"oct","kid":"session-key","k":"{}"}}]}}"#,
        URL_SAFE_NO_PAD.encode(secret)
    )
    .replace('\n', "\r\n");
    converter.parse_message(jwk, None, None);
    assert!(converter.key_manager().find_by_name("session-key").is_some());

    let token = sign_hs256(r#"{"sub":"alice","scope":"openid"}"#, secret);
    let request = converter.parse_message(
        format!("GET /userinfo HTTP/1.1\r\nAuthorization: Bearer {token}\r\n\r\n"),
        None,
        None,
    );
    let root = request.root();
    let signature = root
        .find_element("$.header.Authorization.BearerToken.signature")
        .unwrap()
        .unwrap();
    let facet = signature.facet::<JwtSignatureFacet>().unwrap();
    assert!(facet.verified);
    assert_eq!(facet.verified_using.as_deref(), Some("session-key"));
    assert_eq!(
        root.find_element("$..sub").unwrap().unwrap().text(),
        "alice"
    );

    let members: Vec<_> = root.nested_members().into_iter().map(|(path, _)| path).collect();
    assert_eq!(members, vec!["header.Authorization.BearerToken".to_string()]);
}

#[test]
fn test_key_from_config() {
    let config = ConverterConfig::default().with_key(wiretree_core::Key::new(
        "configured",
        b"secret".to_vec(),
        PRECEDENCE_KEY_FOLDER,
    ));
    let converter = Converter::with_config(config);
    let token = sign_hs256(r#"{"sub":"bob"}"#, b"secret");
    let doc = converter.convert(token);
    let signature = doc.root().first("signature").unwrap();
    assert_eq!(
        signature.facet::<JwtSignatureFacet>().unwrap().verified_using.as_deref(),
        Some("configured")
    );
}

#[test]
fn test_malformed_input_is_noted() {
    let converter = Converter::new();
    let message = converter.parse_message(
        "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\nzz\r\nbroken",
        None,
        None,
    );
    let root = message.root();
    assert!(root.has_facet::<HttpResponseFacet>());
    let notes: Vec<_> = std::iter::once(root)
        .chain(root.descendants())
        .filter_map(|n| n.facet::<NoteFacet>())
        .flat_map(|f| f.notes().iter().map(|n| n.value.clone()))
        .collect();
    assert!(!notes.is_empty());
}

#[test]
fn test_path_usage_errors() {
    let converter = Converter::new();
    let message = converter.parse_message("GET / HTTP/1.1\r\nA: 1\r\nA: 2\r\n\r\n", None, None);
    let root = message.root();
    match root.find_all("header.A") {
        Err(PathError::MissingRoot { .. }) => {}
        other => panic!("Expected MissingRoot, got {:?}", other),
    }
    match root.find_all("$.header[?(key == 'A')") {
        Err(PathError::UnbalancedBrackets { .. }) => {}
        other => panic!("Expected UnbalancedBrackets, got {:?}", other),
    }
    match root.find_element("$.header.A") {
        Err(PathError::AmbiguousResult { count, .. }) => assert_eq!(count, 2),
        other => panic!("Expected AmbiguousResult, got {:?}", other),
    }
}
