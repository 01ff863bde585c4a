//! Conversion engine.
//!
//! The [`Converter`] turns raw bytes into a decorated [`Document`]:
//!
//! ```text
//! bytes ──► node ──► pre-conversion rewrites (until fixed point)
//!                      │
//!                      ▼
//!               every plugin, in order ──► ctx.convert(nested bytes) ─┐
//!                      ▲                                               │
//!                      └───────────────────────────────────────────────┘
//! ```
//!
//! [`Converter::parse_message`] additionally pairs responses with
//! requests, attaches endpoint metadata, fires post-conversion listeners
//! bottom-up and publishes the message to the [`MessageHistory`].

mod config;
mod history;
mod plugin;

pub use config::{
    ConverterConfig, DEFAULT_BUFFER_LIMIT, DEFAULT_MAX_CONVERSION_DEPTH, DEFAULT_MAX_REWRITE_ROUNDS,
};
pub use history::{HistoryStats, MessageHistory};
pub use plugin::{ConverterPlugin, PostConversionListener, PreConversionRewrite};

use std::collections::HashSet;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::{debug, trace, warn};

use crate::capture::MessageSource;
use crate::error::{CaptureError, ConversionError};
use crate::facets::{HostnameFacet, HttpResponseFacet, NoteFacet, NoteStyle, TcpIpFacet};
use crate::key::{JwkKeyReader, KeyManager, X5cKeyReader};
use crate::node::{Document, Facet, Hostname, NodeId, NodeKind, NodeRef};
use crate::plugins::default_plugins;

/// Orchestrates plugins, rewrites, listeners and the message history.
pub struct Converter {
    plugins: Vec<Box<dyn ConverterPlugin>>,
    rewrites: Vec<(NodeKind, Box<dyn PreConversionRewrite>)>,
    listeners: Vec<Box<dyn PostConversionListener>>,
    history: MessageHistory,
    keys: Arc<KeyManager>,
    config: ConverterConfig,
}

impl Converter {
    /// Converter with the built-in plugins and default configuration.
    pub fn new() -> Self {
        Self::with_config(ConverterConfig::default())
    }

    /// Converter with the built-in plugins and key readers.
    pub fn with_config(config: ConverterConfig) -> Self {
        let mut converter = Self::bare(config);
        converter.plugins = default_plugins();
        converter.register_listener(JwkKeyReader);
        converter.register_listener(X5cKeyReader);
        converter
    }

    /// Converter without any plugins or listeners.
    pub fn bare(config: ConverterConfig) -> Self {
        let keys = KeyManager::new();
        for key in &config.keys {
            keys.add(key.clone());
        }
        Self {
            plugins: Vec::new(),
            rewrites: Vec::new(),
            listeners: Vec::new(),
            history: MessageHistory::new(config.history_limit()),
            keys: Arc::new(keys),
            config,
        }
    }

    pub fn register_plugin<P: ConverterPlugin + 'static>(&mut self, plugin: P) {
        self.plugins.push(Box::new(plugin));
    }

    /// Register a rewrite for nodes of the given kind.
    ///
    /// The kind is taken when the node is offered. Nodes created through
    /// [`ConversionContext::convert`] carry no facets yet, so they are
    /// `Raw` (or `Synthetic`). A `Structured` rewrite only sees substitutes
    /// that an earlier rewrite returned already decorated, and nodes a
    /// plugin passes back to [`ConversionContext::convert_node`].
    pub fn register_rewrite<R: PreConversionRewrite + 'static>(&mut self, kind: NodeKind, rewrite: R) {
        self.rewrites.push((kind, Box::new(rewrite)));
    }

    pub fn register_listener<L: PostConversionListener + 'static>(&mut self, listener: L) {
        self.listeners.push(Box::new(listener));
    }

    pub fn plugin_names(&self) -> Vec<&'static str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    pub fn history(&self) -> &MessageHistory {
        &self.history
    }

    pub fn key_manager(&self) -> &Arc<KeyManager> {
        &self.keys
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// Convert `content` into a standalone document.
    ///
    /// Does not touch the history and does not fire listeners.
    pub fn convert(&self, content: impl Into<Bytes>) -> Document {
        let mut doc = Document::new(content);
        let root = doc.root_id();
        let size = doc.raw_size();

        let mut ctx = ConversionContext::new(self, &mut doc);
        match self.config.skip_parsing_larger_than {
            Some(limit) if size > limit => {
                debug!(size, limit, "message exceeds size limit, not decoding");
                ctx.push_note(
                    root,
                    format!("decoding skipped: {size} bytes exceeds limit of {limit}"),
                    NoteStyle::Info,
                );
            }
            _ => {
                let converted = ctx.convert_node(root);
                if converted != root {
                    doc.set_root(converted);
                }
            }
        }
        doc
    }

    /// Convert and publish one captured message.
    pub fn parse_message(
        &self,
        content: impl Into<Bytes>,
        sender: Option<Hostname>,
        receiver: Option<Hostname>,
    ) -> Arc<Document> {
        self.parse_message_at(content, sender, receiver, None)
    }

    /// Like [`parse_message`](Self::parse_message), with a capture timestamp.
    pub fn parse_message_at(
        &self,
        content: impl Into<Bytes>,
        sender: Option<Hostname>,
        receiver: Option<Hostname>,
        transmission_time: Option<DateTime<Utc>>,
    ) -> Arc<Document> {
        let mut doc = self.convert(content);
        let root = doc.root_id();

        if doc.root().has_facet::<HttpResponseFacet>() {
            if let Some(request) = self.history.pair_with_latest_request() {
                if let Some(facet) = doc.facet_mut::<HttpResponseFacet>(root) {
                    facet.request = Some(request);
                }
            }
        }

        let mut ctx = ConversionContext::new(self, &mut doc);
        ctx.attach_endpoints(root, sender.as_ref(), receiver.as_ref(), transmission_time);
        ctx.fire_listeners(root);

        self.history.append(doc)
    }

    /// Drain `source` through [`parse_message_at`](Self::parse_message_at).
    ///
    /// Returns the number of messages converted. The first read error
    /// stops consumption and is returned.
    pub fn consume<S: MessageSource + ?Sized>(&self, source: &mut S) -> Result<usize, CaptureError> {
        let mut count = 0;
        while let Some(message) = source.next_message() {
            let message = message?;
            self.parse_message_at(
                message.content,
                message.sender,
                message.receiver,
                message.transmission_time,
            );
            count += 1;
        }
        debug!(count, "consumed message source");
        Ok(count)
    }
}

impl Default for Converter {
    fn default() -> Self {
        Self::new()
    }
}

/// Mutable view of a document under conversion, handed to plugins,
/// rewrites and listeners.
pub struct ConversionContext<'c> {
    converter: &'c Converter,
    doc: &'c mut Document,
    depth: usize,
}

impl<'c> ConversionContext<'c> {
    fn new(converter: &'c Converter, doc: &'c mut Document) -> Self {
        Self {
            converter,
            doc,
            depth: 0,
        }
    }

    pub fn doc(&self) -> &Document {
        self.doc
    }

    pub fn doc_mut(&mut self) -> &mut Document {
        self.doc
    }

    pub fn node(&self, id: NodeId) -> NodeRef<'_> {
        self.doc.node(id)
    }

    pub fn key_manager(&self) -> &KeyManager {
        &self.converter.keys
    }

    pub fn add_node(&mut self, content: Option<Bytes>, parent: Option<NodeId>) -> NodeId {
        self.doc.add_node(content, parent)
    }

    pub fn add_facet<F: Facet>(&mut self, node: NodeId, facet: F) -> Result<(), ConversionError> {
        self.doc.add_facet(node, facet)
    }

    /// Append a diagnostic to the node's [`NoteFacet`].
    pub fn push_note(&mut self, node: NodeId, value: impl Into<String>, style: NoteStyle) {
        let value = value.into();
        if let Some(facet) = self.doc.facet_mut::<NoteFacet>(node) {
            facet.push(value, style);
            return;
        }
        let mut facet = NoteFacet::new();
        facet.push(value, style);
        if let Err(err) = self.doc.add_facet(node, facet) {
            debug!(%err, "failed to attach note");
        }
    }

    /// Create a node for `content` under `parent` and run the full
    /// pipeline on it. Returns the (possibly substituted) node.
    pub fn convert(&mut self, content: impl Into<Bytes>, parent: Option<NodeId>) -> NodeId {
        let node = self.doc.add_node(Some(content.into()), parent);
        self.convert_node(node)
    }

    /// Run rewrites and plugins on an existing node.
    pub fn convert_node(&mut self, node: NodeId) -> NodeId {
        let max_depth = self.converter.config.max_conversion_depth;
        if self.depth >= max_depth {
            debug!(depth = self.depth, "conversion depth limit reached");
            self.push_note(
                node,
                format!("decoding stopped at nesting depth {max_depth}"),
                NoteStyle::Warn,
            );
            return node;
        }

        self.depth += 1;
        let node = self.apply_rewrites(node);
        let converter = self.converter;
        for plugin in &converter.plugins {
            if !plugin.can_convert(self.doc.node(node)) {
                continue;
            }
            if let Err(err) = plugin.convert(node, self) {
                debug!(plugin = plugin.name(), %err, "plugin failed");
                self.push_note(node, format!("{}: {}", plugin.name(), err), NoteStyle::Error);
            }
        }
        self.depth -= 1;
        node
    }

    fn apply_rewrites(&mut self, node: NodeId) -> NodeId {
        let converter = self.converter;
        if converter.rewrites.is_empty() {
            return node;
        }

        let max_rounds = converter.config.max_rewrite_rounds;
        let mut current = node;
        for round in 0..max_rounds {
            let kind = self.doc.node(current).kind();
            let substitute = converter
                .rewrites
                .iter()
                .filter(|(k, _)| *k == kind)
                .find_map(|(_, rewrite)| rewrite.rewrite(current, self).filter(|id| *id != current));
            match substitute {
                Some(next) => {
                    trace!(round, from = current.index(), to = next.index(), "rewrite substituted node");
                    current = next;
                }
                None => return current,
            }
        }
        warn!(max_rounds, "rewrites did not reach a fixed point, keeping last substitute");
        current
    }

    fn attach_endpoints(
        &mut self,
        root: NodeId,
        sender: Option<&Hostname>,
        receiver: Option<&Hostname>,
        transmission_time: Option<DateTime<Utc>>,
    ) {
        let sender = sender.and_then(|h| self.endpoint_node(root, h));
        let receiver = receiver.and_then(|h| self.endpoint_node(root, h));
        let facet = TcpIpFacet {
            sender,
            receiver,
            sequence_number: None,
            transmission_time,
        };
        if let Err(err) = self.doc.add_facet(root, facet) {
            debug!(%err, "failed to attach endpoints");
        }
    }

    fn endpoint_node(&mut self, parent: NodeId, hostname: &Hostname) -> Option<NodeId> {
        let node = self
            .doc
            .add_node(Some(Bytes::from(hostname.to_string())), Some(parent));
        let domain = self
            .doc
            .add_node(Some(Bytes::from(hostname.host().to_string())), Some(node));
        let port = hostname
            .port()
            .map(|port| self.doc.add_node(Some(Bytes::from(port.to_string())), Some(node)));
        let facet = HostnameFacet {
            domain,
            port,
            hostname: hostname.clone(),
        };
        match self.doc.add_facet(node, facet) {
            Ok(()) => Some(node),
            Err(err) => {
                debug!(%err, "failed to attach hostname");
                None
            }
        }
    }

    /// Invoke every listener on every node reachable from `root`,
    /// children before parents.
    fn fire_listeners(&mut self, root: NodeId) {
        let converter = self.converter;
        if converter.listeners.is_empty() {
            return;
        }
        for node in post_order(self.doc.node(root)) {
            for listener in &converter.listeners {
                if let Err(err) = listener.on_converted(node, self) {
                    debug!(%err, "post-conversion listener failed");
                    self.push_note(node, format!("listener: {err}"), NoteStyle::Error);
                }
            }
        }
    }
}

/// Depth-first post-order over facet edges, each node once.
fn post_order(root: NodeRef<'_>) -> Vec<NodeId> {
    let mut order = Vec::new();
    let mut seen = HashSet::new();
    let mut stack = vec![(root, false)];
    seen.insert(root.id());
    while let Some((node, expanded)) = stack.pop() {
        if expanded {
            order.push(node.id());
            continue;
        }
        stack.push((node, true));
        let children: Vec<_> = node.children().into_iter().filter(|c| seen.insert(c.id())).collect();
        // reversed so the first child is visited first
        stack.extend(children.into_iter().rev().map(|c| (c, false)));
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facets::{HttpMessageFacet, HttpRequestFacet, MapFacet};
    use parking_lot::Mutex;

    /// Splits `a=b;c=d` into a map, converting each value.
    struct PairPlugin;

    impl ConverterPlugin for PairPlugin {
        fn name(&self) -> &'static str {
            "pairs"
        }

        fn can_convert(&self, node: NodeRef<'_>) -> bool {
            node.text().contains('=')
        }

        fn convert(&self, node: NodeId, ctx: &mut ConversionContext<'_>) -> Result<(), ConversionError> {
            let text = ctx.node(node).text().into_owned();
            let mut entries = Vec::new();
            for pair in text.split(';') {
                let (key, value) = pair.split_once('=').ok_or_else(|| ConversionError::Malformed {
                    format: "pairs",
                    reason: format!("missing '=' in '{pair}'"),
                })?;
                let child = ctx.convert(value.to_string(), Some(node));
                entries.push((key.into(), child));
            }
            ctx.add_facet(node, MapFacet::from_entries(entries))
        }
    }

    struct FailingPlugin;

    impl ConverterPlugin for FailingPlugin {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn convert(&self, _node: NodeId, _ctx: &mut ConversionContext<'_>) -> Result<(), ConversionError> {
            Err(ConversionError::Malformed {
                format: "failing",
                reason: "always".to_string(),
            })
        }
    }

    fn pair_converter() -> Converter {
        let mut converter = Converter::bare(ConverterConfig::default());
        converter.register_plugin(FailingPlugin);
        converter.register_plugin(PairPlugin);
        converter
    }

    #[test]
    fn test_failing_plugin_does_not_abort() {
        let converter = pair_converter();
        let doc = converter.convert("a=1;b=2");
        let root = doc.root();

        assert_eq!(root.first("a").map(|n| n.text().into_owned()), Some("1".to_string()));
        assert_eq!(root.first("b").map(|n| n.text().into_owned()), Some("2".to_string()));
        let notes = root.facet::<NoteFacet>().unwrap();
        assert_eq!(notes.errors().count(), 1);
        assert!(notes.notes()[0].value.starts_with("failing:"));
    }

    #[test]
    fn test_plugin_error_recorded_as_note() {
        let converter = pair_converter();
        let doc = converter.convert("a=1;broken");
        let root = doc.root();
        assert!(!root.has_facet::<MapFacet>());
        let notes = root.facet::<NoteFacet>().unwrap();
        assert_eq!(notes.errors().count(), 2);
    }

    #[test]
    fn test_rewrite_reaches_fixed_point() {
        let mut converter = Converter::bare(ConverterConfig::default());
        // strips one leading '>' per round
        converter.register_rewrite(
            NodeKind::Raw,
            |node: NodeId, ctx: &mut ConversionContext<'_>| -> Option<NodeId> {
                let text = ctx.node(node).text().into_owned();
                let parent = ctx.node(node).parent().map(|p| p.id());
                text.strip_prefix('>')
                    .map(|rest| ctx.add_node(Some(Bytes::from(rest.to_string())), parent))
            },
        );
        let doc = converter.convert(">>>payload");
        assert_eq!(doc.root().text(), "payload");
        assert!(doc.root().parent().is_none());
    }

    #[test]
    fn test_rewrite_loop_is_capped() {
        let config = ConverterConfig::default().with_max_rewrite_rounds(3);
        let mut converter = Converter::bare(config);
        let calls = Arc::new(Mutex::new(0usize));
        let counter = Arc::clone(&calls);
        converter.register_rewrite(
            NodeKind::Raw,
            move |node: NodeId, ctx: &mut ConversionContext<'_>| -> Option<NodeId> {
                *counter.lock() += 1;
                let content = ctx.node(node).raw_bytes().cloned();
                Some(ctx.add_node(content, None))
            },
        );
        let doc = converter.convert("loop");
        assert_eq!(*calls.lock(), 3);
        assert_eq!(doc.root().text(), "loop");
    }

    #[test]
    fn test_rewrite_kinds() {
        let mut converter = Converter::bare(ConverterConfig::default());
        let structured_calls = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&structured_calls);
        converter.register_rewrite(
            NodeKind::Structured,
            move |node: NodeId, ctx: &mut ConversionContext<'_>| -> Option<NodeId> {
                seen.lock().push(ctx.node(node).text().into_owned());
                None
            },
        );
        // decorates '+' nodes so the substitute is already structured
        converter.register_rewrite(
            NodeKind::Raw,
            |node: NodeId, ctx: &mut ConversionContext<'_>| -> Option<NodeId> {
                let rest = ctx.node(node).text().strip_prefix('+')?.to_string();
                let parent = ctx.node(node).parent().map(|p| p.id());
                let substitute = ctx.add_node(Some(Bytes::from(rest)), parent);
                ctx.push_note(substitute, "decorated", NoteStyle::Info);
                Some(substitute)
            },
        );

        let doc = converter.convert("fresh");
        assert_eq!(doc.root().kind(), NodeKind::Raw);
        assert!(structured_calls.lock().is_empty());

        let doc = converter.convert("+decorated");
        assert_eq!(doc.root().kind(), NodeKind::Structured);
        assert_eq!(*structured_calls.lock(), vec!["decorated".to_string()]);
    }

    #[test]
    fn test_skip_large_messages() {
        let config = ConverterConfig::default().with_skip_parsing_larger_than(4);
        let mut converter = Converter::bare(config);
        converter.register_plugin(PairPlugin);
        let doc = converter.convert("a=1;b=2");
        assert!(!doc.root().has_facet::<MapFacet>());
        assert!(doc.root().has_facet::<NoteFacet>());
    }

    #[test]
    fn test_depth_limit() {
        let config = ConverterConfig::default().with_max_conversion_depth(2);
        let mut converter = Converter::bare(config);
        converter.register_plugin(PairPlugin);
        // a=b=c=d nests one level per '=' after the first split
        let doc = converter.convert("a=b=c=d");
        let a = doc.root().first("a").unwrap();
        assert!(a.has_facet::<MapFacet>());
        let b = a.first("b").unwrap();
        assert!(!b.has_facet::<MapFacet>());
        assert!(b.has_facet::<NoteFacet>());
    }

    #[test]
    fn test_listeners_fire_children_first() {
        let mut converter = pair_converter();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        converter.register_listener(
            move |node: NodeId, ctx: &mut ConversionContext<'_>| -> Result<(), ConversionError> {
                sink.lock().push(ctx.node(node).path());
                Ok(())
            },
        );
        converter.parse_message("x=1;y=k=v", None, None);

        let order = seen.lock().clone();
        let position = |path: &str| order.iter().position(|p| p == path).unwrap();
        assert!(position("y.k") < position("y"));
        assert!(position("x") < position(""));
        assert!(position("y") < position(""));
        assert_eq!(order.last().map(String::as_str), Some(""));
    }

    #[test]
    fn test_parse_message_attaches_endpoints() {
        let converter = Converter::bare(ConverterConfig::default());
        let sender: Hostname = "client:50000".parse().unwrap();
        let receiver: Hostname = "server:443".parse().unwrap();
        let message = converter.parse_message("ping", Some(sender), Some(receiver));

        let root = message.root();
        let facet = root.facet::<TcpIpFacet>().unwrap();
        assert_eq!(facet.sequence_number, Some(0));
        assert_eq!(root.first("sender").unwrap().text(), "client:50000");
        let receiver = root.first("receiver").unwrap();
        assert_eq!(receiver.first("port").unwrap().text(), "443");
        assert_eq!(receiver.first("domain").unwrap().text(), "server");
    }

    #[test]
    fn test_response_links_latest_unmatched_request() {
        let mut doc_request = Document::new("req");
        let root = doc_request.root_id();
        let method = doc_request.add_node(Some(Bytes::from_static(b"GET")), Some(root));
        let path = doc_request.add_node(Some(Bytes::from_static(b"/")), Some(root));
        let header = doc_request.add_node(None, Some(root));
        let body = doc_request.add_node(None, Some(root));
        doc_request
            .add_facet(root, HttpRequestFacet { method, path })
            .unwrap();
        doc_request
            .add_facet(root, HttpMessageFacet { header, body })
            .unwrap();

        let converter = Converter::bare(ConverterConfig::default());
        let request = converter.history.append(doc_request);

        let mut converter_with_response = converter;
        converter_with_response.register_plugin(ResponseMarker);
        let response = converter_with_response.parse_message("resp", None, None);
        let linked = response
            .root()
            .facet::<HttpResponseFacet>()
            .and_then(|f| f.request.clone())
            .unwrap();
        assert!(Arc::ptr_eq(&linked, &request));

        // the request is now matched
        let second = converter_with_response.parse_message("resp", None, None);
        assert!(second
            .root()
            .facet::<HttpResponseFacet>()
            .unwrap()
            .request
            .is_none());
    }

    struct ResponseMarker;

    impl ConverterPlugin for ResponseMarker {
        fn name(&self) -> &'static str {
            "response-marker"
        }

        fn convert(&self, node: NodeId, ctx: &mut ConversionContext<'_>) -> Result<(), ConversionError> {
            if ctx.node(node).parent().is_some() {
                return Ok(());
            }
            let code = ctx.add_node(Some(Bytes::from_static(b"200")), Some(node));
            ctx.add_facet(node, HttpResponseFacet::new(code, None))
        }
    }

    #[test]
    fn test_history_ordering_across_threads() {
        let converter = Arc::new(Converter::bare(ConverterConfig::default()));
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let converter = Arc::clone(&converter);
                std::thread::spawn(move || {
                    for j in 0..25 {
                        converter.parse_message(format!("{i}-{j}"), None, None);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let sequences: Vec<_> = converter
            .history()
            .messages()
            .iter()
            .filter_map(|m| m.root().facet::<TcpIpFacet>().and_then(|f| f.sequence_number))
            .collect();
        assert_eq!(sequences.len(), 100);
        assert!(sequences.windows(2).all(|w| w[0] < w[1]));
    }
}
