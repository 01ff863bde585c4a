//! Converter configuration.

use crate::key::Key;

/// Default history bound: 1 GiB of raw message bytes.
pub const DEFAULT_BUFFER_LIMIT: usize = 1024 * 1024 * 1024;

/// Default cap on pre-conversion rewrite rounds per node.
pub const DEFAULT_MAX_REWRITE_ROUNDS: usize = 16;

/// Default cap on nested conversion depth.
pub const DEFAULT_MAX_CONVERSION_DEPTH: usize = 64;

/// Configuration for a [`Converter`](super::Converter).
#[derive(Debug, Clone)]
pub struct ConverterConfig {
    /// Evict old messages once the history exceeds `buffer_limit_bytes`
    pub manage_buffer: bool,
    pub buffer_limit_bytes: usize,
    /// Messages larger than this are kept raw, without running plugins
    pub skip_parsing_larger_than: Option<usize>,
    pub max_rewrite_rounds: usize,
    /// Nested conversions deeper than this are kept raw
    pub max_conversion_depth: usize,
    /// Keys registered with the key manager at construction
    pub keys: Vec<Key>,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            manage_buffer: true,
            buffer_limit_bytes: DEFAULT_BUFFER_LIMIT,
            skip_parsing_larger_than: None,
            max_rewrite_rounds: DEFAULT_MAX_REWRITE_ROUNDS,
            max_conversion_depth: DEFAULT_MAX_CONVERSION_DEPTH,
            keys: Vec::new(),
        }
    }
}

impl ConverterConfig {
    pub fn with_buffer_limit_bytes(mut self, limit: usize) -> Self {
        self.manage_buffer = true;
        self.buffer_limit_bytes = limit;
        self
    }

    pub fn with_buffer_limit_mb(self, megabytes: usize) -> Self {
        self.with_buffer_limit_bytes(megabytes.saturating_mul(1024 * 1024))
    }

    /// Keep every message regardless of total size.
    pub fn without_buffer_management(mut self) -> Self {
        self.manage_buffer = false;
        self
    }

    pub fn with_skip_parsing_larger_than(mut self, bytes: usize) -> Self {
        self.skip_parsing_larger_than = Some(bytes);
        self
    }

    pub fn with_max_rewrite_rounds(mut self, rounds: usize) -> Self {
        self.max_rewrite_rounds = rounds;
        self
    }

    pub fn with_max_conversion_depth(mut self, depth: usize) -> Self {
        self.max_conversion_depth = depth;
        self
    }

    pub fn with_key(mut self, key: Key) -> Self {
        self.keys.push(key);
        self
    }

    /// History bound in bytes, if buffer management is enabled.
    pub fn history_limit(&self) -> Option<usize> {
        self.manage_buffer.then_some(self.buffer_limit_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ConverterConfig::default();
        assert!(config.manage_buffer);
        assert_eq!(config.history_limit(), Some(DEFAULT_BUFFER_LIMIT));
        assert_eq!(config.max_rewrite_rounds, 16);
        assert!(config.skip_parsing_larger_than.is_none());
    }

    #[test]
    fn test_builder() {
        let config = ConverterConfig::default()
            .with_buffer_limit_mb(2)
            .with_skip_parsing_larger_than(512)
            .with_key(Key::new("k", b"secret".to_vec(), 1));
        assert_eq!(config.history_limit(), Some(2 * 1024 * 1024));
        assert_eq!(config.skip_parsing_larger_than, Some(512));
        assert_eq!(config.keys.len(), 1);

        let unbounded = config.without_buffer_management();
        assert_eq!(unbounded.history_limit(), None);
    }
}
