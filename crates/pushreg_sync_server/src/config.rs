//! Server configuration.

use std::collections::BTreeSet;

/// Configuration for the registration server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Accepted API keys; empty accepts any key.
    pub api_keys: BTreeSet<String>,
    /// Maximum categories per registration.
    pub max_categories: usize,
    /// Maximum items per tracking batch.
    pub max_batch_items: usize,
    /// Status codes returned, in order, before requests are served.
    pub injected_failures: Vec<u16>,
}

impl ServerConfig {
    /// Creates a configuration that accepts any API key.
    pub fn new() -> Self {
        Self {
            api_keys: BTreeSet::new(),
            max_categories: 1000,
            max_batch_items: 1000,
            injected_failures: Vec::new(),
        }
    }

    /// Accepts the given API key. Once any key is added, others are
    /// rejected.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_keys.insert(key.into());
        self
    }

    /// Sets the maximum categories per registration.
    pub fn with_max_categories(mut self, max: usize) -> Self {
        self.max_categories = max;
        self
    }

    /// Sets the maximum items per tracking batch.
    pub fn with_max_batch_items(mut self, max: usize) -> Self {
        self.max_batch_items = max;
        self
    }

    /// Answers the first `count` requests with `status`.
    pub fn with_failures(mut self, status: u16, count: usize) -> Self {
        self.injected_failures
            .extend(std::iter::repeat(status).take(count));
        self
    }

    /// Returns true if `key` is accepted.
    pub fn accepts(&self, key: &str) -> bool {
        self.api_keys.is_empty() || self.api_keys.contains(key)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}
