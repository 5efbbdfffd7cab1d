//! Host context bundling the capabilities a download may use.
//!
//! Capabilities are optional: which ones are present decides the transport
//! chain a download gets.

use std::sync::Arc;

use crate::host::{ByteFetcher, ByteSink, UrlSaver};

// ============================================================================
// Host Context
// ============================================================================

/// Capabilities provided by the host environment.
#[derive(Clone, Default)]
pub struct HostContext {
    /// Privileged "save URL to disk" primitive.
    pub saver: Option<Arc<dyn UrlSaver>>,
    /// Saves already-fetched bytes.
    pub sink: Option<Arc<dyn ByteSink>>,
    /// Fetches bytes over the network.
    pub fetcher: Option<Arc<dyn ByteFetcher>>,
}

impl HostContext {
    /// Creates a context with no capabilities.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder for the context.
    pub fn builder() -> HostContextBuilder {
        HostContextBuilder::new()
    }

    /// Returns true if bytes can be saved.
    pub fn can_save_bytes(&self) -> bool {
        self.sink.is_some()
    }

    /// Returns true if bytes can be fetched and saved.
    pub fn can_fetch_and_save(&self) -> bool {
        self.fetcher.is_some() && self.sink.is_some()
    }

    /// Names of the capabilities present, for diagnostics.
    pub fn capability_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.saver.is_some() {
            names.push("url_saver");
        }
        if self.sink.is_some() {
            names.push("byte_sink");
        }
        if self.fetcher.is_some() {
            names.push("byte_fetcher");
        }
        names
    }
}

impl std::fmt::Debug for HostContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostContext")
            .field("capabilities", &self.capability_names())
            .finish()
    }
}

// ============================================================================
// Host Context Builder
// ============================================================================

/// Builder for constructing a [`HostContext`].
#[derive(Default)]
pub struct HostContextBuilder {
    context: HostContext,
}

impl HostContextBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the privileged saver.
    pub fn saver(mut self, saver: Arc<dyn UrlSaver>) -> Self {
        self.context.saver = Some(saver);
        self
    }

    /// Sets the byte sink.
    pub fn sink(mut self, sink: Arc<dyn ByteSink>) -> Self {
        self.context.sink = Some(sink);
        self
    }

    /// Sets the byte fetcher.
    pub fn fetcher(mut self, fetcher: Arc<dyn ByteFetcher>) -> Self {
        self.context.fetcher = Some(fetcher);
        self
    }

    /// Builds the context.
    pub fn build(self) -> HostContext {
        self.context
    }
}
