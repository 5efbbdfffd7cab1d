//! HTTP client with tracing, domain allowlist, and byte streaming.
//!
//! This module provides a wrapped HTTP client that adds:
//! - Request/response tracing
//! - Domain allowlist for security
//! - Non-2xx responses surfaced as [`FetchError::HttpStatus`]
//! - Streaming byte downloads with progress reporting

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reqwest::{Client, Response, header::HeaderMap};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

use crate::cancel::{CancelToken, until_cancelled};
use crate::error::FetchError;

/// Default request timeout.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// User agent string for Grabline.
const USER_AGENT: &str = concat!("Grabline/", env!("CARGO_PKG_VERSION"));

/// Upper bound on the buffer reserved from a `Content-Length` header.
const MAX_PREALLOCATION: u64 = 8 * 1024 * 1024;

/// Progress callback for byte transfers: `(received, total)`, total 0 when unknown.
pub type TransferProgress<'a> = &'a (dyn Fn(u64, u64) + Send + Sync);

// ============================================================================
// Byte Fetcher
// ============================================================================

/// Fetches raw bytes for a URL.
///
/// Implementations must report non-2xx responses as
/// [`FetchError::HttpStatus`], never as a generic network error.
#[async_trait]
pub trait ByteFetcher: Send + Sync {
    /// Downloads the full body of `url`.
    async fn fetch_bytes(
        &self,
        url: &str,
        progress: Option<TransferProgress<'_>>,
        token: Option<&CancelToken>,
    ) -> Result<Bytes, FetchError>;
}

// ============================================================================
// HTTP Client
// ============================================================================

/// HTTP client wrapper with tracing and domain allowlist.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client,
    allowed_domains: Option<Vec<String>>,
}

impl HttpClient {
    /// Creates a new HTTP client with default settings.
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Creates a new HTTP client with a custom timeout.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built. This only happens when the
    /// system's TLS configuration is unusable, which leaves no way to make
    /// network requests at all.
    pub fn with_timeout(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|e| {
                panic!(
                    "Failed to create HTTP client: {e}. \
                    This usually indicates a broken TLS/SSL configuration."
                )
            });

        Self {
            inner: client,
            allowed_domains: None,
        }
    }

    /// Restricts requests to the given domains and their subdomains.
    pub fn with_allowed_domains(mut self, domains: Vec<String>) -> Self {
        self.allowed_domains = Some(domains);
        self
    }

    /// Checks if a URL's domain is allowed.
    fn is_domain_allowed(&self, url: &str) -> Result<(), FetchError> {
        let Some(ref allowed) = self.allowed_domains else {
            return Ok(());
        };

        let parsed = Url::parse(url)?;
        let host = parsed
            .host_str()
            .ok_or_else(|| FetchError::InvalidUrl("No host in URL".to_string()))?;

        let allowed = allowed
            .iter()
            .any(|domain| host == domain || host.ends_with(&format!(".{domain}")));

        if allowed {
            Ok(())
        } else {
            Err(FetchError::DomainNotAllowed(host.to_string()))
        }
    }

    /// Performs a GET request with custom headers.
    #[instrument(skip(self, headers), fields(url = %url))]
    pub async fn get_with_headers(&self, url: &str, headers: HeaderMap) -> Result<Response, FetchError> {
        self.is_domain_allowed(url)?;
        debug!("GET request with headers");

        let response = self.inner.get(url).headers(headers).send().await?;
        debug!(status = %response.status(), "Response received");
        Ok(response)
    }

    /// Performs a POST request with custom headers and no body.
    #[instrument(skip(self, headers), fields(url = %url))]
    pub async fn post_with_headers(&self, url: &str, headers: HeaderMap) -> Result<Response, FetchError> {
        self.is_domain_allowed(url)?;
        debug!("POST request with headers");

        let response = self.inner.post(url).headers(headers).send().await?;
        debug!(status = %response.status(), "Response received");
        Ok(response)
    }

    /// Performs a GET and decodes a JSON body, failing on non-2xx.
    pub async fn get_json(&self, url: &str, headers: HeaderMap) -> Result<Value, FetchError> {
        let response = ensure_success(self.get_with_headers(url, headers).await?)?;
        Ok(response.json().await?)
    }

    /// Performs a POST and decodes a JSON body, failing on non-2xx.
    pub async fn post_json(&self, url: &str, headers: HeaderMap) -> Result<Value, FetchError> {
        let response = ensure_success(self.post_with_headers(url, headers).await?)?;
        Ok(response.json().await?)
    }

    /// Returns the inner reqwest client for advanced operations.
    pub fn inner(&self) -> &Client {
        &self.inner
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ByteFetcher for HttpClient {
    #[instrument(skip(self, progress, token), fields(url = %url))]
    async fn fetch_bytes(
        &self,
        url: &str,
        progress: Option<TransferProgress<'_>>,
        token: Option<&CancelToken>,
    ) -> Result<Bytes, FetchError> {
        self.is_domain_allowed(url)?;

        let response = until_cancelled(self.inner.get(url).send(), token).await??;
        let mut response = ensure_success(response)?;
        let total = response.content_length().unwrap_or(0);
        debug!(total, "Streaming body");

        let reserve = usize::try_from(total.min(MAX_PREALLOCATION)).unwrap_or(0);
        let mut body = BytesMut::with_capacity(reserve);
        while let Some(chunk) = until_cancelled(response.chunk(), token).await?? {
            body.extend_from_slice(&chunk);
            if let Some(report) = progress {
                report(body.len() as u64, total);
            }
        }

        debug!(bytes = body.len(), "Body received");
        Ok(body.freeze())
    }
}

/// Converts non-2xx responses into [`FetchError::HttpStatus`].
fn ensure_success(response: Response) -> Result<Response, FetchError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        debug!(status = %status, "Non-success response");
        Err(FetchError::HttpStatus(status.as_u16()))
    }
}

// ============================================================================
// Tests
// ============================================================================
