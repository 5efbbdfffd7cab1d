//! Host API client.
//!
//! Looks a post up by id, normalizes it, and turns its media (and the media
//! of a quoted post, one level deep) into [`MediaDescriptor`]s.

use async_trait::async_trait;
use grabline_core::{MediaDescriptor, SourceLocation};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

use super::media::extract_media;
use super::normalizer::{CanonicalPost, locate_post, normalize_post};
use super::query::{DEFAULT_QUERY_ID, post_query_url};
use super::request_cache::RequestCache;
use crate::cancel::{CancelToken, until_cancelled};
use crate::error::FetchError;
use crate::host::{Credentials, HttpClient};

// ============================================================================
// Constants
// ============================================================================

/// Default API host.
pub const DEFAULT_API_HOST: &str = "x.com";

/// Public bearer token of the web client.
pub const DEFAULT_BEARER_TOKEN: &str = "Bearer AAAAAAAAAAAAAAAAAAAAANRILgAAAAAAnNwIzUejRCOuH5E6I8xnZz4puTs%3D1Zv7ttfk8LF81IUq16cHjhLTvJu4FA33AGWWjCpTnA";

/// Endpoint issuing guest tokens.
pub const GUEST_ACTIVATE_URL: &str = "https://api.twitter.com/1.1/guest/activate.json";

// ============================================================================
// Transport
// ============================================================================

/// JSON transport used by the API client.
///
/// Non-2xx responses must surface as [`FetchError::HttpStatus`].
#[async_trait]
pub trait ApiTransport: Send + Sync {
    /// Performs a GET and decodes the JSON body.
    async fn get_json(&self, url: &str, headers: HeaderMap) -> Result<Value, FetchError>;

    /// Performs a body-less POST and decodes the JSON body.
    async fn post_json(&self, url: &str, headers: HeaderMap) -> Result<Value, FetchError>;
}

#[async_trait]
impl ApiTransport for HttpClient {
    async fn get_json(&self, url: &str, headers: HeaderMap) -> Result<Value, FetchError> {
        HttpClient::get_json(self, url, headers).await
    }

    async fn post_json(&self, url: &str, headers: HeaderMap) -> Result<Value, FetchError> {
        HttpClient::post_json(self, url, headers).await
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Static configuration of the API client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiClientConfig {
    /// Host serving the query endpoint.
    pub api_host: String,
    /// Query-operation id.
    pub query_id: String,
    /// Value of the `authorization` header.
    pub bearer_token: String,
    /// Page origin for `referer`/`origin`; `None` outside a page context.
    pub page_origin: Option<String>,
    /// Whether to request a guest token when none is known.
    pub activate_guest: bool,
}

impl Default for ApiClientConfig {
    fn default() -> Self {
        Self {
            api_host: DEFAULT_API_HOST.to_string(),
            query_id: DEFAULT_QUERY_ID.to_string(),
            bearer_token: DEFAULT_BEARER_TOKEN.to_string(),
            page_origin: None,
            activate_guest: true,
        }
    }
}

// ============================================================================
// Client
// ============================================================================

/// Client for the host's post lookup API.
pub struct HostApiClient {
    transport: Arc<dyn ApiTransport>,
    config: ApiClientConfig,
    credentials: Credentials,
    guest_token: OnceCell<Option<String>>,
    cache: Arc<RequestCache>,
}

impl HostApiClient {
    /// Creates a client with its own request cache.
    pub fn new(transport: Arc<dyn ApiTransport>, config: ApiClientConfig, credentials: Credentials) -> Self {
        Self {
            transport,
            config,
            credentials,
            guest_token: OnceCell::new(),
            cache: Arc::new(RequestCache::new()),
        }
    }

    /// Shares an existing request cache.
    pub fn with_cache(mut self, cache: Arc<RequestCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Returns the request cache.
    pub fn cache(&self) -> &Arc<RequestCache> {
        &self.cache
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &ApiClientConfig {
        &self.config
    }

    /// Fetches the media of a post, primary media first, quoted media after.
    #[instrument(skip(self, token), fields(post_id = %post_id))]
    pub async fn fetch_post_media(
        &self,
        post_id: &str,
        token: Option<&CancelToken>,
    ) -> Result<Vec<MediaDescriptor>, FetchError> {
        let post = self.fetch_post(post_id, token).await?;
        let mut items = extract_media(&post, SourceLocation::Primary, 0);
        let primary_count = items.len();

        if let Some(quoted) = post.quoted.as_ref().and_then(normalize_post) {
            let quoted_items = extract_media(&quoted, SourceLocation::Quoted, primary_count);
            debug!(quoted_id = %quoted.id, count = quoted_items.len(), "Quoted post media");
            items.extend(quoted_items);
        }

        info!(primary = primary_count, total = items.len(), "Post media extracted");
        Ok(items)
    }

    /// Fetches and normalizes a post.
    pub async fn fetch_post(&self, post_id: &str, token: Option<&CancelToken>) -> Result<CanonicalPost, FetchError> {
        let url = post_query_url(&self.config.api_host, &self.config.query_id, post_id)?;
        let response = self.request(&url, token).await?;

        let node = locate_post(&response)
            .ok_or_else(|| FetchError::SchemaMismatch(format!("no post node for {post_id}")))?;
        normalize_post(node).ok_or_else(|| FetchError::SchemaMismatch(format!("no author for post {post_id}")))
    }

    async fn request(&self, url: &str, token: Option<&CancelToken>) -> Result<Arc<Value>, FetchError> {
        if let Some(cached) = self.cache.get(url) {
            debug!("Using cached API response");
            return Ok(cached);
        }

        let headers = self.headers(token).await?;
        let response = until_cancelled(self.transport.get_json(url, headers), token).await??;
        let response = Arc::new(response);
        self.cache.insert(url, Arc::clone(&response));
        Ok(response)
    }

    /// Resolves the guest token, activating one on first use.
    ///
    /// A failed activation is remembered as "no guest token". A cancelled
    /// one stores nothing and aborts only the current request.
    async fn guest_token(&self, token: Option<&CancelToken>) -> Result<Option<String>, FetchError> {
        if let Some(guest) = &self.credentials.guest {
            return Ok(Some(guest.clone()));
        }
        if !self.config.activate_guest {
            return Ok(None);
        }

        let guest = self
            .guest_token
            .get_or_try_init(|| async {
                let activation = until_cancelled(self.activate_guest(), token).await?;
                let guest = activation
                    .inspect_err(|e| warn!(error = %e, "Guest activation failed"))
                    .ok();
                Ok::<_, FetchError>(guest)
            })
            .await?;
        Ok(guest.clone())
    }

    async fn activate_guest(&self) -> Result<String, FetchError> {
        let mut headers = HeaderMap::new();
        insert_header(&mut headers, "authorization", &self.config.bearer_token)?;
        insert_header(&mut headers, "content-type", "application/json")?;

        let response = self.transport.post_json(GUEST_ACTIVATE_URL, headers).await?;
        let guest = response
            .get("guest_token")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| FetchError::SchemaMismatch("activation response without guest_token".to_string()))?;
        debug!("Guest token activated");
        Ok(guest.to_string())
    }

    async fn headers(&self, token: Option<&CancelToken>) -> Result<HeaderMap, FetchError> {
        let mut headers = HeaderMap::new();
        insert_header(&mut headers, "authorization", &self.config.bearer_token)?;
        insert_header(&mut headers, "x-csrf-token", self.credentials.csrf.as_deref().unwrap_or_default())?;
        insert_header(&mut headers, "x-twitter-client-language", "en")?;
        insert_header(&mut headers, "x-twitter-active-user", "yes")?;
        insert_header(&mut headers, "content-type", "application/json")?;

        match self.guest_token(token).await? {
            Some(guest) => insert_header(&mut headers, "x-guest-token", &guest)?,
            None => insert_header(&mut headers, "x-twitter-auth-type", "OAuth2Session")?,
        }

        if let Some(origin) = &self.config.page_origin {
            insert_header(&mut headers, "referer", origin)?;
            insert_header(&mut headers, "origin", origin)?;
        }
        Ok(headers)
    }
}

impl std::fmt::Debug for HostApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostApiClient")
            .field("config", &self.config)
            .field("has_session", &self.credentials.has_session())
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}

fn insert_header(headers: &mut HeaderMap, name: &'static str, value: &str) -> Result<(), FetchError> {
    let value = HeaderValue::from_str(value).map_err(|e| FetchError::Other(format!("invalid {name} header: {e}")))?;
    headers.insert(HeaderName::from_static(name), value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockTransport {
        get_response: Mutex<Option<Result<Value, FetchError>>>,
        post_response: Mutex<Option<Result<Value, FetchError>>>,
        gets: Mutex<Vec<HeaderMap>>,
        posts: Mutex<usize>,
    }

    impl MockTransport {
        fn returning(response: Result<Value, FetchError>) -> Self {
            Self {
                get_response: Mutex::new(Some(response)),
                ..Self::default()
            }
        }

        fn get_count(&self) -> usize {
            self.gets.lock().unwrap().len()
        }

        fn last_headers(&self) -> HeaderMap {
            self.gets.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl ApiTransport for MockTransport {
        async fn get_json(&self, _url: &str, headers: HeaderMap) -> Result<Value, FetchError> {
            self.gets.lock().unwrap().push(headers);
            self.get_response.lock().unwrap().clone().unwrap()
        }

        async fn post_json(&self, _url: &str, _headers: HeaderMap) -> Result<Value, FetchError> {
            *self.posts.lock().unwrap() += 1;
            self.post_response
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| Err(FetchError::HttpStatus(403)))
        }
    }

    fn photo(id: &str) -> Value {
        json!({ "id_str": id, "type": "photo", "media_url_https": format!("https://pbs.twimg.com/media/{id}.jpg") })
    }

    fn response_with_quote() -> Value {
        json!({ "data": { "tweetResult": { "result": {
            "rest_id": "100",
            "core": { "user_results": { "result": { "legacy": { "screen_name": "alice" } } } },
            "legacy": { "extended_entities": { "media": [photo("p1"), photo("p2")] } },
            "quoted_status_result": { "result": {
                "rest_id": "200",
                "core": { "user_results": { "result": { "legacy": { "screen_name": "bob" } } } },
                "legacy": { "extended_entities": { "media": [photo("q1")] } }
            } }
        } } } })
    }

    fn client(transport: Arc<MockTransport>, credentials: Credentials) -> HostApiClient {
        let config = ApiClientConfig {
            activate_guest: false,
            ..ApiClientConfig::default()
        };
        HostApiClient::new(transport, config, credentials)
    }

    #[tokio::test]
    async fn test_quoted_media_follows_primary() {
        let transport = Arc::new(MockTransport::returning(Ok(response_with_quote())));
        let api = client(transport, Credentials::new());

        let items = api.fetch_post_media("100", None).await.unwrap();
        let ids: Vec<_> = items.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p2", "q1"]);
        assert_eq!(items[2].index, 2);
        assert_eq!(items[2].source_location, SourceLocation::Quoted);
        assert_eq!(items[2].post_id, "200");
        assert_eq!(items[2].author_handle.as_deref(), Some("bob"));
        assert!(items[..2].iter().all(|d| !d.is_quoted()));
    }

    #[tokio::test]
    async fn test_successful_response_is_cached() {
        let transport = Arc::new(MockTransport::returning(Ok(response_with_quote())));
        let api = client(Arc::clone(&transport), Credentials::new());

        api.fetch_post_media("100", None).await.unwrap();
        api.fetch_post_media("100", None).await.unwrap();
        assert_eq!(transport.get_count(), 1);
        assert_eq!(api.cache().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_response_not_cached() {
        let transport = Arc::new(MockTransport::returning(Err(FetchError::HttpStatus(429))));
        let api = client(Arc::clone(&transport), Credentials::new());

        let err = api.fetch_post_media("100", None).await.unwrap_err();
        assert_eq!(err, FetchError::HttpStatus(429));
        assert!(api.fetch_post_media("100", None).await.is_err());
        assert_eq!(transport.get_count(), 2);
        assert!(api.cache().is_empty());
    }

    #[tokio::test]
    async fn test_missing_author_is_schema_mismatch() {
        let response = json!({ "data": { "tweetResult": { "result": { "rest_id": "1" } } } });
        let transport = Arc::new(MockTransport::returning(Ok(response)));
        let api = client(transport, Credentials::new());

        let err = api.fetch_post_media("1", None).await.unwrap_err();
        assert!(matches!(err, FetchError::SchemaMismatch(_)));
    }

    #[tokio::test]
    async fn test_headers_guest_and_session() {
        let transport = Arc::new(MockTransport::returning(Ok(response_with_quote())));
        let api = client(Arc::clone(&transport), Credentials::new().with_csrf("c").with_guest("g"));
        api.fetch_post_media("100", None).await.unwrap();

        let headers = transport.last_headers();
        assert_eq!(headers["x-csrf-token"], "c");
        assert_eq!(headers["x-guest-token"], "g");
        assert!(!headers.contains_key("x-twitter-auth-type"));
        assert!(!headers.contains_key("referer"));
        assert!(!headers.contains_key("origin"));

        let transport = Arc::new(MockTransport::returning(Ok(response_with_quote())));
        let api = client(Arc::clone(&transport), Credentials::new());
        api.fetch_post_media("100", None).await.unwrap();

        let headers = transport.last_headers();
        assert_eq!(headers["x-csrf-token"], "");
        assert_eq!(headers["x-twitter-auth-type"], "OAuth2Session");
    }

    #[tokio::test]
    async fn test_page_origin_sets_referer() {
        let transport = Arc::new(MockTransport::returning(Ok(response_with_quote())));
        let config = ApiClientConfig {
            page_origin: Some("https://x.com".to_string()),
            activate_guest: false,
            ..ApiClientConfig::default()
        };
        let api = HostApiClient::new(Arc::clone(&transport) as Arc<dyn ApiTransport>, config, Credentials::new());
        api.fetch_post_media("100", None).await.unwrap();

        let headers = transport.last_headers();
        assert_eq!(headers["referer"], "https://x.com");
        assert_eq!(headers["origin"], "https://x.com");
    }

    #[tokio::test]
    async fn test_guest_activation_runs_once() {
        let transport = Arc::new(MockTransport::returning(Ok(response_with_quote())));
        *transport.post_response.lock().unwrap() = Some(Ok(json!({ "guest_token": "fresh" })));
        let api = HostApiClient::new(
            Arc::clone(&transport) as Arc<dyn ApiTransport>,
            ApiClientConfig::default(),
            Credentials::new(),
        );

        api.fetch_post_media("100", None).await.unwrap();
        api.fetch_post_media("101", None).await.unwrap();
        assert_eq!(*transport.posts.lock().unwrap(), 1);
        assert_eq!(transport.last_headers()["x-guest-token"], "fresh");
    }

    #[tokio::test]
    async fn test_cancelled_activation_is_retried_later() {
        let transport = Arc::new(MockTransport::returning(Ok(response_with_quote())));
        *transport.post_response.lock().unwrap() = Some(Ok(json!({ "guest_token": "fresh" })));
        let api = HostApiClient::new(
            Arc::clone(&transport) as Arc<dyn ApiTransport>,
            ApiClientConfig::default(),
            Credentials::new(),
        );
        let token = CancelToken::new();
        token.cancel("user");

        let err = api.fetch_post_media("100", Some(&token)).await.unwrap_err();
        assert!(err.is_aborted());
        assert_eq!(transport.get_count(), 0);

        api.fetch_post_media("100", None).await.unwrap();
        assert_eq!(*transport.posts.lock().unwrap(), 1);
        let headers = transport.last_headers();
        assert_eq!(headers["x-guest-token"], "fresh");
        assert!(headers.get("x-twitter-auth-type").is_none());
    }

    #[tokio::test]
    async fn test_failed_activation_falls_back_to_session() {
        let transport = Arc::new(MockTransport::returning(Ok(response_with_quote())));
        *transport.post_response.lock().unwrap() = Some(Err(FetchError::HttpStatus(403)));
        let api = HostApiClient::new(
            Arc::clone(&transport) as Arc<dyn ApiTransport>,
            ApiClientConfig::default(),
            Credentials::new(),
        );

        api.fetch_post_media("100", None).await.unwrap();
        api.fetch_post_media("101", None).await.unwrap();
        assert_eq!(*transport.posts.lock().unwrap(), 1);
        assert_eq!(transport.last_headers()["x-twitter-auth-type"], "OAuth2Session");
    }

    #[tokio::test]
    async fn test_cancelled_token_aborts() {
        let transport = Arc::new(MockTransport::returning(Ok(response_with_quote())));
        let api = client(Arc::clone(&transport), Credentials::new());
        let token = CancelToken::new();
        token.cancel("user");

        let err = api.fetch_post_media("100", Some(&token)).await.unwrap_err();
        assert!(err.is_aborted());
    }
}
