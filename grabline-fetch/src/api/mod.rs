//! Host API access.
//!
//! - [`normalizer`] - Reduces legacy and current post shapes to one shape
//! - [`query`] - Builds the lookup URL
//! - [`request_cache`] - FIFO cache of successful responses
//! - [`media`] - Turns media entries into descriptors
//! - [`client`] - Ties the above together behind [`HostApiClient`]

pub mod client;
pub mod media;
pub mod normalizer;
pub mod query;
pub mod request_cache;

pub use client::{ApiClientConfig, ApiTransport, DEFAULT_API_HOST, DEFAULT_BEARER_TOKEN, HostApiClient};
pub use normalizer::{CanonicalAuthor, CanonicalPost, locate_post, normalize_post};
pub use query::{DEFAULT_QUERY_ID, post_query_url};
pub use request_cache::{REQUEST_CACHE_CAPACITY, RequestCache};
