// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `Grabline` Extract
//!
//! Turns a click on a post into an ordered list of media descriptors.
//!
//! ## Strategies
//!
//! | Strategy | Kind | Source | Result name |
//! |----------|------|--------|-------------|
//! | [`ApiStrategy`] | API | Host post lookup by id | `api` |
//! | [`FallbackStrategy`] | DOM | `img`, `video`, `data-*`, inline backgrounds | `fallback` |
//!
//! A failing fallback is reported as `fallback-failed`.
//!
//! ## Building Blocks
//!
//! - [`post`] - Post id and author from status links
//! - [`resolver`] - Maps the clicked element onto an API descriptor list
//! - [`fallback`] - DOM scan with its own clicked detection and dedup
//! - [`url_match`] - Media URL normalization
//!
//! ## Usage
//!
//! ```ignore
//! use grabline_extract::ExtractionPipeline;
//! use grabline_core::StrategyMode;
//! use scraper::{Html, Selector};
//!
//! let doc = Html::parse_document(&html);
//! let container = doc.select(&Selector::parse("article").unwrap()).next().unwrap();
//! let clicked = doc.select(&Selector::parse("img").unwrap()).nth(1).unwrap();
//!
//! let pipeline = ExtractionPipeline::with_api_client(client);
//! let result = pipeline.extract(container, clicked, StrategyMode::Auto).await;
//! ```

pub mod dom;
pub mod error;
pub mod fallback;
pub mod pipeline;
pub mod post;
pub mod resolver;
pub mod strategy;
pub mod url_match;

// Re-export key types
pub use error::ExtractError;
pub use fallback::{FALLBACK_SOURCE_KEY, FallbackOutcome, FallbackSource, extract_from_dom};
pub use pipeline::{
    API_STRATEGY_NAME, ExtractionAttempt, ExtractionOutcome, ExtractionPipeline, FALLBACK_FAILED_NAME,
    FALLBACK_STRATEGY_NAME,
};
pub use post::resolve_post_info;
pub use resolver::{MAX_SEARCH_DEPTH, resolve_clicked_index};
pub use strategy::{ApiStrategy, ExtractionStrategy, FallbackStrategy, PageContext, StrategyKind, StrategyOutput};
pub use url_match::{match_descriptor, normalize_media_url};
