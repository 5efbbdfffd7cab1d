// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `Grabline` Store
//!
//! Settings and persistence for `Grabline`.
//!
//! This crate provides:
//!
//! - **Settings**: Every knob of the extraction and download pipeline,
//!   convertible into the fetch crate's runtime types
//! - **SettingsStore**: Settings with persistence and change notification
//! - **Persistence**: Atomic, owner-only JSON file helpers
//!
//! ## Usage
//!
//! ```ignore
//! use grabline_store::SettingsStore;
//!
//! let store = SettingsStore::load_default().await?;
//! let config = store.fetch_config().await;
//!
//! let orchestrator = DownloadOrchestrator::with_config(context, config.download);
//! ```

pub mod error;
pub mod persistence;
pub mod settings_store;

pub use error::StoreError;
pub use persistence::{
    default_config_dir, default_download_dir, default_settings_path, ensure_dir, load_json, load_json_or_default,
    save_json,
};
pub use settings_store::{FetchConfig, LogLevel, Settings, SettingsStore};
