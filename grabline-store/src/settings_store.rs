//! User preferences store.
//!
//! Holds the settings that wire the extraction and download pipeline
//! together, with persistence and change notification.

use grabline_core::StrategyMode;
use grabline_fetch::{ApiClientConfig, CookieJar, Credentials, DownloadConfig, RetryPolicy};
use grabline_fetch::api::{DEFAULT_API_HOST, DEFAULT_BEARER_TOKEN, DEFAULT_QUERY_ID};
use grabline_fetch::download::{DEFAULT_CONCURRENCY, DEFAULT_PRIVILEGED_TIMEOUT};
use grabline_fetch::prefetch::DEFAULT_PREFETCH_CAPACITY;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, watch};
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::persistence::{default_download_dir, default_settings_path, load_json, save_json};

// ============================================================================
// Settings Types
// ============================================================================

/// User preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // ========================================================================
    // Host API
    // ========================================================================
    /// Host serving the post lookup endpoint.
    pub api_host: String,

    /// Query-operation id of the post lookup.
    pub query_id: String,

    /// Bearer token sent with every lookup.
    pub bearer_token: String,

    /// `Cookie` header used to read the CSRF and guest tokens.
    pub cookie_header: Option<String>,

    /// Page origin for `referer`/`origin`, when running next to a page.
    pub page_origin: Option<String>,

    /// Request a guest token when the cookies carry none.
    pub activate_guest: bool,

    /// Which extraction path to use.
    pub strategy_mode: StrategyMode,

    // ========================================================================
    // Downloads
    // ========================================================================
    /// Where media is saved; `None` uses the platform download dir.
    pub download_dir: Option<PathBuf>,

    /// Batch worker count.
    pub concurrency: usize,

    /// Attempts per transport, including the first.
    pub retry_attempts: u32,

    /// Delay before the first retry.
    pub retry_base_delay_ms: u64,

    /// Upper bound for any retry delay.
    pub retry_max_delay_ms: u64,

    /// Per-attempt deadline of the privileged saver.
    pub privileged_timeout_secs: u64,

    /// Save through the direct URL saver before falling back to fetch-and-save.
    pub enable_direct_saver: bool,

    // ========================================================================
    // Network & Caching
    // ========================================================================
    /// HTTP request timeout.
    pub request_timeout_secs: u64,

    /// Maximum number of prefetched entries.
    pub prefetch_capacity: usize,

    // ========================================================================
    // Diagnostics
    // ========================================================================
    /// Log level.
    pub log_level: LogLevel,
}

impl Default for Settings {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            api_host: DEFAULT_API_HOST.to_string(),
            query_id: DEFAULT_QUERY_ID.to_string(),
            bearer_token: DEFAULT_BEARER_TOKEN.to_string(),
            cookie_header: None,
            page_origin: None,
            activate_guest: true,
            strategy_mode: StrategyMode::Auto,
            download_dir: None,
            concurrency: DEFAULT_CONCURRENCY,
            retry_attempts: retry.max_attempts,
            retry_base_delay_ms: duration_ms(retry.base_delay),
            retry_max_delay_ms: duration_ms(retry.max_delay),
            privileged_timeout_secs: DEFAULT_PRIVILEGED_TIMEOUT.as_secs(),
            enable_direct_saver: false,
            request_timeout_secs: 30,
            prefetch_capacity: DEFAULT_PREFETCH_CAPACITY,
            log_level: LogLevel::default(),
        }
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl Settings {
    /// Checks that every numeric setting is usable.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidSetting`] naming the first bad field.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.api_host.trim().is_empty() {
            return Err(StoreError::invalid("api_host", "must not be empty"));
        }
        if self.query_id.trim().is_empty() {
            return Err(StoreError::invalid("query_id", "must not be empty"));
        }
        if self.concurrency == 0 {
            return Err(StoreError::invalid("concurrency", "must be at least 1"));
        }
        if self.retry_attempts == 0 {
            return Err(StoreError::invalid("retry_attempts", "must be at least 1"));
        }
        if self.retry_base_delay_ms > self.retry_max_delay_ms {
            return Err(StoreError::invalid(
                "retry_base_delay_ms",
                format!("exceeds retry_max_delay_ms ({})", self.retry_max_delay_ms),
            ));
        }
        if self.privileged_timeout_secs == 0 {
            return Err(StoreError::invalid("privileged_timeout_secs", "must be positive"));
        }
        if self.request_timeout_secs == 0 {
            return Err(StoreError::invalid("request_timeout_secs", "must be positive"));
        }
        if self.prefetch_capacity == 0 {
            return Err(StoreError::invalid("prefetch_capacity", "must be at least 1"));
        }
        Ok(())
    }

    /// Retry policy for download transports.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_attempts.max(1))
            .with_base_delay(Duration::from_millis(self.retry_base_delay_ms))
            .with_max_delay(Duration::from_millis(self.retry_max_delay_ms))
    }

    /// Download orchestrator settings.
    pub fn download_config(&self) -> DownloadConfig {
        DownloadConfig::default()
            .with_retry(self.retry_policy())
            .with_privileged_timeout(self.privileged_timeout())
            .with_concurrency(self.concurrency.max(1))
    }

    /// Host API client settings.
    pub fn api_client_config(&self) -> ApiClientConfig {
        ApiClientConfig {
            api_host: self.api_host.clone(),
            query_id: self.query_id.clone(),
            bearer_token: self.bearer_token.clone(),
            page_origin: self.page_origin.clone(),
            activate_guest: self.activate_guest,
        }
    }

    /// CSRF and guest tokens read once from the cookie header.
    pub fn credentials(&self) -> Credentials {
        self.cookie_header
            .as_deref()
            .map(|header| Credentials::resolve(&CookieJar::parse(header)))
            .unwrap_or_default()
    }

    /// Per-attempt deadline of the privileged saver.
    pub fn privileged_timeout(&self) -> Duration {
        Duration::from_secs(self.privileged_timeout_secs)
    }

    /// HTTP request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Download directory with the platform default filled in.
    pub fn resolved_download_dir(&self) -> PathBuf {
        self.download_dir.clone().unwrap_or_else(default_download_dir)
    }

    /// Everything the fetch crate needs, in its own types.
    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            api: self.api_client_config(),
            credentials: self.credentials(),
            download: self.download_config(),
            download_dir: self.resolved_download_dir(),
            request_timeout: self.request_timeout(),
            prefetch_capacity: self.prefetch_capacity.max(1),
            enable_direct_saver: self.enable_direct_saver,
        }
    }
}

/// Runtime configuration derived from [`Settings`].
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Host API client settings.
    pub api: ApiClientConfig,
    /// Tokens read from the cookie header.
    pub credentials: Credentials,
    /// Download orchestrator settings.
    pub download: DownloadConfig,
    /// Where media is saved.
    pub download_dir: PathBuf,
    /// HTTP request timeout.
    pub request_timeout: Duration,
    /// Prefetch cache capacity.
    pub prefetch_capacity: usize,
    /// Whether to register the direct URL saver.
    pub enable_direct_saver: bool,
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Error level logging.
    Error,
    /// Warning level logging.
    #[default]
    Warn,
    /// Info level logging.
    Info,
    /// Debug level logging.
    Debug,
    /// Trace level logging.
    Trace,
}

impl LogLevel {
    /// Returns the `tracing` filter directive for this level.
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_filter())
    }
}

// ============================================================================
// Settings Store
// ============================================================================

/// Settings store with persistence.
pub struct SettingsStore {
    settings: Arc<RwLock<Settings>>,
    path: PathBuf,
    notify: watch::Sender<u64>,
    version: Arc<RwLock<u64>>,
}

impl SettingsStore {
    /// Creates a store holding defaults, backed by `path`.
    pub fn new(path: PathBuf) -> Self {
        Self::with_settings(path, Settings::default())
    }

    fn with_settings(path: PathBuf, settings: Settings) -> Self {
        let (notify, _) = watch::channel(0);
        Self {
            settings: Arc::new(RwLock::new(settings)),
            path,
            notify,
            version: Arc::new(RwLock::new(0)),
        }
    }

    /// Loads settings from the default path.
    ///
    /// # Errors
    ///
    /// Returns error if settings cannot be loaded from disk.
    pub async fn load_default() -> Result<Self, StoreError> {
        Self::load(default_settings_path()).await
    }

    /// Loads settings from a path.
    ///
    /// A missing file yields defaults. A corrupt or invalid file is logged
    /// and replaced by defaults.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read.
    pub async fn load(path: PathBuf) -> Result<Self, StoreError> {
        let settings = match load_json::<Settings>(&path).await {
            Ok(settings) => {
                info!(path = %path.display(), "Loading settings");
                match settings.validate() {
                    Ok(()) => settings,
                    Err(e) => {
                        warn!(error = %e, "Invalid settings, using defaults");
                        Settings::default()
                    }
                }
            }
            Err(e) if e.is_not_found() => {
                debug!(path = %path.display(), "Settings file not found, using defaults");
                Settings::default()
            }
            Err(StoreError::Serialization(e)) => {
                warn!(error = %e, "Failed to parse settings, using defaults");
                Settings::default()
            }
            Err(e) => return Err(e),
        };

        Ok(Self::with_settings(path, settings))
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Gets a copy of the current settings.
    pub async fn get(&self) -> Settings {
        self.settings.read().await.clone()
    }

    /// Updates settings and notifies subscribers.
    pub async fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut Settings),
    {
        {
            let mut settings = self.settings.write().await;
            f(&mut settings);
        }
        self.notify_change().await;
    }

    /// Saves settings to disk.
    ///
    /// # Errors
    ///
    /// Returns error if settings are invalid or cannot be written to disk.
    pub async fn save(&self) -> Result<(), StoreError> {
        let settings = self.settings.read().await;
        settings.validate()?;
        save_json(&self.path, &*settings).await?;
        info!(path = %self.path.display(), "Settings saved");
        Ok(())
    }

    /// Subscribes to settings changes.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.notify.subscribe()
    }

    async fn notify_change(&self) {
        let mut version = self.version.write().await;
        *version += 1;
        let _ = self.notify.send(*version);
    }

    // ========================================================================
    // Convenience Methods
    // ========================================================================

    /// Gets the extraction mode.
    pub async fn strategy_mode(&self) -> StrategyMode {
        self.settings.read().await.strategy_mode
    }

    /// Sets the extraction mode.
    pub async fn set_strategy_mode(&self, mode: StrategyMode) {
        self.update(|s| s.strategy_mode = mode).await;
    }

    /// Sets the cookie header; empty strings clear it.
    pub async fn set_cookie_header(&self, header: Option<String>) {
        let header = header.filter(|h| !h.trim().is_empty());
        self.update(|s| s.cookie_header = header).await;
    }

    /// Sets the download directory.
    pub async fn set_download_dir(&self, dir: Option<PathBuf>) {
        self.update(|s| s.download_dir = dir).await;
    }

    /// Gets the runtime configuration for the fetch crate.
    pub async fn fetch_config(&self) -> FetchConfig {
        self.settings.read().await.fetch_config()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.api_host, "x.com");
        assert_eq!(settings.strategy_mode, StrategyMode::Auto);
        assert_eq!(settings.concurrency, 3);
        assert_eq!(settings.retry_attempts, 3);
        assert_eq!(settings.privileged_timeout_secs, 30);
        assert_eq!(settings.prefetch_capacity, 32);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{ "strategy_mode": "dom", "concurrency": 5 }"#).unwrap();
        assert_eq!(settings.strategy_mode, StrategyMode::Dom);
        assert_eq!(settings.concurrency, 5);
        assert_eq!(settings.query_id, DEFAULT_QUERY_ID);
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let settings = Settings {
            concurrency: 0,
            ..Settings::default()
        };
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("concurrency"));
    }

    #[test]
    fn test_validate_rejects_inverted_delays() {
        let settings = Settings {
            retry_base_delay_ms: 5_000,
            retry_max_delay_ms: 100,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_credentials_from_cookie_header() {
        let settings = Settings {
            cookie_header: Some("ct0=abc; gt=123; other=x".to_string()),
            ..Settings::default()
        };
        let creds = settings.credentials();
        assert_eq!(creds.csrf.as_deref(), Some("abc"));
        assert_eq!(creds.guest.as_deref(), Some("123"));

        assert_eq!(Settings::default().credentials(), Credentials::default());
    }

    #[test]
    fn test_fetch_config_conversion() {
        let settings = Settings {
            retry_attempts: 5,
            retry_base_delay_ms: 50,
            retry_max_delay_ms: 800,
            privileged_timeout_secs: 12,
            concurrency: 2,
            page_origin: Some("https://x.com".to_string()),
            download_dir: Some(PathBuf::from("/tmp/media")),
            ..Settings::default()
        };

        let config = settings.fetch_config();
        assert_eq!(config.download.retry.max_attempts, 5);
        assert_eq!(config.download.retry.base_delay, Duration::from_millis(50));
        assert_eq!(config.download.retry.max_delay, Duration::from_millis(800));
        assert_eq!(config.download.privileged_timeout, Duration::from_secs(12));
        assert_eq!(config.download.concurrency, 2);
        assert_eq!(config.api.page_origin.as_deref(), Some("https://x.com"));
        assert_eq!(config.download_dir, PathBuf::from("/tmp/media"));
    }

    #[test]
    fn test_log_level_display() {
        assert_eq!(LogLevel::default().to_string(), "warn");
        assert_eq!(LogLevel::Debug.as_filter(), "debug");
    }

    #[tokio::test]
    async fn test_settings_store_update_notifies() {
        let store = SettingsStore::new(PathBuf::from("/tmp/unused-settings.json"));
        let mut rx = store.subscribe();

        store.set_strategy_mode(StrategyMode::Api).await;

        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), 1);
        assert_eq!(store.strategy_mode().await, StrategyMode::Api);
    }

    #[tokio::test]
    async fn test_blank_cookie_header_clears() {
        let store = SettingsStore::new(PathBuf::from("/tmp/unused-settings.json"));
        store.set_cookie_header(Some("ct0=a".to_string())).await;
        store.set_cookie_header(Some("   ".to_string())).await;
        assert_eq!(store.get().await.cookie_header, None);
    }
}
