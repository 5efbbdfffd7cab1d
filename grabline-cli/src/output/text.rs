//! Text output formatting with progress bars and colors.

use grabline_core::{DownloadProgress, DownloadResult, ExtractionResult, MediaDescriptor, SourceLocation};
use grabline_extract::ExtractionAttempt;
use grabline_store::Settings;

use super::json::DownloadOutput;

// ============================================================================
// ANSI Colors
// ============================================================================

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const CYAN: &str = "\x1b[36m";

// Progress bar characters
const BAR_FULL: char = '█';
const BAR_EMPTY: char = '░';

/// Marker in front of the clicked item.
const CLICKED_MARKER: &str = "▶";

/// Text formatter with optional colors.
pub struct TextFormatter {
    use_colors: bool,
    bar_width: usize,
}

impl TextFormatter {
    /// Creates a new text formatter.
    pub fn new(use_colors: bool) -> Self {
        Self {
            use_colors,
            bar_width: 20,
        }
    }

    /// Set the progress bar width.
    #[cfg(test)]
    pub fn with_bar_width(mut self, width: usize) -> Self {
        self.bar_width = width;
        self
    }

    // ========================================================================
    // Extraction
    // ========================================================================

    /// Formats an extraction result: a header line, then one line per item
    /// with the clicked one marked.
    pub fn format_extraction(&self, result: &ExtractionResult) -> String {
        if !result.succeeded() {
            let error = result.metadata().error.as_deref().unwrap_or("No media found");
            return format!(
                "{} {} {}",
                self.red("✗"),
                error,
                self.dim(&format!("({})", result.strategy_name()))
            );
        }

        let mut lines = Vec::new();

        let count = result.media_items().len();
        let items = if count == 1 { "item" } else { "items" };
        let header = match result.post_info() {
            Some(post) => match &post.author_handle {
                Some(handle) => format!("Post {} by @{}", post.post_id, handle),
                None => format!("Post {}", post.post_id),
            },
            None => "Unknown post".to_string(),
        };
        lines.push(format!(
            "{} {}",
            self.bold(&header),
            self.dim(&format!("({}, {count} {items})", result.strategy_name()))
        ));

        for (position, item) in result.media_items().iter().enumerate() {
            lines.push(self.format_item(position, item, position == result.clicked_index()));
        }

        lines.join("\n")
    }

    fn format_item(&self, position: usize, item: &MediaDescriptor, clicked: bool) -> String {
        let marker = if clicked {
            self.green(CLICKED_MARKER)
        } else {
            " ".to_string()
        };
        let mut line = format!(
            "{marker} {:>2}. {:<8} {}",
            position + 1,
            item.kind.display_name(),
            self.cyan(&item.url)
        );
        if item.source_location == SourceLocation::Quoted {
            line.push_str(&format!(" {}", self.yellow("[quoted]")));
        }
        if let Some(alt) = &item.alt_text {
            line.push_str(&format!(" {}", self.dim(&format!("\"{alt}\""))));
        }
        line
    }

    /// Formats the strategy attempt log.
    pub fn format_attempts(&self, attempts: &[ExtractionAttempt]) -> String {
        let mut lines = vec!["Attempts:".to_string()];
        for attempt in attempts {
            let status = if attempt.success {
                self.green("✓")
            } else {
                self.red("✗")
            };
            let mut line = format!(
                "  {status} {} ({}) {}",
                attempt.strategy,
                attempt.kind.display_name(),
                self.dim(&format!("{}ms", attempt.duration.as_millis()))
            );
            if let Some(error) = &attempt.error {
                line.push_str(&format!(": {error}"));
            }
            lines.push(line);
        }
        lines.join("\n")
    }

    // ========================================================================
    // Downloads
    // ========================================================================

    /// Formats one progress event as a single line.
    pub fn format_progress(&self, progress: &DownloadProgress, unit: &str) -> String {
        match progress.percentage {
            Some(pct) => format!(
                "{} {pct:>3}% {}/{} {unit}",
                self.progress_bar(pct),
                progress.current,
                progress.total
            ),
            None => format!("{} {unit}", progress.current),
        }
    }

    /// Formats the outcome of a download.
    pub fn format_download(&self, output: &DownloadOutput) -> String {
        let bulk = &output.results;
        let total = bulk.results.len();
        let summary = format!("Saved {} of {total} to {}", bulk.succeeded, output.directory);
        let header = if bulk.all_succeeded() {
            self.bold(&summary)
        } else {
            self.yellow(&summary)
        };

        let mut lines = vec![header];
        lines.extend(bulk.results.iter().map(|r| self.format_download_result(r)));
        lines.join("\n")
    }

    fn format_download_result(&self, result: &DownloadResult) -> String {
        let name = result.filename.as_deref().unwrap_or("(not started)");
        if result.succeeded {
            let transport = result.transport.as_deref().unwrap_or("unknown");
            format!("  {} {name} {}", self.green("✓"), self.dim(&format!("via {transport}")))
        } else {
            let reason = match (&result.error, &result.detail) {
                (Some(kind), Some(detail)) => format!("{kind}: {detail}"),
                (Some(kind), None) => kind.to_string(),
                (None, Some(detail)) => detail.clone(),
                (None, None) => "failed".to_string(),
            };
            format!("  {} {name} {}", self.red("✗"), reason)
        }
    }

    /// Creates a progress bar for a whole-number percentage.
    pub fn progress_bar(&self, percent: u8) -> String {
        let percent = usize::from(percent.min(100));
        let filled = (percent * self.bar_width + 50) / 100;
        let empty = self.bar_width.saturating_sub(filled);

        let bar = format!(
            "{}{}",
            BAR_FULL.to_string().repeat(filled),
            BAR_EMPTY.to_string().repeat(empty)
        );

        if percent == 100 { self.green(&bar) } else { self.cyan(&bar) }
    }

    // ========================================================================
    // Settings
    // ========================================================================

    /// Formats the settings for `config show`.
    pub fn format_settings(&self, settings: &Settings) -> String {
        let mut lines = vec![self.bold("Grabline Configuration"), "─".repeat(40), String::new()];

        lines.push("Extraction:".to_string());
        lines.push(format!("  Strategy mode:   {}", settings.strategy_mode));
        lines.push(format!("  API host:        {}", settings.api_host));
        lines.push(format!("  Query id:        {}", settings.query_id));
        lines.push(format!(
            "  Cookies:         {}",
            if settings.cookie_header.is_some() { "set" } else { "none" }
        ));
        lines.push(format!("  Guest activation: {}", settings.activate_guest));
        lines.push(String::new());

        lines.push("Downloads:".to_string());
        lines.push(format!("  Directory:       {}", settings.resolved_download_dir().display()));
        lines.push(format!("  Concurrency:     {}", settings.concurrency));
        lines.push(format!(
            "  Retries:         {} attempts, {}-{}ms backoff",
            settings.retry_attempts, settings.retry_base_delay_ms, settings.retry_max_delay_ms
        ));
        lines.push(format!("  Direct saver:    {}", settings.enable_direct_saver));
        lines.push(format!("  Saver timeout:   {}s", settings.privileged_timeout_secs));
        lines.push(String::new());

        lines.push(format!("Request timeout:   {}s", settings.request_timeout_secs));
        lines.push(format!("Prefetch capacity: {}", settings.prefetch_capacity));
        lines.push(format!("Log level:         {}", settings.log_level));

        lines.join("\n")
    }

    // ========================================================================
    // Color Helpers
    // ========================================================================

    fn paint(&self, color: &str, text: &str) -> String {
        if self.use_colors {
            format!("{color}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    fn bold(&self, text: &str) -> String {
        self.paint(BOLD, text)
    }

    fn dim(&self, text: &str) -> String {
        self.paint(DIM, text)
    }

    fn green(&self, text: &str) -> String {
        self.paint(GREEN, text)
    }

    fn yellow(&self, text: &str) -> String {
        self.paint(YELLOW, text)
    }

    fn red(&self, text: &str) -> String {
        self.paint(RED, text)
    }

    fn cyan(&self, text: &str) -> String {
        self.paint(CYAN, text)
    }
}
