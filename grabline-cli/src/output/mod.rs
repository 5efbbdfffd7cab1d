//! Output formatting for CLI.

mod json;
mod text;

pub use json::{DownloadOutput, ExtractionOutput, JsonFormatter};
pub use text::TextFormatter;
#[cfg(test)]
mod tests;
