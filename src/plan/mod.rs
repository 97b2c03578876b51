//! Plan rendering for the results viewer
//!
//! Published plans are either `terraform show -json` documents or colored
//! plan text. Both are turned into HTML with every sensitive value redacted
//! before anything is escaped or emitted.

pub mod ansi;
pub mod formatter;
pub mod redact;
pub mod viewer;

pub use formatter::format_plan_for_display;

/// Escape HTML special characters
pub(crate) fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
