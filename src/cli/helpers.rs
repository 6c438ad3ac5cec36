//! Shared helper functions for CLI commands.

use console::{style, StyledObject};

/// Truncate a string for display, appending an ellipsis when cut.
pub fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let cut: String = s.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{}…", cut.trim_end())
}

/// Render a confidence score with a color that matches its band.
pub fn confidence_badge(confidence: f64) -> StyledObject<String> {
    let text = format!("{:.2}", confidence);
    if confidence > 0.8 {
        style(text).green()
    } else if confidence > 0.6 {
        style(text).yellow()
    } else {
        style(text).red()
    }
}
