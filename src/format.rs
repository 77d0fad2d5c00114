//! Formatting helpers for featured dates, poem excerpts and subtitles.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

static ISO_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})$").expect("valid regex"));

/// Default excerpt length for compact displays.
pub const DEFAULT_EXCERPT_CHARS: usize = 280;

/// Date presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateStyle {
    /// "Thursday 19 February 2026"
    #[default]
    Long,
    /// "19 Feb 2026"
    Short,
}

/// Formats a `YYYY-MM-DD` date. Anything else, including impossible dates,
/// is returned unchanged.
#[must_use]
pub fn format_featured_date(iso_date: &str, style: DateStyle) -> String {
    let Some(caps) = ISO_DATE_RE.captures(iso_date) else {
        return iso_date.to_string();
    };
    let date = (|| {
        let year = caps[1].parse().ok()?;
        let month = caps[2].parse().ok()?;
        let day = caps[3].parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, day)
    })();

    match date {
        Some(date) => match style {
            DateStyle::Long => date.format("%A %-d %B %Y").to_string(),
            DateStyle::Short => date.format("%-d %b %Y").to_string(),
        },
        None => iso_date.to_string(),
    }
}

/// Normalizes line endings and trims, then clips to `max_chars` characters
/// with a trailing `...`.
#[must_use]
pub fn truncate_poem(text: &str, max_chars: usize) -> String {
    let normalized = text.replace("\r\n", "\n");
    let normalized = normalized.trim();

    if normalized.chars().count() <= max_chars {
        return normalized.to_string();
    }

    let clipped: String = normalized.chars().take(max_chars).collect();
    format!("{}...", clipped.trim_end())
}

/// "Author • Date", with placeholders for blanks.
#[must_use]
pub fn subtitle(author: &str, date: &str) -> String {
    let author = if author.trim().is_empty() {
        "Unknown Author"
    } else {
        author
    };
    let date = if date.trim().is_empty() {
        "Unknown Date"
    } else {
        date
    };
    format!("{author} • {date}")
}
