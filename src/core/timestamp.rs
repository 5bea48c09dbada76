// LootScribe - core/timestamp.rs
//
// Timestamp extraction for client log lines and raid-window filtering.
// Shared by the loot-council parser and the flat sibling matchers.
//
// Every line the client writes starts with `[Day Mon DD HH:MM:SS YYYY]`.
// Lines without a parseable prefix are dropped before classification, and so
// are lines whose timestamp falls outside the raid window.

use crate::util::constants::LOG_TIMESTAMP_FORMAT;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;

fn timestamp_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^\[(?P<day>\w{3}) (?P<month>\w{3}) (?P<date>\d{1,2}) (?P<time>\d{2}:\d{2}:\d{2}) (?P<year>\d{4})\]",
        )
        .expect("timestamp regex is valid")
    })
}

fn prefix_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\[[^\]]+\]\s*").expect("prefix regex is valid"))
}

/// Parse the leading bracketed timestamp of a log line.
///
/// The weekday name is matched but not checked against the date. Returns
/// `None` when the prefix is missing or names an impossible date.
pub fn extract_timestamp(line: &str) -> Option<DateTime<Utc>> {
    let caps = timestamp_regex().captures(line)?;
    let composed = format!(
        "{} {} {} {}",
        &caps["month"], &caps["date"], &caps["time"], &caps["year"]
    );
    NaiveDateTime::parse_from_str(&composed, LOG_TIMESTAMP_FORMAT)
        .ok()
        .map(|ndt| ndt.and_utc())
}

/// Remove the leading `[...]` prefix (and following whitespace) from a line.
pub fn strip_timestamp_prefix(line: &str) -> &str {
    match prefix_regex().find(line) {
        Some(m) => &line[m.end()..],
        None => line,
    }
}

/// Remove ASCII control characters (U+0000..U+001F, U+007F).
///
/// Client logs occasionally carry stray `\r` or colour escape bytes which
/// would otherwise defeat the anchored line patterns.
pub fn sanitize_line(line: &str) -> Cow<'_, str> {
    if line.chars().any(|c| c.is_ascii_control()) {
        Cow::Owned(line.chars().filter(|c| !c.is_ascii_control()).collect())
    } else {
        Cow::Borrowed(line)
    }
}

// =============================================================================
// LogLine
// =============================================================================

/// One raw line of the log with its derived timestamp.
///
/// A `LogLine` lives only for the duration of one loop iteration.
#[derive(Debug, Clone)]
pub struct LogLine<'a> {
    /// Text exactly as read from the log.
    pub raw: &'a str,
    /// Control-character-free copy of `raw`.
    pub sanitized: Cow<'a, str>,
    /// Timestamp from the bracketed prefix, if present and valid.
    pub timestamp: Option<DateTime<Utc>>,
}

impl<'a> LogLine<'a> {
    pub fn read(raw: &'a str) -> Self {
        let sanitized = sanitize_line(raw);
        let timestamp = extract_timestamp(&sanitized);
        Self {
            raw,
            sanitized,
            timestamp,
        }
    }

    /// The trimmed line with its timestamp prefix removed.
    pub fn body(&self) -> &str {
        strip_timestamp_prefix(self.sanitized.trim()).trim()
    }
}

// =============================================================================
// Raid window
// =============================================================================

/// Inclusive time window of one raid. `end = None` is open-ended upward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RaidWindow {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

impl RaidWindow {
    pub fn new(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    /// Open-ended window starting at `start`.
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self { start, end: None }
    }

    /// True when `ts` lies within `[start, end]`.
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        if ts < self.start {
            return false;
        }
        match self.end {
            Some(end) => ts <= end,
            None => true,
        }
    }

    /// Read `raw` and return it only if it carries an in-window timestamp.
    pub fn qualify<'a>(&self, raw: &'a str) -> Option<(LogLine<'a>, DateTime<Utc>)> {
        let line = LogLine::read(raw);
        let ts = line.timestamp?;
        if self.contains(ts) {
            Some((line, ts))
        } else {
            None
        }
    }
}

// =============================================================================
// Window bound parsing (CLI / config input)
// =============================================================================

/// Parse a user-supplied raid boundary.
///
/// Strategy, in order:
///   1. RFC 3339 with offset (`2025-11-10T12:00:00Z`).
///   2. Naive date-time with `T` or space separator, treated as UTC.
///   3. Date only, treated as midnight UTC.
pub fn parse_bound(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    let normalised = trimmed.replace('T', " ");
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(&normalised, format) {
            return Some(ndt.and_utc());
        }
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ndt| ndt.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 10, h, m, s).unwrap()
    }

    #[test]
    fn test_extract_timestamp_basic() {
        let ts = extract_timestamp("[Mon Nov 10 13:02:18 2025] You say, 'hi'").unwrap();
        assert_eq!(ts, utc(13, 2, 18));
    }

    #[test]
    fn test_extract_timestamp_single_digit_day() {
        let ts = extract_timestamp("[Wed Nov 5 09:00:00 2025] text").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2025, 11, 5, 9, 0, 0).unwrap());
    }

    #[test]
    fn test_extract_timestamp_missing_or_invalid() {
        assert!(extract_timestamp("no prefix here").is_none());
        assert!(extract_timestamp("[Mon Nov 10 13:02 2025] short time").is_none());
        assert!(extract_timestamp("[Mon Foo 10 13:02:18 2025] bad month").is_none());
        assert!(extract_timestamp("[Mon Feb 30 13:02:18 2025] impossible date").is_none());
        assert!(extract_timestamp("").is_none());
    }

    #[test]
    fn test_extract_timestamp_ignores_weekday_mismatch() {
        // 2025-11-10 is a Monday.
        let ts = extract_timestamp("[Fri Nov 10 13:02:18 2025] text").unwrap();
        assert_eq!(ts, utc(13, 2, 18));
    }

    #[test]
    fn test_strip_timestamp_prefix() {
        assert_eq!(
            strip_timestamp_prefix("[Mon Nov 10 13:02:18 2025] Request #1) Vayle"),
            "Request #1) Vayle"
        );
        assert_eq!(strip_timestamp_prefix("plain"), "plain");
    }

    #[test]
    fn test_sanitize_removes_control_characters() {
        assert_eq!(sanitize_line("abc\r"), "abc");
        assert_eq!(sanitize_line("a\u{1b}b\u{7f}c"), "abc");
        assert!(matches!(sanitize_line("clean"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_log_line_body_strips_prefix_and_whitespace() {
        let line = LogLine::read("  [Mon Nov 10 13:02:18 2025]   Item Replaced: X -->\r");
        // Leading whitespace defeats the anchored prefix regex, like the client.
        assert!(line.timestamp.is_none());

        let line = LogLine::read("[Mon Nov 10 13:02:18 2025]   Item Replaced: X -->  \r");
        assert_eq!(line.timestamp, Some(utc(13, 2, 18)));
        assert_eq!(line.body(), "Item Replaced: X -->");
    }

    #[test]
    fn test_window_bounds_are_inclusive() {
        let window = RaidWindow::new(utc(12, 0, 0), Some(utc(14, 0, 0)));
        assert!(window.contains(utc(12, 0, 0)));
        assert!(window.contains(utc(14, 0, 0)));
        assert!(!window.contains(utc(11, 59, 59)));
        assert!(!window.contains(utc(14, 0, 1)));
    }

    #[test]
    fn test_window_open_ended() {
        let window = RaidWindow::starting_at(utc(12, 0, 0));
        assert!(window.contains(Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()));
        assert!(!window.contains(utc(11, 0, 0)));
    }

    #[test]
    fn test_window_qualify_drops_untimestamped_and_out_of_window() {
        let window = RaidWindow::starting_at(utc(12, 0, 0));
        assert!(window.qualify("no timestamp").is_none());
        assert!(window.qualify("[Mon Nov 10 11:00:00 2025] early").is_none());
        let (line, ts) = window.qualify("[Mon Nov 10 12:30:00 2025] late").unwrap();
        assert_eq!(ts, utc(12, 30, 0));
        assert_eq!(line.body(), "late");
    }

    #[test]
    fn test_parse_bound_formats() {
        assert_eq!(parse_bound("2025-11-10T12:00:00Z"), Some(utc(12, 0, 0)));
        assert_eq!(parse_bound("2025-11-10T13:00:00+01:00"), Some(utc(12, 0, 0)));
        assert_eq!(parse_bound("2025-11-10 12:00:00"), Some(utc(12, 0, 0)));
        assert_eq!(parse_bound("2025-11-10T12:00"), Some(utc(12, 0, 0)));
        assert_eq!(parse_bound("2025-11-10"), Some(utc(0, 0, 0)));
        assert_eq!(parse_bound("yesterday"), None);
        assert_eq!(parse_bound("   "), None);
    }
}
