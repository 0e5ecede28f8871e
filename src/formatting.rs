// src/formatting.rs

use regex::Regex;
use std::sync::OnceLock;

/// The longest metric name segment derived from a command line.
pub const MAX_METRIC_NAME_LENGTH: usize = 64;

fn disallowed_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^0-9a-zA-Z_-]").expect("static regex is valid"))
}

fn repeated_underscores() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"_{2,}").expect("static regex is valid"))
}

/// Returns the last `n` Unicode code points of `s`.
///
/// Strings with `n` or fewer code points are returned unchanged.
pub fn truncate_tail(s: &str, n: usize) -> &str {
    let len = s.chars().count();
    if len <= n {
        return s;
    }
    match s.char_indices().nth(len - n) {
        Some((idx, _)) => &s[idx..],
        None => "",
    }
}

/// Returns the first `n` Unicode code points of `s`.
pub fn truncate_head(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Turns an arbitrary command line into a metric name segment.
///
/// Every character outside `[0-9a-zA-Z_-]` becomes `_`, runs of underscores
/// collapse into one and the result is cut to [`MAX_METRIC_NAME_LENGTH`]
/// code points.
pub fn normalize_metric_name(name: &str) -> String {
    let replaced = disallowed_chars().replace_all(name, "_");
    let collapsed = repeated_underscores().replace_all(&replaced, "_");
    truncate_head(&collapsed, MAX_METRIC_NAME_LENGTH).to_string()
}

/// Folds every run of whitespace, line breaks included, into one space and
/// keeps at most `n` code points.
pub fn single_line(s: &str, n: usize) -> String {
    let folded = s.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_head(&folded, n).to_string()
}

/// Escapes the characters Slack treats as control sequences in message text.
pub fn escape_markup(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
