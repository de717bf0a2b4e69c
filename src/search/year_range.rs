use once_cell::sync::Lazy;
use regex::Regex;

use super::plan::YearRange;

static YEAR_RANGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([0-9]{4})-([0-9]{4})").expect("year range regex"));

/// Pull a `YYYY-YYYY` range out of `q`.
///
/// Only ASCII digits count. The first occurrence is parsed. Every occurrence
/// is replaced by a space so that a second call never finds another range;
/// whitespace is collapsed afterwards. Without a match `q` is returned
/// unchanged.
pub fn extract_year_range(q: &str) -> (Option<YearRange>, String) {
    let Some(range) = YEAR_RANGE_RE.captures(q).and_then(|caps| {
        Some(YearRange {
            start: caps[1].parse().ok()?,
            end: caps[2].parse().ok()?,
        })
    }) else {
        return (None, q.to_string());
    };
    let stripped = YEAR_RANGE_RE.replace_all(q, " ");
    let rest = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    (Some(range), rest)
}
