pub(crate) fn normalize_header(value: &str) -> String {
    let cleaned = value.replace(['\u{feff}', '\u{200b}'], "");
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.to_ascii_lowercase()
}

const CURRENCY_MARKERS: [&str; 4] = ["₹", "rs.", "rs", "inr"];

/// Blank cells count as zero. Thousands separators, a trailing `%` and a leading rupee marker
/// are dropped. Anything else that is not a finite number yields `None`.
pub(crate) fn parse_number(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Some(0.0);
    }
    let lowered = trimmed.to_lowercase();
    let amount = CURRENCY_MARKERS
        .iter()
        .find_map(|marker| lowered.strip_prefix(marker))
        .unwrap_or(&lowered);
    let cleaned: String = amount
        .trim()
        .chars()
        .filter(|c| *c != ',' && *c != '%')
        .collect();
    cleaned.parse::<f64>().ok().filter(|number| number.is_finite())
}

pub(crate) fn clean_text(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Case-insensitive substring test used for vendor and rate-card matching.
pub(crate) fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
