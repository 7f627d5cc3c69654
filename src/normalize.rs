use std::sync::LazyLock;

use regex::Regex;

static PRICE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").unwrap());
static AREA_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d[\d,]*(?:\.\d+)?").unwrap());
static BHK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)\s*BHK").unwrap());

const CRORE: f64 = 10_000_000.0;
const LAKH: f64 = 100_000.0;
const SQFT_PER_SQYRD: f64 = 9.0;

const SQYRD_MARKERS: &[&str] = &["sqyrd", "sq yrd", "sq yd", "sqyd"];

/// Price text → rupees. "Cr" and "Lac" scale the leading number; anything
/// else takes it as-is.
pub fn parse_currency(text: &str) -> Option<f64> {
    let cleaned = text.replace(',', "");
    let value: f64 = PRICE_RE.find(&cleaned)?.as_str().parse().ok()?;

    if cleaned.contains("Cr") {
        Some(value * CRORE)
    } else if cleaned.contains("Lac") {
        Some(value * LAKH)
    } else {
        Some(value)
    }
}

/// Area text → square feet. Square yards are converted, everything else
/// (sqft or no unit at all) passes through.
pub fn parse_area(text: &str) -> Option<f64> {
    let token = AREA_RE.find(text)?.as_str().replace(',', "");
    let value: f64 = token.parse().ok()?;

    let lower = text.to_lowercase();
    if SQYRD_MARKERS.iter().any(|m| lower.contains(m)) {
        Some(value * SQFT_PER_SQYRD)
    } else {
        Some(value)
    }
}

/// "3 BHK Flat for Sale" → 3.
pub fn parse_bedroom_count(title: &str) -> Option<u32> {
    BHK_RE.captures(title)?[1].parse().ok()
}

/// Collapse whitespace runs and trim. Empty results become `None`.
pub fn normalize_whitespace(text: &str) -> Option<String> {
    let joined = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}
