// src/extractors/value.rs
//! Turns a fact's raw text and attributes into a number.

use serde::Serialize;

use crate::extractors::facts::Fact;
use crate::utils::error::ValueError;

// --- Unit Multipliers ---
// Checked in order; the first marker found in `{unitRef} {name} {text}` wins.
// 百万円 keeps the observed 100x factor on top of the million.
const UNIT_MULTIPLIERS: &[(&str, f64)] = &[
    ("百万円", 100.0 * 1_000_000.0),
    ("千円", 1_000.0),
    ("万円", 10_000.0),
    ("円", 1.0),
    ("jpy", 1.0),
];

const NEGATIVE_MARKERS: &[char] = &['△', '▲'];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedValue {
    pub value: f64,
    pub is_percent: bool,
    pub unit_ref: Option<String>,
    pub scale: Option<i32>,
}

/// Maps full-width ASCII (U+FF01..U+FF5E), the minus sign and the ideographic
/// space to their standard-width forms.
pub fn fold_width(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{FF01}'..='\u{FF5E}' => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
            '\u{2212}' => '-',
            '\u{3000}' => ' ',
            _ => c,
        })
        .collect()
}

/// Parses the numeric part of a fact's text.
///
/// Handles width folding, `(123)` and `△123` negatives, thousands separators
/// and a trailing percent sign. The percent division itself happens in
/// [`normalize`].
pub fn parse_number(raw: &str) -> Result<f64, ValueError> {
    let folded = fold_width(raw);
    let mut text = folded.trim();
    if text.is_empty() {
        return Err(ValueError::Empty);
    }

    let mut sign = 1.0;
    if let Some(inner) = text.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
        sign = -1.0;
        text = inner.trim();
    }
    if let Some(rest) = text.strip_prefix(NEGATIVE_MARKERS) {
        sign = -sign;
        text = rest.trim();
    }

    let cleaned = text.replace(',', "");
    let cleaned = cleaned.trim_end_matches('%').trim_end();
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(|v| sign * v)
        .ok_or_else(|| ValueError::Unparsable(raw.trim().to_string()))
}

pub fn is_percent(hint: &str) -> bool {
    let lower = hint.to_lowercase();
    lower.contains('%')
        || lower.contains('％')
        || lower.contains("percent")
        || (lower.contains("pure") && lower.contains("ratio"))
}

pub fn unit_multiplier(hint: &str) -> f64 {
    let lower = hint.to_lowercase();
    UNIT_MULTIPLIERS
        .iter()
        .find(|(marker, _)| lower.contains(marker))
        .map(|(_, multiplier)| *multiplier)
        .unwrap_or(1.0)
}

/// Normalizes one fact. `unit_hint` is an extra caller-supplied unit string
/// checked for percent markers.
pub fn normalize(fact: &Fact<'_>, unit_hint: Option<&str>) -> Result<NormalizedValue, ValueError> {
    let mut value = parse_number(&fact.text)?;

    // Inline facts carry their sign separately from the displayed text
    if fact.attributes.get("sign").map(str::trim) == Some("-") {
        value = -value;
    }

    let unit_ref = fact.unit_ref();
    let percent = is_percent(&fact.text)
        || unit_ref.is_some_and(is_percent)
        || unit_hint.is_some_and(is_percent);
    if percent {
        value /= 100.0;
    }

    let scale = fact
        .attributes
        .get("scale")
        .and_then(|s| s.trim().parse::<i32>().ok());
    if let Some(scale) = scale {
        value *= 10f64.powi(scale);
    }

    let hint = format!("{} {} {}", unit_ref.unwrap_or_default(), fact.name, fact.text);
    value *= unit_multiplier(&hint);
    if !value.is_finite() {
        return Err(ValueError::OutOfRange(fact.text.clone()));
    }

    Ok(NormalizedValue {
        value,
        is_percent: percent,
        unit_ref: unit_ref.map(str::to_string),
        scale,
    })
}
