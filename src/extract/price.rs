use std::sync::LazyLock;

use regex::Regex;

use crate::models::Price;

static DEFAULT_EXTRACTOR: LazyLock<PriceExtractor> = LazyLock::new(PriceExtractor::new);

/// Turns free-form listing text into a `$`-prefixed amount, or `Not Found`.
pub fn extract_price(raw: &str) -> Price {
    DEFAULT_EXTRACTOR.extract(raw)
}

pub struct PriceExtractor {
    // Ordered most to least specific
    patterns: Vec<Regex>,
    label_tokens: Regex,
    whitespace: Regex,
}

impl PriceExtractor {
    pub fn new() -> Self {
        let patterns = [
            r"\$[0-9,]+\.?[0-9]*",
            r"[0-9,]+\.?[0-9]*\s*\$",
            r"CAD\s*\$?[0-9,]+\.?[0-9]*",
            r"[0-9,]+\.?[0-9]*\s*CAD",
            r"Price:\s*\$?[0-9,]+\.?[0-9]*",
            r"[0-9,]+\.?[0-9]*",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("price pattern is valid"))
        .collect();

        PriceExtractor {
            patterns,
            label_tokens: Regex::new(r"(?i)CAD|Price:").expect("label pattern is valid"),
            whitespace: Regex::new(r"\s+").expect("whitespace pattern is valid"),
        }
    }

    pub fn extract(&self, raw: &str) -> Price {
        let text = self.whitespace.replace_all(raw.trim(), " ");
        if text.is_empty() {
            return Price::NotFound;
        }

        for pattern in &self.patterns {
            let Some(found) = pattern.find(&text) else {
                continue;
            };
            if let Some(amount) = self.normalize(found.as_str()) {
                return Price::Amount(amount);
            }
        }

        Price::NotFound
    }

    /// Cleans one pattern match; `None` when it does not hold a positive amount.
    fn normalize(&self, matched: &str) -> Option<String> {
        let stripped = self.label_tokens.replace_all(matched, "");
        let stripped = stripped.trim();
        let cleaned = stripped.strip_suffix('$').unwrap_or(stripped).trim();

        let value = parse_leading_float(cleaned)?;
        if !value.is_finite() || value <= 0.0 {
            return None;
        }

        if cleaned.starts_with('$') {
            Some(cleaned.to_string())
        } else {
            Some(format!("${}", cleaned))
        }
    }
}

impl Default for PriceExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads the longest numeric prefix, ignoring `$` and `,` anywhere in the text.
fn parse_leading_float(text: &str) -> Option<f64> {
    let digits: String = text.chars().filter(|c| *c != '$' && *c != ',').collect();
    let digits = digits.trim_start();

    let mut end = 0;
    let mut seen_dot = false;
    let mut seen_digit = false;
    for (i, c) in digits.char_indices() {
        match c {
            '0'..='9' => seen_digit = true,
            '.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end = i + c.len_utf8();
    }

    if !seen_digit {
        return None;
    }
    digits[..end].trim_end_matches('.').parse().ok()
}
