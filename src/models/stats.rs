use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use super::scraped::{Price, SupplierResult};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct PriceStats {
    pub min: f64,
    pub max: f64,
    pub average: f64,
    pub median: f64,
    pub range: f64,
    pub count: usize,
}

/// Summary statistics over a set of prices. An empty input yields all zeros.
pub fn calculate_price_stats(prices: &[f64]) -> PriceStats {
    if prices.is_empty() {
        return PriceStats::default();
    }

    let mut sorted = prices.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let min = sorted[0];
    let max = sorted[sorted.len() - 1];
    let average = prices.iter().sum::<f64>() / prices.len() as f64;
    let mid = sorted.len() / 2;
    let median = if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    };

    PriceStats {
        min,
        max,
        average,
        median,
        range: max - min,
        count: prices.len(),
    }
}

/// True for strings that look like a usable amount (`$1,234.56`, `19.99`).
pub fn validate_price_string(price: &str) -> bool {
    if price.is_empty()
        || price == Price::NOT_FOUND
        || price == Price::ERROR
        || price == Price::TIMEOUT
    {
        return false;
    }

    let compact: String = price.chars().filter(|c| !c.is_whitespace()).collect();
    let digits = compact.strip_prefix('$').unwrap_or(&compact);
    let mut seen_dot = false;
    let mut seen_digit = false;
    for (i, c) in digits.chars().enumerate() {
        match c {
            '0'..='9' => seen_digit = true,
            ',' if !seen_dot => {}
            '.' if !seen_dot && i > 0 => seen_dot = true,
            _ => return false,
        }
    }
    seen_digit && !digits.starts_with(',')
}

pub fn extract_numeric_price(price: &str) -> Option<f64> {
    if !validate_price_string(price) {
        return None;
    }
    Price::Amount(price.to_string()).amount()?.to_f64()
}

/// Formats an amount the way Canadian storefronts show it: `$1,234.56`.
pub fn format_price(amount: Decimal) -> String {
    let rounded = amount.round_dp(2);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let text = format!("{:.2}", rounded.abs());
    let (whole, fraction) = text.split_once('.').unwrap_or((&text, "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    format!("{}${}.{}", if negative { "-" } else { "" }, grouped, fraction)
}

/// Numeric prices present in a set of results, in result order.
pub fn numeric_prices(results: &[SupplierResult]) -> Vec<f64> {
    results
        .iter()
        .filter_map(|r| r.price().amount())
        .filter_map(|d| d.to_f64())
        .collect()
}
