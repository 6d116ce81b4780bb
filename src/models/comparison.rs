use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::scraped::{iso_timestamp, SupplierResult};
use super::stats::{calculate_price_stats, numeric_prices, PriceStats};

/// Aggregated answer for one orchestration run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PriceComparisonResponse {
    /// Display form of the requested product.
    pub product: String,
    pub prices: Vec<SupplierResult>,
    pub timestamp: String,
    pub session_id: Uuid,
    /// Wall-clock milliseconds for the whole run.
    pub duration: u64,
}

impl PriceComparisonResponse {
    pub fn new(
        product: impl Into<String>,
        prices: Vec<SupplierResult>,
        session_id: Uuid,
        duration_ms: u64,
    ) -> Self {
        Self {
            product: product.into(),
            prices,
            timestamp: iso_timestamp(Utc::now()),
            session_id,
            duration: duration_ms,
        }
    }

    /// Cheapest result carrying a numeric amount.
    pub fn best_offer(&self) -> Option<&SupplierResult> {
        self.priced().min_by(|a, b| a.1.cmp(&b.1)).map(|(r, _)| r)
    }

    /// Most expensive result carrying a numeric amount.
    pub fn worst_offer(&self) -> Option<&SupplierResult> {
        self.priced().max_by(|a, b| a.1.cmp(&b.1)).map(|(r, _)| r)
    }

    /// Spread between the dearest and the cheapest supplier.
    pub fn savings(&self) -> Option<Decimal> {
        // Need at least two priced suppliers for a spread
        if self.priced().count() < 2 {
            return None;
        }
        let best = self.best_offer()?.price().amount()?;
        let worst = self.worst_offer()?.price().amount()?;
        Some(worst - best)
    }

    pub fn savings_percentage(&self) -> Option<f64> {
        let savings = self.savings()?;
        let worst = self.worst_offer()?.price().amount()?;
        if worst.is_zero() {
            return None;
        }
        (savings / worst * Decimal::ONE_HUNDRED).to_f64()
    }

    pub fn stats(&self) -> PriceStats {
        calculate_price_stats(&numeric_prices(&self.prices))
    }

    pub fn found_count(&self) -> usize {
        self.priced().count()
    }

    fn priced(&self) -> impl Iterator<Item = (&SupplierResult, Decimal)> {
        self.prices
            .iter()
            .filter_map(|r| r.price().amount().map(|amount| (r, amount)))
    }
}

/// Whole-run failure raised before any supplier was queried.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, thiserror::Error)]
#[serde(rename_all = "camelCase")]
#[error("price fetch {session_id} failed after {duration}ms: {message}")]
pub struct OrchestrationFailure {
    pub session_id: Uuid,
    pub duration: u64,
    pub message: String,
}

impl OrchestrationFailure {
    pub fn new(session_id: Uuid, duration_ms: u64, message: impl Into<String>) -> Self {
        Self {
            session_id,
            duration: duration_ms,
            message: message.into(),
        }
    }
}

/// A stored price as returned by the comparison lookup endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoredPrice {
    pub supplier: String,
    pub price: Option<Decimal>,
    pub price_text: String,
    pub link: Option<String>,
    pub availability: Option<String>,
    pub status: String,
    pub scraped_at: DateTime<Utc>,
}
