use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const AVAILABLE: &str = "Available";
pub const PRODUCT_NOT_FOUND: &str = "Product not found";
pub const SCRAPING_FAILED: &str = "Scraping failed";
pub const REQUEST_TIMED_OUT: &str = "Request timed out";
pub const FOUND_BUT_UNAVAILABLE: &str = "Product found but unavailable";
pub const CAPTCHA_DETECTED: &str = "CAPTCHA protection detected";
pub const PAGE_NAVIGATION_ERROR: &str = "Page navigation error";
pub const SUPPLIER_NOT_CONFIGURED: &str = "Supplier not configured";

/// A scraped price: either a `$`-prefixed amount or one of the fixed
/// sentinels standing in for a missing price. Serialized as the bare string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Price {
    Amount(String),
    NotFound,
    Error,
    Timeout,
    Unavailable,
    NotAvailable,
}

impl Price {
    pub const NOT_FOUND: &'static str = "Not Found";
    pub const ERROR: &'static str = "Error";
    pub const TIMEOUT: &'static str = "Timeout";
    pub const UNAVAILABLE: &'static str = "Unavailable";
    pub const NOT_AVAILABLE: &'static str = "Not Available";

    pub fn as_str(&self) -> &str {
        match self {
            Price::Amount(amount) => amount,
            Price::NotFound => Self::NOT_FOUND,
            Price::Error => Self::ERROR,
            Price::Timeout => Self::TIMEOUT,
            Price::Unavailable => Self::UNAVAILABLE,
            Price::NotAvailable => Self::NOT_AVAILABLE,
        }
    }

    pub fn is_amount(&self) -> bool {
        matches!(self, Price::Amount(_))
    }

    pub fn is_sentinel(&self) -> bool {
        !self.is_amount()
    }

    /// Numeric value of an amount, ignoring `$` and thousands separators.
    pub fn amount(&self) -> Option<Decimal> {
        match self {
            Price::Amount(text) => {
                let cleaned: String = text
                    .chars()
                    .filter(|c| *c != '$' && *c != ',' && !c.is_whitespace())
                    .collect();
                Decimal::from_str(cleaned.trim_end_matches('.')).ok()
            }
            _ => None,
        }
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Price {
    fn from(value: String) -> Self {
        match value.as_str() {
            Price::NOT_FOUND => Price::NotFound,
            Price::ERROR => Price::Error,
            Price::TIMEOUT => Price::Timeout,
            Price::UNAVAILABLE => Price::Unavailable,
            Price::NOT_AVAILABLE => Price::NotAvailable,
            _ => Price::Amount(value),
        }
    }
}

impl From<Price> for String {
    fn from(price: Price) -> Self {
        match price {
            Price::Amount(amount) => amount,
            other => other.as_str().to_string(),
        }
    }
}

/// What one supplier scrape produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedData {
    pub price: Price,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability: Option<String>,
}

impl ScrapedData {
    pub fn new(price: Price, link: Option<String>, availability: impl Into<String>) -> Self {
        Self {
            price,
            link,
            availability: Some(availability.into()),
        }
    }

    /// A matched listing; availability follows whether a price was read.
    pub fn listing(price: Price, link: Option<String>) -> Self {
        let availability = if price.is_amount() {
            AVAILABLE
        } else {
            PRODUCT_NOT_FOUND
        };
        Self::new(price, link, availability)
    }

    pub fn not_found() -> Self {
        Self::new(Price::NotFound, None, PRODUCT_NOT_FOUND)
    }

    pub fn failed() -> Self {
        Self::new(Price::Error, None, SCRAPING_FAILED)
    }

    pub fn timed_out() -> Self {
        Self::new(Price::Timeout, None, REQUEST_TIMED_OUT)
    }

    pub fn unavailable(link: Option<String>) -> Self {
        Self::new(Price::Unavailable, link, FOUND_BUT_UNAVAILABLE)
    }

    pub fn blocked(reason: impl Into<String>) -> Self {
        Self::new(Price::NotAvailable, None, reason)
    }

    pub fn not_configured() -> Self {
        Self::new(Price::Error, None, SUPPLIER_NOT_CONFIGURED)
    }
}

/// One row of the comparison payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplierResult {
    pub website: String,
    #[serde(flatten)]
    pub data: ScrapedData,
    pub last_updated: String,
}

impl SupplierResult {
    pub fn new(website: impl Into<String>, data: ScrapedData) -> Self {
        Self::at(website, data, Utc::now())
    }

    pub fn at(website: impl Into<String>, data: ScrapedData, when: DateTime<Utc>) -> Self {
        Self {
            website: website.into(),
            data,
            last_updated: iso_timestamp(when),
        }
    }

    pub fn price(&self) -> &Price {
        &self.data.price
    }
}

/// `2024-01-31T12:00:00.000Z`, the format the dashboard consumes.
pub fn iso_timestamp(when: DateTime<Utc>) -> String {
    when.to_rfc3339_opts(SecondsFormat::Millis, true)
}
