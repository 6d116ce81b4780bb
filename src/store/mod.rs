//! Optional persistence collaborators used by the orchestrator.
//!
//! Every call into these traits is best effort: the orchestrator logs and
//! swallows their errors so a missing or broken database never changes the
//! comparison payload.

pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Price, Product, ScrapedData, StoredPrice};
use crate::utils::error::Result;

pub use sqlite::SqliteStore;

/// A supplier row as known to the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SupplierRecord {
    pub id: i64,
    pub name: String,
    pub website_url: String,
    pub is_active: bool,
}

/// Request details recorded alongside a session for auditing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMeta {
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Started,
    Completed,
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Started => "started",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SupplierDirectory: Send + Sync {
    async fn find_active_suppliers(&self) -> Result<Vec<SupplierRecord>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceStore: Send + Sync {
    /// Finds the product by its identity key, creating it when absent.
    async fn ensure_product(&self, product: &Product) -> Result<i64>;

    /// Records one supplier's answer as the current price, demoting the
    /// previous current row for the same pair.
    async fn save_price_result(
        &self,
        product_id: i64,
        supplier_id: i64,
        data: &ScrapedData,
        duration_ms: u64,
    ) -> Result<()>;

    async fn current_prices(&self, product_id: i64) -> Result<Vec<StoredPrice>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionAudit: Send + Sync {
    async fn log_session_start(
        &self,
        session_id: Uuid,
        product_id: Option<i64>,
        meta: &RequestMeta,
    ) -> Result<()>;

    async fn log_session_end(
        &self,
        session_id: Uuid,
        status: SessionStatus,
        error: Option<String>,
    ) -> Result<()>;
}

/// Stored availability bucket for a supplier answer.
pub fn availability_status(data: &ScrapedData) -> &'static str {
    match data.price {
        Price::NotFound => "not_found",
        Price::Error => "error",
        Price::Timeout => "timeout",
        Price::Unavailable | Price::NotAvailable => "unavailable",
        Price::Amount(_) => {
            let out_of_stock = data
                .availability
                .as_deref()
                .is_some_and(|a| a.to_lowercase().contains("out of stock"));
            if out_of_stock { "out_of_stock" } else { "available" }
        }
    }
}
