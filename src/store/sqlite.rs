use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};
use uuid::Uuid;

use super::{
    availability_status, PriceStore, RequestMeta, SessionAudit, SessionStatus, SupplierDirectory,
    SupplierRecord,
};
use crate::models::{Product, ScrapedData, StoredPrice};
use crate::suppliers::catalog;
use crate::utils::error::Result;

/// SQLite-backed store implementing every persistence collaborator.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct CurrentPriceRow {
    supplier: String,
    price: Option<f64>,
    price_text: String,
    product_url: Option<String>,
    availability: Option<String>,
    availability_status: String,
    scraped_at: DateTime<Utc>,
}

impl From<CurrentPriceRow> for StoredPrice {
    fn from(row: CurrentPriceRow) -> Self {
        StoredPrice {
            supplier: row.supplier,
            price: row
                .price
                .and_then(Decimal::from_f64_retain)
                .map(|d| d.round_dp(2)),
            price_text: row.price_text,
            link: row.product_url,
            availability: row.availability,
            status: row.availability_status,
            scraped_at: row.scraped_at,
        }
    }
}

impl SqliteStore {
    /// Opens the database, applies the schema and seeds the built-in suppliers.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // Each in-memory connection would otherwise be its own database.
        let max_connections = if url.contains(":memory:") { 1 } else { max_connections.max(1) };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(sqlx::Error::from)?;

        let store = Self { pool };
        store.seed_builtin_suppliers().await?;
        info!(url, "Price store ready");
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn seed_builtin_suppliers(&self) -> Result<()> {
        for descriptor in catalog::builtin() {
            sqlx::query(
                "INSERT OR IGNORE INTO suppliers (name, website_url, search_url_template, is_active)
                 VALUES (?, ?, ?, TRUE)",
            )
            .bind(descriptor.name)
            .bind(descriptor.base_url)
            .bind(descriptor.search_url)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    /// Every supplier, active or not, in catalog id order.
    pub async fn all_suppliers(&self) -> Result<Vec<SupplierRecord>> {
        let suppliers = sqlx::query_as::<_, SupplierRecord>(
            "SELECT id, name, website_url, is_active FROM suppliers ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(suppliers)
    }

    pub async fn set_supplier_active(&self, name: &str, active: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE suppliers SET is_active = ? WHERE name = ?")
            .bind(active)
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn session_status(&self, session_id: Uuid) -> Result<Option<String>> {
        let status = sqlx::query_scalar::<_, String>(
            "SELECT status FROM scraping_logs WHERE session_id = ? ORDER BY id DESC LIMIT 1",
        )
        .bind(session_id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        Ok(status)
    }
}

#[async_trait]
impl SupplierDirectory for SqliteStore {
    async fn find_active_suppliers(&self) -> Result<Vec<SupplierRecord>> {
        let suppliers = sqlx::query_as::<_, SupplierRecord>(
            "SELECT id, name, website_url, is_active FROM suppliers WHERE is_active = TRUE ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(suppliers)
    }
}

#[async_trait]
impl PriceStore for SqliteStore {
    async fn ensure_product(&self, product: &Product) -> Result<i64> {
        let size = product.size().unwrap_or("");
        let existing = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM products WHERE brand = ? AND part_number = ? AND COALESCE(size, '') = ?",
        )
        .bind(&product.brand)
        .bind(&product.part_number)
        .bind(size)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(id) = existing {
            return Ok(id);
        }

        let id = sqlx::query(
            "INSERT INTO products (brand, part_number, size, category) VALUES (?, ?, ?, 'Safety Equipment')",
        )
        .bind(&product.brand)
        .bind(&product.part_number)
        .bind(product.size())
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        debug!(product_id = id, product = %product.display_name(), "Created product");
        Ok(id)
    }

    async fn save_price_result(
        &self,
        product_id: i64,
        supplier_id: i64,
        data: &ScrapedData,
        duration_ms: u64,
    ) -> Result<()> {
        let price = data.price.amount().and_then(|d| d.to_f64());
        let raw = serde_json::to_string(data)?;
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE price_data SET is_current = FALSE WHERE product_id = ? AND supplier_id = ?",
        )
        .bind(product_id)
        .bind(supplier_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO price_data
             (product_id, supplier_id, price, price_text, currency, availability_status, availability,
              product_url, is_current, scraping_duration_ms, raw_data, scraped_at)
             VALUES (?, ?, ?, ?, 'CAD', ?, ?, ?, TRUE, ?, ?, ?)",
        )
        .bind(product_id)
        .bind(supplier_id)
        .bind(price)
        .bind(data.price.as_str())
        .bind(availability_status(data))
        .bind(data.availability.as_deref())
        .bind(data.link.as_deref())
        .bind(duration_ms as i64)
        .bind(raw)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if let Some(price) = price {
            sqlx::query(
                "INSERT INTO price_history (product_id, supplier_id, price, currency, recorded_at)
                 VALUES (?, ?, ?, 'CAD', ?)",
            )
            .bind(product_id)
            .bind(supplier_id)
            .bind(price)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn current_prices(&self, product_id: i64) -> Result<Vec<StoredPrice>> {
        let rows = sqlx::query_as::<_, CurrentPriceRow>(
            "SELECT s.name AS supplier, pd.price, pd.price_text, pd.product_url, pd.availability,
                    pd.availability_status, pd.scraped_at
             FROM price_data pd
             JOIN suppliers s ON pd.supplier_id = s.id
             WHERE pd.product_id = ? AND pd.is_current = TRUE
             ORDER BY s.id",
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(StoredPrice::from).collect())
    }
}

#[async_trait]
impl SessionAudit for SqliteStore {
    async fn log_session_start(
        &self,
        session_id: Uuid,
        product_id: Option<i64>,
        meta: &RequestMeta,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO scraping_logs (session_id, product_id, status, start_time, user_agent, ip_address)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(session_id.to_string())
        .bind(product_id)
        .bind(SessionStatus::Started.as_str())
        .bind(Utc::now())
        .bind(meta.user_agent.as_deref())
        .bind(meta.ip_address.as_deref())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn log_session_end(
        &self,
        session_id: Uuid,
        status: SessionStatus,
        error: Option<String>,
    ) -> Result<()> {
        let ended = Utc::now();
        let updated = sqlx::query(
            "UPDATE scraping_logs
             SET status = ?, end_time = ?, error_message = ?,
                 duration_ms = CAST((julianday(?) - julianday(start_time)) * 86400000 AS INTEGER)
             WHERE session_id = ?",
        )
        .bind(status.as_str())
        .bind(ended)
        .bind(error.as_deref())
        .bind(ended.to_rfc3339())
        .bind(session_id.to_string())
        .execute(&self.pool)
        .await?;

        // Runs rejected before they started have no row yet
        if updated.rows_affected() == 0 {
            sqlx::query(
                "INSERT INTO scraping_logs (session_id, status, start_time, end_time, duration_ms, error_message)
                 VALUES (?, ?, ?, ?, 0, ?)",
            )
            .bind(session_id.to_string())
            .bind(status.as_str())
            .bind(ended)
            .bind(ended)
            .bind(error)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }
}
