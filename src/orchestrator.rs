//! Fans one product lookup out to every supplier and assembles the comparison.
//!
//! Suppliers start `index * stagger` apart, each scrape runs on its own task
//! raced against a per-supplier timeout, and every slot is filled in catalog
//! order whatever happened to its sibling tasks.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;
use validator::Validate;

use crate::config::OrchestratorConfig;
use crate::models::{
    OrchestrationFailure, PriceComparisonResponse, Product, ScrapedData, SupplierResult,
};
use crate::store::{PriceStore, RequestMeta, SessionAudit, SessionStatus, SupplierDirectory};
use crate::suppliers::registry::ScraperHandle;
use crate::suppliers::SupplierRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorSettings {
    pub stagger: Duration,
    pub task_timeout: Duration,
    /// Fail the whole run instead of using the built-in list when the
    /// supplier directory cannot be read.
    pub require_supplier_directory: bool,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            stagger: Duration::from_millis(3000),
            task_timeout: Duration::from_millis(120_000),
            require_supplier_directory: false,
        }
    }
}

impl From<&OrchestratorConfig> for OrchestratorSettings {
    fn from(config: &OrchestratorConfig) -> Self {
        Self {
            stagger: Duration::from_millis(config.stagger_ms),
            task_timeout: Duration::from_millis(config.task_timeout_ms),
            require_supplier_directory: config.require_supplier_directory,
        }
    }
}

pub struct PriceOrchestrator {
    registry: SupplierRegistry,
    settings: OrchestratorSettings,
    directory: Option<Arc<dyn SupplierDirectory>>,
    store: Option<Arc<dyn PriceStore>>,
    audit: Option<Arc<dyn SessionAudit>>,
}

/// Where each registered supplier maps in the directory. `None` means the
/// supplier runs but its results are not persisted.
type SupplierIds = HashMap<String, Option<i64>>;

impl PriceOrchestrator {
    pub fn new(registry: SupplierRegistry, settings: OrchestratorSettings) -> Self {
        Self {
            registry,
            settings,
            directory: None,
            store: None,
            audit: None,
        }
    }

    pub fn with_directory(mut self, directory: Arc<dyn SupplierDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn PriceStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_audit(mut self, audit: Arc<dyn SessionAudit>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn registry(&self) -> &SupplierRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    pub async fn fetch_all_prices(
        &self,
        product: &Product,
        meta: &RequestMeta,
    ) -> Result<PriceComparisonResponse, OrchestrationFailure> {
        let session_id = Uuid::new_v4();
        let span = info_span!("fetch_prices", %session_id);
        self.run(session_id, product, meta).instrument(span).await
    }

    async fn run(
        &self,
        session_id: Uuid,
        product: &Product,
        meta: &RequestMeta,
    ) -> Result<PriceComparisonResponse, OrchestrationFailure> {
        let started = Instant::now();
        info!(product = %product.display_name(), "Fetching prices");

        if let Err(message) = check_product(product) {
            return Err(self.fail(session_id, started, message).await);
        }

        let supplier_ids = match self.resolve_suppliers().await {
            Ok(ids) => ids,
            Err(message) => return Err(self.fail(session_id, started, message).await),
        };

        let product_id = self.ensure_product(product).await;
        if let Some(audit) = &self.audit {
            if let Err(e) = audit.log_session_start(session_id, product_id, meta).await {
                warn!(error = %e, "Failed to record session start");
            }
        }

        let tasks = self
            .registry
            .scrapers()
            .iter()
            .enumerate()
            .map(|(index, scraper)| self.supplier_task(index, scraper, product, product_id, &supplier_ids));
        let prices: Vec<SupplierResult> = join_all(tasks).await;

        let duration = elapsed_ms(started);
        if let Some(audit) = &self.audit {
            if let Err(e) = audit.log_session_end(session_id, SessionStatus::Completed, None).await {
                warn!(error = %e, "Failed to record session completion");
            }
        }

        let response = PriceComparisonResponse::new(product.display_name(), prices, session_id, duration);
        metrics::counter!("price_fetch_sessions_total", "status" => "completed").increment(1);
        metrics::histogram!("price_fetch_duration_seconds").record(duration as f64 / 1000.0);
        info!(duration_ms = duration, found = response.found_count(), "Completed price fetch");
        Ok(response)
    }

    /// One supplier's slot: stagger, scrape on its own task, bound by the timeout.
    async fn supplier_task(
        &self,
        index: usize,
        scraper: &ScraperHandle,
        product: &Product,
        product_id: Option<i64>,
        supplier_ids: &SupplierIds,
    ) -> SupplierResult {
        let supplier = scraper.name().to_string();

        let Some(supplier_id) = supplier_ids.get(&supplier).copied() else {
            warn!(supplier = %supplier, "Supplier not found in directory");
            return SupplierResult::new(supplier, ScrapedData::not_configured());
        };

        let delay = self.settings.stagger.saturating_mul(index as u32);
        if !delay.is_zero() {
            debug!(supplier = %supplier, delay_ms = delay.as_millis() as u64, "Waiting before scraping");
            tokio::time::sleep(delay).await;
        }

        let persist = match (&self.store, product_id, supplier_id) {
            (Some(store), Some(product_id), Some(supplier_id)) => Some((store.clone(), product_id, supplier_id)),
            _ => None,
        };
        let handle = tokio::spawn(
            scrape_and_record(scraper.clone(), product.clone(), persist)
                .instrument(info_span!("supplier", supplier = %supplier)),
        );

        let data = match tokio::time::timeout(self.settings.task_timeout, handle).await {
            Ok(Ok(data)) => data,
            Ok(Err(e)) => {
                error!(supplier = %supplier, error = %e, "Scrape task aborted");
                ScrapedData::failed()
            }
            Err(_) => {
                warn!(
                    supplier = %supplier,
                    timeout_ms = self.settings.task_timeout.as_millis() as u64,
                    "Supplier timed out"
                );
                ScrapedData::timed_out()
            }
        };

        SupplierResult::new(supplier, data)
    }

    async fn resolve_suppliers(&self) -> Result<SupplierIds, String> {
        let all_unpersisted = || {
            self.registry
                .names()
                .into_iter()
                .map(|name| (name, None))
                .collect::<SupplierIds>()
        };

        let Some(directory) = &self.directory else {
            return Ok(all_unpersisted());
        };

        match directory.find_active_suppliers().await {
            Ok(records) => Ok(records.into_iter().map(|r| (r.name, Some(r.id))).collect()),
            Err(e) if self.settings.require_supplier_directory => {
                error!(error = %e, "Supplier directory unavailable");
                Err(format!("Supplier directory unavailable: {}", e))
            }
            Err(e) => {
                warn!(error = %e, "Supplier directory unavailable, using built-in suppliers");
                Ok(all_unpersisted())
            }
        }
    }

    async fn ensure_product(&self, product: &Product) -> Option<i64> {
        let store = self.store.as_ref()?;
        match store.ensure_product(product).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(error = %e, "Price store unavailable, results will not be saved");
                None
            }
        }
    }

    async fn fail(&self, session_id: Uuid, started: Instant, message: String) -> OrchestrationFailure {
        let duration = elapsed_ms(started);
        error!(duration_ms = duration, error = %message, "Price fetch failed");
        if let Some(audit) = &self.audit {
            if let Err(e) = audit
                .log_session_end(session_id, SessionStatus::Failed, Some(message.clone()))
                .await
            {
                warn!(error = %e, "Failed to record session failure");
            }
        }
        metrics::counter!("price_fetch_sessions_total", "status" => "failed").increment(1);
        OrchestrationFailure::new(session_id, duration, message)
    }
}

async fn scrape_and_record(
    scraper: ScraperHandle,
    product: Product,
    persist: Option<(Arc<dyn PriceStore>, i64, i64)>,
) -> ScrapedData {
    let started = Instant::now();
    let data = match scraper.scrape(&product).await {
        Ok(data) => data,
        Err(e) => {
            error!(error = %e, "Scraping failed");
            ScrapedData::failed()
        }
    };

    if let Some((store, product_id, supplier_id)) = persist {
        if let Err(e) = store
            .save_price_result(product_id, supplier_id, &data, elapsed_ms(started))
            .await
        {
            warn!(error = %e, "Failed to save price result");
        }
    }
    data
}

fn check_product(product: &Product) -> Result<(), String> {
    if !product.has_identity() {
        return Err("Brand and part number are required".to_string());
    }
    product.validate().map_err(|e| e.to_string())
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
