use async_trait::async_trait;

use crate::models::{Product, ScrapedData};
use crate::utils::error::Result;

/// A single supplier's price lookup.
///
/// Implementations return `Err` for failures worth retrying (navigation,
/// browser, extraction errors). Definitive answers, including "not found" and
/// anti-bot challenges, come back as `Ok` with the matching sentinel price.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SupplierScraper: Send + Sync {
    /// Display name reported in the comparison payload.
    fn name(&self) -> &str;

    async fn scrape(&self, product: &Product) -> Result<ScrapedData>;
}
