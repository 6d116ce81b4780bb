use std::sync::Arc;

use super::catalog;
use super::engine::SiteScraper;
use super::traits::SupplierScraper;
use crate::browser::BrowserSessionManager;
use crate::utils::RetryPolicy;

pub type ScraperHandle = Arc<dyn SupplierScraper>;

/// Ordered set of supplier scrapers. Registration order is the order results
/// are reported in.
#[derive(Clone, Default)]
pub struct SupplierRegistry {
    scrapers: Vec<ScraperHandle>,
    sites: Vec<Arc<SiteScraper>>,
}

impl SupplierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in site, sharing one browser session.
    pub fn with_builtin(sessions: Arc<BrowserSessionManager>, retry: RetryPolicy) -> Self {
        let mut registry = Self::new();
        for descriptor in catalog::builtin() {
            registry.register_site(SiteScraper::new(descriptor, sessions.clone(), retry));
        }
        registry
    }

    /// Register a scraper, replacing any existing one with the same name in place.
    pub fn register(&mut self, scraper: ScraperHandle) {
        match self.scrapers.iter().position(|s| s.name() == scraper.name()) {
            Some(index) => self.scrapers[index] = scraper,
            None => self.scrapers.push(scraper),
        }
    }

    fn register_site(&mut self, site: SiteScraper) {
        let site = Arc::new(site);
        self.sites.push(site.clone());
        self.register(site);
    }

    pub fn get(&self, name: &str) -> Option<&ScraperHandle> {
        self.scrapers.iter().find(|s| s.name() == name)
    }

    /// Descriptor-driven scraper by name, case-insensitive, for diagnostics.
    pub fn site(&self, name: &str) -> Option<&Arc<SiteScraper>> {
        self.sites
            .iter()
            .find(|s| s.descriptor().name.eq_ignore_ascii_case(name))
    }

    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> Vec<String> {
        self.scrapers.iter().map(|s| s.name().to_string()).collect()
    }

    pub fn scrapers(&self) -> &[ScraperHandle] {
        &self.scrapers
    }

    pub fn len(&self) -> usize {
        self.scrapers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scrapers.is_empty()
    }
}
