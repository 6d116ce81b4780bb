use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::descriptor::{ExtractionStrategy, ReadySignal, SiteDescriptor};
use super::listing::{self, Listing, ListingStatus};
use super::traits::SupplierScraper;
use crate::browser::{BrowserSessionManager, NavigationWait, PageDriver};
use crate::extract::{extract_price, ProductMatcher};
use crate::models::{
    Price, Product, ScrapedData, CAPTCHA_DETECTED, PAGE_NAVIGATION_ERROR,
};
use crate::utils::error::Result;
use crate::utils::{with_retry, RetryPolicy};

const PRODUCT_PAGE_TIMEOUT: Duration = Duration::from_secs(30);
const PRODUCT_PAGE_SETTLE: Duration = Duration::from_secs(3);
const PROBE_LISTING_LIMIT: usize = 10;

/// Descriptor-driven scraper shared by every built-in supplier.
pub struct SiteScraper {
    descriptor: SiteDescriptor,
    sessions: Arc<BrowserSessionManager>,
    retry: RetryPolicy,
}

/// What one pass over a results page saw, for diagnostics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeReport {
    pub supplier: String,
    pub strategy: &'static str,
    pub search_url: String,
    pub page_title: Option<String>,
    pub final_url: Option<String>,
    pub container_count: usize,
    pub listing_count: usize,
    pub listings: Vec<ProbeListing>,
    pub result: ScrapedData,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeListing {
    #[serde(flatten)]
    pub listing: Listing,
    pub extracted_price: Price,
    pub matched: bool,
}

/// Result of reading a results page, before the outcome is decided.
struct PageScan {
    title: Option<String>,
    html: String,
    outcome: ScanOutcome,
}

enum ScanOutcome {
    Decided(ScrapedData),
    Listings(Vec<Listing>),
}

impl SiteScraper {
    pub fn new(descriptor: SiteDescriptor, sessions: Arc<BrowserSessionManager>, retry: RetryPolicy) -> Self {
        Self {
            descriptor,
            sessions,
            retry,
        }
    }

    pub fn descriptor(&self) -> &SiteDescriptor {
        &self.descriptor
    }

    /// One un-retried pass that also reports what the page contained.
    pub async fn probe(&self, product: &Product) -> Result<ProbeReport> {
        let search_url = self.descriptor.search_url(product);
        let lease = self.sessions.acquire_page().await?;

        let report: Result<ProbeReport> = async {
            let scan = self.scan(&*lease, &search_url).await?;
            let final_url = lease.current_url().await.ok();
            let container_count = listing::count(&scan.html, self.descriptor.containers)?;
            let matcher = ProductMatcher::new(product);

            let (listings, result) = match scan.outcome {
                ScanOutcome::Decided(data) => (Vec::new(), data),
                ScanOutcome::Listings(listings) => {
                    let result = self.decide(&*lease, &listings, &matcher).await;
                    (listings, result)
                }
            };

            Ok(ProbeReport {
                supplier: self.descriptor.name.to_string(),
                strategy: strategy_name(&self.descriptor.strategy),
                search_url: search_url.clone(),
                page_title: scan.title,
                final_url,
                container_count,
                listing_count: listings.len(),
                listings: listings
                    .into_iter()
                    .take(PROBE_LISTING_LIMIT)
                    .map(|l| ProbeListing {
                        extracted_price: extract_price(&l.price_text),
                        matched: l.matches(&matcher),
                        listing: l,
                    })
                    .collect(),
                result,
            })
        }
        .await;

        self.sessions.release_page(lease).await;
        report
    }

    async fn attempt(&self, product: &Product, attempt: usize) -> Result<ScrapedData> {
        let supplier = self.descriptor.name;
        let search_url = self.descriptor.search_url(product);
        info!(supplier, attempt, query = %product.search_query(), "Searching supplier");

        let lease = self.sessions.acquire_page().await?;
        let result: Result<ScrapedData> = async {
            let scan = self.scan(&*lease, &search_url).await?;
            match scan.outcome {
                ScanOutcome::Decided(data) => Ok(data),
                ScanOutcome::Listings(listings) => {
                    let matcher = ProductMatcher::new(product);
                    Ok(self.decide(&*lease, &listings, &matcher).await)
                }
            }
        }
        .await;
        self.sessions.release_page(lease).await;

        match &result {
            Ok(data) => info!(supplier, attempt, price = %data.price, "Supplier scrape finished"),
            Err(e) => warn!(supplier, attempt, error = %e, "Supplier scrape attempt failed"),
        }
        result
    }

    /// Navigates to the results page and reads it up to the listing stage.
    async fn scan(&self, page: &dyn PageDriver, search_url: &str) -> Result<PageScan> {
        let d = &self.descriptor;
        debug!(supplier = d.name, url = search_url, "Navigating");
        page.navigate(search_url, d.navigation, d.navigation_timeout).await?;

        if !d.settle.is_zero() {
            tokio::time::sleep(d.settle).await;
        }

        let title = match page.title().await {
            Ok(title) => Some(title),
            Err(e) if !d.challenge_markers.is_empty() => {
                warn!(supplier = d.name, error = %e, "Could not read page title");
                return Ok(PageScan {
                    title: None,
                    html: String::new(),
                    outcome: ScanOutcome::Decided(ScrapedData::blocked(PAGE_NAVIGATION_ERROR)),
                });
            }
            Err(e) => {
                debug!(supplier = d.name, error = %e, "Could not read page title");
                None
            }
        };

        if let Some(title) = &title {
            debug!(supplier = d.name, title = %title, "Page loaded");
            if d.challenge_markers.iter().any(|m| title.contains(m)) {
                warn!(supplier = d.name, title = %title, "Challenge page detected, skipping");
                return Ok(PageScan {
                    title: Some(title.clone()),
                    html: String::new(),
                    outcome: ScanOutcome::Decided(ScrapedData::blocked(CAPTCHA_DETECTED)),
                });
            }
        }

        for signal in d.ready {
            self.await_signal(page, signal).await;
        }

        let html = page.content().await?;

        if let Some(no_results) = d.no_results {
            if listing::contains(&html, no_results)? {
                debug!(supplier = d.name, "No-results marker present");
                return Ok(PageScan {
                    title,
                    html,
                    outcome: ScanOutcome::Decided(ScrapedData::not_found()),
                });
            }
        }

        let listings = listing::extract_listings(&html, d)?;
        debug!(supplier = d.name, listings = listings.len(), "Listings extracted");

        Ok(PageScan {
            title,
            html,
            outcome: ScanOutcome::Listings(listings),
        })
    }

    async fn await_signal(&self, page: &dyn PageDriver, signal: &ReadySignal) {
        let supplier = self.descriptor.name;
        let outcome = match *signal {
            ReadySignal::Present { selector, timeout } => page.wait_for_selector(selector, timeout).await,
            ReadySignal::Hidden { selector, timeout } => page.wait_for_hidden(selector, timeout).await,
            ReadySignal::Settle(delay) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
        };
        if let Err(e) = outcome {
            debug!(supplier, error = %e, "Readiness wait expired, continuing");
        }
    }

    /// Picks the best listing and turns it into the supplier's answer.
    async fn decide(&self, page: &dyn PageDriver, listings: &[Listing], matcher: &ProductMatcher) -> ScrapedData {
        let supplier = self.descriptor.name;
        let Some(best) = listing::best_match(listings, matcher) else {
            debug!(supplier, "No listing matched");
            return ScrapedData::not_found();
        };
        debug!(supplier, title = %best.title, raw_price = %best.price_text, "Best match");

        if best.status == ListingStatus::Unavailable {
            return ScrapedData::unavailable(best.link.clone());
        }

        let mut price = extract_price(&best.price_text);
        if !price.is_amount() && self.descriptor.has_product_page_fallback() {
            if let Some(link) = &best.link {
                match self.price_from_product_page(page, link).await {
                    Ok(Some(found)) => price = found,
                    Ok(None) => debug!(supplier, link = %link, "No price on product page"),
                    Err(e) => warn!(supplier, link = %link, error = %e, "Product page lookup failed"),
                }
            }
        }

        ScrapedData::listing(price, best.link.clone())
    }

    async fn price_from_product_page(&self, page: &dyn PageDriver, link: &str) -> Result<Option<Price>> {
        page.navigate(link, NavigationWait::DomContentLoaded, PRODUCT_PAGE_TIMEOUT).await?;
        tokio::time::sleep(PRODUCT_PAGE_SETTLE).await;

        let html = page.content().await?;
        let text = listing::product_page_price(&html, self.descriptor.product_page_fallback)?;
        Ok(text.map(|t| extract_price(&t)).filter(Price::is_amount))
    }
}

#[async_trait]
impl SupplierScraper for SiteScraper {
    fn name(&self) -> &str {
        self.descriptor.name
    }

    async fn scrape(&self, product: &Product) -> Result<ScrapedData> {
        let attempts = AtomicUsize::new(0);
        let started = tokio::time::Instant::now();

        let result = with_retry(self.retry, || {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            self.attempt(product, attempt)
        })
        .await;

        let outcome = match &result {
            Ok(data) => outcome_label(&data.price),
            Err(_) => "error",
        };
        metrics::histogram!("scrape_duration_seconds", "supplier" => self.descriptor.name)
            .record(started.elapsed().as_secs_f64());
        metrics::counter!("scrape_results_total", "supplier" => self.descriptor.name, "outcome" => outcome)
            .increment(1);

        result
    }
}

fn outcome_label(price: &Price) -> &'static str {
    match price {
        Price::Amount(_) => "found",
        Price::NotFound => "not_found",
        Price::Error => "error",
        Price::Timeout => "timeout",
        Price::Unavailable => "unavailable",
        Price::NotAvailable => "blocked",
    }
}

impl std::fmt::Debug for SiteScraper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiteScraper")
            .field("supplier", &self.descriptor.name)
            .field("retry", &self.retry)
            .finish()
    }
}

fn strategy_name(strategy: &ExtractionStrategy) -> &'static str {
    match strategy {
        ExtractionStrategy::Listing => "listing",
        ExtractionStrategy::MarkerClassified { .. } => "marker_classified",
    }
}
