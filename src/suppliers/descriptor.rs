use std::time::Duration;

use crate::browser::NavigationWait;
use crate::models::Product;

/// Something to wait for before reading the page. Expiry is never fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadySignal {
    Present {
        selector: &'static str,
        timeout: Duration,
    },
    Hidden {
        selector: &'static str,
        timeout: Duration,
    },
    Settle(Duration),
}

/// How listings are located on a results page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    /// Containers enumerated in document order.
    Listing,
    /// Items discovered from price markers and unavailable markers, each
    /// resolved to its enclosing item container.
    MarkerClassified {
        price_marker: &'static str,
        unavailable_marker: &'static str,
        item_container: &'static str,
    },
}

/// Everything the scrape engine needs to know about one supplier site.
/// Each selector group is a comma-separated CSS selector; groups are tried in
/// order and the first one yielding non-empty text wins.
#[derive(Debug, Clone)]
pub struct SiteDescriptor {
    pub name: &'static str,
    pub base_url: &'static str,
    /// Contains `{query}`, replaced by the URL-escaped search query.
    pub search_url: &'static str,
    pub navigation: NavigationWait,
    pub navigation_timeout: Duration,
    pub settle: Duration,
    /// Page-title fragments that identify an anti-bot challenge.
    pub challenge_markers: &'static [&'static str],
    pub ready: &'static [ReadySignal],
    pub no_results: Option<&'static str>,
    pub containers: &'static str,
    pub title: &'static [&'static str],
    pub price: &'static [&'static str],
    pub link: &'static [&'static str],
    pub part_number: &'static [&'static str],
    pub max_items: Option<usize>,
    /// Price selectors tried on the product page when the listing had none.
    pub product_page_fallback: &'static [&'static str],
    pub strategy: ExtractionStrategy,
}

impl SiteDescriptor {
    pub fn search_url(&self, product: &Product) -> String {
        let query = product.search_query();
        self.search_url
            .replace("{query}", &urlencoding::encode(&query))
    }

    pub fn has_product_page_fallback(&self) -> bool {
        !self.product_page_fallback.is_empty()
    }
}
