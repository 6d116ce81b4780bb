//! Built-in supplier sites, in the order results are reported.

use std::time::Duration;

use super::descriptor::{ExtractionStrategy, ReadySignal, SiteDescriptor};
use crate::browser::NavigationWait;

pub const AMAZON_CA: &str = "Amazon.ca";
pub const ULINE: &str = "ULINE";
pub const BROGAN_SAFETY: &str = "Brogan Safety";
pub const SB_SIMPSON: &str = "SB Simpson";
pub const SPI_HEALTH_SAFETY: &str = "SPI Health & Safety";
pub const HAZMASTERS: &str = "Hazmasters";
pub const ACKLANDS_GRAINGER: &str = "Acklands Grainger";
pub const VALLEN: &str = "Vallen";

pub const SUPPLIER_NAMES: [&str; 8] = [
    AMAZON_CA,
    ULINE,
    BROGAN_SAFETY,
    SB_SIMPSON,
    SPI_HEALTH_SAFETY,
    HAZMASTERS,
    ACKLANDS_GRAINGER,
    VALLEN,
];

const RESULTS_WAIT: Duration = Duration::from_secs(10);
const DOM_NAVIGATION_TIMEOUT: Duration = Duration::from_secs(60);
const SPINNER_WAIT: Duration = Duration::from_secs(30);
const SPA_SETTLE: Duration = Duration::from_secs(8);

// Field groups shared by the generic storefront layouts
const STORE_TITLE: &[&str] = &[
    ".product-title, .item-title, h3, h4, .product-name",
    r#"a[href*="/product/"]"#,
    r#"[class*="title"]"#,
];
const STORE_PRICE: &[&str] = &[
    r#".price, .product-price, .item-price, [class*="price"]"#,
    ".money, .cost",
];
const STORE_LINK: &[&str] = &[
    r#"a[href*="/product/"]"#,
    r#"a[href*="/products/"]"#,
    "a",
];

pub fn builtin() -> Vec<SiteDescriptor> {
    vec![
        amazon_ca(),
        uline(),
        brogan_safety(),
        sb_simpson(),
        spi_health_safety(),
        hazmasters(),
        acklands_grainger(),
        vallen(),
    ]
}

pub fn amazon_ca() -> SiteDescriptor {
    SiteDescriptor {
        name: AMAZON_CA,
        base_url: "https://www.amazon.ca",
        search_url: "https://www.amazon.ca/s?k={query}",
        navigation: NavigationWait::NetworkIdle,
        navigation_timeout: Duration::from_secs(30),
        settle: Duration::ZERO,
        challenge_markers: &[],
        ready: &[ReadySignal::Present {
            selector: r#"[data-component-type="s-search-result"], .s-result-item"#,
            timeout: RESULTS_WAIT,
        }],
        no_results: None,
        containers: r#"[data-component-type="s-search-result"], .s-result-item"#,
        title: &[
            "h2 a span",
            r#"[data-cy="title-recipe-title"]"#,
            ".s-title-instructions-style span",
        ],
        price: &[
            ".a-price .a-offscreen",
            ".a-price-whole",
            ".a-price-range",
            ".a-price",
            "[data-a-price]",
        ],
        link: &[
            "h2 a",
            r#"[data-cy="title-recipe-title"] a"#,
            "a.a-link-normal",
        ],
        part_number: &[],
        max_items: None,
        product_page_fallback: &[],
        strategy: ExtractionStrategy::Listing,
    }
}

pub fn uline() -> SiteDescriptor {
    SiteDescriptor {
        name: ULINE,
        base_url: "https://www.uline.ca",
        search_url: "https://www.uline.ca/Product/AdvSearchResult?keywords={query}",
        navigation: NavigationWait::DomContentLoaded,
        navigation_timeout: DOM_NAVIGATION_TIMEOUT,
        settle: Duration::from_secs(2),
        challenge_markers: &["Challenge", "Validation"],
        ready: &[ReadySignal::Present {
            selector: ".search-results, .product-item, .no-results, .search-result",
            timeout: RESULTS_WAIT,
        }],
        no_results: Some(".no-results, .no-search-results"),
        containers: r#".search-result, .product-item, .search-result-item, [class*="search-result"]"#,
        title: &[
            ".product-title, .item-title, h3, h4, .title",
            r#"a[href*="/Product/Detail"]"#,
            r#"[class*="title"]"#,
        ],
        price: &[
            ".price, .product-price, .item-price",
            r#"[class*="price"]"#,
            ".cost",
        ],
        link: &[
            r#"a[href*="/Product/Detail"]"#,
            r#"a[href*="/Product/"]"#,
            "a",
        ],
        part_number: &[
            ".model, .part-number, .item-number",
            r#"[class*="model"], [class*="part"]"#,
            ".sku",
        ],
        max_items: None,
        product_page_fallback: &[],
        strategy: ExtractionStrategy::Listing,
    }
}

pub fn brogan_safety() -> SiteDescriptor {
    SiteDescriptor {
        name: BROGAN_SAFETY,
        base_url: "https://www.brogansafety.com",
        search_url: "https://www.brogansafety.com/search?criteria={query}",
        navigation: NavigationWait::DomContentLoaded,
        navigation_timeout: DOM_NAVIGATION_TIMEOUT,
        settle: Duration::ZERO,
        challenge_markers: &[],
        ready: &[ReadySignal::Present {
            selector: ".product-item, .search-results, .no-results",
            timeout: RESULTS_WAIT,
        }],
        no_results: None,
        containers: ".product-item, .product-card, .search-result-item, .grid-product, [data-product-id]",
        title: STORE_TITLE,
        price: STORE_PRICE,
        link: STORE_LINK,
        part_number: &[],
        max_items: None,
        product_page_fallback: &[],
        strategy: ExtractionStrategy::Listing,
    }
}

pub fn sb_simpson() -> SiteDescriptor {
    SiteDescriptor {
        name: SB_SIMPSON,
        base_url: "https://sbsimpson.com",
        search_url: "https://sbsimpson.com/expertrec-search/?q={query}",
        navigation: NavigationWait::DomContentLoaded,
        navigation_timeout: DOM_NAVIGATION_TIMEOUT,
        settle: Duration::ZERO,
        challenge_markers: &[],
        ready: &[ReadySignal::Present {
            selector: ".product-item, .search-results, .product-grid",
            timeout: RESULTS_WAIT,
        }],
        no_results: None,
        containers: r#".woocommerce-loop-product, .product, [class*="result"], .result, .item, div[class*="product"], div[class*="item"]"#,
        title: &[
            ".woocommerce-loop-product__title, .product-title, .item-title, h3, h4, .product-name",
            r#"a[href*="/product/"]"#,
            r#"[class*="title"], a, span"#,
        ],
        price: &[
            r#".er_item_price_container, .woocommerce-Price-amount.amount, .price, [class*="price"]"#,
            ".er_item_price_container *, .woocommerce-Price-amount *, .money, .cost",
        ],
        link: STORE_LINK,
        part_number: &[],
        max_items: Some(10),
        product_page_fallback: &[
            ".woocommerce-Price-amount.amount",
            ".woocommerce-Price-amount",
            ".price .amount",
            ".price",
            r#"[class*="price"]"#,
            ".product-price",
            ".regular-price",
            ".sale-price",
        ],
        strategy: ExtractionStrategy::Listing,
    }
}

pub fn spi_health_safety() -> SiteDescriptor {
    SiteDescriptor {
        name: SPI_HEALTH_SAFETY,
        base_url: "https://www.spi.com",
        search_url: "https://www.spi.com/Search?query={query}",
        navigation: NavigationWait::DomContentLoaded,
        navigation_timeout: DOM_NAVIGATION_TIMEOUT,
        settle: Duration::ZERO,
        challenge_markers: &[],
        ready: &[ReadySignal::Present {
            selector: ".product-item, .search-results, .product-list",
            timeout: RESULTS_WAIT,
        }],
        no_results: None,
        containers: r#".search-result, .product-item, .product-card, .search-item, [class*="result"]"#,
        title: STORE_TITLE,
        price: STORE_PRICE,
        link: STORE_LINK,
        part_number: &[],
        max_items: None,
        product_page_fallback: &[],
        strategy: ExtractionStrategy::Listing,
    }
}

pub fn hazmasters() -> SiteDescriptor {
    SiteDescriptor {
        name: HAZMASTERS,
        base_url: "https://www.hazmasters.com",
        search_url: "https://www.hazmasters.com/products?q={query}",
        navigation: NavigationWait::DomContentLoaded,
        navigation_timeout: DOM_NAVIGATION_TIMEOUT,
        settle: Duration::ZERO,
        challenge_markers: &[],
        ready: &[ReadySignal::Present {
            selector: ".product-item, .search-results, .product-grid, .no-results",
            timeout: RESULTS_WAIT,
        }],
        no_results: Some(".no-results, .no-search-results"),
        containers: r#".product-item, .product-card, .grid-item, .search-result, [class*="product"]"#,
        title: STORE_TITLE,
        price: STORE_PRICE,
        link: STORE_LINK,
        part_number: &[],
        max_items: None,
        product_page_fallback: &[],
        strategy: ExtractionStrategy::Listing,
    }
}

pub fn acklands_grainger() -> SiteDescriptor {
    SiteDescriptor {
        name: ACKLANDS_GRAINGER,
        base_url: "https://www.grainger.ca",
        search_url: "https://www.grainger.ca/en/search/?searchBar=true&nls=NLSAA_NA-1&text={query}",
        navigation: NavigationWait::DomContentLoaded,
        navigation_timeout: DOM_NAVIGATION_TIMEOUT,
        settle: Duration::ZERO,
        challenge_markers: &[],
        ready: &[ReadySignal::Present {
            selector: ".search-results-container, .product-item, .search-result",
            timeout: RESULTS_WAIT,
        }],
        no_results: None,
        containers: r#".search-result, .product-item, [data-testid="search-result"]"#,
        title: &[
            r#".search-result-title, .product-title, h3, h4, a[href*="/product/"]"#,
            r#"[data-testid="product-title"]"#,
        ],
        price: &[
            r#".price, .product-price, [data-testid="price"]"#,
            r#"[class*="price"]"#,
        ],
        link: &[r#"a[href*="/product/"]"#, r#"a[href*="/p/"]"#, "a"],
        part_number: &[],
        max_items: None,
        product_page_fallback: &[],
        strategy: ExtractionStrategy::Listing,
    }
}

/// Angular storefront; listings only exist once the client render finishes.
pub fn vallen() -> SiteDescriptor {
    SiteDescriptor {
        name: VALLEN,
        base_url: "https://www.vallen.ca",
        search_url: "https://www.vallen.ca/search/{query}",
        navigation: NavigationWait::NetworkIdle,
        navigation_timeout: Duration::from_secs(90),
        settle: Duration::ZERO,
        challenge_markers: &[],
        ready: &[
            ReadySignal::Hidden {
                selector: "val-loading-spinner",
                timeout: SPINNER_WAIT,
            },
            ReadySignal::Settle(SPA_SETTLE),
            ReadySignal::Present {
                selector: r#"[data-testid*="price"], [data-testid*="product-item"]"#,
                timeout: RESULTS_WAIT,
            },
        ],
        no_results: None,
        containers: r#"[data-testid*="product-item"]"#,
        title: &[
            r#"[data-testid*="product-title"], [data-testid*="product-name"]"#,
            r#"[data-testid*="product-item-list-title"]"#,
            r#"[data-testid*="product-item-list-id"]"#,
            r#"a[href*="/products/"]"#,
        ],
        price: &[],
        link: &[
            r#"a[href*="/products/"]"#,
            r#"[data-testid*="product-item-list-title-link"]"#,
            r#"[data-testid*="product-item-list-id-link"]"#,
        ],
        part_number: &[],
        max_items: None,
        product_page_fallback: &[],
        strategy: ExtractionStrategy::MarkerClassified {
            price_marker: r#"[data-testid*="product-price-value"]"#,
            unavailable_marker: r#"[data-testid*="product-price-unavailable"]"#,
            item_container: r#"[data-testid*="product-item"]"#,
        },
    }
}
