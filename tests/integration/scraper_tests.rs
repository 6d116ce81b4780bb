use super::*;
use price_scout::models::{
    Price, Product, CAPTCHA_DETECTED, FOUND_BUT_UNAVAILABLE, PAGE_NAVIGATION_ERROR, PRODUCT_NOT_FOUND,
};
use price_scout::suppliers::SupplierScraper;

const VALLEN_RESULTS: &str = r#"
<html><body>
  <div data-testid="product-item-1">
    <a href="/products/3m-2091" data-testid="product-item-list-title-link">
      <span data-testid="product-title">3M 2091 Particulate Filter P100</span>
    </a>
    <span data-testid="product-price-unavailable">Login for pricing</span>
  </div>
</body></html>
"#;

const SB_SIMPSON_RESULTS: &str = r#"
<html><body>
  <ul class="products">
    <li class="product">
      <a href="/product/3m-2091/">
        <h2 class="woocommerce-loop-product__title">3M 2091 P100 Particulate Filter</h2>
      </a>
    </li>
  </ul>
</body></html>
"#;

const SB_SIMPSON_PRODUCT: &str = r#"
<html><body>
  <h1 class="product_title">3M 2091 P100 Particulate Filter</h1>
  <p class="price"><span class="woocommerce-Price-amount amount"><bdi>$31.25</bdi></span></p>
</body></html>
"#;

fn respirator() -> Product {
    Product::new("3M", "2091")
}

#[tokio::test]
async fn test_amazon_picks_matching_listing() -> anyhow::Result<()> {
    let web = FakeWeb::new().page("amazon.ca", "Amazon.ca : 3M 2091", AMAZON_RESULTS);
    let sessions = fake_sessions(&web);
    let scraper = site_scraper(catalog::amazon_ca(), &sessions);

    let data = scraper.scrape(&respirator()).await?;

    assert_eq!(data.price, Price::Amount("$19.99".to_string()));
    assert_eq!(data.link.as_deref(), Some("https://www.amazon.ca/dp/B0001"));
    assert_eq!(data.availability.as_deref(), Some("Available"));
    assert_eq!(web.navigations(), vec!["https://www.amazon.ca/s?k=3M%202091".to_string()]);
    Ok(())
}

#[tokio::test]
async fn test_label_prefixed_price_is_normalized() -> anyhow::Result<()> {
    let web = FakeWeb::new().page("brogansafety.com", "Search", BROGAN_RESULTS);
    let sessions = fake_sessions(&web);
    let scraper = site_scraper(catalog::brogan_safety(), &sessions);

    let data = scraper.scrape(&respirator()).await?;

    assert_eq!(data.price.as_str(), "$24.50");
    assert_eq!(
        data.link.as_deref(),
        Some("https://www.brogansafety.com/product/3m-2091-p100")
    );
    Ok(())
}

#[tokio::test]
async fn test_no_results_marker_short_circuits() -> anyhow::Result<()> {
    let web = FakeWeb::new().page("hazmasters.com", "Search", HAZMASTERS_EMPTY);
    let sessions = fake_sessions(&web);
    let scraper = site_scraper(catalog::hazmasters(), &sessions);

    let data = scraper.scrape(&respirator()).await?;

    assert_eq!(data.price, Price::NotFound);
    assert_eq!(data.availability.as_deref(), Some(PRODUCT_NOT_FOUND));
    Ok(())
}

#[tokio::test]
async fn test_unmatched_listings_are_not_found() -> anyhow::Result<()> {
    let web = FakeWeb::new().page("amazon.ca", "Amazon.ca", AMAZON_RESULTS);
    let sessions = fake_sessions(&web);
    let scraper = site_scraper(catalog::amazon_ca(), &sessions);

    let data = scraper.scrape(&Product::new("Honeywell", "7581")).await?;

    assert_eq!(data.price, Price::NotFound);
    assert!(data.link.is_none());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_challenge_page_is_reported_not_retried() -> anyhow::Result<()> {
    let web = FakeWeb::new().page("uline.ca", "Challenge Validation", "<html></html>");
    let sessions = fake_sessions(&web);
    let scraper = SiteScraper::new(
        catalog::uline(),
        Arc::clone(&sessions),
        RetryPolicy::new(2, Duration::from_secs(3)),
    );

    let data = scraper.scrape(&respirator()).await?;

    assert_eq!(data.price, Price::NotAvailable);
    assert_eq!(data.availability.as_deref(), Some(CAPTCHA_DETECTED));
    assert_eq!(web.navigations().len(), 1);
    assert_eq!(web.pages_opened(), 1);
    assert_eq!(web.pages_closed(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_navigation_failure_retries_then_errors() {
    let web = FakeWeb::new().failing("grainger.ca");
    let sessions = fake_sessions(&web);
    let scraper = SiteScraper::new(
        catalog::acklands_grainger(),
        Arc::clone(&sessions),
        RetryPolicy::new(2, Duration::from_secs(3)),
    );

    let result = scraper.scrape(&respirator()).await;

    assert!(matches!(result, Err(AppError::Navigation { .. })));
    assert_eq!(web.navigations().len(), 3);
    // One process serves every attempt, and each attempt's page is closed
    assert_eq!(web.launches(), 1);
    assert_eq!(web.pages_opened(), 3);
    assert_eq!(web.pages_closed(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_unreadable_title_on_guarded_site() -> anyhow::Result<()> {
    let web = FakeWeb::new().untitled("uline.ca");
    let sessions = fake_sessions(&web);
    let scraper = site_scraper(catalog::uline(), &sessions);

    let data = scraper.scrape(&respirator()).await?;

    assert_eq!(data.price, Price::NotAvailable);
    assert_eq!(data.availability.as_deref(), Some(PAGE_NAVIGATION_ERROR));
    assert!(data.link.is_none());
    assert_eq!(web.pages_opened(), web.pages_closed());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_priceless_listing_falls_back_to_product_page() -> anyhow::Result<()> {
    let web = FakeWeb::new()
        .page("sbsimpson.com/product/", "3M 2091", SB_SIMPSON_PRODUCT)
        .page("sbsimpson.com/expertrec-search", "Search", SB_SIMPSON_RESULTS);
    let sessions = fake_sessions(&web);
    let scraper = site_scraper(catalog::sb_simpson(), &sessions);

    let data = scraper.scrape(&respirator()).await?;

    assert_eq!(data.price, Price::Amount("$31.25".to_string()));
    assert_eq!(data.link.as_deref(), Some("https://sbsimpson.com/product/3m-2091/"));
    assert_eq!(data.availability.as_deref(), Some("Available"));
    assert_eq!(
        web.navigations(),
        vec![
            "https://sbsimpson.com/expertrec-search/?q=3M%202091".to_string(),
            "https://sbsimpson.com/product/3m-2091/".to_string(),
        ]
    );
    // Both pages are read through the same lease
    assert_eq!(web.pages_opened(), 1);
    assert_eq!(web.pages_closed(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_marker_classified_unavailable_listing() -> anyhow::Result<()> {
    let web = FakeWeb::new().page("vallen.ca", "Vallen", VALLEN_RESULTS);
    let sessions = fake_sessions(&web);
    let scraper = site_scraper(catalog::vallen(), &sessions);

    let data = scraper.scrape(&respirator()).await?;

    assert_eq!(data.price, Price::Unavailable);
    assert_eq!(data.availability.as_deref(), Some(FOUND_BUT_UNAVAILABLE));
    assert_eq!(data.link.as_deref(), Some("https://www.vallen.ca/products/3m-2091"));
    Ok(())
}

#[tokio::test]
async fn test_probe_reports_page_contents() -> anyhow::Result<()> {
    let web = FakeWeb::new().page("amazon.ca", "Amazon.ca : 3M 2091", AMAZON_RESULTS);
    let sessions = fake_sessions(&web);
    let scraper = site_scraper(catalog::amazon_ca(), &sessions);

    let report = scraper.probe(&respirator()).await?;

    assert_eq!(report.supplier, "Amazon.ca");
    assert_eq!(report.strategy, "listing");
    assert_eq!(report.page_title.as_deref(), Some("Amazon.ca : 3M 2091"));
    assert_eq!(report.container_count, 2);
    assert_eq!(report.listing_count, 2);
    assert!(!report.listings[0].matched);
    assert!(report.listings[1].matched);
    assert_eq!(report.listings[1].extracted_price.as_str(), "$19.99");
    assert_eq!(report.result.price.as_str(), "$19.99");
    Ok(())
}

#[tokio::test]
async fn test_pages_share_one_browser() -> anyhow::Result<()> {
    let web = FakeWeb::new()
        .page("amazon.ca", "Amazon.ca", AMAZON_RESULTS)
        .page("brogansafety.com", "Search", BROGAN_RESULTS);
    let sessions = fake_sessions(&web);
    let amazon = site_scraper(catalog::amazon_ca(), &sessions);
    let brogan = site_scraper(catalog::brogan_safety(), &sessions);

    let product = respirator();
    let (a, b) = tokio::join!(amazon.scrape(&product), brogan.scrape(&product));
    assert!(a?.price.is_amount());
    assert!(b?.price.is_amount());

    assert_eq!(web.launches(), 1);
    assert_eq!(web.pages_opened(), 2);
    assert_eq!(web.pages_closed(), 2);
    assert!(sessions.is_running().await);
    sessions.shutdown().await;
    assert!(!sessions.is_running().await);
    Ok(())
}
