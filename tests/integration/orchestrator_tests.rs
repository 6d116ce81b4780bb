use super::*;
use price_scout::models::{Price, Product, SCRAPING_FAILED, SUPPLIER_NOT_CONFIGURED};
use price_scout::store::{PriceStore, RequestMeta};
use rust_decimal::Decimal;
use std::str::FromStr;

fn four_site_web() -> FakeWeb {
    FakeWeb::new()
        .page("amazon.ca", "Amazon.ca : 3M 2091", AMAZON_RESULTS)
        .page("brogansafety.com", "Search", BROGAN_RESULTS)
        .page("hazmasters.com", "Search", HAZMASTERS_EMPTY)
        .failing("grainger.ca")
}

fn four_sites(sessions: &Arc<BrowserSessionManager>) -> SupplierRegistry {
    site_registry(
        vec![
            catalog::amazon_ca(),
            catalog::brogan_safety(),
            catalog::hazmasters(),
            catalog::acklands_grainger(),
        ],
        sessions,
    )
}

#[tokio::test]
async fn test_full_run_persists_every_supplier() -> anyhow::Result<()> {
    let web = four_site_web();
    let sessions = fake_sessions(&web);
    let (store, _dir) = temp_store().await?;
    let orchestrator = stored_orchestrator(four_sites(&sessions), &store);

    let meta = RequestMeta {
        user_agent: Some("integration".to_string()),
        ip_address: Some("198.51.100.20".to_string()),
    };
    let response = orchestrator.fetch_all_prices(&Product::new("3M", "2091"), &meta).await?;

    let websites: Vec<_> = response.prices.iter().map(|r| r.website.as_str()).collect();
    assert_eq!(
        websites,
        vec!["Amazon.ca", "Brogan Safety", "Hazmasters", "Acklands Grainger"]
    );
    assert_eq!(response.prices[0].price().as_str(), "$19.99");
    assert_eq!(response.prices[1].price().as_str(), "$24.50");
    assert_eq!(response.prices[2].price(), &Price::NotFound);
    assert_eq!(response.prices[3].price(), &Price::Error);
    assert_eq!(response.prices[3].data.availability.as_deref(), Some(SCRAPING_FAILED));
    assert_eq!(response.found_count(), 2);
    assert_eq!(response.best_offer().map(|r| r.website.as_str()), Some("Amazon.ca"));

    let product_id = store.ensure_product(&Product::new("3M", "2091")).await?;
    let stored = store.current_prices(product_id).await?;
    assert_eq!(stored.len(), 4);
    assert_eq!(stored[0].supplier, "Amazon.ca");
    assert_eq!(stored[0].price, Some(Decimal::from_str("19.99")?));
    assert_eq!(stored[0].status, "available");
    assert_eq!(stored[2].status, "not_found");
    assert_eq!(stored[3].status, "error");

    assert_eq!(
        store.session_status(response.session_id).await?.as_deref(),
        Some("completed")
    );
    Ok(())
}

#[tokio::test]
async fn test_repeat_run_keeps_one_current_row_per_supplier() -> anyhow::Result<()> {
    let web = four_site_web();
    let sessions = fake_sessions(&web);
    let (store, _dir) = temp_store().await?;
    let orchestrator = stored_orchestrator(four_sites(&sessions), &store);
    let product = Product::new("3M", "2091");

    orchestrator.fetch_all_prices(&product, &RequestMeta::default()).await?;
    orchestrator.fetch_all_prices(&product, &RequestMeta::default()).await?;

    let product_id = store.ensure_product(&product).await?;
    assert_eq!(store.current_prices(product_id).await?.len(), 4);

    let history: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM price_history WHERE product_id = ?")
        .bind(product_id)
        .fetch_one(store.pool())
        .await?;
    // Only the two priced suppliers write history, once per run
    assert_eq!(history, 4);
    Ok(())
}

#[tokio::test]
async fn test_inactive_supplier_is_not_configured() -> anyhow::Result<()> {
    let web = four_site_web();
    let sessions = fake_sessions(&web);
    let (store, _dir) = temp_store().await?;
    assert!(store.set_supplier_active("Brogan Safety", false).await?);
    let orchestrator = stored_orchestrator(four_sites(&sessions), &store);

    let response = orchestrator
        .fetch_all_prices(&Product::new("3M", "2091"), &RequestMeta::default())
        .await?;

    let brogan = &response.prices[1];
    assert_eq!(brogan.website, "Brogan Safety");
    assert_eq!(brogan.price(), &Price::Error);
    assert_eq!(brogan.data.availability.as_deref(), Some(SUPPLIER_NOT_CONFIGURED));
    assert!(!web.navigations().iter().any(|url| url.contains("brogansafety.com")));
    Ok(())
}

#[tokio::test]
async fn test_invalid_product_records_failed_session() -> anyhow::Result<()> {
    let web = four_site_web();
    let sessions = fake_sessions(&web);
    let (store, _dir) = temp_store().await?;
    let orchestrator = stored_orchestrator(four_sites(&sessions), &store);

    let failure = orchestrator
        .fetch_all_prices(&Product::new("3M", "  "), &RequestMeta::default())
        .await
        .unwrap_err();

    assert_eq!(failure.message, "Brand and part number are required");
    assert_eq!(
        store.session_status(failure.session_id).await?.as_deref(),
        Some("failed")
    );
    assert!(web.navigations().is_empty());
    assert_eq!(web.launches(), 0);
    Ok(())
}

#[tokio::test]
async fn test_run_without_store_still_answers() -> anyhow::Result<()> {
    let web = four_site_web();
    let sessions = fake_sessions(&web);
    let orchestrator = PriceOrchestrator::new(four_sites(&sessions), fast_settings());

    let response = orchestrator
        .fetch_all_prices(&Product::new("3M", "2091").with_size("Medium"), &RequestMeta::default())
        .await?;

    assert_eq!(response.product, "3M 2091 Medium");
    assert_eq!(response.prices.len(), 4);
    assert!(web
        .navigations()
        .iter()
        .all(|url| url.contains("3M%202091%20Medium")));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_timed_out_supplier_still_releases_its_page() -> anyhow::Result<()> {
    let web = FakeWeb::new()
        .stalling("amazon.ca", Duration::from_secs(30))
        .page("brogansafety.com", "Search", BROGAN_RESULTS);
    let sessions = fake_sessions(&web);
    let registry = site_registry(vec![catalog::amazon_ca(), catalog::brogan_safety()], &sessions);
    let settings = OrchestratorSettings {
        task_timeout: Duration::from_secs(5),
        ..fast_settings()
    };
    let orchestrator = PriceOrchestrator::new(registry, settings);

    let response = orchestrator
        .fetch_all_prices(&Product::new("3M", "2091"), &RequestMeta::default())
        .await?;

    assert_eq!(*response.prices[0].price(), Price::Timeout);
    assert!(response.prices[1].price().is_amount());

    // The abandoned scrape is still holding Amazon's page
    assert_eq!(web.pages_opened(), 2);
    assert_eq!(web.pages_closed(), 1);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(web.pages_closed(), 2);
    Ok(())
}
