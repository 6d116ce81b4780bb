use super::*;
use axum::http::{Method, StatusCode};
use price_scout::web::create_router;
use serde_json::json;

fn priced_web() -> FakeWeb {
    FakeWeb::new()
        .page("amazon.ca", "Amazon.ca : 3M 2091", AMAZON_RESULTS)
        .page("brogansafety.com", "Search", BROGAN_RESULTS)
        .page("hazmasters.com", "Search", HAZMASTERS_EMPTY)
}

#[tokio::test]
async fn test_health_check_with_database() -> anyhow::Result<()> {
    let test_app = create_test_app(priced_web()).await?;
    let app = create_router(test_app.state.clone());

    let response = make_request(&app, Method::GET, "/health", None).await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "connected");
    assert_eq!(body["browser"], "idle");
    Ok(())
}

#[tokio::test]
async fn test_fetch_then_compare() -> anyhow::Result<()> {
    let test_app = create_test_app(priced_web()).await?;
    let app = create_router(test_app.state.clone());

    let response = make_request(
        &app,
        Method::POST,
        "/api/fetch-prices",
        Some(json!({"brand": "3M", "partNumber": "2091"}).to_string()),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await?;
    assert_eq!(body["product"], "3M 2091");
    assert_eq!(body["prices"].as_array().map(Vec::len), Some(3));
    assert_eq!(body["prices"][0]["website"], "Amazon.ca");
    assert_eq!(body["prices"][0]["price"], "$19.99");
    assert_eq!(body["prices"][0]["link"], "https://www.amazon.ca/dp/B0001");
    assert_eq!(body["prices"][2]["price"], "Not Found");
    assert!(body["sessionId"].as_str().is_some());
    assert!(body["duration"].as_u64().is_some());

    // The browser stays up for the next request
    assert!(test_app.web.launches() >= 1);
    assert!(test_app.state.sessions.is_running().await);

    let response = make_request(&app, Method::GET, "/api/price-comparison?productId=1", None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    let prices = body["prices"].as_array().cloned().unwrap_or_default();
    assert_eq!(prices.len(), 3);
    assert_eq!(prices[0]["supplier"], "Amazon.ca");
    assert_eq!(prices[0]["status"], "available");
    assert_eq!(prices[1]["priceText"], "$24.50");
    Ok(())
}

#[tokio::test]
async fn test_fetch_rejects_missing_part_number() -> anyhow::Result<()> {
    let test_app = create_test_app(priced_web()).await?;
    let app = create_router(test_app.state.clone());

    let response = make_request(
        &app,
        Method::POST,
        "/api/fetch-prices",
        Some(json!({"brand": "3M", "partNumber": "   "}).to_string()),
    )
    .await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await?;
    assert_eq!(body["error"], "Brand and part number are required");
    assert!(test_app.web.navigations().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_suppliers_carry_directory_ids() -> anyhow::Result<()> {
    let test_app = create_test_app(priced_web()).await?;
    test_app.store.set_supplier_active("Vallen", false).await?;
    let app = create_router(test_app.state.clone());

    let response = make_request(&app, Method::GET, "/api/suppliers", None).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await?;
    let suppliers = body["suppliers"].as_array().cloned().unwrap_or_default();
    assert_eq!(suppliers.len(), 8);
    assert_eq!(suppliers[0]["id"], 1);
    assert_eq!(suppliers[0]["websiteUrl"], "https://www.amazon.ca");
    assert_eq!(suppliers[7]["name"], "Vallen");
    assert_eq!(suppliers[7]["isActive"], false);
    Ok(())
}

#[tokio::test]
async fn test_price_comparison_requires_product_id() -> anyhow::Result<()> {
    let test_app = create_test_app(priced_web()).await?;
    let app = create_router(test_app.state.clone());

    let response = make_request(&app, Method::GET, "/api/price-comparison", None).await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await?;
    assert_eq!(body["error"], "productId is required");
    Ok(())
}

#[tokio::test]
async fn test_debug_scraper_probes_named_site() -> anyhow::Result<()> {
    let web = priced_web();
    let app = create_router(create_probe_state(&web));

    let response = make_request(
        &app,
        Method::POST,
        "/api/debug-scraper",
        Some(json!({"supplier": "brogan safety"}).to_string()),
    )
    .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    assert_eq!(body["supplier"], "Brogan Safety");
    assert_eq!(body["product"]["brand"], "3M");
    assert_eq!(body["report"]["listingCount"], 1);
    assert_eq!(body["report"]["listings"][0]["matched"], true);
    assert_eq!(body["report"]["result"]["price"], "$24.50");
    Ok(())
}

#[tokio::test]
async fn test_rate_limit_is_per_client_and_path() -> anyhow::Result<()> {
    let web = priced_web();
    let mut state = create_probe_state(&web);
    state.rate_limiter = Arc::new(RateLimiter::new(2, Duration::from_secs(60)));
    let app = create_router(state);

    for _ in 0..2 {
        let response = make_request(&app, Method::GET, "/api/suppliers", None).await?;
        assert_eq!(response.status(), StatusCode::OK);
    }
    let response = make_request(&app, Method::GET, "/api/suppliers", None).await?;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    // Another path has its own window
    let response = make_request(&app, Method::GET, "/api/price-comparison?productId=1", None).await?;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.headers()["X-RateLimit-Remaining"], "1");
    Ok(())
}
