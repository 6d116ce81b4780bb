use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::browser::BrowserSessionManager;
use crate::config::AppConfig;
use crate::orchestrator::PriceOrchestrator;
use crate::rate_limiter::RateLimiter;
use crate::store::SqliteStore;

pub mod handlers;
pub mod middleware;
pub mod responses;

pub use handlers::{debug_scraper, fetch_prices, health_check, list_suppliers, price_comparison};
pub use responses::{ApiError, ApiResult};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<PriceOrchestrator>,
    pub store: Option<Arc<SqliteStore>>,
    pub rate_limiter: Arc<RateLimiter>,
    pub sessions: Arc<BrowserSessionManager>,
    pub config: AppConfig,
}

pub fn create_router(state: AppState) -> Router {
    let mut api = api_routes();
    if state.config.rate_limit.enabled {
        api = api.layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limiting,
        ));
    }

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api)
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_response(DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(CompressionLayer::new())
                .layer(CorsLayer::permissive())
                .layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    middleware::request_timeout,
                )),
        )
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/fetch-prices", post(fetch_prices))
        .route("/suppliers", get(list_suppliers))
        .route("/price-comparison", get(price_comparison))
        .route("/debug-scraper", post(debug_scraper))
}

pub async fn serve(state: AppState, shutdown: impl Future<Output = ()> + Send + 'static) -> anyhow::Result<()> {
    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server starting on {}", addr);

    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;
    Ok(())
}
