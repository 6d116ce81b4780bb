use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::Validate;

use super::middleware::extract_client_ip;
use super::responses::{ApiError, ApiResult};
use super::AppState;
use crate::models::{iso_timestamp, PriceComparisonResponse, Product};
use crate::store::{PriceStore, RequestMeta};
use crate::suppliers::catalog;
use crate::utils::AppError;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FetchPricesRequest {
    pub brand: String,
    pub part_number: String,
    pub size: Option<String>,
}

impl FetchPricesRequest {
    /// Blank fields are rejected; the rest is kept exactly as sent.
    pub fn into_product(self) -> ApiResult<Product> {
        let product = Product {
            brand: self.brand,
            part_number: self.part_number,
            size: self.size.filter(|s| !s.trim().is_empty()),
        };
        if !product.has_identity() {
            return Err(ApiError::BadRequest("Brand and part number are required".into()));
        }
        product.validate().map_err(AppError::from)?;
        Ok(product)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplierInfo {
    pub id: Option<i64>,
    pub name: String,
    pub website_url: String,
    pub search_url_template: String,
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
pub struct ComparisonQuery {
    #[serde(rename = "productId")]
    pub product_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct DebugScraperRequest {
    pub supplier: String,
    pub product: Option<Product>,
}

pub async fn health_check(State(state): State<AppState>) -> Response {
    let (database, healthy) = match &state.store {
        Some(store) => match store.ping().await {
            Ok(()) => ("connected", true),
            Err(e) => {
                tracing::warn!(error = %e, "Health check database ping failed");
                ("disconnected", false)
            }
        },
        None => ("disabled", true),
    };

    let status = if healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    let body = json!({
        "status": if healthy { "healthy" } else { "unhealthy" },
        "timestamp": iso_timestamp(chrono::Utc::now()),
        "database": database,
        "browser": if state.sessions.is_running().await { "running" } else { "idle" },
        "version": env!("CARGO_PKG_VERSION"),
    });
    (status, Json(body)).into_response()
}

pub async fn fetch_prices(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<FetchPricesRequest>,
) -> ApiResult<Json<PriceComparisonResponse>> {
    let product = request.into_product()?;
    let meta = RequestMeta {
        user_agent: headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        ip_address: Some(extract_client_ip(&headers)).filter(|ip| ip != "unknown"),
    };

    let response = state.orchestrator.fetch_all_prices(&product, &meta).await?;
    Ok(Json(response))
}

pub async fn list_suppliers(State(state): State<AppState>) -> Json<serde_json::Value> {
    let stored = match &state.store {
        Some(store) => store.all_suppliers().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Could not read supplier directory");
            Vec::new()
        }),
        None => Vec::new(),
    };

    let suppliers: Vec<SupplierInfo> = catalog::builtin()
        .into_iter()
        .map(|descriptor| {
            let record = stored.iter().find(|r| r.name == descriptor.name);
            SupplierInfo {
                id: record.map(|r| r.id),
                name: descriptor.name.to_string(),
                website_url: descriptor.base_url.to_string(),
                search_url_template: descriptor.search_url.to_string(),
                is_active: record.is_none_or(|r| r.is_active),
            }
        })
        .collect();

    Json(json!({ "suppliers": suppliers }))
}

pub async fn price_comparison(
    State(state): State<AppState>,
    Query(query): Query<ComparisonQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let store = state
        .store
        .as_ref()
        .ok_or_else(|| ApiError::ServiceUnavailable("Database is not configured".into()))?;
    let product_id = query
        .product_id
        .ok_or_else(|| ApiError::BadRequest("productId is required".into()))?;

    let prices = store.current_prices(product_id).await?;
    Ok(Json(json!({ "productId": product_id, "prices": prices })))
}

pub async fn debug_scraper(
    State(state): State<AppState>,
    Json(request): Json<DebugScraperRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let site = state
        .orchestrator
        .registry()
        .site(&request.supplier)
        .cloned()
        .ok_or_else(|| AppError::NotFound {
            resource: format!("Supplier {}", request.supplier),
        })?;

    let product = request.product.unwrap_or_else(|| Product::new("3M", "2091"));
    product.validate().map_err(AppError::from)?;

    tracing::info!(supplier = %site.descriptor().name, product = %product.display_name(), "Debug scrape");
    let report = site.probe(&product).await?;

    Ok(Json(json!({
        "supplier": site.descriptor().name,
        "product": product,
        "report": report,
        "timestamp": iso_timestamp(chrono::Utc::now()),
    })))
}
