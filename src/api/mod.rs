//! HTTP surface

use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;

pub mod best_sellers;
pub mod orders;
pub mod payments;
pub mod products;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub search: Option<String>,
}

impl ListParams {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn per_page(&self) -> u32 {
        self.per_page.unwrap_or(20).clamp(1, 100)
    }
}

#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: u32,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/products", get(products::list).post(products::create))
        .route("/api/products/best-sellers", get(best_sellers::list))
        .route(
            "/api/products/:id",
            get(products::get).put(products::update).delete(products::remove),
        )
        .route("/api/products/:id/quote", post(products::quote))
        .route(
            "/api/products/:id/best-seller",
            post(best_sellers::add).delete(best_sellers::remove),
        )
        .route("/api/products/:id/best-seller/order", put(best_sellers::update_order))
        .route("/api/orders", get(orders::list_all).post(orders::create))
        .route("/api/orders/mine", get(orders::list_mine))
        .route("/api/orders/:id", get(orders::get).delete(orders::remove))
        .route("/api/orders/:id/deliver", put(orders::deliver))
        .route("/api/orders/:id/status", put(orders::update_status))
        .route("/api/checkout/session", post(payments::create_session))
        .route("/api/checkout/confirm/:session_id", get(payments::confirm))
        .route("/api/webhooks/payment", post(payments::webhook))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy", "service": "phoneshop" }))
}
