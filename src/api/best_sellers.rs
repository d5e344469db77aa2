//! Best-seller handlers

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::products::ProductSummary;
use crate::auth::AuthUser;
use crate::domain::best_sellers::{self, BestSellerMode, SLOT_COUNT};
use crate::error::ApiError;
use crate::repo;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BestSellersResponse {
    pub products: Vec<ProductSummary>,
    pub mode: BestSellerMode,
}

pub async fn list(State(state): State<AppState>) -> Result<Json<BestSellersResponse>, ApiError> {
    let manual = repo::products::manual_best_sellers(&state.db).await?;
    let exclude: Vec<Uuid> = manual.iter().map(|p| p.id).collect();
    let remaining = SLOT_COUNT.saturating_sub(manual.len()) as i64;
    let automatic = if remaining > 0 {
        repo::products::top_sold_excluding(&state.db, &exclude, remaining).await?
    } else {
        Vec::new()
    };

    let (products, mode) = best_sellers::assemble(manual, automatic);
    Ok(Json(BestSellersResponse {
        products: products.into_iter().map(ProductSummary::from).collect(),
        mode,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PinnedResponse {
    pub product_id: Uuid,
    pub best_seller_order: i32,
}

/// Pin a product into the lowest free slot.
pub async fn add(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<PinnedResponse>), ApiError> {
    auth.require_admin()?;
    let product =
        repo::products::get_active(&state.db, id).await?.ok_or(ApiError::NotFound("product"))?;
    if product.is_best_seller {
        return Err(ApiError::Conflict("product is already a best seller".into()));
    }
    let used = repo::products::used_slots(&state.db).await?;
    let slot = best_sellers::lowest_free_slot(&used)
        .ok_or_else(|| ApiError::Conflict("all best-seller slots are filled".into()))?;
    repo::products::pin_best_seller(&state.db, id, slot).await?;
    Ok((StatusCode::CREATED, Json(PinnedResponse { product_id: id, best_seller_order: slot })))
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrderRequest {
    pub order: i32,
}

/// Move a pinned product to a specific slot, swapping with any holder.
pub async fn update_order(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateOrderRequest>,
) -> Result<StatusCode, ApiError> {
    auth.require_admin()?;
    if !(1..=SLOT_COUNT as i32).contains(&req.order) {
        return Err(ApiError::Validation(format!(
            "best-seller order must be between 1 and {SLOT_COUNT}"
        )));
    }
    repo::products::set_best_seller_order(&state.db, id, req.order).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    auth.require_admin()?;
    if !repo::products::clear_best_seller(&state.db, id).await? {
        return Err(ApiError::NotFound("best seller"));
    }
    Ok(StatusCode::NO_CONTENT)
}
