//! Product catalog handlers

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::types::Json as Jsonb;
use uuid::Uuid;
use validator::Validate;

use super::{ListParams, PaginatedResponse};
use crate::auth::AuthUser;
use crate::domain::catalog::{LegacyMap, Quote, Selection, VariantMap};
use crate::domain::product::Product;
use crate::error::ApiError;
use crate::repo;
use crate::state::AppState;

/// Product plus the two storefront display values derived from whichever
/// pricing shape is active.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummary {
    #[serde(flatten)]
    pub product: Product,
    pub lowest_price: f64,
    pub in_stock: bool,
}

impl From<Product> for ProductSummary {
    fn from(product: Product) -> Self {
        let lowest_price = product.lowest_price();
        let in_stock = product.in_stock();
        Self { product, lowest_price, in_stock }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProductPayload {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    pub description: Option<String>,
    pub brand: Option<String>,
    pub image_url: Option<String>,
    #[serde(default)]
    pub variants: VariantMap,
    #[serde(default)]
    pub conditions: LegacyMap,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub stock: i64,
    #[serde(default)]
    pub colors: Vec<String>,
}

impl ProductPayload {
    fn check(&self) -> Result<(), ApiError> {
        self.validate().map_err(|e| ApiError::Validation(e.to_string()))?;
        // variants and legacy conditions are mutually exclusive shapes
        if !self.variants.is_empty() && !self.conditions.is_empty() {
            return Err(ApiError::Validation(
                "a product cannot carry both variants and legacy conditions".into(),
            ));
        }
        if self.price < 0.0 || self.stock < 0 {
            return Err(ApiError::Validation("price and stock cannot be negative".into()));
        }
        Ok(())
    }
}

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<PaginatedResponse<ProductSummary>>, ApiError> {
    let (page, per_page) = (params.page(), params.per_page());
    let (products, total) =
        repo::products::list(&state.db, page, per_page, params.search.as_deref()).await?;
    let data = products.into_iter().map(ProductSummary::from).collect();
    Ok(Json(PaginatedResponse { data, total, page }))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ProductSummary>, ApiError> {
    let product = repo::products::get_active(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("product"))?;
    Ok(Json(product.into()))
}

/// Run the resolution algorithm for a buyer's selection.
pub async fn quote(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(selection): Json<Selection>,
) -> Result<Json<Quote>, ApiError> {
    let product = repo::products::get_active(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("product"))?;
    let quote = product.catalog().resolve(&selection)?;
    Ok(Json(quote))
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<ProductPayload>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    auth.require_admin()?;
    payload.check()?;

    let now = Utc::now();
    let mut product = Product {
        id: Uuid::now_v7(),
        name: payload.name,
        description: payload.description,
        brand: payload.brand,
        image_url: payload.image_url,
        variants: Jsonb(payload.variants),
        conditions: Jsonb(payload.conditions),
        price: payload.price,
        stock: payload.stock,
        colors: payload.colors,
        available_storages: vec![],
        sold_count: 0,
        is_best_seller: false,
        best_seller_order: None,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    product.normalize();
    repo::products::insert(&state.db, &product).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ProductPayload>,
) -> Result<Json<Product>, ApiError> {
    auth.require_admin()?;
    payload.check()?;

    let mut product =
        repo::products::get(&state.db, id).await?.ok_or(ApiError::NotFound("product"))?;
    product.name = payload.name;
    product.description = payload.description;
    product.brand = payload.brand;
    product.image_url = payload.image_url;
    product.variants = Jsonb(payload.variants);
    product.conditions = Jsonb(payload.conditions);
    product.price = payload.price;
    product.stock = payload.stock;
    product.colors = payload.colors;
    product.updated_at = Utc::now();
    product.normalize();

    if !repo::products::update(&state.db, &product).await? {
        return Err(ApiError::NotFound("product"));
    }
    Ok(Json(product))
}

pub async fn remove(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    auth.require_admin()?;
    if !repo::products::soft_delete(&state.db, id).await? {
        return Err(ApiError::NotFound("product"));
    }
    Ok(StatusCode::NO_CONTENT)
}
