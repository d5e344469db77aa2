//! Order handlers
//!
//! Creation validates every line against the live catalog and snapshots
//! name and unit price, but reserves nothing: stock moves exactly once, at
//! the paid transition, whichever flow triggers it.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::types::Json as Jsonb;
use uuid::Uuid;
use validator::Validate;

use std::collections::HashMap;

use super::{ListParams, PaginatedResponse};
use crate::auth::AuthUser;
use crate::domain::cart::{Cart, CartItem};
use crate::domain::catalog::{ConditionCode, Selection, StockError, Storage};
use crate::domain::product::Product;
use crate::domain::events::OrderEvent;
use crate::domain::order::{self, Address, Order, OrderError, OrderItem, OrderStatus, PaymentStatus};
use crate::error::ApiError;
use crate::repo;
use crate::state::AppState;

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRequest {
    pub product_id: Uuid,
    pub quantity: i64,
    pub storage: Option<Storage>,
    pub condition: Option<ConditionCode>,
    pub color: Option<String>,
}

impl OrderItemRequest {
    fn selection(&self) -> Selection {
        Selection { storage: self.storage, condition: self.condition, color: self.color.clone() }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, message = "order has no items"))]
    pub items: Vec<OrderItemRequest>,
    pub shipping_address: Address,
    #[validate(length(min = 1, message = "payment method is required"))]
    pub payment_method: String,
}

fn check_address(address: &Address) -> Result<(), ApiError> {
    if address.full_name.trim().is_empty()
        || address.street.trim().is_empty()
        || address.city.trim().is_empty()
        || address.postal_code.trim().is_empty()
        || address.country.trim().is_empty()
    {
        return Err(ApiError::Validation("shipping address is incomplete".into()));
    }
    Ok(())
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    req.validate().map_err(|e| ApiError::Validation(e.to_string()))?;
    check_address(&req.shipping_address)?;

    // Quote every line and fold it into a cart, so repeats of the same
    // configuration become one line whose combined quantity is checked
    // against stock below.
    let mut cart = Cart::new();
    let mut products: HashMap<Uuid, Product> = HashMap::new();
    for line in &req.items {
        if line.quantity < 1 {
            return Err(ApiError::Validation("quantity must be at least 1".into()));
        }
        if !products.contains_key(&line.product_id) {
            let product = repo::products::get_active(&state.db, line.product_id)
                .await?
                .ok_or(ApiError::NotFound("product"))?;
            products.insert(line.product_id, product);
        }
        let product = &products[&line.product_id];
        let selection = line.selection();
        let quote = product.catalog().resolve(&selection)?;
        cart.add_item(CartItem {
            product_id: product.id,
            selection,
            quantity: line.quantity,
            unit_price: quote.unit_price,
        });
    }

    // Validate every merged line before committing anything: one bad line
    // rejects the whole order.
    let mut items = Vec::with_capacity(cart.item_count());
    for line in cart.items() {
        let product = &products[&line.product_id];
        // the dry-run decrement also enforces that variant purchases name a
        // concrete color and checks that color's own stock
        match product.catalog().decrease(&line.selection, line.quantity) {
            Ok(_) => {}
            Err(StockError::Insufficient) => {
                return Err(ApiError::Conflict(format!("insufficient stock for {}", product.name)));
            }
            Err(StockError::Catalog(e)) => return Err(e.into()),
        }
        items.push(OrderItem {
            product: line.product_id,
            name: product.name.clone(),
            quantity: line.quantity,
            price: line.unit_price,
            storage: line.selection.storage,
            condition: line.selection.condition,
            color: line.selection.color.clone(),
        });
    }

    let items_price = order::round_cents(items.iter().map(OrderItem::line_total).sum());
    let shipping_price = state.config.shipping_price;
    let tax_price = order::round_cents(items_price * state.config.tax_rate);
    let total_amount = order::round_cents(items_price + shipping_price + tax_price);
    order::verify_total(&items, shipping_price, tax_price, total_amount)?;

    let now = Utc::now();
    let new_order = Order {
        id: Uuid::now_v7(),
        order_number: format!("ORD-{:08}", rand::random::<u32>()),
        user_id: auth.user_id,
        items: Jsonb(items),
        shipping_address: Jsonb(req.shipping_address),
        payment_method: req.payment_method,
        items_price,
        shipping_price,
        tax_price,
        total_amount,
        status: OrderStatus::Pending,
        payment_status: PaymentStatus::Pending,
        is_paid: false,
        paid_at: None,
        is_delivered: false,
        delivered_at: None,
        payment_session_id: None,
        created_at: now,
        updated_at: now,
    };
    repo::orders::insert(&state.db, &new_order).await?;
    state
        .publish(&OrderEvent::Created {
            order_id: new_order.id,
            user_id: new_order.user_id,
            total_amount,
        })
        .await;
    Ok((StatusCode::CREATED, Json(new_order)))
}

pub async fn get(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, ApiError> {
    let order = repo::orders::get(&state.db, id).await?.ok_or(ApiError::NotFound("order"))?;
    if !auth.can_access(order.user_id) {
        return Err(ApiError::Forbidden);
    }
    Ok(Json(order))
}

pub async fn list_mine(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<ListParams>,
) -> Result<Json<PaginatedResponse<Order>>, ApiError> {
    let (page, per_page) = (params.page(), params.per_page());
    let (orders, total) =
        repo::orders::list_for_user(&state.db, auth.user_id, page, per_page).await?;
    Ok(Json(PaginatedResponse { data: orders, total, page }))
}

pub async fn list_all(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<ListParams>,
) -> Result<Json<PaginatedResponse<Order>>, ApiError> {
    auth.require_admin()?;
    let (page, per_page) = (params.page(), params.per_page());
    let (orders, total) = repo::orders::list_all(&state.db, page, per_page).await?;
    Ok(Json(PaginatedResponse { data: orders, total, page }))
}

pub async fn remove(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let order = repo::orders::get(&state.db, id).await?.ok_or(ApiError::NotFound("order"))?;
    if !auth.can_access(order.user_id) {
        return Err(ApiError::Forbidden);
    }
    if !order.is_deletable() {
        return Err(ApiError::Conflict("only pending unpaid orders can be deleted".into()));
    }
    // re-checked in the delete predicate in case the order got paid since
    if !repo::orders::delete_pending(&state.db, id).await? {
        return Err(ApiError::Conflict("order is no longer deletable".into()));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn deliver(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, ApiError> {
    auth.require_admin()?;
    match repo::orders::mark_delivered(&state.db, id).await? {
        Some(order) => Ok(Json(order)),
        None => {
            let order =
                repo::orders::get(&state.db, id).await?.ok_or(ApiError::NotFound("order"))?;
            if !order.is_paid {
                Err(OrderError::NotPaid.into())
            } else {
                Err(ApiError::Conflict("order is already delivered".into()))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

pub async fn update_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<Order>, ApiError> {
    auth.require_admin()?;
    let order = repo::orders::get(&state.db, id).await?.ok_or(ApiError::NotFound("order"))?;
    if !order.status.can_transition_to(req.status) {
        return Err(OrderError::InvalidTransition { from: order.status, to: req.status }.into());
    }
    match req.status {
        // manual settlement (e.g. a bank transfer) uses the same idempotent
        // paid path as the gateway, so stock moves exactly once
        OrderStatus::Paid => {
            let order = super::payments::confirm_paid(&state, id, None).await?;
            Ok(Json(order))
        }
        OrderStatus::Delivered => {
            let order = repo::orders::mark_delivered(&state.db, id)
                .await?
                .ok_or_else(|| ApiError::Conflict("order cannot be delivered".into()))?;
            Ok(Json(order))
        }
        OrderStatus::Cancelled => {
            repo::orders::set_status(&state.db, id, req.status).await?;
            state.publish(&OrderEvent::Cancelled { order_id: id }).await;
            let order =
                repo::orders::get(&state.db, id).await?.ok_or(ApiError::NotFound("order"))?;
            Ok(Json(order))
        }
        _ => {
            repo::orders::set_status(&state.db, id, req.status).await?;
            let order =
                repo::orders::get(&state.db, id).await?.ok_or(ApiError::NotFound("order"))?;
            Ok(Json(order))
        }
    }
}
