//! Checkout sessions and payment confirmation
//!
//! Confirmation arrives twice for most orders: once from the client polling
//! the session and once from the gateway webhook. Both paths funnel into
//! [`confirm_paid`], whose first step is a conditional paid-flip in the
//! database; only the winner decrements stock, so a double delivery can
//! never double-sell.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use sqlx::types::Json as Jsonb;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::domain::events::OrderEvent;
use crate::domain::order::{Address, Order, OrderStatus};
use crate::error::ApiError;
use crate::gateway::{
    CheckoutSession, CreateSessionRequest, GatewayError, SessionLineItem, SessionPaymentStatus,
    WebhookEvent,
};
use crate::repo;
use crate::state::AppState;

pub const SIGNATURE_HEADER: &str = "x-gateway-signature";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionPayload {
    pub order_id: Uuid,
}

pub async fn create_session(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<CreateSessionPayload>,
) -> Result<Json<CheckoutSession>, ApiError> {
    let order =
        repo::orders::get(&state.db, payload.order_id).await?.ok_or(ApiError::NotFound("order"))?;
    if !auth.can_access(order.user_id) {
        return Err(ApiError::Forbidden);
    }
    if order.is_paid {
        return Err(ApiError::Conflict("order is already paid".into()));
    }

    let mut line_items: Vec<SessionLineItem> = order
        .items
        .0
        .iter()
        .map(|item| SessionLineItem {
            name: item.name.clone(),
            unit_amount: item.price,
            quantity: item.quantity,
        })
        .collect();
    if order.shipping_price > 0.0 {
        line_items.push(SessionLineItem {
            name: "Shipping".into(),
            unit_amount: order.shipping_price,
            quantity: 1,
        });
    }
    if order.tax_price > 0.0 {
        line_items.push(SessionLineItem {
            name: "Tax".into(),
            unit_amount: order.tax_price,
            quantity: 1,
        });
    }

    let session = state
        .gateway
        .create_session(CreateSessionRequest {
            order_id: order.id,
            line_items,
            success_url: state.config.checkout_success_url.clone(),
            cancel_url: state.config.checkout_cancel_url.clone(),
        })
        .await?;
    repo::orders::set_payment_session(&state.db, order.id, &session.id).await?;
    Ok(Json(session))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmResponse {
    pub order_id: Uuid,
    pub status: OrderStatus,
    pub paid: bool,
}

/// Client-side polling endpoint: read the session back from the gateway
/// and, if it settled, apply the same transition the webhook would.
pub async fn confirm(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(session_id): Path<String>,
) -> Result<Json<ConfirmResponse>, ApiError> {
    let details = state.gateway.retrieve_session(&session_id).await.map_err(|e| match e {
        GatewayError::SessionNotFound => ApiError::NotFound("checkout session"),
        other => other.into(),
    })?;
    let order_id = details
        .order_id
        .ok_or_else(|| ApiError::Gateway("session carries no order reference".into()))?;
    let order = repo::orders::get(&state.db, order_id).await?.ok_or(ApiError::NotFound("order"))?;
    if !auth.can_access(order.user_id) {
        return Err(ApiError::Forbidden);
    }

    if details.payment_status != SessionPaymentStatus::Paid {
        return Ok(Json(ConfirmResponse { order_id, status: order.status, paid: order.is_paid }));
    }
    let order = confirm_paid(&state, order_id, details.shipping_address).await?;
    Ok(Json(ConfirmResponse { order_id, status: order.status, paid: order.is_paid }))
}

/// Gateway webhook. Always acknowledged with 200: the gateway delivers
/// at-least-once and would otherwise hammer the endpoint with redeliveries.
/// Failures are logged for the operator instead.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    let event = match state.gateway.parse_webhook(&body, signature) {
        Ok(event) => event,
        Err(e) => {
            tracing::error!(error = %e, "rejected payment webhook");
            return StatusCode::OK;
        }
    };
    if let WebhookEvent::CheckoutCompleted { order_id, shipping_address, session_id } = event {
        tracing::info!(%order_id, %session_id, "payment webhook received");
        if let Err(e) = confirm_paid(&state, order_id, shipping_address).await {
            tracing::error!(error = %e, %order_id, "failed to apply payment confirmation");
        }
    }
    StatusCode::OK
}

/// Idempotent paid transition shared by every confirmation path.
///
/// The conditional update in [`repo::orders::mark_paid_if_unpaid`] decides
/// a single winner; that caller overwrites the shipping address with the
/// gateway's (when provided) and decrements stock against the *live*
/// catalog. Losers return the already-paid order untouched.
pub(crate) async fn confirm_paid(
    state: &AppState,
    order_id: Uuid,
    gateway_address: Option<Address>,
) -> Result<Order, ApiError> {
    let Some(mut order) = repo::orders::mark_paid_if_unpaid(&state.db, order_id).await? else {
        // already paid, or unknown: a no-op either way
        return repo::orders::get(&state.db, order_id)
            .await?
            .ok_or(ApiError::NotFound("order"));
    };

    if let Some(address) = gateway_address {
        repo::orders::set_shipping_address(&state.db, order_id, &address).await?;
        order.shipping_address = Jsonb(address);
    }

    for item in order.items.0.iter() {
        let taken = repo::products::decrease_stock(
            &state.db,
            item.product,
            &item.selection(),
            item.quantity,
        )
        .await;
        match taken {
            Ok(true) => {}
            // the money already moved; flag the shortfall rather than fail
            Ok(false) => tracing::warn!(
                order = %order_id, product = %item.product,
                "paid order exceeded available stock"
            ),
            Err(e) => tracing::error!(
                order = %order_id, product = %item.product, error = %e,
                "stock decrement failed for paid order"
            ),
        }
    }

    state.publish(&OrderEvent::Paid { order_id, total_amount: order.total_amount }).await;
    Ok(order)
}
