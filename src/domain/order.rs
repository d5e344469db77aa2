//! Order entity and lifecycle rules
//!
//! Line items snapshot the product name and resolved unit price at creation
//! time; catalog edits never rewrite order history. The declared total must
//! equal the line sum plus shipping and tax within a cent before an order
//! is ever persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use thiserror::Error;
use uuid::Uuid;

use super::catalog::{ConditionCode, Selection, Storage};

/// Declared totals may differ from the recomputed sum by float noise only.
pub const TOTAL_TOLERANCE: f64 = 0.01;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Forward-only lifecycle; `cancelled` is terminal and reachable from
    /// `pending` alone.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Paid) | (Paid, Shipped) | (Shipped, Delivered) | (Pending, Cancelled)
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
}

/// One purchased configuration. `product` references the live catalog;
/// `name` and `price` are frozen copies taken when the order was placed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product: Uuid,
    pub name: String,
    pub quantity: i64,
    pub price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<Storage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<ConditionCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl OrderItem {
    pub fn selection(&self) -> Selection {
        Selection { storage: self.storage, condition: self.condition, color: self.color.clone() }
    }

    pub fn line_total(&self) -> f64 {
        self.price * self.quantity as f64
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub full_name: String,
    pub street: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Uuid,
    pub items: Json<Vec<OrderItem>>,
    pub shipping_address: Json<Address>,
    pub payment_method: String,
    pub items_price: f64,
    pub shipping_price: f64,
    pub tax_price: f64,
    pub total_amount: f64,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub is_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub is_delivered: bool,
    pub delivered_at: Option<DateTime<Utc>>,
    pub payment_session_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Deletion is only allowed before any money has moved.
    pub fn is_deletable(&self) -> bool {
        self.status == OrderStatus::Pending && !self.is_paid
    }
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum OrderError {
    #[error("order has no items")]
    NoItems,
    #[error("declared total {declared} does not match computed total {computed}")]
    TotalMismatch { declared: f64, computed: f64 },
    #[error("order cannot move from {from:?} to {to:?}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    #[error("order is not paid")]
    NotPaid,
}

/// Check the total invariant: `total == sum(price * qty) + shipping + tax`
/// within [`TOTAL_TOLERANCE`].
pub fn verify_total(
    items: &[OrderItem],
    shipping_price: f64,
    tax_price: f64,
    total_amount: f64,
) -> Result<(), OrderError> {
    if items.is_empty() {
        return Err(OrderError::NoItems);
    }
    let computed = items.iter().map(OrderItem::line_total).sum::<f64>() + shipping_price + tax_price;
    if (total_amount - computed).abs() > TOTAL_TOLERANCE {
        return Err(OrderError::TotalMismatch { declared: total_amount, computed });
    }
    Ok(())
}

/// Round a currency amount to cents.
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(price: f64, quantity: i64) -> OrderItem {
        OrderItem {
            product: Uuid::new_v4(),
            name: "iPhone 12".into(),
            quantity,
            price,
            storage: None,
            condition: None,
            color: None,
        }
    }

    #[test]
    fn total_within_a_cent_passes() {
        let items = vec![item(299.99, 2), item(50.0, 1)];
        // 649.98 + 4.99 + 0.0
        verify_total(&items, 4.99, 0.0, 654.97).unwrap();
        verify_total(&items, 4.99, 0.0, 654.975).unwrap();
    }

    #[test]
    fn total_off_by_more_than_a_cent_fails() {
        let items = vec![item(100.0, 1)];
        assert!(matches!(
            verify_total(&items, 0.0, 0.0, 101.0),
            Err(OrderError::TotalMismatch { .. })
        ));
    }

    #[test]
    fn empty_orders_are_rejected() {
        assert_eq!(verify_total(&[], 0.0, 0.0, 0.0), Err(OrderError::NoItems));
    }

    #[test]
    fn lifecycle_is_forward_only() {
        use OrderStatus::*;
        assert!(Pending.can_transition_to(Paid));
        assert!(Paid.can_transition_to(Shipped));
        assert!(Shipped.can_transition_to(Delivered));
        assert!(Pending.can_transition_to(Cancelled));

        assert!(!Paid.can_transition_to(Pending));
        assert!(!Paid.can_transition_to(Cancelled));
        assert!(!Pending.can_transition_to(Delivered));
        assert!(!Delivered.can_transition_to(Shipped));
        assert!(!Cancelled.can_transition_to(Paid));
    }

    #[test]
    fn rounding_keeps_two_decimals() {
        assert_eq!(round_cents(19.999), 20.0);
        assert_eq!(round_cents(0.125), 0.13);
    }
}
