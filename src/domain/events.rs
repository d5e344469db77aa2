//! Domain events published to the message bus

use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Created { order_id: Uuid, user_id: Uuid, total_amount: f64 },
    Paid { order_id: Uuid, total_amount: f64 },
    Cancelled { order_id: Uuid },
}

impl OrderEvent {
    pub fn subject(&self) -> &'static str {
        match self {
            Self::Created { .. } => "orders.created",
            Self::Paid { .. } => "orders.paid",
            Self::Cancelled { .. } => "orders.cancelled",
        }
    }
}
