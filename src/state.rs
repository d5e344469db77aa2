//! Shared application state

use std::sync::Arc;

use crate::config::Config;
use crate::domain::events::OrderEvent;
use crate::gateway::PaymentGateway;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub nats: Option<async_nats::Client>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Best-effort event publication; the order flow never fails because
    /// the bus is down.
    pub async fn publish(&self, event: &OrderEvent) {
        let Some(nats) = &self.nats else { return };
        let payload = match serde_json::to_vec(event) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize order event");
                return;
            }
        };
        if let Err(e) = nats.publish(event.subject().to_string(), payload.into()).await {
            tracing::warn!(error = %e, subject = event.subject(), "failed to publish order event");
        }
    }
}
