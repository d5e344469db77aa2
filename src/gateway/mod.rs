//! Payment gateway abstraction
//!
//! The storefront only needs three things from a gateway: open a hosted
//! checkout session for an order, read a session back when the client polls,
//! and decode a signed completion webhook. The order id rides in session
//! metadata and is the only correlation key back to our own records.
//!
//! [`SandboxGateway`] is the in-process implementation used for local
//! development and tests; a hosted provider plugs in behind the same trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::order::Address;

#[derive(Clone, Debug)]
pub struct CreateSessionRequest {
    pub order_id: Uuid,
    pub line_items: Vec<SessionLineItem>,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionLineItem {
    pub name: String,
    pub unit_amount: f64,
    pub quantity: i64,
}

/// A freshly opened checkout session: the id we persist and the hosted
/// page the client is redirected to.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPaymentStatus {
    Unpaid,
    Paid,
}

#[derive(Clone, Debug)]
pub struct SessionDetails {
    pub id: String,
    pub payment_status: SessionPaymentStatus,
    pub order_id: Option<Uuid>,
    pub shipping_address: Option<Address>,
}

/// Decoded webhook delivery.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type")]
pub enum WebhookEvent {
    #[serde(rename = "checkout.session.completed")]
    CheckoutCompleted {
        #[serde(rename = "sessionId")]
        session_id: String,
        #[serde(rename = "orderId")]
        order_id: Uuid,
        #[serde(rename = "shippingAddress")]
        shipping_address: Option<Address>,
    },
    #[serde(other)]
    Ignored,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway unavailable: {0}")]
    Unavailable(String),
    #[error("checkout session not found")]
    SessionNotFound,
    #[error("invalid webhook signature")]
    InvalidSignature,
    #[error("malformed webhook payload: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_session(
        &self,
        req: CreateSessionRequest,
    ) -> Result<CheckoutSession, GatewayError>;

    async fn retrieve_session(&self, session_id: &str) -> Result<SessionDetails, GatewayError>;

    /// Verify the delivery signature and decode the event. Callers decide
    /// how to acknowledge; this only validates and parses.
    fn parse_webhook(&self, payload: &[u8], signature: Option<&str>)
        -> Result<WebhookEvent, GatewayError>;
}

/// In-process gateway double. Sessions live in a map; tests (and a local
/// storefront without a provider account) drive completion explicitly via
/// [`SandboxGateway::complete_session`].
pub struct SandboxGateway {
    secret: String,
    sessions: Mutex<HashMap<String, SessionDetails>>,
}

impl SandboxGateway {
    pub fn new(secret: impl Into<String>) -> Self {
        Self { secret: secret.into(), sessions: Mutex::new(HashMap::new()) }
    }

    /// Simulate the shopper finishing the hosted checkout page.
    pub fn complete_session(&self, session_id: &str, shipping_address: Option<Address>) -> bool {
        let mut sessions = self.sessions.lock().expect("sandbox gateway lock poisoned");
        match sessions.get_mut(session_id) {
            Some(session) => {
                session.payment_status = SessionPaymentStatus::Paid;
                session.shipping_address = shipping_address;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl PaymentGateway for SandboxGateway {
    async fn create_session(
        &self,
        req: CreateSessionRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        let id = format!("cs_{}", Uuid::new_v4().simple());
        let session = SessionDetails {
            id: id.clone(),
            payment_status: SessionPaymentStatus::Unpaid,
            order_id: Some(req.order_id),
            shipping_address: None,
        };
        self.sessions
            .lock()
            .expect("sandbox gateway lock poisoned")
            .insert(id.clone(), session);
        Ok(CheckoutSession { url: format!("https://pay.sandbox.local/c/{id}"), id })
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<SessionDetails, GatewayError> {
        self.sessions
            .lock()
            .expect("sandbox gateway lock poisoned")
            .get(session_id)
            .cloned()
            .ok_or(GatewayError::SessionNotFound)
    }

    fn parse_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookEvent, GatewayError> {
        if signature != Some(self.secret.as_str()) {
            return Err(GatewayError::InvalidSignature);
        }
        serde_json::from_slice(payload).map_err(|e| GatewayError::Malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(order_id: Uuid) -> CreateSessionRequest {
        CreateSessionRequest {
            order_id,
            line_items: vec![SessionLineItem { name: "iPhone 13".into(), unit_amount: 300.0, quantity: 2 }],
            success_url: "http://localhost/success".into(),
            cancel_url: "http://localhost/cancel".into(),
        }
    }

    #[tokio::test]
    async fn session_roundtrip_carries_the_order_id() {
        let gateway = SandboxGateway::new("whsec_test");
        let order_id = Uuid::new_v4();

        let session = gateway.create_session(request(order_id)).await.unwrap();
        let details = gateway.retrieve_session(&session.id).await.unwrap();
        assert_eq!(details.order_id, Some(order_id));
        assert_eq!(details.payment_status, SessionPaymentStatus::Unpaid);

        assert!(gateway.complete_session(&session.id, None));
        let details = gateway.retrieve_session(&session.id).await.unwrap();
        assert_eq!(details.payment_status, SessionPaymentStatus::Paid);
    }

    #[tokio::test]
    async fn unknown_session_is_an_error() {
        let gateway = SandboxGateway::new("whsec_test");
        assert!(matches!(
            gateway.retrieve_session("cs_missing").await,
            Err(GatewayError::SessionNotFound)
        ));
    }

    #[test]
    fn webhook_signature_is_checked_before_parsing() {
        let gateway = SandboxGateway::new("whsec_test");
        let body = br#"{"type":"checkout.session.completed","sessionId":"cs_1","orderId":"7f2c8e4e-4a5b-4b6c-8d9e-0f1a2b3c4d5e"}"#;

        assert!(matches!(
            gateway.parse_webhook(body, Some("wrong")),
            Err(GatewayError::InvalidSignature)
        ));
        assert!(matches!(
            gateway.parse_webhook(body, None),
            Err(GatewayError::InvalidSignature)
        ));

        let event = gateway.parse_webhook(body, Some("whsec_test")).unwrap();
        assert!(matches!(event, WebhookEvent::CheckoutCompleted { .. }));
    }

    #[test]
    fn unrecognized_events_are_ignored_not_errors() {
        let gateway = SandboxGateway::new("whsec_test");
        let body = br#"{"type":"charge.refunded"}"#;
        let event = gateway.parse_webhook(body, Some("whsec_test")).unwrap();
        assert!(matches!(event, WebhookEvent::Ignored));
    }
}
