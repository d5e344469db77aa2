//! Phoneshop - storefront backend for a phone-resale business
//!
//! ## Features
//! - Nested variant catalog (storage x condition x color) with two legacy
//!   pricing shapes kept readable behind one resolution algorithm
//! - Race-free stock mutation via conditional database updates
//! - Order lifecycle with snapshot pricing and a checked total invariant
//! - Idempotent payment confirmation shared by polling and webhook
//! - Hybrid manual/automatic best-seller ranking

pub mod api;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod repo;
pub mod state;

pub use config::Config;
pub use error::ApiError;
pub use state::AppState;
