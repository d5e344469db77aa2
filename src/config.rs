//! Environment configuration, read once at startup

use anyhow::Context;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub nats_url: Option<String>,
    /// Flat shipping rate applied to every order, in the currency unit.
    pub shipping_price: f64,
    /// Tax rate applied to the item subtotal (e.g. 0.2 for 20%).
    pub tax_rate: f64,
    pub checkout_success_url: String,
    pub checkout_cancel_url: String,
    pub webhook_secret: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: std::env::var("DATABASE_URL").context("DATABASE_URL is required")?,
            port: std::env::var("PORT").unwrap_or_else(|_| "8083".into()).parse()?,
            nats_url: std::env::var("NATS_URL").ok(),
            shipping_price: parse_or("SHIPPING_PRICE", 4.99)?,
            tax_rate: parse_or("TAX_RATE", 0.0)?,
            checkout_success_url: std::env::var("CHECKOUT_SUCCESS_URL")
                .unwrap_or_else(|_| "http://localhost:3000/checkout/success".into()),
            checkout_cancel_url: std::env::var("CHECKOUT_CANCEL_URL")
                .unwrap_or_else(|_| "http://localhost:3000/checkout/cancel".into()),
            webhook_secret: std::env::var("WEBHOOK_SECRET").unwrap_or_default(),
        })
    }
}

fn parse_or(key: &str, default: f64) -> anyhow::Result<f64> {
    match std::env::var(key) {
        Ok(raw) => raw.parse().with_context(|| format!("{key} must be a number")),
        Err(_) => Ok(default),
    }
}
