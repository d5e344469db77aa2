//! Phoneshop - storefront service for a phone-resale business

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use phoneshop::gateway::SandboxGateway;
use phoneshop::{api, AppState, Config};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let db = PgPoolOptions::new().max_connections(10).connect(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&db).await?;

    let nats = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::warn!(error = %e, "NATS unavailable, events disabled");
                None
            }
        },
        None => None,
    };

    let gateway = Arc::new(SandboxGateway::new(config.webhook_secret.clone()));
    let port = config.port;
    let state = AppState { db, nats, gateway, config: Arc::new(config) };
    let app = api::router(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!("phoneshop listening on {addr}");
    axum::serve(tokio::net::TcpListener::bind(&addr).await?, app).await?;
    Ok(())
}
