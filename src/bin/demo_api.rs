//! x402kit demo API
//!
//! Serves a free `/` route and a paid `/data` route behind the paywall.
//!
//! ## Environment variables
//!
//! - `BIND_ADDRESS` - Server bind address (default: 0.0.0.0:3000)
//! - `X402_PRICES` - Route prices (default: `/data=0.01 STX`)
//! - `X402_PAY_TO` - Recipient address (default: an example testnet address)
//! - `X402_NETWORK` - `mainnet` or `testnet` (default: testnet)
//! - `X402_FACILITATOR_URL` - Facilitator base URL
//! - `X402_CHALLENGE_TTL_SECS`, `X402_VERIFY_TIMEOUT_MS` - Paywall timing

use axum::{response::Json, routing::get, Router};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use x402kit::middleware::{payment_middleware, Paywall, PaywallConfig};
use x402kit::server::{serve_with_shutdown, shutdown_signal, ServerConfig};

const DEFAULT_PRICES: &str = "/data=0.01 STX";
const EXAMPLE_PAY_TO: &str = "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM";

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = PaywallConfig::from_lookup(|key| {
        std::env::var(key).ok().or_else(|| match key {
            "X402_PRICES" => Some(DEFAULT_PRICES.to_string()),
            "X402_PAY_TO" => Some(EXAMPLE_PAY_TO.to_string()),
            _ => None,
        })
    })?;

    for entry in config.prices.entries() {
        tracing::info!(route = %entry.pattern, price = %entry.price, "priced route");
    }

    let paywall = Paywall::new(config)?;
    let sweeper = paywall.spawn_sweeper();

    let app = Router::new()
        .route("/data", get(data_handler))
        .route("/", get(root_handler))
        .layer(axum::middleware::from_fn_with_state(
            paywall,
            payment_middleware,
        ))
        .layer(TraceLayer::new_for_http());

    serve_with_shutdown(app, ServerConfig::from_env(), shutdown_signal()).await?;

    sweeper.shutdown().await;
    Ok(())
}

async fn data_handler() -> Json<Value> {
    Json(json!({ "message": "This is paid data!" }))
}

async fn root_handler() -> &'static str {
    "Welcome to your x402kit API!"
}
