//! Paywall middleware for axum and tower
//!
//! This module puts x402 payment protection in front of priced routes. Routes
//! missing from the [`PriceTable`](crate::types::PriceTable) pass straight
//! through; priced routes need a verified `X-Payment-Proof`.
//!
//! # Architecture
//!
//! - [`config`] - [`PaywallConfig`] builder and environment loading
//! - [`payment`] - [`Paywall`] decision logic and the axum middleware function
//! - [`service`] - Tower layer for stacking the paywall with other middleware
//!
//! # Examples
//!
//! ## Axum integration
//!
//! ```no_run
//! use axum::{routing::get, Router};
//! use x402kit::middleware::{payment_middleware, Paywall, PaywallConfig};
//! use x402kit::types::{Network, PriceTable};
//!
//! # fn example() -> x402kit::Result<()> {
//! let prices = PriceTable::from_prices([("/data", "0.01 STX")])?;
//! let config = PaywallConfig::new(prices, "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM")
//!     .with_network(Network::Testnet)
//!     .with_facilitator_url("http://127.0.0.1:4021");
//! let paywall = Paywall::new(config)?;
//!
//! let app: Router = Router::new()
//!     .route("/data", get(|| async { "paid content" }))
//!     .route("/", get(|| async { "free content" }))
//!     .layer(axum::middleware::from_fn_with_state(
//!         paywall,
//!         payment_middleware,
//!     ));
//! # Ok(())
//! # }
//! ```
//!
//! ## Tower layer
//!
//! ```no_run
//! use axum::{routing::get, Router};
//! use x402kit::middleware::{create_payment_service, Paywall, PaywallConfig};
//!
//! # fn example() -> x402kit::Result<()> {
//! let config = PaywallConfig::from_env()?;
//! let paywall = Paywall::new(config)?;
//!
//! let app: Router = Router::new()
//!     .route("/data", get(|| async { "paid content" }))
//!     .layer(create_payment_service(paywall));
//! # Ok(())
//! # }
//! ```
//!
//! # Payment Flow
//!
//! 1. Priced request without `X-Payment-Proof` → 402 with a fresh challenge
//! 2. Proof attached → nonce claimed, route and amount checked, facilitator verify
//! 3. Verified → handler runs, response carries `X-Payment-Receipt`
//! 4. Rejected → 402 with a new challenge; facilitator unavailable → 503

pub mod config;
pub mod payment;
pub mod service;


// Re-export commonly used types
pub use config::{parse_prices, PaywallConfig, DEFAULT_CHALLENGE_TTL, DEFAULT_SWEEP_INTERVAL};
pub use payment::{
    generate_nonce, payment_middleware, Admission, PaymentOutcome, Paywall, Rejection,
    VerifiedPayment,
};
pub use service::{create_payment_service, PaywallLayer, PaywallService};
