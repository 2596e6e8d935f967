//! # x402kit
//!
//! Pay-per-request HTTP on the Stacks payment rail, using the HTTP 402 status
//! code and a single pay-and-retry round trip.
//!
//! ## Features
//!
//! - 🧱 **Paywall middleware**: axum middleware and a tower layer that price routes
//!   and answer unpaid requests with a 402 challenge
//! - 💸 **Paying client**: a reqwest-based client that pays through a wallet and
//!   retries exactly once
//! - 🔁 **Replay protection**: single-use, TTL-bounded nonces claimed atomically
//! - 🛡️ **Fail closed**: facilitator errors and timeouts never admit a request
//! - 💰 **Facilitator integration**: HTTP verify client with auth header support
//!
//! ## Quick Start
//!
//! ### Protecting routes with the paywall
//!
//! ```rust,no_run
//! use axum::{response::Json, routing::get, Router};
//! use x402kit::middleware::{payment_middleware, Paywall, PaywallConfig};
//! use x402kit::types::PriceTable;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let prices = PriceTable::from_prices([("/data", "0.01 STX")])?;
//!     let config = PaywallConfig::new(prices, "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM");
//!     let paywall = Paywall::new(config)?;
//!     let _sweeper = paywall.spawn_sweeper();
//!
//!     let app = Router::new()
//!         .route("/data", get(data_handler))
//!         .layer(axum::middleware::from_fn_with_state(paywall, payment_middleware));
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//!
//! async fn data_handler() -> Json<serde_json::Value> {
//!     Json(serde_json::json!({ "message": "This is paid data!" }))
//! }
//! ```
//!
//! ## Architecture
//!
//! - **`types`**: Prices, challenges, proofs and facilitator wire types
//! - **`error`**: Error taxonomy shared by server and client
//! - **`nonce_storage`**: Nonce ledger and its background sweeper
//! - **`facilitator`**: Payment verification client
//! - **`wallet`**: Wallet capability used by the paying client
//! - **`client`**: HTTP client with x402 payment support
//! - **`middleware`**: Paywall for axum and tower (feature `axum`)
//! - **`server`**: Serving helpers with graceful shutdown (feature `axum`)
//!
//! ## Optional Features
//!
//! - **`axum`**: Paywall middleware and server helpers (default)

pub mod client;
pub mod error;
pub mod facilitator;
pub mod nonce_storage;
pub mod types;
pub mod wallet;

#[cfg(feature = "axum")]
pub mod middleware;

#[cfg(feature = "axum")]
pub mod server;

// Re-exports for convenience
pub use client::X402Client;
pub use error::{Result, X402Error};
pub use facilitator::{Facilitator, FacilitatorClient};
pub use nonce_storage::{InMemoryNonceStore, NonceStorage};
pub use types::*;
pub use wallet::{SharedWallet, Wallet, WalletError};

#[cfg(feature = "axum")]
pub use middleware::{Paywall, PaywallConfig};

/// Current version of the x402kit library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_constants() {
        assert_eq!(X402_VERSION, 1);
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_demo_price() {
        let prices = PriceTable::from_prices([("/data", "0.01 STX")]).unwrap();
        let entry = prices.lookup("/data").unwrap();
        assert_eq!(entry.price.amount, 10_000);
        assert_eq!(entry.price.currency, Currency::Stx);
    }

    #[test]
    fn test_networks() {
        assert_eq!(networks::MAINNET, "mainnet");
        assert_eq!(networks::TESTNET, "testnet");

        assert!(networks::is_supported("testnet"));
        assert!(networks::is_supported("mainnet"));
        assert!(!networks::is_supported("base-sepolia"));

        assert!(Network::Testnet.accepts_address("ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM"));
        assert!(!Network::Mainnet.accepts_address("ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM"));
    }

    #[test]
    fn test_facilitator_config() {
        let config = FacilitatorConfig {
            url: "https://example.com/facilitator".to_string(),
            timeout: std::time::Duration::from_secs(30),
            create_auth_headers: None,
        };

        assert_eq!(config.url, "https://example.com/facilitator".to_string());
        assert_eq!(config.timeout, std::time::Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }
}
