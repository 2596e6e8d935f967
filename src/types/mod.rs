//! Core types for the x402 pay-and-retry protocol
//!
//! This module defines the data structures shared by the paywall and the paying
//! client: prices and the route price table, the challenge a server issues, the
//! proof a wallet returns, and the facilitator wire types.
//!
//! # Architecture
//!
//! - [`network`] - Stacks network selector
//! - [`price`] - Currency, price parsing and the route [`PriceTable`]
//! - [`payment`] - [`PaymentChallenge`], [`PaymentProof`] and rejection bodies
//! - [`facilitator`] - Facilitator configuration and verify request/response
//! - [`constants`] - Network identifiers and wire header names
//!
//! # Examples
//!
//! ## Building a price table
//!
//! ```
//! use x402kit::types::PriceTable;
//!
//! # fn example() -> x402kit::Result<()> {
//! let prices = PriceTable::from_prices([("/data", "0.01 STX"), ("/files/*", "0.5 STX")])?;
//!
//! let entry = prices.lookup("/data").expect("priced");
//! assert_eq!(entry.price.amount, 10_000); // micro-STX
//! assert!(prices.lookup("/").is_none()); // free
//! # Ok(())
//! # }
//! ```
//!
//! ## Encoding a proof for the retry
//!
//! ```
//! use x402kit::types::PaymentProof;
//!
//! # fn example() -> x402kit::Result<()> {
//! let proof = PaymentProof::new("5f1c...", "0xsignature", 10_000)
//!     .with_payer("ST2CY5V39NHDPWSXMW9QDT3HC3GD6Q6XX4CFRK9AG");
//!
//! // Value of the X-Payment-Proof header
//! let header = proof.to_base64()?;
//! # Ok(())
//! # }
//! ```

pub mod constants;
pub mod facilitator;
pub mod network;
pub mod payment;
pub mod price;

// Re-export commonly used types
pub use constants::{headers, networks};
pub use facilitator::{
    AuthHeadersFn, AuthHeadersFnArc, AuthHeadersFnBox, FacilitatorConfig, VerifyRequest,
    VerifyResponse, DEFAULT_FACILITATOR_TIMEOUT, DEFAULT_FACILITATOR_URL,
};
pub use network::Network;
pub use payment::{
    PaymentChallenge, PaymentProof, PaymentRequiredResponse, RejectReason, X402_VERSION,
};
pub use price::{Currency, Price, PriceEntry, PriceTable};
