//! Error types for x402kit
//!
//! [`X402Error`] carries the payment taxonomy shared by the paywall and the
//! paying client, plus the infrastructure failures (configuration, transport,
//! encoding) that can occur around it.

use crate::types::RejectReason;
use thiserror::Error;

/// Result type alias for x402kit operations
pub type Result<T> = std::result::Result<T, X402Error>;

/// Errors produced by x402kit
#[derive(Debug, Error)]
pub enum X402Error {
    /// A challenge was issued; payment is required before access
    #[error("Payment required: {amount} to {pay_to}")]
    PaymentRequired { amount: u64, pay_to: String },

    /// A proof was presented but did not pass verification
    #[error("Invalid payment proof: {reason}")]
    InvalidProof { reason: RejectReason },

    /// The facilitator could not be reached or did not answer in time
    #[error("Payment verification unavailable: {message}")]
    VerificationUnavailable { message: String },

    /// The 402 response did not carry a usable challenge
    #[error("Malformed payment challenge: {message}")]
    MalformedChallenge { message: String },

    /// The wallet refused or failed to produce a proof
    #[error("Payment failed: {message}")]
    PaymentFailed { message: String },

    /// The request was rejected again after the single paid retry
    #[error("Request rejected after payment retry (status {status}): {reason}")]
    RetryExhausted { status: u16, reason: String },

    /// Invalid price configuration
    #[error("Invalid price '{price}': {message}")]
    InvalidPrice { price: String, message: String },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Nonce storage failure
    #[error("Nonce storage error: {message}")]
    Storage { message: String },

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Base64 decoding error
    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
}

impl X402Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn invalid_price(price: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidPrice {
            price: price.into(),
            message: message.into(),
        }
    }

    pub fn invalid_proof(reason: RejectReason) -> Self {
        Self::InvalidProof { reason }
    }

    pub fn verification_unavailable(message: impl Into<String>) -> Self {
        Self::VerificationUnavailable {
            message: message.into(),
        }
    }

    pub fn malformed_challenge(message: impl Into<String>) -> Self {
        Self::MalformedChallenge {
            message: message.into(),
        }
    }

    pub fn payment_failed(message: impl Into<String>) -> Self {
        Self::PaymentFailed {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Stable, machine-readable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PaymentRequired { .. } => "payment_required",
            Self::InvalidProof { .. } => "invalid_proof",
            Self::VerificationUnavailable { .. } => "verification_unavailable",
            Self::MalformedChallenge { .. } => "malformed_challenge",
            Self::PaymentFailed { .. } => "payment_failed",
            Self::RetryExhausted { .. } => "retry_exhausted",
            Self::InvalidPrice { .. } => "invalid_price",
            Self::Config { .. } => "config",
            Self::Storage { .. } => "storage",
            Self::Transport(_) => "transport",
            Self::Json(_) => "json",
            Self::Base64(_) => "base64",
        }
    }

    /// HTTP status the paywall answers with for this error
    pub fn status_code(&self) -> http::StatusCode {
        match self {
            Self::PaymentRequired { .. } | Self::InvalidProof { .. } => {
                http::StatusCode::PAYMENT_REQUIRED
            }
            Self::VerificationUnavailable { .. } | Self::Storage { .. } => {
                http::StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Json(_) | Self::Base64(_) | Self::MalformedChallenge { .. } => {
                http::StatusCode::BAD_REQUEST
            }
            Self::Transport(_) | Self::RetryExhausted { .. } | Self::PaymentFailed { .. } => {
                http::StatusCode::BAD_GATEWAY
            }
            Self::InvalidPrice { .. } | Self::Config { .. } => {
                http::StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}
