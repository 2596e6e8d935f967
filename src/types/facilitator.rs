//! Facilitator configuration and wire types

use super::payment::{PaymentChallenge, PaymentProof, X402_VERSION};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Default facilitator URL (a locally running facilitator)
pub const DEFAULT_FACILITATOR_URL: &str = "http://127.0.0.1:4021";

/// Default timeout for a single verify call
pub const DEFAULT_FACILITATOR_TIMEOUT: Duration = Duration::from_secs(10);

/// Type alias for authentication headers function
pub type AuthHeadersFn = dyn Fn() -> crate::Result<HashMap<String, String>> + Send + Sync;

/// Type alias for authentication headers function wrapped in Arc
pub type AuthHeadersFnArc = Arc<AuthHeadersFn>;

/// Type alias for authentication headers function wrapped in Box
pub type AuthHeadersFnBox = Box<AuthHeadersFn>;

/// Facilitator configuration
#[derive(Clone)]
pub struct FacilitatorConfig {
    /// Base URL of the facilitator service
    pub url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Function to create authentication headers for each verify call
    pub create_auth_headers: Option<AuthHeadersFnArc>,
}

impl std::fmt::Debug for FacilitatorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FacilitatorConfig")
            .field("url", &self.url)
            .field("timeout", &self.timeout)
            .field("create_auth_headers", &"<function>")
            .finish()
    }
}

impl FacilitatorConfig {
    /// Create a new facilitator config
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            timeout: DEFAULT_FACILITATOR_TIMEOUT,
            create_auth_headers: None,
        }
    }

    /// Validate the facilitator configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.url.is_empty() {
            return Err(crate::X402Error::config("Facilitator URL cannot be empty"));
        }

        let parsed = url::Url::parse(&self.url).map_err(|e| {
            crate::X402Error::config(format!("Invalid facilitator URL '{}': {}", self.url, e))
        })?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(crate::X402Error::config(
                "Facilitator URL must start with http:// or https://",
            ));
        }

        if self.timeout.is_zero() {
            return Err(crate::X402Error::config(
                "Facilitator timeout must be greater than zero",
            ));
        }

        Ok(())
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the auth headers creator
    pub fn with_auth_headers(mut self, creator: AuthHeadersFnBox) -> Self {
        self.create_auth_headers = Some(Arc::from(creator));
        self
    }
}

impl Default for FacilitatorConfig {
    fn default() -> Self {
        Self::new(DEFAULT_FACILITATOR_URL)
    }
}

/// Body of a facilitator verify call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyRequest {
    #[serde(rename = "x402Version")]
    pub x402_version: u32,
    #[serde(rename = "paymentProof")]
    pub payment_proof: PaymentProof,
    #[serde(rename = "paymentChallenge")]
    pub payment_challenge: PaymentChallenge,
}

impl VerifyRequest {
    pub fn new(proof: &PaymentProof, challenge: &PaymentChallenge) -> Self {
        Self {
            x402_version: X402_VERSION,
            payment_proof: proof.clone(),
            payment_challenge: challenge.clone(),
        }
    }
}

/// Payment verification response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResponse {
    /// Whether the payment is valid
    #[serde(rename = "isValid")]
    pub is_valid: bool,
    /// Reason for invalidity (if applicable)
    #[serde(rename = "invalidReason", skip_serializing_if = "Option::is_none")]
    pub invalid_reason: Option<String>,
    /// Payer's address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
}

impl VerifyResponse {
    /// A positive verification result
    pub fn valid(payer: Option<String>) -> Self {
        Self {
            is_valid: true,
            invalid_reason: None,
            payer,
        }
    }

    /// A negative verification result
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            invalid_reason: Some(reason.into()),
            payer: None,
        }
    }
}
