//! Payment-related types

use super::constants::headers;
use super::network::Network;
use super::price::Currency;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

/// x402 protocol version
pub const X402_VERSION: u32 = 1;

/// Structured payment challenge sent with a 402 response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentChallenge {
    /// Protocol version identifier
    #[serde(rename = "x402Version", default = "default_version")]
    pub x402_version: u32,
    /// Required amount in the smallest unit of `currency`
    pub amount: u64,
    /// Currency of the amount
    pub currency: Currency,
    /// Recipient address for the payment
    #[serde(rename = "payTo")]
    pub pay_to: String,
    /// Network the payment must settle on
    pub network: Network,
    /// Facilitator that will verify the proof
    #[serde(rename = "facilitatorUrl")]
    pub facilitator_url: String,
    /// Single-use token the proof must echo
    pub nonce: String,
    /// Route pattern the challenge was issued for
    pub resource: String,
    /// Unix timestamp after which the challenge is no longer honoured
    #[serde(rename = "expiresAt")]
    pub expires_at: i64,
}

fn default_version() -> u32 {
    X402_VERSION
}

impl PaymentChallenge {
    /// Check whether the challenge has passed its expiry
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.expires_at
    }

    /// Render the challenge as `X-Payment-*` header pairs
    pub fn header_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            (headers::PAYMENT_AMOUNT, self.amount.to_string()),
            (headers::PAYMENT_CURRENCY, self.currency.code().to_string()),
            (headers::PAYMENT_PAY_TO, self.pay_to.clone()),
            (headers::PAYMENT_NETWORK, self.network.as_str().to_string()),
            (headers::PAYMENT_FACILITATOR, self.facilitator_url.clone()),
            (headers::PAYMENT_NONCE, self.nonce.clone()),
            (headers::PAYMENT_RESOURCE, self.resource.clone()),
            (headers::PAYMENT_EXPIRES_AT, self.expires_at.to_string()),
        ]
    }

    /// Rebuild a challenge from `X-Payment-*` headers.
    ///
    /// Used by clients behind proxies that strip 402 bodies.
    pub fn from_headers(headers_map: &http::HeaderMap) -> crate::Result<Self> {
        let field = |name: &str| -> crate::Result<String> {
            headers_map
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| {
                    crate::X402Error::malformed_challenge(format!("missing header {}", name))
                })
        };

        let amount = field(headers::PAYMENT_AMOUNT)?.parse::<u64>().map_err(|_| {
            crate::X402Error::malformed_challenge("payment amount is not an integer")
        })?;
        let currency = field(headers::PAYMENT_CURRENCY)?
            .parse::<Currency>()
            .map_err(|_| crate::X402Error::malformed_challenge("unknown currency"))?;
        let network = field(headers::PAYMENT_NETWORK)?
            .parse::<Network>()
            .map_err(|_| crate::X402Error::malformed_challenge("unknown network"))?;
        let expires_at = field(headers::PAYMENT_EXPIRES_AT)?
            .parse::<i64>()
            .map_err(|_| crate::X402Error::malformed_challenge("expiry is not a timestamp"))?;

        let challenge = Self {
            x402_version: X402_VERSION,
            amount,
            currency,
            pay_to: field(headers::PAYMENT_PAY_TO)?,
            network,
            facilitator_url: field(headers::PAYMENT_FACILITATOR)?,
            nonce: field(headers::PAYMENT_NONCE)?,
            resource: field(headers::PAYMENT_RESOURCE)?,
            expires_at,
        };
        challenge.validate()?;
        Ok(challenge)
    }

    /// Check that the fields a client needs in order to pay are present
    pub fn validate(&self) -> crate::Result<()> {
        if self.pay_to.trim().is_empty() {
            return Err(crate::X402Error::malformed_challenge("payTo is empty"));
        }
        if self.nonce.trim().is_empty() {
            return Err(crate::X402Error::malformed_challenge("nonce is empty"));
        }
        if self.facilitator_url.trim().is_empty() {
            return Err(crate::X402Error::malformed_challenge(
                "facilitatorUrl is empty",
            ));
        }
        Ok(())
    }
}

/// Proof of payment produced by a wallet for one challenge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentProof {
    /// Nonce of the challenge being answered
    pub nonce: String,
    /// Opaque signature verifiable by the facilitator
    pub signature: String,
    /// Amount paid in smallest units
    pub amount: u64,
    /// On-chain transaction reference, if the wallet already broadcast one
    #[serde(rename = "transactionRef", skip_serializing_if = "Option::is_none")]
    pub transaction_ref: Option<String>,
    /// Payer address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
}

impl PaymentProof {
    /// Create a new proof
    pub fn new(nonce: impl Into<String>, signature: impl Into<String>, amount: u64) -> Self {
        Self {
            nonce: nonce.into(),
            signature: signature.into(),
            amount,
            transaction_ref: None,
            payer: None,
        }
    }

    /// Set the transaction reference
    pub fn with_transaction_ref(mut self, transaction_ref: impl Into<String>) -> Self {
        self.transaction_ref = Some(transaction_ref.into());
        self
    }

    /// Set the payer address
    pub fn with_payer(mut self, payer: impl Into<String>) -> Self {
        self.payer = Some(payer.into());
        self
    }

    /// Decode a base64-encoded proof from the `X-Payment-Proof` header
    pub fn from_base64(encoded: &str) -> crate::Result<Self> {
        use base64::{engine::general_purpose, Engine as _};
        let decoded = general_purpose::STANDARD.decode(encoded.trim())?;
        let proof: PaymentProof = serde_json::from_slice(&decoded)?;
        Ok(proof)
    }

    /// Encode the proof to base64 for the `X-Payment-Proof` header
    pub fn to_base64(&self) -> crate::Result<String> {
        use base64::{engine::general_purpose, Engine as _};
        let json = serde_json::to_string(self)?;
        Ok(general_purpose::STANDARD.encode(json))
    }
}

/// Machine-readable reason attached to every paywall rejection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// No proof was attached
    PaymentRequired,
    /// The proof header could not be decoded
    MalformedProof,
    /// The nonce was never issued by this server (or already evicted)
    UnknownNonce,
    /// The nonce was already spent
    NonceAlreadyUsed,
    /// The challenge expired before the proof arrived
    NonceExpired,
    /// The nonce was issued for a different route
    RouteMismatch,
    /// The proof pays less than the route requires
    InsufficientAmount,
    /// The facilitator rejected the proof
    FacilitatorRejected,
    /// The facilitator could not be consulted
    VerificationUnavailable,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PaymentRequired => "payment_required",
            Self::MalformedProof => "malformed_proof",
            Self::UnknownNonce => "unknown_nonce",
            Self::NonceAlreadyUsed => "nonce_already_used",
            Self::NonceExpired => "nonce_expired",
            Self::RouteMismatch => "route_mismatch",
            Self::InsufficientAmount => "insufficient_amount",
            Self::FacilitatorRejected => "facilitator_rejected",
            Self::VerificationUnavailable => "verification_unavailable",
        }
    }

    /// Error kind of the rejection: `payment_required` when no proof was
    /// attached, `verification_unavailable` when no verdict could be reached,
    /// `invalid_proof` otherwise
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PaymentRequired => "payment_required",
            Self::VerificationUnavailable => "verification_unavailable",
            _ => "invalid_proof",
        }
    }

    /// Human-readable description used in response bodies
    pub fn description(&self) -> &'static str {
        match self {
            Self::PaymentRequired => "X-Payment-Proof header is required",
            Self::MalformedProof => "Payment proof could not be decoded",
            Self::UnknownNonce => "Payment proof answers an unknown challenge",
            Self::NonceAlreadyUsed => "Payment proof was already used",
            Self::NonceExpired => "Payment challenge expired",
            Self::RouteMismatch => "Payment proof was issued for a different resource",
            Self::InsufficientAmount => "Payment amount is below the required price",
            Self::FacilitatorRejected => "Payment verification failed",
            Self::VerificationUnavailable => "Payment verification is temporarily unavailable",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of a paywall rejection (HTTP 402 or 503)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequiredResponse {
    /// Protocol version
    #[serde(rename = "x402Version")]
    pub x402_version: u32,
    /// Human-readable error message
    pub error: String,
    /// Error kind (`payment_required`, `invalid_proof` or
    /// `verification_unavailable`)
    #[serde(default)]
    pub kind: String,
    /// Machine-readable rejection reason
    pub reason: RejectReason,
    /// Fresh challenge to pay, absent when verification is unavailable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub challenge: Option<PaymentChallenge>,
}

impl PaymentRequiredResponse {
    /// Create a new rejection body
    pub fn new(reason: RejectReason, challenge: Option<PaymentChallenge>) -> Self {
        Self {
            x402_version: X402_VERSION,
            error: reason.description().to_string(),
            kind: reason.kind().to_string(),
            reason,
            challenge,
        }
    }
}
