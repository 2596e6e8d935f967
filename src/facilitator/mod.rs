//! Facilitator client for payment verification
//!
//! A facilitator is the third-party service that confirms a [`PaymentProof`]
//! actually pays the [`PaymentChallenge`] it answers. The paywall only admits a
//! request after a positive verify call.
//!
//! # Architecture
//!
//! - [`Facilitator`] - Verification seam used by the paywall
//! - [`FacilitatorClient`] - HTTP implementation posting to `{url}/verify`
//!
//! Any failure to obtain an answer (connect error, timeout, non-2xx status,
//! unreadable body) is reported as [`X402Error::VerificationUnavailable`] so
//! callers can fail closed.
//!
//! # Examples
//!
//! ```no_run
//! use x402kit::facilitator::{Facilitator, FacilitatorClient};
//! use x402kit::types::{FacilitatorConfig, PaymentChallenge, PaymentProof};
//! use std::time::Duration;
//!
//! # async fn example(proof: PaymentProof, challenge: PaymentChallenge) -> x402kit::Result<()> {
//! let config = FacilitatorConfig::new("http://127.0.0.1:4021")
//!     .with_timeout(Duration::from_secs(5));
//! let client = FacilitatorClient::new(config)?;
//!
//! let response = client.verify(&proof, &challenge).await?;
//! if response.is_valid {
//!     println!("paid by {:?}", response.payer);
//! }
//! # Ok(())
//! # }
//! ```

use crate::types::{
    FacilitatorConfig, PaymentChallenge, PaymentProof, VerifyRequest, VerifyResponse,
};
use crate::{Result, X402Error};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;


pub use crate::types::DEFAULT_FACILITATOR_URL;

/// Verifies payment proofs against the challenge they answer
#[async_trait]
pub trait Facilitator: Send + Sync {
    /// Ask whether `proof` validly pays `challenge`.
    ///
    /// `Ok` carries the facilitator's verdict; `Err` means no verdict could be
    /// obtained.
    async fn verify(
        &self,
        proof: &PaymentProof,
        challenge: &PaymentChallenge,
    ) -> Result<VerifyResponse>;
}

/// HTTP facilitator client
#[derive(Clone)]
pub struct FacilitatorClient {
    /// Base URL of the facilitator service
    url: String,
    /// HTTP client
    client: Client,
    timeout: Duration,
    /// Configuration for authentication headers
    auth_config: Option<crate::types::AuthHeadersFnArc>,
}

impl std::fmt::Debug for FacilitatorClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FacilitatorClient")
            .field("url", &self.url)
            .field("timeout", &self.timeout)
            .field("auth_config", &"<function>")
            .finish()
    }
}

impl FacilitatorClient {
    /// Create a new facilitator client
    pub fn new(config: FacilitatorConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .build()
            .map_err(|e| X402Error::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            url: config.url,
            client,
            timeout: config.timeout,
            auth_config: config.create_auth_headers,
        })
    }

    /// Get the base URL of this facilitator
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Per-call timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl Facilitator for FacilitatorClient {
    async fn verify(
        &self,
        proof: &PaymentProof,
        challenge: &PaymentChallenge,
    ) -> Result<VerifyResponse> {
        let request_body = VerifyRequest::new(proof, challenge);

        tracing::debug!(
            nonce = %challenge.nonce,
            amount = proof.amount,
            "Sending verify request to: {}/verify",
            self.url
        );

        let mut request = self
            .client
            .post(format!("{}/verify", self.url))
            .json(&request_body);

        if let Some(auth_config) = &self.auth_config {
            for (key, value) in auth_config()? {
                request = request.header(key, value);
            }
        }

        let response = request.send().await.map_err(|e| {
            let cause = if e.is_timeout() {
                "timed out"
            } else if e.is_connect() {
                "unreachable"
            } else {
                "request failed"
            };
            tracing::error!(error = %e, "Facilitator verify {}", cause);
            X402Error::verification_unavailable(format!("facilitator {}: {}", cause, e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let response_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            tracing::error!(
                "Facilitator verify failed with status: {}. Response body: {}",
                status,
                response_body
            );
            return Err(X402Error::verification_unavailable(format!(
                "Verification failed with status: {}",
                status
            )));
        }

        let verify_response: VerifyResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "Facilitator returned an unreadable verify response");
            X402Error::verification_unavailable(format!("unreadable verify response: {}", e))
        })?;

        tracing::debug!(
            nonce = %challenge.nonce,
            is_valid = verify_response.is_valid,
            "Facilitator verify completed"
        );
        Ok(verify_response)
    }
}
