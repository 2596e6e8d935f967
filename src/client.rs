//! Paying HTTP client
//!
//! [`X402Client`] sends a request, and when the server answers `402 Payment
//! Required` it asks its [`Wallet`] to pay the attached challenge and retries
//! the request exactly once with the proof in `X-Payment-Proof`.
//!
//! ```no_run
//! use x402kit::client::X402Client;
//! use x402kit::types::{PaymentChallenge, PaymentProof};
//! use x402kit::wallet::{Wallet, WalletError};
//!
//! struct StaticWallet;
//!
//! #[async_trait::async_trait]
//! impl Wallet for StaticWallet {
//!     async fn sign(&self, challenge: &PaymentChallenge) -> Result<PaymentProof, WalletError> {
//!         Ok(PaymentProof::new(challenge.nonce.clone(), "0xsignature", challenge.amount))
//!     }
//! }
//!
//! # async fn example() -> x402kit::Result<()> {
//! let client = X402Client::new(StaticWallet).with_max_amount(50_000);
//! let data = client
//!     .call("http://localhost:3000/data", &serde_json::json!({}))
//!     .await?;
//! println!("{}", data);
//! # Ok(())
//! # }
//! ```

use crate::types::{headers, Network, PaymentChallenge, PaymentProof, PaymentRequiredResponse};
use crate::wallet::{SharedWallet, Wallet};
use crate::{Result, X402Error};
use reqwest::{Client, Method, Response, StatusCode};
use serde_json::Value;
use std::sync::Arc;

/// HTTP client that pays x402 challenges and retries once
#[derive(Clone)]
pub struct X402Client {
    http: Client,
    wallet: SharedWallet,
    /// Upper bound on a single payment, in smallest units
    max_amount: Option<u64>,
    /// Network the wallet is willing to pay on
    network: Option<Network>,
}

impl std::fmt::Debug for X402Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("X402Client")
            .field("wallet", &"<wallet>")
            .field("max_amount", &self.max_amount)
            .field("network", &self.network)
            .finish()
    }
}

impl X402Client {
    /// Create a client paying with `wallet`
    pub fn new(wallet: impl Wallet + 'static) -> Self {
        Self::with_shared_wallet(Arc::new(wallet))
    }

    /// Create a client from an already shared wallet
    pub fn with_shared_wallet(wallet: SharedWallet) -> Self {
        Self {
            http: Client::new(),
            wallet,
            max_amount: None,
            network: None,
        }
    }

    /// Use a preconfigured reqwest client (timeouts, proxies, TLS)
    pub fn with_http_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    /// Refuse challenges asking for more than `max_amount` smallest units
    pub fn with_max_amount(mut self, max_amount: u64) -> Self {
        self.max_amount = Some(max_amount);
        self
    }

    /// Refuse challenges for any network other than `network`
    pub fn with_network(mut self, network: Network) -> Self {
        self.network = Some(network);
        self
    }

    /// GET `url`, paying if required
    pub async fn get(&self, url: &str) -> Result<Response> {
        self.request(Method::GET, url, None).await
    }

    /// POST a JSON body to `url`, paying if required, and decode the JSON answer
    pub async fn call(&self, url: &str, body: &Value) -> Result<Value> {
        let response = self
            .request(Method::POST, url, Some(body))
            .await?
            .error_for_status()?;
        Ok(response.json::<Value>().await?)
    }

    /// Send a request, paying and retrying once on `402 Payment Required`.
    ///
    /// A first response other than 402 is returned untouched. After the paid
    /// retry any 4xx or 5xx status is reported as [`X402Error::RetryExhausted`].
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<Response> {
        let response = self.send(method.clone(), url, body, None).await?;
        if response.status() != StatusCode::PAYMENT_REQUIRED {
            return Ok(response);
        }

        let challenge = Self::parse_challenge(response).await?;
        tracing::debug!(
            nonce = %challenge.nonce,
            amount = challenge.amount,
            currency = %challenge.currency,
            network = %challenge.network,
            "received payment challenge"
        );

        self.check_challenge(&challenge)?;

        let proof = self.wallet.sign(&challenge).await.map_err(|e| {
            tracing::warn!(error = %e, nonce = %challenge.nonce, "wallet did not produce a proof");
            X402Error::from(e)
        })?;
        Self::check_proof(&challenge, &proof)?;

        let proof_header = proof.to_base64()?;
        tracing::info!(
            nonce = %challenge.nonce,
            amount = proof.amount,
            "retrying request with payment proof"
        );

        let retried = self.send(method, url, body, Some(&proof_header)).await?;
        let status = retried.status();
        if status.is_client_error() || status.is_server_error() {
            let reason = Self::rejection_reason(retried).await;
            tracing::warn!(status = status.as_u16(), %reason, "paid retry was rejected");
            return Err(X402Error::RetryExhausted {
                status: status.as_u16(),
                reason,
            });
        }

        Ok(retried)
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        proof_header: Option<&str>,
    ) -> Result<Response> {
        let mut request = self.http.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }
        if let Some(proof) = proof_header {
            request = request.header(headers::PAYMENT_PROOF, proof);
        }
        Ok(request.send().await?)
    }

    /// Extract the challenge from a 402 body, falling back to `X-Payment-*` headers
    async fn parse_challenge(response: Response) -> Result<PaymentChallenge> {
        let header_map = response.headers().clone();
        let body = response.bytes().await?;

        let from_body = serde_json::from_slice::<PaymentRequiredResponse>(&body)
            .ok()
            .and_then(|rejection| rejection.challenge);

        let challenge = match from_body {
            Some(challenge) => challenge,
            None => PaymentChallenge::from_headers(&header_map)?,
        };
        challenge.validate()?;
        Ok(challenge)
    }

    fn check_challenge(&self, challenge: &PaymentChallenge) -> Result<()> {
        if challenge.is_expired() {
            return Err(X402Error::payment_failed(format!(
                "Challenge {} expired at {}",
                challenge.nonce, challenge.expires_at
            )));
        }
        if let Some(max) = self.max_amount {
            if challenge.amount > max {
                return Err(X402Error::payment_failed(format!(
                    "Payment amount {} exceeds maximum allowed {}",
                    challenge.amount, max
                )));
            }
        }
        if let Some(network) = self.network {
            if challenge.network != network {
                return Err(X402Error::payment_failed(format!(
                    "Challenge is for {} but the client pays on {}",
                    challenge.network, network
                )));
            }
        }
        Ok(())
    }

    fn check_proof(challenge: &PaymentChallenge, proof: &PaymentProof) -> Result<()> {
        if proof.nonce != challenge.nonce {
            return Err(X402Error::payment_failed(
                "wallet signed a proof for a different nonce",
            ));
        }
        if proof.amount > challenge.amount {
            return Err(X402Error::payment_failed(format!(
                "wallet offered {} but the challenge asks for {}",
                proof.amount, challenge.amount
            )));
        }
        Ok(())
    }

    async fn rejection_reason(response: Response) -> String {
        let status = response.status();
        let fallback = status
            .canonical_reason()
            .unwrap_or("request rejected")
            .to_string();
        match response.json::<PaymentRequiredResponse>().await {
            Ok(rejection) => rejection.reason.to_string(),
            Err(_) => fallback,
        }
    }
}
