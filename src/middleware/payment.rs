//! Paywall interceptor implementation

use super::config::PaywallConfig;
use crate::facilitator::{Facilitator, FacilitatorClient};
use crate::nonce_storage::{
    spawn_sweeper, ClaimOutcome, InMemoryNonceStore, NonceStorage, SweeperHandle,
};
use crate::types::{
    headers, PaymentChallenge, PaymentProof, PaymentRequiredResponse, PriceEntry, RejectReason,
    X402_VERSION,
};
use crate::{Result, X402Error};
use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

/// Paywall interceptor guarding priced routes
#[derive(Clone)]
pub struct Paywall {
    config: Arc<PaywallConfig>,
    facilitator: Arc<dyn Facilitator>,
    nonce_storage: Arc<dyn NonceStorage>,
}

impl std::fmt::Debug for Paywall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Paywall")
            .field("config", &self.config)
            .field("facilitator", &"<facilitator>")
            .field("nonce_storage", &"<nonce storage>")
            .finish()
    }
}

/// Payment accepted for an admitted request.
///
/// Inserted into the request extensions before the handler runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedPayment {
    /// Spent nonce
    pub nonce: String,
    /// Amount paid in smallest units
    pub amount: u64,
    /// Route pattern that was paid for
    pub resource: String,
    /// Payer as reported by the facilitator or the proof
    pub payer: Option<String>,
    /// On-chain transaction reference, if the proof carried one
    pub transaction_ref: Option<String>,
}

/// Decision for a single request
#[derive(Debug)]
pub enum Admission {
    /// The route has no price
    Unpriced,
    /// The proof was verified and its nonce spent
    Paid(VerifiedPayment),
    /// The request must not reach the handler
    Rejected(Rejection),
}

/// Payment processing result
#[derive(Debug)]
pub enum PaymentOutcome {
    /// Unpriced route, handler ran
    Unpriced { response: Response },
    /// Payment verified, handler ran
    Admitted {
        response: Response,
        payment: VerifiedPayment,
    },
    /// Rejected before the handler
    Rejected { rejection: Rejection },
}

impl IntoResponse for PaymentOutcome {
    fn into_response(self) -> Response {
        match self {
            PaymentOutcome::Unpriced { response } => response,
            PaymentOutcome::Admitted { response, .. } => response,
            PaymentOutcome::Rejected { rejection } => rejection.into_response(),
        }
    }
}

/// A paywall rejection: 402 with a fresh challenge, or 503 when verification
/// is unavailable
#[derive(Debug, Clone)]
pub struct Rejection {
    body: PaymentRequiredResponse,
}

impl Rejection {
    fn payment_required(reason: RejectReason, challenge: PaymentChallenge) -> Self {
        Self {
            body: PaymentRequiredResponse::new(reason, Some(challenge)),
        }
    }

    fn unavailable() -> Self {
        Self {
            body: PaymentRequiredResponse::new(RejectReason::VerificationUnavailable, None),
        }
    }

    /// The rejection as an [`X402Error`]
    pub fn error(&self) -> X402Error {
        match (self.body.reason, &self.body.challenge) {
            (RejectReason::VerificationUnavailable, _) => {
                X402Error::verification_unavailable(self.body.error.clone())
            }
            (RejectReason::PaymentRequired, Some(challenge)) => X402Error::PaymentRequired {
                amount: challenge.amount,
                pay_to: challenge.pay_to.clone(),
            },
            (reason, _) => X402Error::invalid_proof(reason),
        }
    }

    /// HTTP status of the rejection: 402, or 503 when verification is unavailable
    pub fn status(&self) -> StatusCode {
        self.error().status_code()
    }

    /// Machine-readable reason
    pub fn reason(&self) -> RejectReason {
        self.body.reason
    }

    /// Fresh challenge, absent on 503
    pub fn challenge(&self) -> Option<&PaymentChallenge> {
        self.body.challenge.as_ref()
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let mut response_headers = HeaderMap::new();
        response_headers.insert(
            HeaderName::from_static(headers::PAYMENT_REASON),
            HeaderValue::from_static(self.body.reason.as_str()),
        );
        if let Some(challenge) = &self.body.challenge {
            for (name, value) in challenge.header_pairs() {
                match HeaderValue::from_str(&value) {
                    Ok(value) => {
                        response_headers.insert(HeaderName::from_static(name), value);
                    }
                    Err(_) => {
                        tracing::error!(header = name, "challenge field is not a valid header value")
                    }
                }
            }
        }
        (self.status(), response_headers, Json(self.body)).into_response()
    }
}

impl Paywall {
    /// Create a paywall with an HTTP facilitator client and an in-memory nonce store
    pub fn new(config: PaywallConfig) -> Result<Self> {
        config.validate()?;
        let facilitator = FacilitatorClient::new(config.facilitator_config.clone())?;
        let nonce_storage = InMemoryNonceStore::with_capacity(config.nonce_capacity);

        Ok(Self {
            config: Arc::new(config),
            facilitator: Arc::new(facilitator),
            nonce_storage: Arc::new(nonce_storage),
        })
    }

    /// Replace the facilitator
    pub fn with_facilitator(mut self, facilitator: impl Facilitator + 'static) -> Self {
        self.facilitator = Arc::new(facilitator);
        self
    }

    /// Replace the nonce store
    pub fn with_nonce_storage(mut self, nonce_storage: impl NonceStorage + 'static) -> Self {
        self.nonce_storage = Arc::new(nonce_storage);
        self
    }

    /// Get the paywall configuration
    pub fn config(&self) -> &PaywallConfig {
        &self.config
    }

    /// Shared handle to the nonce store
    pub fn nonce_storage(&self) -> Arc<dyn NonceStorage> {
        self.nonce_storage.clone()
    }

    /// Start the background sweeper for this paywall's nonce store
    pub fn spawn_sweeper(&self) -> SweeperHandle {
        spawn_sweeper(self.nonce_storage.clone(), self.config.sweep_interval)
    }

    /// Decide whether a request for `path` carrying `request_headers` may pass
    pub async fn admit(&self, path: &str, request_headers: &HeaderMap) -> Admission {
        let Some(entry) = self.config.prices.lookup(path) else {
            return Admission::Unpriced;
        };

        let mut proof_headers = request_headers.get_all(headers::PAYMENT_PROOF).iter();
        let raw_proof = match (proof_headers.next(), proof_headers.next()) {
            (None, _) => return self.reject(entry, RejectReason::PaymentRequired).await,
            (Some(value), None) => value,
            (Some(_), Some(_)) => {
                tracing::warn!(path, "multiple payment proof headers");
                return self.reject(entry, RejectReason::MalformedProof).await;
            }
        };

        let proof = match raw_proof
            .to_str()
            .ok()
            .map(PaymentProof::from_base64)
        {
            Some(Ok(proof)) => proof,
            _ => {
                tracing::warn!(path, "payment proof could not be decoded");
                return self.reject(entry, RejectReason::MalformedProof).await;
            }
        };

        match self.verify(entry, &proof).await {
            Ok(payment) => {
                tracing::info!(
                    path,
                    nonce = %payment.nonce,
                    amount = payment.amount,
                    payer = payment.payer.as_deref().unwrap_or("unknown"),
                    "payment verified"
                );
                Admission::Paid(payment)
            }
            Err(Some(reason)) => {
                tracing::warn!(path, nonce = %proof.nonce, %reason, "payment proof rejected");
                self.reject(entry, reason).await
            }
            Err(None) => Admission::Rejected(Rejection::unavailable()),
        }
    }

    /// Claim the proof's nonce and run the checks. `Err(None)` means no verdict
    /// could be reached.
    async fn verify(
        &self,
        entry: &PriceEntry,
        proof: &PaymentProof,
    ) -> std::result::Result<VerifiedPayment, Option<RejectReason>> {
        let challenge = match self.nonce_storage.claim(&proof.nonce).await {
            Ok(ClaimOutcome::Claimed(challenge)) => challenge,
            Ok(ClaimOutcome::Unknown) => return Err(Some(RejectReason::UnknownNonce)),
            Ok(ClaimOutcome::AlreadySpent) => return Err(Some(RejectReason::NonceAlreadyUsed)),
            Ok(ClaimOutcome::Expired) => return Err(Some(RejectReason::NonceExpired)),
            Err(e) => {
                tracing::error!(error = %e, "nonce store failure during claim");
                return Err(None);
            }
        };

        if challenge.resource != entry.pattern {
            return Err(Some(RejectReason::RouteMismatch));
        }

        if proof.amount < entry.price.amount {
            return Err(Some(RejectReason::InsufficientAmount));
        }

        let verdict = tokio::time::timeout(
            self.config.verify_timeout,
            self.facilitator.verify(proof, &challenge),
        )
        .await;

        match verdict {
            Ok(Ok(response)) if response.is_valid => Ok(VerifiedPayment {
                nonce: challenge.nonce,
                amount: proof.amount,
                resource: challenge.resource,
                payer: response.payer.or_else(|| proof.payer.clone()),
                transaction_ref: proof.transaction_ref.clone(),
            }),
            Ok(Ok(response)) => {
                tracing::warn!(
                    nonce = %challenge.nonce,
                    reason = response.invalid_reason.as_deref().unwrap_or("unspecified"),
                    "facilitator rejected payment"
                );
                Err(Some(RejectReason::FacilitatorRejected))
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, nonce = %challenge.nonce, "facilitator unavailable");
                Err(None)
            }
            Err(_) => {
                tracing::warn!(
                    nonce = %challenge.nonce,
                    timeout_ms = self.config.verify_timeout.as_millis() as u64,
                    "facilitator verify timed out"
                );
                Err(None)
            }
        }
    }

    /// Issue a fresh challenge for `entry` and wrap it in a 402 rejection
    async fn reject(&self, entry: &PriceEntry, reason: RejectReason) -> Admission {
        let challenge = self.new_challenge(entry);

        if let Err(e) = self
            .nonce_storage
            .issue(&challenge, self.config.challenge_ttl)
            .await
        {
            tracing::error!(error = %e, "nonce store failure while issuing challenge");
            return Admission::Rejected(Rejection::unavailable());
        }

        tracing::debug!(
            resource = %challenge.resource,
            nonce = %challenge.nonce,
            amount = challenge.amount,
            %reason,
            "issued payment challenge"
        );
        Admission::Rejected(Rejection::payment_required(reason, challenge))
    }

    fn new_challenge(&self, entry: &PriceEntry) -> PaymentChallenge {
        let ttl = i64::try_from(self.config.challenge_ttl.as_secs()).unwrap_or(i64::MAX);
        PaymentChallenge {
            x402_version: X402_VERSION,
            amount: entry.price.amount,
            currency: entry.price.currency,
            pay_to: self.config.pay_to.clone(),
            network: self.config.network,
            facilitator_url: self.config.facilitator_config.url.clone(),
            nonce: generate_nonce(),
            resource: entry.pattern.clone(),
            expires_at: chrono::Utc::now().timestamp().saturating_add(ttl),
        }
    }

    /// Process a request through the paywall and, if admitted, the handler
    pub async fn process_payment(&self, mut request: Request, next: Next) -> PaymentOutcome {
        let path = request.uri().path().to_string();

        let admission = self.admit(&path, request.headers()).await;
        match admission {
            Admission::Unpriced => PaymentOutcome::Unpriced {
                response: next.run(request).await,
            },
            Admission::Paid(payment) => {
                request.extensions_mut().insert(payment.clone());
                let mut response = next.run(request).await;
                attach_receipt(&mut response, &payment);
                PaymentOutcome::Admitted { response, payment }
            }
            Admission::Rejected(rejection) => PaymentOutcome::Rejected { rejection },
        }
    }
}

/// Echo the spent nonce on an admitted response
pub(crate) fn attach_receipt<B>(response: &mut http::Response<B>, payment: &VerifiedPayment) {
    if let Ok(value) = HeaderValue::from_str(&payment.nonce) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(headers::PAYMENT_RECEIPT), value);
    }
}

/// Generate a random challenge nonce (32 bytes, hex encoded)
pub fn generate_nonce() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Axum middleware function for the paywall
pub async fn payment_middleware(
    State(paywall): State<Paywall>,
    request: Request,
    next: Next,
) -> Response {
    paywall.process_payment(request, next).await.into_response()
}
