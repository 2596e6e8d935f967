//! Wallet abstraction used by the paying client
//!
//! A [`Wallet`] turns a [`PaymentChallenge`] into a [`PaymentProof`] the
//! facilitator can verify. Key management and signing schemes live behind this
//! trait; the client only ever sees the finished proof.

use crate::types::{PaymentChallenge, PaymentProof};
use async_trait::async_trait;
use std::sync::Arc;

/// Errors a wallet can report while answering a challenge
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalletError {
    /// The wallet declined to pay (policy, user rejection, insufficient balance)
    #[error("Wallet refused to pay: {0}")]
    Refused(String),
    /// Producing the signature or transaction failed
    #[error("Failed to sign payment: {0}")]
    Signing(String),
}

/// Produces payment proofs for challenges
#[async_trait]
pub trait Wallet: Send + Sync {
    /// Sign a proof paying `challenge`
    async fn sign(&self, challenge: &PaymentChallenge) -> Result<PaymentProof, WalletError>;
}

/// Shared, type-erased wallet
pub type SharedWallet = Arc<dyn Wallet>;

#[async_trait]
impl<W: Wallet + ?Sized> Wallet for Arc<W> {
    async fn sign(&self, challenge: &PaymentChallenge) -> Result<PaymentProof, WalletError> {
        (**self).sign(challenge).await
    }
}

impl From<WalletError> for crate::X402Error {
    fn from(error: WalletError) -> Self {
        crate::X402Error::payment_failed(error.to_string())
    }
}
