//! Nonce ledger for challenge issuance and replay protection
//!
//! Every challenge the paywall issues is recorded here under its nonce. A proof
//! is only honoured if its nonce can be *claimed*: moved from issued to spent in
//! a single atomic step. Entries expire with their challenge and are swept on a
//! timer so the ledger stays bounded under sustained load.

use crate::types::PaymentChallenge;
use crate::{Result, X402Error};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Default number of outstanding nonces kept in memory
pub const DEFAULT_NONCE_CAPACITY: usize = 100_000;

/// Result of trying to claim a nonce
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The nonce was issued and unspent; it is now spent
    Claimed(PaymentChallenge),
    /// The nonce was never issued, or was already evicted
    Unknown,
    /// The nonce was spent by an earlier proof
    AlreadySpent,
    /// The challenge behind the nonce has expired
    Expired,
}

/// Trait for storing issued and spent nonces
///
/// Implementations must make [`NonceStorage::claim`] atomic: two concurrent
/// claims of the same nonce must never both return [`ClaimOutcome::Claimed`].
#[async_trait]
pub trait NonceStorage: Send + Sync {
    /// Record a freshly issued challenge, valid for `ttl`
    async fn issue(&self, challenge: &PaymentChallenge, ttl: Duration) -> Result<()>;

    /// Atomically mark an issued nonce as spent
    async fn claim(&self, nonce: &str) -> Result<ClaimOutcome>;

    /// Drop expired entries, returning how many were removed
    async fn purge_expired(&self) -> Result<usize>;

    /// Drop every entry
    async fn clear(&self) -> Result<()>;

    /// Number of tracked nonces
    async fn len(&self) -> Result<usize>;

    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NonceState {
    Issued,
    Spent,
}

#[derive(Debug)]
struct NonceEntry {
    challenge: PaymentChallenge,
    state: NonceState,
    expires_at: Instant,
}

impl NonceEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Default)]
struct Ledger {
    entries: HashMap<String, NonceEntry>,
    // insertion order; with a fixed TTL this is also expiry order
    order: VecDeque<String>,
}

impl Ledger {
    fn purge_expired(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let entries = &self.entries;
        self.order.retain(|nonce| entries.contains_key(nonce));
        before - self.entries.len()
    }

    fn evict_oldest(&mut self) -> Option<String> {
        while let Some(nonce) = self.order.pop_front() {
            if self.entries.remove(&nonce).is_some() {
                return Some(nonce);
            }
        }
        None
    }
}

/// In-memory nonce ledger
///
/// Bounded by `capacity`: when full, expired entries are purged first and then
/// the oldest entries are evicted. An evicted nonce becomes unknown, so a late
/// proof for it is rejected rather than admitted.
#[derive(Debug, Clone)]
pub struct InMemoryNonceStore {
    ledger: Arc<RwLock<Ledger>>,
    capacity: usize,
}

impl InMemoryNonceStore {
    /// Create a new in-memory store with the default capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_NONCE_CAPACITY)
    }

    /// Create a new in-memory store holding at most `capacity` nonces
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ledger: Arc::new(RwLock::new(Ledger::default())),
            capacity: capacity.max(1),
        }
    }

    /// Maximum number of tracked nonces
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InMemoryNonceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NonceStorage for InMemoryNonceStore {
    async fn issue(&self, challenge: &PaymentChallenge, ttl: Duration) -> Result<()> {
        let now = Instant::now();
        let mut ledger = self.ledger.write().await;

        if ledger.entries.contains_key(&challenge.nonce) {
            return Err(X402Error::storage(format!(
                "nonce {} was already issued",
                challenge.nonce
            )));
        }

        if ledger.entries.len() >= self.capacity {
            let purged = ledger.purge_expired(now);
            if purged > 0 {
                tracing::debug!(purged, "purged expired nonces at capacity");
            }
        }
        while ledger.entries.len() >= self.capacity {
            match ledger.evict_oldest() {
                Some(nonce) => tracing::warn!(%nonce, "nonce ledger full, evicting oldest entry"),
                None => break,
            }
        }

        ledger.entries.insert(
            challenge.nonce.clone(),
            NonceEntry {
                challenge: challenge.clone(),
                state: NonceState::Issued,
                expires_at: now + ttl,
            },
        );
        ledger.order.push_back(challenge.nonce.clone());
        Ok(())
    }

    async fn claim(&self, nonce: &str) -> Result<ClaimOutcome> {
        let now = Instant::now();
        let mut ledger = self.ledger.write().await;

        let Some(entry) = ledger.entries.get_mut(nonce) else {
            return Ok(ClaimOutcome::Unknown);
        };

        if entry.is_expired(now) {
            return Ok(ClaimOutcome::Expired);
        }

        match entry.state {
            NonceState::Spent => Ok(ClaimOutcome::AlreadySpent),
            NonceState::Issued => {
                entry.state = NonceState::Spent;
                Ok(ClaimOutcome::Claimed(entry.challenge.clone()))
            }
        }
    }

    async fn purge_expired(&self) -> Result<usize> {
        let mut ledger = self.ledger.write().await;
        Ok(ledger.purge_expired(Instant::now()))
    }

    async fn clear(&self) -> Result<()> {
        let mut ledger = self.ledger.write().await;
        ledger.entries.clear();
        ledger.order.clear();
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        let ledger = self.ledger.read().await;
        Ok(ledger.entries.len())
    }
}

/// Handle to a background sweeper task
///
/// Dropping the handle stops the sweeper.
#[derive(Debug)]
pub struct SweeperHandle {
    handle: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stop the sweeper and wait for it to finish
    pub async fn shutdown(mut self) {
        self.handle.abort();
        // the task never completes on its own, so cancellation is the expected result
        let _ = (&mut self.handle).await;
    }

    /// Whether the sweeper task has stopped
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Spawn a task that purges expired nonces every `interval`
pub fn spawn_sweeper<S>(storage: Arc<S>, interval: Duration) -> SweeperHandle
where
    S: NonceStorage + ?Sized + 'static,
{
    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match storage.purge_expired().await {
                Ok(0) => {}
                Ok(purged) => tracing::debug!(purged, "swept expired nonces"),
                Err(e) => tracing::error!(error = %e, "nonce sweep failed"),
            }
        }
    });
    SweeperHandle { handle }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Currency, Network, X402_VERSION};

    fn challenge(nonce: &str) -> PaymentChallenge {
        PaymentChallenge {
            x402_version: X402_VERSION,
            amount: 10_000,
            currency: Currency::Stx,
            pay_to: "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM".to_string(),
            network: Network::Testnet,
            facilitator_url: "http://127.0.0.1:4021".to_string(),
            nonce: nonce.to_string(),
            resource: "/data".to_string(),
            expires_at: chrono::Utc::now().timestamp() + 60,
        }
    }

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn test_in_memory_store_creation() {
        let store = InMemoryNonceStore::new();
        assert!(store.is_empty().await.unwrap());
        assert_eq!(store.capacity(), DEFAULT_NONCE_CAPACITY);
        assert_eq!(store.claim("missing").await.unwrap(), ClaimOutcome::Unknown);
    }

    #[tokio::test]
    async fn test_claim_issued_nonce() {
        let store = InMemoryNonceStore::new();
        let issued = challenge("nonce_123");
        store.issue(&issued, TTL).await.unwrap();

        assert_eq!(
            store.claim("nonce_123").await.unwrap(),
            ClaimOutcome::Claimed(issued)
        );
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_replay_protection() {
        let store = InMemoryNonceStore::new();
        store.issue(&challenge("nonce_replay"), TTL).await.unwrap();

        assert!(matches!(
            store.claim("nonce_replay").await.unwrap(),
            ClaimOutcome::Claimed(_)
        ));
        assert_eq!(
            store.claim("nonce_replay").await.unwrap(),
            ClaimOutcome::AlreadySpent
        );
        assert_eq!(
            store.claim("nonce_replay").await.unwrap(),
            ClaimOutcome::AlreadySpent
        );
    }

    #[tokio::test]
    async fn test_issue_rejects_duplicate_nonce() {
        let store = InMemoryNonceStore::new();
        store.issue(&challenge("dup"), TTL).await.unwrap();
        let err = store.issue(&challenge("dup"), TTL).await.unwrap_err();
        assert_eq!(err.kind(), "storage");
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_nonce_cannot_be_claimed() {
        let store = InMemoryNonceStore::new();
        store
            .issue(&challenge("short"), Duration::from_secs(5))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(6)).await;

        assert_eq!(store.claim("short").await.unwrap(), ClaimOutcome::Expired);
        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert_eq!(store.claim("short").await.unwrap(), ClaimOutcome::Unknown);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_keeps_live_entries() {
        let store = InMemoryNonceStore::new();
        store
            .issue(&challenge("old"), Duration::from_secs(5))
            .await
            .unwrap();
        store
            .issue(&challenge("new"), Duration::from_secs(50))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(10)).await;

        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert_eq!(store.len().await.unwrap(), 1);
        assert!(matches!(
            store.claim("new").await.unwrap(),
            ClaimOutcome::Claimed(_)
        ));
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest() {
        let store = InMemoryNonceStore::with_capacity(2);
        store.issue(&challenge("n1"), TTL).await.unwrap();
        store.issue(&challenge("n2"), TTL).await.unwrap();
        store.issue(&challenge("n3"), TTL).await.unwrap();

        assert_eq!(store.len().await.unwrap(), 2);
        assert_eq!(store.claim("n1").await.unwrap(), ClaimOutcome::Unknown);
        assert!(matches!(
            store.claim("n3").await.unwrap(),
            ClaimOutcome::Claimed(_)
        ));
    }

    #[tokio::test]
    async fn test_clear() {
        let store = InMemoryNonceStore::new();
        store.issue(&challenge("a"), TTL).await.unwrap();
        store.issue(&challenge("b"), TTL).await.unwrap();
        store.clear().await.unwrap();
        assert!(store.is_empty().await.unwrap());
        assert_eq!(store.claim("a").await.unwrap(), ClaimOutcome::Unknown);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_claims_admit_exactly_one() {
        let store = Arc::new(InMemoryNonceStore::new());
        store.issue(&challenge("contended"), TTL).await.unwrap();

        let tasks: Vec<_> = (0..32)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.claim("contended").await.unwrap() })
            })
            .collect();

        let mut claimed = 0;
        for task in tasks {
            if let ClaimOutcome::Claimed(_) = task.await.unwrap() {
                claimed += 1;
            }
        }
        assert_eq!(claimed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_purges_expired_entries() {
        let store = Arc::new(InMemoryNonceStore::new());
        store
            .issue(&challenge("swept"), Duration::from_secs(5))
            .await
            .unwrap();

        let sweeper = spawn_sweeper(store.clone(), Duration::from_secs(1));
        tokio::time::sleep(Duration::from_secs(7)).await;

        assert!(store.is_empty().await.unwrap());
        assert!(!sweeper.is_finished());
        sweeper.shutdown().await;
    }
}
