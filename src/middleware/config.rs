//! Paywall configuration

use crate::types::{FacilitatorConfig, Network, PriceTable};
use crate::{Result, X402Error};
use std::time::Duration;

/// Default lifetime of an issued challenge
pub const DEFAULT_CHALLENGE_TTL: Duration = Duration::from_secs(300);

/// Default interval between nonce ledger sweeps
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Environment variable names read by [`PaywallConfig::from_env`]
pub mod env {
    pub const PRICES: &str = "X402_PRICES";
    pub const PAY_TO: &str = "X402_PAY_TO";
    pub const NETWORK: &str = "X402_NETWORK";
    pub const FACILITATOR_URL: &str = "X402_FACILITATOR_URL";
    pub const CHALLENGE_TTL_SECS: &str = "X402_CHALLENGE_TTL_SECS";
    pub const VERIFY_TIMEOUT_MS: &str = "X402_VERIFY_TIMEOUT_MS";
}

/// Configuration for the paywall interceptor
#[derive(Debug, Clone)]
pub struct PaywallConfig {
    /// Route prices; unpriced routes are free
    pub prices: PriceTable,
    /// Recipient address for payments
    pub pay_to: String,
    /// Network payments must settle on
    pub network: Network,
    /// Facilitator used to verify proofs
    pub facilitator_config: FacilitatorConfig,
    /// How long an issued challenge can be answered
    pub challenge_ttl: Duration,
    /// Upper bound on a single facilitator verify call
    pub verify_timeout: Duration,
    /// Maximum number of outstanding nonces
    pub nonce_capacity: usize,
    /// Interval between sweeps of expired nonces
    pub sweep_interval: Duration,
}

impl PaywallConfig {
    /// Create a new paywall config
    pub fn new(prices: PriceTable, pay_to: impl Into<String>) -> Self {
        let facilitator_config = FacilitatorConfig::default();
        Self {
            prices,
            pay_to: pay_to.into().trim().to_string(),
            network: Network::default(),
            verify_timeout: facilitator_config.timeout,
            facilitator_config,
            challenge_ttl: DEFAULT_CHALLENGE_TTL,
            nonce_capacity: crate::nonce_storage::DEFAULT_NONCE_CAPACITY,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    /// Set the network
    pub fn with_network(mut self, network: Network) -> Self {
        self.network = network;
        self
    }

    /// Set the facilitator configuration
    pub fn with_facilitator_config(mut self, facilitator_config: FacilitatorConfig) -> Self {
        self.verify_timeout = facilitator_config.timeout;
        self.facilitator_config = facilitator_config;
        self
    }

    /// Set the facilitator URL, keeping the current timeout
    pub fn with_facilitator_url(mut self, url: impl Into<String>) -> Self {
        let timeout = self.facilitator_config.timeout;
        self.facilitator_config = FacilitatorConfig {
            create_auth_headers: self.facilitator_config.create_auth_headers.take(),
            ..FacilitatorConfig::new(url).with_timeout(timeout)
        };
        self
    }

    /// Set the challenge lifetime
    pub fn with_challenge_ttl(mut self, ttl: Duration) -> Self {
        self.challenge_ttl = ttl;
        self
    }

    /// Set the verification timeout
    pub fn with_verify_timeout(mut self, timeout: Duration) -> Self {
        self.verify_timeout = timeout;
        self.facilitator_config.timeout = timeout;
        self
    }

    /// Set the nonce ledger capacity
    pub fn with_nonce_capacity(mut self, capacity: usize) -> Self {
        self.nonce_capacity = capacity;
        self
    }

    /// Set the nonce sweep interval
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.pay_to.is_empty() {
            return Err(X402Error::config("Pay-to address cannot be empty"));
        }

        // challenge fields are echoed in X-Payment-* headers
        if !is_header_safe(&self.pay_to) {
            return Err(X402Error::config(format!(
                "Pay-to address {:?} must be visible ASCII",
                self.pay_to
            )));
        }
        if !is_header_safe(&self.facilitator_config.url) {
            return Err(X402Error::config(format!(
                "Facilitator URL {:?} must be visible ASCII",
                self.facilitator_config.url
            )));
        }

        if !self.network.accepts_address(&self.pay_to) {
            return Err(X402Error::config(format!(
                "Pay-to address '{}' is not a {} address (expected prefix {:?})",
                self.pay_to,
                self.network,
                self.network.address_prefixes()
            )));
        }

        self.facilitator_config.validate()?;

        if self.challenge_ttl.is_zero() {
            return Err(X402Error::config("Challenge TTL must be greater than zero"));
        }
        if self.verify_timeout.is_zero() {
            return Err(X402Error::config(
                "Verification timeout must be greater than zero",
            ));
        }
        if self.nonce_capacity == 0 {
            return Err(X402Error::config("Nonce capacity must be greater than zero"));
        }

        Ok(())
    }

    /// Build a config from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from a key lookup (environment-style names, see [`env`])
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let prices = match get(env::PRICES) {
            Some(raw) => parse_prices(&raw)?,
            None => PriceTable::new(),
        };

        let pay_to = get(env::PAY_TO)
            .ok_or_else(|| X402Error::config(format!("{} is not set", env::PAY_TO)))?;

        let mut config = Self::new(prices, pay_to);

        if let Some(network) = get(env::NETWORK) {
            config = config.with_network(network.parse()?);
        }

        if let Some(url) = get(env::FACILITATOR_URL) {
            config = config.with_facilitator_url(url);
        }

        if let Some(ttl) = get(env::CHALLENGE_TTL_SECS) {
            let secs = ttl.trim().parse::<u64>().map_err(|_| {
                X402Error::config(format!(
                    "{} must be a number of seconds",
                    env::CHALLENGE_TTL_SECS
                ))
            })?;
            config = config.with_challenge_ttl(Duration::from_secs(secs));
        }

        if let Some(timeout) = get(env::VERIFY_TIMEOUT_MS) {
            let millis = timeout.trim().parse::<u64>().map_err(|_| {
                X402Error::config(format!(
                    "{} must be a number of milliseconds",
                    env::VERIFY_TIMEOUT_MS
                ))
            })?;
            config = config.with_verify_timeout(Duration::from_millis(millis));
        }

        config.validate()?;
        Ok(config)
    }
}

fn is_header_safe(value: &str) -> bool {
    value.bytes().all(|b| b.is_ascii_graphic())
}

/// Parse a price list such as `/data=0.01 STX;/premium/*=0.05 STX`
pub fn parse_prices(raw: &str) -> Result<PriceTable> {
    let entries = raw
        .split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry
                .split_once('=')
                .map(|(pattern, price)| (pattern.trim().to_string(), price.trim().to_string()))
                .ok_or_else(|| {
                    X402Error::config(format!(
                        "Price entry '{}' must look like '/route=0.01 STX'",
                        entry
                    ))
                })
        })
        .collect::<Result<Vec<_>>>()?;

    PriceTable::from_prices(entries)
}
