//! Network configuration types

use super::constants::networks;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stacks network a paywall settles on
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    #[default]
    Testnet,
}

impl Network {
    /// Get the network identifier string
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mainnet => networks::MAINNET,
            Network::Testnet => networks::TESTNET,
        }
    }

    /// Whether this is a test network
    pub fn is_testnet(&self) -> bool {
        matches!(self, Network::Testnet)
    }

    /// Address version prefixes valid on this network
    pub fn address_prefixes(&self) -> &'static [&'static str] {
        match self {
            Network::Mainnet => networks::MAINNET_ADDRESS_PREFIXES,
            Network::Testnet => networks::TESTNET_ADDRESS_PREFIXES,
        }
    }

    /// Check whether `address` carries a version prefix of this network
    pub fn accepts_address(&self, address: &str) -> bool {
        self.address_prefixes()
            .iter()
            .any(|prefix| address.starts_with(prefix))
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = crate::X402Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            networks::MAINNET => Ok(Network::Mainnet),
            networks::TESTNET => Ok(Network::Testnet),
            other => Err(crate::X402Error::config(format!(
                "Unsupported network '{}', expected one of {:?}",
                other,
                networks::all_supported()
            ))),
        }
    }
}
