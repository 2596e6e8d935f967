//! Common constants for networks and wire headers

/// Stacks network identifiers
pub mod networks {
    /// Stacks mainnet
    pub const MAINNET: &str = "mainnet";
    /// Stacks testnet
    pub const TESTNET: &str = "testnet";

    /// Standard and multisig address versions on mainnet
    pub const MAINNET_ADDRESS_PREFIXES: &[&str] = &["SP", "SM"];
    /// Standard and multisig address versions on testnet
    pub const TESTNET_ADDRESS_PREFIXES: &[&str] = &["ST", "SN"];

    /// Check if a network is supported
    pub fn is_supported(network: &str) -> bool {
        matches!(network, MAINNET | TESTNET)
    }

    /// Get all supported networks
    pub fn all_supported() -> Vec<&'static str> {
        vec![MAINNET, TESTNET]
    }
}

/// Header names used on the wire.
///
/// Header names are case-insensitive; these are the lowercase canonical forms
/// (`X-Payment-Proof` and friends).
pub mod headers {
    /// Proof-bearing header on the paid retry
    pub const PAYMENT_PROOF: &str = "x-payment-proof";
    /// Spent nonce echoed on an admitted response
    pub const PAYMENT_RECEIPT: &str = "x-payment-receipt";
    /// Machine-readable rejection reason
    pub const PAYMENT_REASON: &str = "x-payment-reason";

    pub const PAYMENT_AMOUNT: &str = "x-payment-amount";
    pub const PAYMENT_CURRENCY: &str = "x-payment-currency";
    pub const PAYMENT_PAY_TO: &str = "x-payment-pay-to";
    pub const PAYMENT_NETWORK: &str = "x-payment-network";
    pub const PAYMENT_FACILITATOR: &str = "x-payment-facilitator";
    pub const PAYMENT_NONCE: &str = "x-payment-nonce";
    pub const PAYMENT_RESOURCE: &str = "x-payment-resource";
    pub const PAYMENT_EXPIRES_AT: &str = "x-payment-expires-at";
}
