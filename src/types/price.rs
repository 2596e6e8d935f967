//! Price parsing and the route price table

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Currency a price is quoted in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    /// Stacks token, smallest unit micro-STX
    #[serde(rename = "STX")]
    Stx,
    /// Bitcoin on Stacks, smallest unit satoshi
    #[serde(rename = "sBTC")]
    Sbtc,
}

impl Currency {
    /// Currency code as written in price strings
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Stx => "STX",
            Currency::Sbtc => "sBTC",
        }
    }

    /// Number of decimal places of the smallest unit
    pub fn decimals(&self) -> u32 {
        match self {
            Currency::Stx => 6,
            Currency::Sbtc => 8,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = crate::X402Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "STX" => Ok(Currency::Stx),
            "SBTC" => Ok(Currency::Sbtc),
            _ => Err(crate::X402Error::invalid_price(
                s,
                format!("unknown currency code '{}'", s),
            )),
        }
    }
}

/// A price in the smallest unit of its currency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Price {
    /// Amount in smallest units (e.g. micro-STX)
    pub amount: u64,
    /// Currency of the amount
    pub currency: Currency,
}

impl Price {
    /// Create a price from an amount already in smallest units
    pub fn new(amount: u64, currency: Currency) -> Self {
        Self { amount, currency }
    }

    /// Parse a human-readable price such as `"0.01 STX"`
    pub fn parse(input: &str) -> crate::Result<Self> {
        let mut parts = input.split_whitespace();
        let (amount, code) = match (parts.next(), parts.next(), parts.next()) {
            (Some(amount), Some(code), None) => (amount, code),
            _ => {
                return Err(crate::X402Error::invalid_price(
                    input,
                    "expected '<decimal> <currency-code>'",
                ))
            }
        };

        let currency = code
            .parse::<Currency>()
            .map_err(|_| crate::X402Error::invalid_price(input, "unknown currency code"))?;

        let decimal = Decimal::from_str(amount)
            .map_err(|_| crate::X402Error::invalid_price(input, "amount is not a number"))?;

        if decimal.is_sign_negative() && !decimal.is_zero() {
            return Err(crate::X402Error::invalid_price(
                input,
                "amount must not be negative",
            ));
        }

        if decimal.normalize().scale() > currency.decimals() {
            return Err(crate::X402Error::invalid_price(
                input,
                format!(
                    "{} supports at most {} decimal places",
                    currency,
                    currency.decimals()
                ),
            ));
        }

        let units = decimal
            .checked_mul(Decimal::from(10u64.pow(currency.decimals())))
            .and_then(|scaled| scaled.to_u64())
            .ok_or_else(|| crate::X402Error::invalid_price(input, "amount is too large"))?;

        Ok(Self::new(units, currency))
    }

    /// The amount expressed in whole currency units
    pub fn as_decimal(&self) -> Decimal {
        Decimal::from_i128_with_scale(i128::from(self.amount), self.currency.decimals())
            .normalize()
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.as_decimal(), self.currency)
    }
}

impl FromStr for Price {
    type Err = crate::X402Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Self::parse(s)
    }
}

/// A priced route pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceEntry {
    /// Route pattern as configured (`/data` or `/files/*`)
    pub pattern: String,
    /// Required price
    pub price: Price,
}

/// Immutable mapping from route pattern to required price.
///
/// Routes without an entry are free. Patterns are exact paths or prefixes
/// ending in `/*`; exact matches win, then the longest prefix.
#[derive(Debug, Clone, Default)]
pub struct PriceTable {
    exact: HashMap<String, PriceEntry>,
    prefixes: Vec<(String, PriceEntry)>,
    currency: Option<Currency>,
}

impl PriceTable {
    /// Create an empty price table (every route is free)
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from route patterns and human-readable prices
    pub fn from_prices<I, K, V>(prices: I) -> crate::Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let entries = prices
            .into_iter()
            .map(|(pattern, price)| Ok((pattern.into(), Price::parse(price.as_ref())?)))
            .collect::<crate::Result<Vec<_>>>()?;
        Self::from_entries(entries)
    }

    /// Build a table from route patterns and already-parsed prices
    pub fn from_entries<I, K>(entries: I) -> crate::Result<Self>
    where
        I: IntoIterator<Item = (K, Price)>,
        K: Into<String>,
    {
        let mut table = Self::new();

        for (pattern, price) in entries {
            let pattern = pattern.into();
            if !pattern.starts_with('/') {
                return Err(crate::X402Error::config(format!(
                    "Route pattern '{}' must start with '/'",
                    pattern
                )));
            }

            match table.currency {
                Some(currency) if currency != price.currency => {
                    return Err(crate::X402Error::config(format!(
                        "Route '{}' is priced in {} but the table uses {}",
                        pattern, price.currency, currency
                    )));
                }
                _ => table.currency = Some(price.currency),
            }

            let entry = PriceEntry {
                pattern: pattern.clone(),
                price,
            };

            let duplicate = if let Some(prefix) = pattern.strip_suffix('*') {
                if !prefix.ends_with('/') {
                    return Err(crate::X402Error::config(format!(
                        "Wildcard route '{}' must end with '/*'",
                        pattern
                    )));
                }
                if table.prefixes.iter().any(|(p, _)| p == prefix) {
                    true
                } else {
                    table.prefixes.push((prefix.to_string(), entry));
                    false
                }
            } else {
                table.exact.insert(pattern.clone(), entry).is_some()
            };

            if duplicate {
                return Err(crate::X402Error::config(format!(
                    "Route '{}' is priced more than once",
                    pattern
                )));
            }
        }

        table
            .prefixes
            .sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()));

        Ok(table)
    }

    /// Look up the price entry governing `path`, if any
    pub fn lookup(&self, path: &str) -> Option<&PriceEntry> {
        if let Some(entry) = self.exact.get(path) {
            return Some(entry);
        }
        self.prefixes
            .iter()
            .find(|(prefix, _)| path.starts_with(prefix.as_str()))
            .map(|(_, entry)| entry)
    }

    /// Currency shared by every entry, `None` for an empty table
    pub fn currency(&self) -> Option<Currency> {
        self.currency
    }

    /// Number of priced patterns
    pub fn len(&self) -> usize {
        self.exact.len() + self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over all entries
    pub fn entries(&self) -> impl Iterator<Item = &PriceEntry> {
        self.exact
            .values()
            .chain(self.prefixes.iter().map(|(_, entry)| entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stx_price() {
        let price = Price::parse("0.01 STX").unwrap();
        assert_eq!(price.amount, 10_000);
        assert_eq!(price.currency, Currency::Stx);
    }

    #[test]
    fn test_parse_sbtc_price() {
        let price = Price::parse("0.00000150 sbtc").unwrap();
        assert_eq!(price.amount, 150);
        assert_eq!(price.currency, Currency::Sbtc);
    }

    #[test]
    fn test_parse_whole_and_zero_prices() {
        assert_eq!(Price::parse("2 STX").unwrap().amount, 2_000_000);
        assert_eq!(Price::parse("0 STX").unwrap().amount, 0);
        assert_eq!(Price::parse("  1.5   stx ").unwrap().amount, 1_500_000);
    }

    #[test]
    fn test_parse_invalid_prices() {
        for input in [
            "abc STX",
            "0.01",
            "0.01 DOGE",
            "-1 STX",
            "0.0000001 STX",
            "1 STX extra",
            "",
            "99999999999999999999 STX",
            "79228162514264337593543950335 STX",
            "10000000000000000000000000 sBTC",
        ] {
            let err = Price::parse(input).unwrap_err();
            assert_eq!(err.kind(), "invalid_price", "input: {:?}", input);
        }
    }

    #[test]
    fn test_price_display() {
        assert_eq!(Price::parse("0.01 STX").unwrap().to_string(), "0.01 STX");
        assert_eq!(Price::new(150, Currency::Sbtc).to_string(), "0.0000015 sBTC");
    }

    #[test]
    fn test_price_table_exact_lookup() {
        let table = PriceTable::from_prices([("/data", "0.01 STX")]).unwrap();
        let entry = table.lookup("/data").unwrap();
        assert_eq!(entry.pattern, "/data");
        assert_eq!(entry.price.amount, 10_000);
        assert!(table.lookup("/").is_none());
        assert!(table.lookup("/data/more").is_none());
        assert_eq!(table.currency(), Some(Currency::Stx));
    }

    #[test]
    fn test_price_table_prefix_lookup() {
        let table = PriceTable::from_prices([
            ("/files/*", "0.01 STX"),
            ("/files/large/*", "0.5 STX"),
            ("/files/readme", "0 STX"),
        ])
        .unwrap();

        assert_eq!(table.lookup("/files/a").unwrap().price.amount, 10_000);
        assert_eq!(table.lookup("/files/large/x").unwrap().price.amount, 500_000);
        assert_eq!(table.lookup("/files/readme").unwrap().pattern, "/files/readme");
        assert!(table.lookup("/files").is_none());
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_price_table_rejects_bad_config() {
        assert!(PriceTable::from_prices([("data", "0.01 STX")]).is_err());
        assert!(PriceTable::from_prices([("/files*", "0.01 STX")]).is_err());
        assert!(PriceTable::from_prices([("/a", "1 STX"), ("/b", "1 sBTC")]).is_err());
        assert!(PriceTable::from_prices([("/a", "1 STX"), ("/a", "2 STX")]).is_err());
        assert!(PriceTable::from_prices([("/a", "one STX")]).is_err());
    }

    #[test]
    fn test_empty_price_table() {
        let table = PriceTable::new();
        assert!(table.is_empty());
        assert!(table.lookup("/anything").is_none());
        assert_eq!(table.currency(), None);
    }
}
