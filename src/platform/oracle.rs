//! Simulated primary price source.
//!
//! Stands in for the on-chain exchange the treasury normally prices against.
//! Quotes are set per token through the debug API (or seeded from config), and
//! a token can be forced into a failing state to exercise the manual-rate
//! fallback.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::conversion::{RateSource, RateSourceError};
use crate::types::Address;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum OracleQuote {
    Rate { rate: u128 },
    Failing { reason: String },
}

/// Cloneable handle; every clone sees the same quote table.
#[derive(Debug, Clone, Default)]
pub struct SimulatedOracle {
    quotes: Arc<RwLock<HashMap<Address, OracleQuote>>>,
}

impl SimulatedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_rate(&self, token: Address, rate: u128) {
        self.write(token, OracleQuote::Rate { rate });
    }

    pub fn set_failing(&self, token: Address, reason: impl Into<String>) {
        self.write(
            token,
            OracleQuote::Failing {
                reason: reason.into(),
            },
        );
    }

    /// Returns `true` if a quote was removed.
    pub fn clear(&self, token: &Address) -> bool {
        let mut quotes = self.quotes.write().unwrap_or_else(|e| e.into_inner());
        quotes.remove(token).is_some()
    }

    pub fn quote(&self, token: &Address) -> Option<OracleQuote> {
        let quotes = self.quotes.read().unwrap_or_else(|e| e.into_inner());
        quotes.get(token).cloned()
    }

    /// All quotes, in token order.
    pub fn quotes(&self) -> Vec<(Address, OracleQuote)> {
        let quotes = self.quotes.read().unwrap_or_else(|e| e.into_inner());
        let mut list: Vec<(Address, OracleQuote)> =
            quotes.iter().map(|(t, q)| (*t, q.clone())).collect();
        list.sort_by_key(|(token, _)| *token);
        list
    }

    fn write(&self, token: Address, quote: OracleQuote) {
        let mut quotes = self.quotes.write().unwrap_or_else(|e| e.into_inner());
        quotes.insert(token, quote);
    }
}

impl RateSource for SimulatedOracle {
    fn rate(&self, token: &Address, _amount: u128) -> Result<u128, RateSourceError> {
        match self.quote(token) {
            Some(OracleQuote::Rate { rate }) => Ok(rate),
            Some(OracleQuote::Failing { reason }) => Err(RateSourceError(reason)),
            None => Err(RateSourceError(format!("no exchange quote for {}", token))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_quotes() {
        let oracle = SimulatedOracle::new();
        let handle = oracle.clone();
        let token = Address::from_low_u64(5);

        handle.set_rate(token, 42);
        assert_eq!(oracle.rate(&token, 1), Ok(42));

        handle.set_failing(token, "halted");
        assert_eq!(oracle.rate(&token, 1), Err(RateSourceError("halted".into())));

        assert!(handle.clear(&token));
        assert!(oracle.rate(&token, 1).is_err());
        assert!(oracle.quotes().is_empty());
    }
}
