use std::collections::HashMap;

use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RateLookupError {
    #[error("no conversion rate configured from `{from}` to `{to}`")]
    MissingRate { from: String, to: String },
}

/// External collaborator supplying conversion rates into the company
/// currency. Live lookups are out of scope; callers inject whichever
/// implementation fits.
pub trait RateLookup: Send + Sync {
    fn rate(&self, from: &str, to: &str) -> Result<Decimal, RateLookupError>;
}

/// Deterministic rate table for tests, fixtures, and offline use.
/// Same-currency conversion is always identity.
#[derive(Clone, Debug, Default)]
pub struct FixedRateTable {
    rates: HashMap<(String, String), Decimal>,
}

impl FixedRateTable {
    pub fn new(rates: Vec<(&str, &str, Decimal)>) -> Self {
        Self {
            rates: rates
                .into_iter()
                .map(|(from, to, rate)| ((normalize(from), normalize(to)), rate))
                .collect(),
        }
    }
}

impl RateLookup for FixedRateTable {
    fn rate(&self, from: &str, to: &str) -> Result<Decimal, RateLookupError> {
        let from_key = normalize(from);
        let to_key = normalize(to);
        if from_key == to_key {
            return Ok(Decimal::ONE);
        }

        self.rates.get(&(from_key, to_key)).copied().ok_or_else(|| {
            RateLookupError::MissingRate { from: from.to_string(), to: to.to_string() }
        })
    }
}

fn normalize(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}
