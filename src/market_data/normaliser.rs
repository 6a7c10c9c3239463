// Convert venue wire encodings into the canonical model:
// native symbol strings -> CanonicalSymbol, string-or-number fields -> f64.

use serde::{Deserialize, Serialize};

use crate::error::FetchError;
use crate::market_data::types::{CanonicalSymbol, Level};

/// How a venue spells a symbol, e.g. `BTC-USDT-SWAP` or `cmt_btcusdt`.
/// Matching ignores case.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SymbolConvention {
    /// Between base and quote; empty when the venue concatenates them.
    pub separator: String,
    pub prefix: String,
    pub suffix: String,
}

impl SymbolConvention {
    pub fn separated(separator: &str) -> Self {
        Self { separator: separator.to_string(), ..Self::default() }
    }

    pub fn concatenated() -> Self {
        Self::default()
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_string();
        self
    }

    pub fn with_suffix(mut self, suffix: &str) -> Self {
        self.suffix = suffix.to_string();
        self
    }

    /// Native -> canonical. `quotes` resolves concatenated symbols such as
    /// `BTCUSDT`; the longest matching quote wins.
    pub fn to_canonical(&self, native: &str, quotes: &[String]) -> Option<CanonicalSymbol> {
        let upper = native.trim().to_ascii_uppercase();
        let body = strip_prefix_ci(&upper, &self.prefix)?;
        let body = strip_suffix_ci(body, &self.suffix)?;

        if !self.separator.is_empty() {
            let (base, quote) = body.split_once(self.separator.to_ascii_uppercase().as_str())?;
            return CanonicalSymbol::new(base, quote);
        }

        let mut candidates: Vec<&String> = quotes.iter().collect();
        candidates.sort_by_key(|q| std::cmp::Reverse(q.len()));
        candidates.into_iter().find_map(|quote| {
            let quote = quote.to_ascii_uppercase();
            body.strip_suffix(quote.as_str())
                .filter(|base| !base.is_empty())
                .and_then(|base| CanonicalSymbol::new(base, &quote))
        })
    }
}

fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix.is_empty() {
        return Some(s);
    }
    s.strip_prefix(prefix.to_ascii_uppercase().as_str())
}

fn strip_suffix_ci<'a>(s: &'a str, suffix: &str) -> Option<&'a str> {
    if suffix.is_empty() {
        return Some(s);
    }
    s.strip_suffix(suffix.to_ascii_uppercase().as_str())
}

/// A numeric field that some venues send as a JSON string and others as a
/// JSON number.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawNumber {
    Number(f64),
    Text(String),
}

impl RawNumber {
    pub fn value(&self) -> Result<f64, FetchError> {
        match self {
            RawNumber::Number(n) => Ok(*n),
            RawNumber::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| FetchError::malformed(format!("not a number: {s:?}"))),
        }
    }
}

/// Array-encoded level: `[price, size, ...]`. Trailing elements (order
/// counts, liquidation flags) are ignored.
pub type RawLevel = Vec<RawNumber>;

/// Converts array-encoded levels to canonical ones.
///
/// Sizes are multiplied by `contract_size`. Zero-size levels are venue
/// padding and are dropped; levels are never synthesised.
pub fn levels_from_arrays(raw: &[RawLevel], contract_size: f64) -> Result<Vec<Level>, FetchError> {
    raw.iter()
        .map(|entry| match entry.as_slice() {
            [price, size, ..] => Ok((price.value()?, size.value()?)),
            _ => Err(FetchError::malformed(format!("level has {} fields, expected >= 2", entry.len()))),
        })
        .filter_map(|parsed| match parsed {
            Ok((_, size)) if size == 0.0 => None,
            Ok((price, size)) => Some(Ok(Level::new(price, size * contract_size))),
            Err(e) => Some(Err(e)),
        })
        .collect()
}

/// Same as [`levels_from_arrays`] for already-parsed pairs.
pub fn levels_from_pairs(raw: &[(f64, f64)], contract_size: f64) -> Vec<Level> {
    raw.iter()
        .filter(|(_, size)| *size != 0.0)
        .map(|&(price, size)| Level::new(price, size * contract_size))
        .collect()
}
