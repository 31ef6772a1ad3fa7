//! Credit and cost calculation.
//!
//! One credit buys one character in one target language. Money is kept as an
//! integer count of millionths so that totals are exact and repeatable.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::analysis::DocumentAnalysis;

const MICROS_PER_UNIT: u64 = 1_000_000;
const FRACTION_DIGITS: usize = 6;

/// A non-negative fixed-point amount with six fractional digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money {
    micros: u64,
}

impl Money {
    pub const ZERO: Money = Money { micros: 0 };

    pub const fn from_micros(micros: u64) -> Self {
        Self { micros }
    }

    pub const fn micros(&self) -> u64 {
        self.micros
    }

    /// Multiplies by a quantity, saturating at the representable maximum.
    pub fn times(&self, quantity: u64) -> Money {
        Money {
            micros: self.micros.saturating_mul(quantity),
        }
    }

    /// Formats rounded half-up to two decimals, the way totals are shown.
    pub fn display_cents(&self) -> String {
        let cents = (self.micros + 5_000) / 10_000;
        format!("{}.{:02}", cents / 100, cents % 100)
    }
}

impl fmt::Display for Money {
    /// Exact value with at least two decimals.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.micros / MICROS_PER_UNIT;
        let fraction = format!("{:06}", self.micros % MICROS_PER_UNIT);
        let trimmed = fraction.trim_end_matches('0');
        let fraction = if trimmed.len() < 2 {
            &fraction[..2]
        } else {
            trimmed
        };
        write!(f, "{}.{}", whole, fraction)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseMoneyError(String);

impl fmt::Display for ParseMoneyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ParseMoneyError {}

impl FromStr for Money {
    type Err = ParseMoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (whole, fraction) = match s.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (s, ""),
        };

        if whole.is_empty() && fraction.is_empty() {
            return Err(ParseMoneyError("empty amount".to_string()));
        }
        let digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
        if !digits(whole) || !digits(fraction) {
            return Err(ParseMoneyError(format!("'{}' is not a non-negative decimal", s)));
        }
        if fraction.len() > FRACTION_DIGITS {
            return Err(ParseMoneyError(format!(
                "'{}' has more than {} fractional digits",
                s, FRACTION_DIGITS
            )));
        }

        let whole: u64 = if whole.is_empty() {
            0
        } else {
            whole
                .parse()
                .map_err(|_| ParseMoneyError(format!("'{}' is out of range", s)))?
        };
        let fraction: u64 = if fraction.is_empty() {
            0
        } else {
            format!("{:0<6}", fraction)
                .parse()
                .map_err(|_| ParseMoneyError(format!("'{}' is out of range", s)))?
        };

        whole
            .checked_mul(MICROS_PER_UNIT)
            .and_then(|micros| micros.checked_add(fraction))
            .map(Money::from_micros)
            .ok_or_else(|| ParseMoneyError(format!("'{}' is out of range", s)))
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// Accepts either a decimal string or a JSON number.
impl<'de> Deserialize<'de> for Money {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error;
        use serde_json::Value;

        let value = Value::deserialize(deserializer)?;
        let text = match &value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => return Err(D::Error::custom("amount must be a string or number")),
        };
        text.parse().map_err(D::Error::custom)
    }
}

/// Outcome of a cost calculation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculationSummary {
    pub total_chars: u64,
    pub credits_required: u64,
    pub total_cost: Money,
}

/// Pure mapping from an analysis and a language selection to credits and cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CostCalculator {
    unit_price: Money,
}

impl CostCalculator {
    pub fn new(unit_price: Money) -> Self {
        Self { unit_price }
    }

    pub fn unit_price(&self) -> Money {
        self.unit_price
    }

    pub fn calculate(
        &self,
        analysis: &DocumentAnalysis,
        target_languages: &BTreeSet<String>,
    ) -> CalculationSummary {
        let total_chars = analysis
            .char_count
            .saturating_mul(target_languages.len() as u64);

        CalculationSummary {
            total_chars,
            credits_required: total_chars,
            total_cost: self.unit_price.times(total_chars),
        }
    }
}
