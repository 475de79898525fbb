//! Arbitrary-precision signed decimal integers.
//!
//! On-chain `int` and `nat` values are unbounded, and `mutez` amounts
//! can exceed what lossy host numerics represent, so this type keeps the
//! canonical decimal text itself: an optional `-`, then digits with no
//! leading zeros; zero is `"0"` and never signed. That text is exactly
//! the wire payload of an `{"int": ..}` literal, so conversion in either
//! direction is lossless by construction.

use std::cmp::Ordering;
use std::fmt;

/// A validated, canonical arbitrary-precision integer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BigInt {
    // Canonical form: "-"? nonzero-leading digits, or "0".
    text: String,
}

/// Error for text that is not a decimal integer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("not a decimal integer: '{0}'")]
pub struct ParseBigIntError(pub String);

impl BigInt {
    /// Parse decimal text, normalizing leading zeros and `-0`.
    pub fn parse(text: &str) -> Result<BigInt, ParseBigIntError> {
        let (negative, digits) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseBigIntError(text.to_string()));
        }
        let trimmed = digits.trim_start_matches('0');
        if trimmed.is_empty() {
            return Ok(BigInt {
                text: "0".to_string(),
            });
        }
        let text = if negative {
            format!("-{}", trimmed)
        } else {
            trimmed.to_string()
        };
        Ok(BigInt { text })
    }

    pub fn zero() -> BigInt {
        BigInt {
            text: "0".to_string(),
        }
    }

    /// The canonical decimal text, suitable for an `{"int": ..}` payload.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_negative(&self) -> bool {
        self.text.starts_with('-')
    }

    fn magnitude(&self) -> &str {
        self.text.strip_prefix('-').unwrap_or(&self.text)
    }
}

impl From<i64> for BigInt {
    fn from(v: i64) -> BigInt {
        BigInt {
            text: v.to_string(),
        }
    }
}

impl From<u64> for BigInt {
    fn from(v: u64) -> BigInt {
        BigInt {
            text: v.to_string(),
        }
    }
}

impl fmt::Display for BigInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl Ord for BigInt {
    fn cmp(&self, other: &BigInt) -> Ordering {
        match (self.is_negative(), other.is_negative()) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => cmp_magnitude(self.magnitude(), other.magnitude()),
            (true, true) => cmp_magnitude(other.magnitude(), self.magnitude()),
        }
    }
}

impl PartialOrd for BigInt {
    fn partial_cmp(&self, other: &BigInt) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Canonical magnitudes have no leading zeros, so a longer magnitude is
// strictly larger and equal lengths compare lexicographically.
fn cmp_magnitude(a: &str, b: &str) -> Ordering {
    match a.len().cmp(&b.len()) {
        Ordering::Equal => a.cmp(b),
        other => other,
    }
}
