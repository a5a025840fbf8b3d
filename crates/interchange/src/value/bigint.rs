use std::fmt;
use std::str::FromStr;

/// Arbitrary-precision integer kept in canonical decimal form.
///
/// The engine only carries big integers between formats, it never does
/// arithmetic on them, so the decimal digits are the representation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BigInteger {
    negative: bool,
    /// Decimal digits without leading zeros; `"0"` for zero.
    digits: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid big integer literal {0:?}")]
pub struct ParseBigIntegerError(pub String);

impl BigInteger {
    pub fn is_negative(&self) -> bool {
        self.negative
    }

    /// The magnitude as decimal digits.
    pub fn digits(&self) -> &str {
        &self.digits
    }

    /// Returns the value as `i128` when it fits.
    pub fn to_i128(&self) -> Option<i128> {
        self.to_string().parse().ok()
    }
}

impl FromStr for BigInteger {
    type Err = ParseBigIntegerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (negative, body) = match s.as_bytes().first() {
            Some(b'-') => (true, &s[1..]),
            Some(b'+') => (false, &s[1..]),
            _ => (false, s),
        };
        if body.is_empty() || !body.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseBigIntegerError(s.to_owned()));
        }
        let trimmed = body.trim_start_matches('0');
        let digits = if trimmed.is_empty() { "0" } else { trimmed };
        Ok(Self {
            negative: negative && digits != "0",
            digits: digits.to_owned(),
        })
    }
}

impl fmt::Display for BigInteger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negative {
            f.write_str("-")?;
        }
        f.write_str(&self.digits)
    }
}

impl From<i128> for BigInteger {
    fn from(n: i128) -> Self {
        Self {
            negative: n < 0,
            digits: n.unsigned_abs().to_string(),
        }
    }
}

impl From<i64> for BigInteger {
    fn from(n: i64) -> Self {
        Self::from(n as i128)
    }
}

impl From<u64> for BigInteger {
    fn from(n: u64) -> Self {
        Self::from(n as i128)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_canonicalizes() {
        let n: BigInteger = "-000123".parse().unwrap();
        assert_eq!(n.to_string(), "-123");
        let z: BigInteger = "-0".parse().unwrap();
        assert_eq!(z.to_string(), "0");
        assert!(!z.is_negative());
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("".parse::<BigInteger>().is_err());
        assert!("-".parse::<BigInteger>().is_err());
        assert!("12a".parse::<BigInteger>().is_err());
        assert!("1.5".parse::<BigInteger>().is_err());
    }

    #[test]
    fn large_values_survive() {
        let s = "123456789012345678901234567890123456789";
        let n: BigInteger = s.parse().unwrap();
        assert_eq!(n.to_string(), s);
        assert_eq!(n.to_i128(), None);
    }

    #[test]
    fn from_i64() {
        assert_eq!(BigInteger::from(i64::MIN).to_string(), i64::MIN.to_string());
        assert_eq!(BigInteger::from(42i64).to_i128(), Some(42));
    }
}
