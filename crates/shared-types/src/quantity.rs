//! # Hex Quantity Codecs
//!
//! EVM JSON-RPC encodes numeric quantities as `0x`-prefixed hex strings
//! with no leading zeros. These helpers convert between that wire form and
//! native integers at the node-client boundary.

use ethereum_types::U256;
use thiserror::Error;

/// Errors from quantity parsing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QuantityError {
    /// The string did not start with `0x`.
    #[error("Quantity missing 0x prefix: {0:?}")]
    MissingPrefix(String),

    /// The string had a prefix but no digits.
    #[error("Quantity has no digits: {0:?}")]
    Empty(String),

    /// The digits were not valid hexadecimal or overflowed the target type.
    #[error("Invalid hex quantity: {0:?}")]
    Invalid(String),
}

fn strip_prefix(s: &str) -> Result<&str, QuantityError> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .ok_or_else(|| QuantityError::MissingPrefix(s.to_string()))?;
    if digits.is_empty() {
        return Err(QuantityError::Empty(s.to_string()));
    }
    Ok(digits)
}

/// Parse a `0x…` quantity into a `u64`.
pub fn parse_u64(s: &str) -> Result<u64, QuantityError> {
    let digits = strip_prefix(s)?;
    u64::from_str_radix(digits, 16).map_err(|_| QuantityError::Invalid(s.to_string()))
}

/// Parse a `0x…` quantity into a `U256`.
pub fn parse_u256(s: &str) -> Result<U256, QuantityError> {
    let digits = strip_prefix(s)?;
    U256::from_str_radix(digits, 16).map_err(|_| QuantityError::Invalid(s.to_string()))
}

/// Format a `u64` as a minimal `0x…` quantity.
#[must_use]
pub fn format_u64(value: u64) -> String {
    format!("0x{value:x}")
}

/// Parse `0x…`-prefixed binary data (headers, calldata) into bytes.
///
/// Unlike quantities, data fields keep leading zeros; an empty payload is
/// the literal `0x`.
pub fn parse_bytes(s: &str) -> Result<Vec<u8>, QuantityError> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .ok_or_else(|| QuantityError::MissingPrefix(s.to_string()))?;
    hex::decode(digits).map_err(|_| QuantityError::Invalid(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_u64() {
        assert_eq!(parse_u64("0x0").unwrap(), 0);
        assert_eq!(parse_u64("0x10").unwrap(), 16);
        assert_eq!(parse_u64("0xdeadbeef").unwrap(), 0xdead_beef);
    }

    #[test]
    fn test_parse_u64_rejects_missing_prefix() {
        assert!(matches!(
            parse_u64("10"),
            Err(QuantityError::MissingPrefix(_))
        ));
    }

    #[test]
    fn test_parse_u64_rejects_empty_digits() {
        assert!(matches!(parse_u64("0x"), Err(QuantityError::Empty(_))));
    }

    #[test]
    fn test_parse_u64_rejects_garbage() {
        assert!(matches!(parse_u64("0xzz"), Err(QuantityError::Invalid(_))));
    }

    #[test]
    fn test_parse_u256() {
        let v = parse_u256("0xde0b6b3a7640000").unwrap(); // 1 ether
        assert_eq!(v, U256::from(1_000_000_000_000_000_000u64));
    }

    #[test]
    fn test_format_round_trip() {
        for v in [0u64, 1, 16, u64::MAX] {
            assert_eq!(parse_u64(&format_u64(v)).unwrap(), v);
        }
    }

    #[test]
    fn test_parse_bytes() {
        assert_eq!(parse_bytes("0x").unwrap(), Vec::<u8>::new());
        assert_eq!(parse_bytes("0x00ff").unwrap(), vec![0x00, 0xff]);
        assert!(parse_bytes("00ff").is_err());
    }
}
