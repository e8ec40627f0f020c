//! Parsing helpers for the node's hex-string encodings.
//!
//! Quantities arrive as `0x`-prefixed hex without leading zeros, but nodes in
//! the wild also send plain decimal strings and padded hex, so every numeric
//! parser here accepts both. Fixed-width data (hashes, addresses, blooms) must
//! match its width exactly.

use std::num::IntErrorKind;

use alloy_primitives::{Address, Bytes, B256, U256};
use serde_json::Value;
use thiserror::Error;

/// Why a hex-encoded value was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HexError {
    #[error("empty value")]
    Empty,

    #[error("invalid digits in {0:?}")]
    Invalid(String),

    #[error("value exceeds {bits} bits")]
    Overflow { bits: u32 },

    #[error("expected {expected} bytes, found {found} hex digits")]
    Length { expected: usize, found: usize },
}

fn strip_prefix(s: &str) -> Option<&str> {
    s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))
}

fn is_hex_digits(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_hexdigit())
}

fn is_dec_digits(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_digit())
}

/// Parse a quantity (`"0x1b4"` or `"436"`) into a `u64`.
pub fn parse_u64(s: &str) -> Result<u64, HexError> {
    let (digits, radix) = match strip_prefix(s) {
        Some(hex) => (hex, 16),
        None => (s, 10),
    };
    if digits.is_empty() {
        return Err(HexError::Empty);
    }
    let valid = if radix == 16 { is_hex_digits(digits) } else { is_dec_digits(digits) };
    if !valid {
        return Err(HexError::Invalid(s.to_owned()));
    }
    u64::from_str_radix(digits, radix).map_err(|e| match e.kind() {
        IntErrorKind::PosOverflow => HexError::Overflow { bits: 64 },
        _ => HexError::Invalid(s.to_owned()),
    })
}

/// Parse a quantity into a 256-bit integer.
pub fn parse_u256(s: &str) -> Result<U256, HexError> {
    let (digits, radix) = match strip_prefix(s) {
        Some(hex) => (hex, 16),
        None => (s, 10),
    };
    if digits.is_empty() {
        return Err(HexError::Empty);
    }
    let valid = if radix == 16 { is_hex_digits(digits) } else { is_dec_digits(digits) };
    if !valid {
        return Err(HexError::Invalid(s.to_owned()));
    }
    // Digits are known good here, so any failure is a width overflow.
    U256::from_str_radix(digits, radix).map_err(|_| HexError::Overflow { bits: 256 })
}

/// Parse exactly `N` bytes of hex data.
pub fn parse_array<const N: usize>(s: &str) -> Result<[u8; N], HexError> {
    let digits = strip_prefix(s).unwrap_or(s);
    if digits.is_empty() {
        return Err(HexError::Empty);
    }
    if digits.len() != N * 2 {
        return Err(HexError::Length {
            expected: N,
            found: digits.len(),
        });
    }
    let mut out = [0u8; N];
    hex::decode_to_slice(digits, &mut out).map_err(|_| HexError::Invalid(s.to_owned()))?;
    Ok(out)
}

/// Parse a 32-byte hash.
pub fn parse_b256(s: &str) -> Result<B256, HexError> {
    parse_array::<32>(s).map(B256::from)
}

/// Parse a 20-byte address.
pub fn parse_address(s: &str) -> Result<Address, HexError> {
    parse_array::<20>(s).map(Address::from)
}

/// Parse variable-length hex data. `"0x"` is the empty byte string.
pub fn parse_bytes(s: &str) -> Result<Bytes, HexError> {
    let digits = strip_prefix(s).unwrap_or(s);
    hex::decode(digits)
        .map(Bytes::from)
        .map_err(|_| HexError::Invalid(s.to_owned()))
}

/// Encode `n` as a JSON-RPC quantity parameter (`"0x1b4"`).
pub fn quantity(n: u64) -> Value {
    Value::String(format!("{n:#x}"))
}
