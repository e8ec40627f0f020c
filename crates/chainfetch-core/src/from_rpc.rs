//! Conversion of raw JSON-RPC results into typed values.
//!
//! Only types implementing [`FromRpc`] can be requested through the
//! [`Client`](crate::Client), so asking for an unsupported result type is a
//! compile-time error rather than a runtime one.

use std::fmt;

use alloy_primitives::{Address, Bytes, B256, U256};
use serde_json::value::RawValue;
use serde_json::Value;

use crate::error::{DecodeError, FieldError, FieldErrors};
use crate::hex::{self, HexError};

/// A decode that did not fully succeed, with whatever could be recovered.
///
/// Records decode best-effort: a bad field leaves its slot at the default
/// while every other field is still populated, so `value` is `Some` for
/// partial records and `None` when nothing usable was produced.
#[derive(Debug)]
pub struct Partial<T> {
    pub value: Option<T>,
    pub error: DecodeError,
}

impl<T> Partial<T> {
    pub fn new(value: Option<T>, error: DecodeError) -> Self {
        Self { value, error }
    }

    /// Nothing recovered; the payload was malformed.
    pub fn malformed(err: serde_json::Error) -> Self {
        Self::new(None, DecodeError::Malformed(err))
    }

    /// Nothing recovered; the node returned `null`.
    pub fn null() -> Self {
        Self::new(None, DecodeError::Null)
    }

    pub fn into_parts(self) -> (Option<T>, DecodeError) {
        (self.value, self.error)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Partial<U> {
        Partial {
            value: self.value.map(f),
            error: self.error,
        }
    }
}

impl<T> fmt::Display for Partial<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl<T: fmt::Debug> std::error::Error for Partial<T> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// A type that can be produced from one raw JSON-RPC `result`.
pub trait FromRpc: Sized {
    fn from_rpc(raw: &RawValue) -> Result<Self, Partial<Self>>;
}

/// Returns `true` if the raw result is the JSON literal `null`.
pub fn is_null(raw: &RawValue) -> bool {
    raw.get().trim() == "null"
}

// ─── Untyped results ──────────────────────────────────────────────────────────

impl FromRpc for Box<RawValue> {
    fn from_rpc(raw: &RawValue) -> Result<Self, Partial<Self>> {
        Ok(raw.to_owned())
    }
}

impl FromRpc for Value {
    fn from_rpc(raw: &RawValue) -> Result<Self, Partial<Self>> {
        serde_json::from_str(raw.get()).map_err(Partial::malformed)
    }
}

impl FromRpc for String {
    fn from_rpc(raw: &RawValue) -> Result<Self, Partial<Self>> {
        serde_json::from_str(raw.get()).map_err(Partial::malformed)
    }
}

impl FromRpc for bool {
    fn from_rpc(raw: &RawValue) -> Result<Self, Partial<Self>> {
        serde_json::from_str(raw.get()).map_err(Partial::malformed)
    }
}

// ─── Hex-encoded scalars ──────────────────────────────────────────────────────

/// Decode a hex-string result with `parse`; JSON numbers are accepted for quantities.
fn scalar<T>(
    raw: &RawValue,
    what: &'static str,
    parse: fn(&str) -> Result<T, HexError>,
    from_number: Option<fn(u64) -> T>,
) -> Result<T, Partial<T>> {
    let value: Value = serde_json::from_str(raw.get()).map_err(Partial::malformed)?;
    let parsed = match (&value, from_number) {
        (Value::String(s), _) => parse(s),
        (Value::Number(n), Some(from)) => match n.as_u64() {
            Some(n) => Ok(from(n)),
            None => Err(HexError::Invalid(n.to_string())),
        },
        (Value::Null, _) => return Err(Partial::null()),
        _ => {
            return Err(Partial::new(
                None,
                DecodeError::Shape {
                    expected: what,
                    found: json_kind(&value),
                },
            ))
        }
    };
    parsed.map_err(|e| {
        let mut errors = FieldErrors::new();
        errors.push(FieldError::new("result", e.to_string()));
        Partial::new(None, DecodeError::Fields(errors))
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn u64_number(n: u64) -> u64 {
    n
}

fn u256_number(n: u64) -> U256 {
    U256::from(n)
}

impl FromRpc for u64 {
    fn from_rpc(raw: &RawValue) -> Result<Self, Partial<Self>> {
        scalar(raw, "quantity", hex::parse_u64, Some(u64_number as fn(u64) -> u64))
    }
}

impl FromRpc for U256 {
    fn from_rpc(raw: &RawValue) -> Result<Self, Partial<Self>> {
        scalar(raw, "quantity", hex::parse_u256, Some(u256_number as fn(u64) -> U256))
    }
}

impl FromRpc for B256 {
    fn from_rpc(raw: &RawValue) -> Result<Self, Partial<Self>> {
        scalar(raw, "hash", hex::parse_b256, None)
    }
}

impl FromRpc for Address {
    fn from_rpc(raw: &RawValue) -> Result<Self, Partial<Self>> {
        scalar(raw, "address", hex::parse_address, None)
    }
}

impl FromRpc for Bytes {
    fn from_rpc(raw: &RawValue) -> Result<Self, Partial<Self>> {
        scalar(raw, "hex data", hex::parse_bytes, None)
    }
}

// ─── Containers ───────────────────────────────────────────────────────────────

/// `null` decodes to `None`; anything else decodes as `T`.
impl<T: FromRpc> FromRpc for Option<T> {
    fn from_rpc(raw: &RawValue) -> Result<Self, Partial<Self>> {
        if is_null(raw) {
            return Ok(None);
        }
        T::from_rpc(raw).map(Some).map_err(|p| p.map(Some))
    }
}

/// Element-wise decode. Failed elements are reported under `[index]` and
/// partial elements are kept; elements that produced nothing are dropped.
impl<T: FromRpc> FromRpc for Vec<T> {
    fn from_rpc(raw: &RawValue) -> Result<Self, Partial<Self>> {
        if is_null(raw) {
            return Err(Partial::null());
        }
        let elements: Vec<&RawValue> =
            serde_json::from_str(raw.get()).map_err(Partial::malformed)?;

        let mut out = Vec::with_capacity(elements.len());
        let mut errors = FieldErrors::new();
        for (i, element) in elements.into_iter().enumerate() {
            match T::from_rpc(element) {
                Ok(v) => out.push(v),
                Err(Partial { value, error }) => {
                    let prefix = format!("[{i}]");
                    match error {
                        DecodeError::Fields(nested) => errors.absorb(&prefix, nested),
                        other => errors.push(FieldError::new(prefix, other.to_string())),
                    }
                    out.extend(value);
                }
            }
        }

        if errors.is_empty() {
            Ok(out)
        } else {
            Err(Partial::new(Some(out), DecodeError::Fields(errors)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(json: &str) -> Box<RawValue> {
        RawValue::from_string(json.to_owned()).unwrap()
    }

    #[test]
    fn quantities_from_string_or_number() {
        assert_eq!(u64::from_rpc(&raw(r#""0x14F8C31""#)).unwrap(), 21_990_449);
        assert_eq!(u64::from_rpc(&raw("42")).unwrap(), 42);
        assert_eq!(U256::from_rpc(&raw(r#""0x100""#)).unwrap(), U256::from(256u64));
    }

    #[test]
    fn quantity_errors() {
        let err = u64::from_rpc(&raw(r#""bogus""#)).unwrap_err();
        assert!(err.value.is_none());
        assert!(err.error.field_errors().unwrap().contains("result"));

        let err = u64::from_rpc(&raw("null")).unwrap_err();
        assert!(matches!(err.error, DecodeError::Null));

        let err = u64::from_rpc(&raw("[1]")).unwrap_err();
        assert!(matches!(
            err.error,
            DecodeError::Shape {
                found: "array",
                ..
            }
        ));
    }

    #[test]
    fn option_maps_null_to_none() {
        assert_eq!(Option::<u64>::from_rpc(&raw("null")).unwrap(), None);
        assert_eq!(Option::<u64>::from_rpc(&raw(r#""0x1""#)).unwrap(), Some(1));
    }

    #[test]
    fn vec_reports_failed_elements_by_index() {
        let err = Vec::<u64>::from_rpc(&raw(r#"["0x1","nope","0x3"]"#)).unwrap_err();
        assert_eq!(err.value.as_deref(), Some(&[1u64, 3][..]));
        let fields = err.error.field_errors().unwrap();
        assert!(fields.contains("[1].result"));
    }

    #[test]
    fn raw_passthrough() {
        let v = Box::<RawValue>::from_rpc(&raw(r#"{"a":1}"#)).unwrap();
        assert_eq!(v.get(), r#"{"a":1}"#);
        let v = Value::from_rpc(&raw(r#"{"a":1}"#)).unwrap();
        assert_eq!(v["a"], 1);
    }
}
