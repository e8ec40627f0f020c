//! Lenient token readers shared by the record decoders.
//!
//! Every value in a record is first read as a [`WireValue`], which accepts any
//! JSON kind, so a field of the wrong kind becomes a field error instead of
//! aborting the whole record. Lists of records use [`WireList`] and
//! [`Lenient`] for the same reason.

use std::borrow::Cow;
use std::fmt;
use std::marker::PhantomData;

use alloy_primitives::{Address, Bytes, B256, U256};
use chainfetch_core::error::{DecodeError, FieldError, FieldErrors};
use chainfetch_core::from_rpc::Partial;
use chainfetch_core::hex::{self, HexError};
use serde::de::{self, DeserializeOwned, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer};
use tracing::debug;

use crate::cold::{ColdBlob, ColdSchema, ColdStaging};
use crate::quantity::Quantity;

/// One JSON value, borrowed from the input where no escape forces a copy.
/// Arrays and objects are skipped and only their kind is kept.
#[derive(Debug)]
pub(crate) enum WireValue<'de> {
    Str(Cow<'de, str>),
    Uint(u64),
    Bool(bool),
    Null,
    Other(&'static str),
}

impl WireValue<'_> {
    pub(crate) fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Str(_) => "string",
            Self::Uint(_) => "number",
            Self::Bool(_) => "boolean",
            Self::Null => "null",
            Self::Other(kind) => kind,
        }
    }
}

impl<'de> Deserialize<'de> for WireValue<'de> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ValueVisitor;

        impl<'de> Visitor<'de> for ValueVisitor {
            type Value = WireValue<'de>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("any JSON value")
            }

            fn visit_borrowed_str<E: de::Error>(self, v: &'de str) -> Result<Self::Value, E> {
                Ok(WireValue::Str(Cow::Borrowed(v)))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(WireValue::Str(Cow::Owned(v.to_owned())))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
                Ok(WireValue::Str(Cow::Owned(v)))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(WireValue::Uint(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(u64::try_from(v).map_or(WireValue::Other("negative number"), WireValue::Uint))
            }

            fn visit_f64<E: de::Error>(self, _: f64) -> Result<Self::Value, E> {
                Ok(WireValue::Other("non-integer number"))
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
                Ok(WireValue::Bool(v))
            }

            fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(WireValue::Null)
            }

            fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(WireValue::Null)
            }

            fn visit_seq<A: SeqAccess<'de>>(self, seq: A) -> Result<Self::Value, A::Error> {
                IgnoredAny.visit_seq(seq)?;
                Ok(WireValue::Other("array"))
            }

            fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<Self::Value, A::Error> {
                IgnoredAny.visit_map(map)?;
                Ok(WireValue::Other("object"))
            }
        }

        deserializer.deserialize_any(ValueVisitor)
    }
}

/// Scalar kinds that a list or record position does not accept.
macro_rules! reject_scalars {
    ($ty:ident) => {
        fn visit_bool<E: de::Error>(self, _: bool) -> Result<Self::Value, E> {
            Ok($ty::Other("boolean"))
        }

        fn visit_u64<E: de::Error>(self, _: u64) -> Result<Self::Value, E> {
            Ok($ty::Other("number"))
        }

        fn visit_i64<E: de::Error>(self, _: i64) -> Result<Self::Value, E> {
            Ok($ty::Other("number"))
        }

        fn visit_f64<E: de::Error>(self, _: f64) -> Result<Self::Value, E> {
            Ok($ty::Other("number"))
        }
    };
}

/// A list element that should be a record but may be anything.
#[derive(Debug)]
pub(crate) enum Lenient<'de, T> {
    Record(T),
    Str(Cow<'de, str>),
    Other(&'static str),
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Lenient<'de, T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct LenientVisitor<T>(PhantomData<T>);

        impl<'de, T: Deserialize<'de>> Visitor<'de> for LenientVisitor<T> {
            type Value = Lenient<'de, T>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object or a string")
            }

            reject_scalars!(Lenient);

            fn visit_borrowed_str<E: de::Error>(self, v: &'de str) -> Result<Self::Value, E> {
                Ok(Lenient::Str(Cow::Borrowed(v)))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(Lenient::Str(Cow::Owned(v.to_owned())))
            }

            fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(Lenient::Other("null"))
            }

            fn visit_seq<A: SeqAccess<'de>>(self, seq: A) -> Result<Self::Value, A::Error> {
                IgnoredAny.visit_seq(seq)?;
                Ok(Lenient::Other("array"))
            }

            fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<Self::Value, A::Error> {
                T::deserialize(de::value::MapAccessDeserializer::new(map)).map(Lenient::Record)
            }
        }

        deserializer.deserialize_any(LenientVisitor(PhantomData))
    }
}

/// A JSON array of `T`, or whatever stood in its place.
#[derive(Debug)]
pub(crate) enum WireList<T> {
    Items(Vec<T>),
    Null,
    Other(&'static str),
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for WireList<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ListVisitor<T>(PhantomData<T>);

        impl<'de, T: Deserialize<'de>> Visitor<'de> for ListVisitor<T> {
            type Value = WireList<T>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an array")
            }

            reject_scalars!(WireList);

            fn visit_str<E: de::Error>(self, _: &str) -> Result<Self::Value, E> {
                Ok(WireList::Other("string"))
            }

            fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(WireList::Null)
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(item) = seq.next_element()? {
                    items.push(item);
                }
                Ok(WireList::Items(items))
            }

            fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<Self::Value, A::Error> {
                IgnoredAny.visit_map(map)?;
                Ok(WireList::Other("object"))
            }
        }

        deserializer.deserialize_any(ListVisitor(PhantomData))
    }
}

// ─── Field reader ─────────────────────────────────────────────────────────────

/// A decoded record that carries its own field errors.
pub(crate) trait Record {
    const KIND: &'static str;

    fn errors(&self) -> &FieldErrors;
}

/// Converts wire values into typed hot slots, collecting field errors.
///
/// Null leaves a slot at its zero value without an error; every other
/// mismatch records an error and also leaves the zero value.
#[derive(Default)]
pub(crate) struct FieldReader {
    errors: FieldErrors,
}

impl FieldReader {
    pub(crate) fn fail(&mut self, field: &str, reason: impl fmt::Display) {
        self.errors.push(FieldError::new(field, reason.to_string()));
    }

    fn parse<T>(
        &mut self,
        field: &str,
        value: WireValue<'_>,
        parse: fn(&str) -> Result<T, HexError>,
        from_uint: Option<fn(u64) -> T>,
    ) -> Option<T> {
        let parsed = match (value, from_uint) {
            (WireValue::Null, _) => return None,
            (WireValue::Str(s), _) => parse(&s),
            (WireValue::Uint(n), Some(from)) => Ok(from(n)),
            (other, _) => {
                self.fail(field, format_args!("unexpected {}", other.kind()));
                return None;
            }
        };
        parsed.map_err(|e| self.fail(field, e)).ok()
    }

    pub(crate) fn quantity(&mut self, field: &str, value: WireValue<'_>, slot: &Quantity) {
        if let Some(n) = self.parse(field, value, hex::parse_u64, Some(uint as fn(u64) -> u64)) {
            slot.set(n);
        }
    }

    pub(crate) fn u256(&mut self, field: &str, value: WireValue<'_>) -> U256 {
        self.parse(field, value, hex::parse_u256, Some(U256::from as fn(u64) -> U256))
            .unwrap_or_default()
    }

    /// An 8-bit type tag, e.g. a transaction's `type`.
    pub(crate) fn u8(&mut self, field: &str, value: WireValue<'_>) -> Option<u8> {
        let n = self.parse(field, value, hex::parse_u64, Some(uint as fn(u64) -> u64))?;
        u8::try_from(n)
            .map_err(|_| self.fail(field, HexError::Overflow { bits: 8 }))
            .ok()
    }

    pub(crate) fn b256(&mut self, field: &str, value: WireValue<'_>) -> B256 {
        self.parse(field, value, hex::parse_b256, None).unwrap_or_default()
    }

    pub(crate) fn opt_b256(&mut self, field: &str, value: WireValue<'_>) -> Option<B256> {
        self.parse(field, value, hex::parse_b256, None)
    }

    pub(crate) fn address(&mut self, field: &str, value: WireValue<'_>) -> Address {
        self.opt_address(field, value).unwrap_or_default()
    }

    pub(crate) fn opt_address(&mut self, field: &str, value: WireValue<'_>) -> Option<Address> {
        self.parse(field, value, hex::parse_address, None)
    }

    pub(crate) fn bytes(&mut self, field: &str, value: WireValue<'_>) -> Bytes {
        self.parse(field, value, hex::parse_bytes, None).unwrap_or_default()
    }

    pub(crate) fn flag(&mut self, field: &str, value: WireValue<'_>) -> bool {
        match value {
            WireValue::Bool(b) => b,
            WireValue::Null => false,
            other => {
                self.fail(field, format_args!("expected boolean, found {}", other.kind()));
                false
            }
        }
    }

    /// A list of 32-byte hashes (topics, uncles).
    pub(crate) fn hashes(&mut self, field: &str, list: WireList<WireValue<'_>>) -> Vec<B256> {
        match list {
            WireList::Null => Vec::new(),
            WireList::Other(kind) => {
                self.fail(field, format_args!("expected array, found {kind}"));
                Vec::new()
            }
            WireList::Items(items) => items
                .into_iter()
                .enumerate()
                .filter_map(|(i, v)| {
                    let path = format!("{field}[{i}]");
                    if v.is_null() {
                        self.fail(&path, "expected hash, found null");
                        return None;
                    }
                    self.opt_b256(&path, v)
                })
                .collect(),
        }
    }

    /// A list of nested records. Nested field errors are folded in under
    /// `field[index]`; elements that are not objects are list errors.
    pub(crate) fn records<R: Record>(&mut self, field: &str, list: WireList<Lenient<'_, R>>) -> Vec<R> {
        match list {
            WireList::Null => Vec::new(),
            WireList::Other(kind) => {
                self.fail(field, format_args!("expected array, found {kind}"));
                Vec::new()
            }
            WireList::Items(items) => items
                .into_iter()
                .enumerate()
                .filter_map(|(i, item)| self.element(field, i, item))
                .collect(),
        }
    }

    /// One element of a record list.
    pub(crate) fn element<R: Record>(&mut self, field: &str, index: usize, item: Lenient<'_, R>) -> Option<R> {
        match item {
            Lenient::Record(record) => {
                if !record.errors().is_empty() {
                    self.errors.absorb(&format!("{field}[{index}]"), record.errors().clone());
                }
                Some(record)
            }
            Lenient::Str(_) => {
                self.fail(&format!("{field}[{index}]"), format_args!("expected {}, found string", R::KIND));
                None
            }
            Lenient::Other(kind) => {
                self.fail(&format!("{field}[{index}]"), format_args!("expected {}, found {kind}", R::KIND));
                None
            }
        }
    }

    /// Stage a cold field's raw text. Numbers are kept in canonical hex.
    pub(crate) fn cold<'de>(
        &mut self,
        staging: &mut ColdStaging<'de>,
        schema: &ColdSchema,
        tag: u8,
        value: WireValue<'de>,
    ) {
        match value {
            WireValue::Str(s) => staging.insert(tag, s),
            WireValue::Uint(n) => staging.insert(tag, Cow::Owned(format!("{n:#x}"))),
            WireValue::Null => {}
            other => self.fail(
                schema.name_of(tag).unwrap_or_default(),
                format_args!("expected string, found {}", other.kind()),
            ),
        }
    }

    /// Pack the cold fields and hand back the blob with every error recorded.
    pub(crate) fn finish(mut self, staging: ColdStaging<'_>) -> (ColdBlob, FieldErrors) {
        let blob = match staging.encode() {
            Ok(blob) => blob,
            Err(e) => {
                self.fail("<cold>", e);
                ColdBlob::default()
            }
        };
        (blob, self.errors)
    }
}

fn uint(n: u64) -> u64 {
    n
}

// ─── Entry-point helpers ──────────────────────────────────────────────────────

fn is_null(raw: &[u8]) -> bool {
    std::str::from_utf8(raw).is_ok_and(|s| s.trim() == "null")
}

/// Decode one record, returning it as a partial value if any field failed.
pub(crate) fn decode_one<R: Record + DeserializeOwned>(raw: &[u8]) -> Result<R, Partial<R>> {
    if is_null(raw) {
        return Err(Partial::null());
    }
    let record: R = serde_json::from_slice(raw).map_err(Partial::malformed)?;
    if record.errors().is_empty() {
        return Ok(record);
    }
    debug!(record = R::KIND, errors = record.errors().len(), "record decoded with field errors");
    let errors = record.errors().clone();
    Err(Partial::new(Some(record), DecodeError::Fields(errors)))
}

/// Decode an array of records in one pass.
pub(crate) fn decode_many<R: Record + DeserializeOwned>(raw: &[u8]) -> Result<Vec<R>, Partial<Vec<R>>> {
    if is_null(raw) {
        return Err(Partial::null());
    }
    let list: WireList<Lenient<'_, R>> = serde_json::from_slice(raw).map_err(Partial::malformed)?;
    if let WireList::Other(found) = list {
        return Err(Partial::new(
            None,
            DecodeError::Shape {
                expected: "array",
                found,
            },
        ));
    }
    let mut reader = FieldReader::default();
    let records = reader.records("", list);
    if reader.errors.is_empty() {
        return Ok(records);
    }
    debug!(record = R::KIND, errors = reader.errors.len(), "record list decoded with field errors");
    Err(Partial::new(Some(records), DecodeError::Fields(reader.errors)))
}
