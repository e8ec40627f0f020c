//! Cold-field codec: rarely read wire fields packed into one compact blob.
//!
//! A record's cold fields are staged as the raw strings seen on the wire
//! (borrowed from the input where possible), then packed once at the end of
//! the decode pass. Each record type owns a static [`ColdSchema`]; a field's
//! tag is its index in the schema. The blob is the borsh encoding of
//! `Vec<(tag: u8, value: String)>`, sorted by tag, so equal inputs always
//! produce equal blobs.
//!
//! Decoding is a pure function of the blob: every call materializes a fresh
//! [`ColdFields`] owned by the caller. Nothing is cached back into the record.

use std::borrow::Cow;
use std::fmt;
use std::io;

use borsh::{BorshDeserialize, BorshSerialize};
use chainfetch_core::error::CodecError;
use alloy_primitives::{Bloom, B64};
use chainfetch_core::hex::{self, HexError};

/// Typed getters over a record's `cold` blob, one per schema field.
macro_rules! cold_accessors {
    ($schema:expr; $( $(#[$doc:meta])* $name:ident -> $ty:ty = $field:literal, $parse:expr; )*) => {
        $(
            $(#[$doc])*
            pub fn $name(&self) -> Result<$ty, chainfetch_core::error::CodecError> {
                $crate::cold::read(&$schema, &self.cold, $field, $parse)
            }
        )*
    };
}

/// Ordered wire names of one record type's cold fields.
#[derive(Debug, PartialEq, Eq)]
pub struct ColdSchema {
    record: &'static str,
    fields: &'static [&'static str],
}

impl ColdSchema {
    pub const fn new(record: &'static str, fields: &'static [&'static str]) -> Self {
        Self { record, fields }
    }

    /// Record type name, e.g. `"block"`.
    pub fn record(&self) -> &'static str {
        self.record
    }

    pub fn fields(&self) -> &'static [&'static str] {
        self.fields
    }

    pub fn tag_of(&self, name: &str) -> Option<u8> {
        self.fields
            .iter()
            .position(|f| *f == name)
            .and_then(|i| u8::try_from(i).ok())
    }

    pub fn name_of(&self, tag: u8) -> Option<&'static str> {
        self.fields.get(usize::from(tag)).copied()
    }
}

/// Cold values collected during one decode pass.
#[derive(Debug, Default)]
pub struct ColdStaging<'a> {
    entries: Vec<(u8, Cow<'a, str>)>,
}

impl<'a> ColdStaging<'a> {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Stage `value` under `tag`, replacing an earlier value for the same tag.
    pub fn insert(&mut self, tag: u8, value: Cow<'a, str>) {
        match self.entries.iter_mut().find(|(t, _)| *t == tag) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((tag, value)),
        }
    }

    /// Stage a value by wire name.
    pub fn insert_named(
        &mut self,
        schema: &ColdSchema,
        name: &str,
        value: impl Into<Cow<'a, str>>,
    ) -> Result<(), CodecError> {
        let tag = schema.tag_of(name).ok_or_else(|| CodecError::UnknownField {
            record: schema.record,
            field: name.to_owned(),
        })?;
        self.insert(tag, value.into());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pack the staged values into a blob.
    pub fn encode(mut self) -> Result<ColdBlob, CodecError> {
        self.entries.sort_unstable_by_key(|(tag, _)| *tag);
        let size = 4 + self.entries.iter().map(|(_, v)| 5 + v.len()).sum::<usize>();
        let mut out = Vec::with_capacity(size);
        BorshSerialize::serialize(&(self.entries.len() as u32), &mut out)?;
        for (tag, value) in &self.entries {
            BorshSerialize::serialize(tag, &mut out)?;
            BorshSerialize::serialize(&**value, &mut out)?;
        }
        Ok(ColdBlob(out.into_boxed_slice()))
    }
}

/// Encoded cold fields of one record.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ColdBlob(Box<[u8]>);

impl ColdBlob {
    /// Wrap bytes produced by [`ColdStaging::encode`], e.g. read back from storage.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes.into_boxed_slice())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for ColdBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ColdBlob({} bytes)", self.0.len())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, BorshDeserialize)]
struct ColdEntry {
    tag: u8,
    value: String,
}

/// A decoded, caller-owned view of a record's cold fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColdFields {
    schema: &'static ColdSchema,
    entries: Vec<ColdEntry>,
}

impl ColdFields {
    /// The value of `name`, if it was present on the wire.
    pub fn get(&self, name: &str) -> Option<&str> {
        let tag = self.schema.tag_of(name)?;
        self.entries
            .iter()
            .find(|e| e.tag == tag)
            .map(|e| e.value.as_str())
    }

    /// Present fields in tag order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        self.entries.iter().filter_map(|e| {
            self.schema
                .name_of(e.tag)
                .map(|name| (name, e.value.as_str()))
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn take(self, tag: u8) -> Option<String> {
        self.entries.into_iter().find(|e| e.tag == tag).map(|e| e.value)
    }
}

/// Decode every cold field in `blob`. An empty blob was never encoded and is
/// reported as [`CodecError::Missing`].
pub fn decode(schema: &'static ColdSchema, blob: &ColdBlob) -> Result<ColdFields, CodecError> {
    if blob.is_empty() {
        return Err(CodecError::Missing {
            record: schema.record,
        });
    }
    let entries: Vec<ColdEntry> = borsh::from_slice(blob.as_bytes())?;
    if let Some(bad) = entries.iter().find(|e| schema.name_of(e.tag).is_none()) {
        return Err(CodecError::Malformed(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("tag {} is outside the {} cold schema", bad.tag, schema.record),
        )));
    }
    Ok(ColdFields { schema, entries })
}

/// Decode one cold field by wire name. `Ok(None)` if it was absent on the wire.
pub fn decode_field(
    schema: &'static ColdSchema,
    blob: &ColdBlob,
    name: &str,
) -> Result<Option<String>, CodecError> {
    let tag = schema.tag_of(name).ok_or_else(|| CodecError::UnknownField {
        record: schema.record,
        field: name.to_owned(),
    })?;
    Ok(decode(schema, blob)?.take(tag))
}

/// Decode one cold field and parse it with `parse`.
pub(crate) fn read<T>(
    schema: &'static ColdSchema,
    blob: &ColdBlob,
    field: &'static str,
    parse: fn(&str) -> Result<T, HexError>,
) -> Result<T, CodecError> {
    let raw = decode_field(schema, blob, field)?.ok_or(CodecError::Absent { field })?;
    parse(&raw).map_err(|source| CodecError::InvalidValue { field, source })
}

pub(crate) fn parse_bloom(s: &str) -> Result<Bloom, HexError> {
    hex::parse_array::<256>(s).map(Bloom::new)
}

pub(crate) fn parse_b64(s: &str) -> Result<B64, HexError> {
    hex::parse_array::<8>(s).map(B64::new)
}
