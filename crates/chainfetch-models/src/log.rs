//! Event log record.

use std::fmt;

use alloy_primitives::{Address, Bytes, B256, U256};
use chainfetch_core::error::{CodecError, FieldErrors};
use chainfetch_core::from_rpc::{FromRpc, Partial};
use chainfetch_core::hex;
use serde::de::{IgnoredAny, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use serde_json::value::RawValue;

use crate::cold::{self, ColdBlob, ColdFields, ColdSchema, ColdStaging};
use crate::quantity::Quantity;
use crate::wire::{decode_one, FieldReader, Record};

pub static LOG_COLD: ColdSchema = ColdSchema::new("log", &["blockHash", "blockTimestamp"]);

/// One entry of `eth_getLogs` or of a receipt's `logs`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Log {
    address: Address,
    topics: Vec<B256>,
    data: Bytes,
    block_number: Quantity,
    transaction_index: Quantity,
    log_index: Quantity,
    transaction_hash: B256,
    removed: bool,
    cold: ColdBlob,
    errors: FieldErrors,
}

impl Log {
    pub fn address(&self) -> Address {
        self.address
    }

    /// `topics[0]` is the event signature hash for non-anonymous events.
    pub fn topics(&self) -> &[B256] {
        &self.topics
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn block_number(&self) -> u64 {
        self.block_number.get()
    }

    pub fn transaction_index(&self) -> u64 {
        self.transaction_index.get()
    }

    pub fn log_index(&self) -> u64 {
        self.log_index.get()
    }

    pub fn transaction_hash(&self) -> B256 {
        self.transaction_hash
    }

    /// `true` if the log was dropped by a chain reorganization.
    pub fn removed(&self) -> bool {
        self.removed
    }

    pub fn field_errors(&self) -> &FieldErrors {
        &self.errors
    }

    pub fn cold_blob(&self) -> &ColdBlob {
        &self.cold
    }

    pub fn cold_fields(&self) -> Result<ColdFields, CodecError> {
        cold::decode(&LOG_COLD, &self.cold)
    }

    pub fn cold_field(&self, name: &str) -> Result<Option<String>, CodecError> {
        cold::decode_field(&LOG_COLD, &self.cold, name)
    }

    cold_accessors! { LOG_COLD;
        block_hash -> B256 = "blockHash", hex::parse_b256;
        /// Only reported by some clients.
        block_timestamp -> U256 = "blockTimestamp", hex::parse_u256;
    }
}

impl Record for Log {
    const KIND: &'static str = "log";

    fn errors(&self) -> &FieldErrors {
        &self.errors
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(field_identifier, rename_all = "camelCase")]
enum LogKey {
    Address,
    Topics,
    Data,
    BlockNumber,
    TransactionIndex,
    LogIndex,
    TransactionHash,
    Removed,
    BlockHash,
    BlockTimestamp,
    #[serde(other)]
    Unknown,
}

impl LogKey {
    const FIRST_COLD: u8 = Self::BlockHash as u8;

    fn cold_tag(self) -> Option<u8> {
        let key = self as u8;
        (Self::FIRST_COLD..Self::Unknown as u8)
            .contains(&key)
            .then(|| key - Self::FIRST_COLD)
    }
}

impl<'de> Deserialize<'de> for Log {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(LogVisitor)
    }
}

struct LogVisitor;

impl<'de> Visitor<'de> for LogVisitor {
    type Value = Log;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a log object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Log, A::Error> {
        let mut log = Log::default();
        let mut reader = FieldReader::default();
        let mut staging = ColdStaging::new();

        while let Some(key) = map.next_key::<LogKey>()? {
            match key {
                LogKey::Address => log.address = reader.address("address", map.next_value()?),
                LogKey::Topics => log.topics = reader.hashes("topics", map.next_value()?),
                LogKey::Data => log.data = reader.bytes("data", map.next_value()?),
                LogKey::BlockNumber => {
                    reader.quantity("blockNumber", map.next_value()?, &log.block_number)
                }
                LogKey::TransactionIndex => {
                    reader.quantity("transactionIndex", map.next_value()?, &log.transaction_index)
                }
                LogKey::LogIndex => reader.quantity("logIndex", map.next_value()?, &log.log_index),
                LogKey::TransactionHash => {
                    log.transaction_hash = reader.b256("transactionHash", map.next_value()?)
                }
                LogKey::Removed => log.removed = reader.flag("removed", map.next_value()?),
                LogKey::Unknown => {
                    map.next_value::<IgnoredAny>()?;
                }
                key => {
                    if let Some(tag) = key.cold_tag() {
                        reader.cold(&mut staging, &LOG_COLD, tag, map.next_value()?);
                    }
                }
            }
        }

        (log.cold, log.errors) = reader.finish(staging);
        Ok(log)
    }
}

impl FromRpc for Log {
    fn from_rpc(raw: &RawValue) -> Result<Self, Partial<Self>> {
        decode_one(raw.get().as_bytes())
    }
}
