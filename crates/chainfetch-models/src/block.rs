//! Block record.

use std::fmt;

use alloy_primitives::{Address, Bloom, Bytes, B256, B64, U256};
use chainfetch_core::error::{CodecError, FieldErrors};
use chainfetch_core::from_rpc::{FromRpc, Partial};
use chainfetch_core::hex;
use serde::de::{IgnoredAny, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use serde_json::value::RawValue;

use crate::cold::{self, parse_b64, parse_bloom, ColdBlob, ColdFields, ColdSchema, ColdStaging};
use crate::quantity::Quantity;
use crate::transaction::Transaction;
use crate::wire::{decode_one, FieldReader, Lenient, Record, WireList, WireValue};

/// Cold fields of a block header, in tag order.
pub static BLOCK_COLD: ColdSchema = ColdSchema::new(
    "block",
    &[
        "parentHash",
        "sha3Uncles",
        "miner",
        "stateRoot",
        "transactionsRoot",
        "receiptsRoot",
        "logsBloom",
        "difficulty",
        "totalDifficulty",
        "gasLimit",
        "gasUsed",
        "extraData",
        "nonce",
        "mixHash",
        "baseFeePerGas",
        "withdrawalsRoot",
        "blobGasUsed",
        "excessBlobGas",
        "parentBeaconBlockRoot",
    ],
);

/// A block's transaction list: hashes, or full objects when requested with
/// `eth_getBlockByNumber(n, true)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockTransactions {
    Hashes(Vec<B256>),
    Full(Vec<Transaction>),
}

impl Default for BlockTransactions {
    fn default() -> Self {
        Self::Hashes(Vec::new())
    }
}

impl BlockTransactions {
    pub fn len(&self) -> usize {
        match self {
            Self::Hashes(h) => h.len(),
            Self::Full(t) => t.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Transaction hashes in block order, whichever form was returned.
    pub fn hashes(&self) -> Vec<B256> {
        match self {
            Self::Hashes(h) => h.clone(),
            Self::Full(t) => t.iter().map(Transaction::hash).collect(),
        }
    }

    pub fn as_full(&self) -> Option<&[Transaction]> {
        match self {
            Self::Full(t) => Some(t),
            Self::Hashes(_) => None,
        }
    }
}

/// A block from `eth_getBlockByNumber` / `eth_getBlockByHash`.
///
/// Hot fields are read directly. Header fields outside the hot set live in a
/// packed cold blob and are parsed on each access; see [`Block::cold_fields`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block {
    hash: B256,
    number: Quantity,
    timestamp: Quantity,
    size: Quantity,
    transactions: BlockTransactions,
    uncles: Vec<B256>,
    cold: ColdBlob,
    errors: FieldErrors,
}

impl Block {
    pub fn hash(&self) -> B256 {
        self.hash
    }

    pub fn number(&self) -> u64 {
        self.number.get()
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp.get()
    }

    pub fn size(&self) -> u64 {
        self.size.get()
    }

    pub fn transactions(&self) -> &BlockTransactions {
        &self.transactions
    }

    pub fn uncles(&self) -> &[B256] {
        &self.uncles
    }

    /// Fields that failed to decode, including those of nested transactions.
    pub fn field_errors(&self) -> &FieldErrors {
        &self.errors
    }

    pub fn cold_blob(&self) -> &ColdBlob {
        &self.cold
    }

    /// Every cold header field present on the wire, as raw strings.
    pub fn cold_fields(&self) -> Result<ColdFields, CodecError> {
        cold::decode(&BLOCK_COLD, &self.cold)
    }

    pub fn cold_field(&self, name: &str) -> Result<Option<String>, CodecError> {
        cold::decode_field(&BLOCK_COLD, &self.cold, name)
    }

    cold_accessors! { BLOCK_COLD;
        parent_hash -> B256 = "parentHash", hex::parse_b256;
        sha3_uncles -> B256 = "sha3Uncles", hex::parse_b256;
        miner -> Address = "miner", hex::parse_address;
        state_root -> B256 = "stateRoot", hex::parse_b256;
        transactions_root -> B256 = "transactionsRoot", hex::parse_b256;
        receipts_root -> B256 = "receiptsRoot", hex::parse_b256;
        logs_bloom -> Bloom = "logsBloom", parse_bloom;
        difficulty -> U256 = "difficulty", hex::parse_u256;
        total_difficulty -> U256 = "totalDifficulty", hex::parse_u256;
        gas_limit -> U256 = "gasLimit", hex::parse_u256;
        gas_used -> U256 = "gasUsed", hex::parse_u256;
        extra_data -> Bytes = "extraData", hex::parse_bytes;
        nonce -> B64 = "nonce", parse_b64;
        mix_hash -> B256 = "mixHash", hex::parse_b256;
        /// EIP-1559 blocks only.
        base_fee_per_gas -> U256 = "baseFeePerGas", hex::parse_u256;
        withdrawals_root -> B256 = "withdrawalsRoot", hex::parse_b256;
        blob_gas_used -> U256 = "blobGasUsed", hex::parse_u256;
        excess_blob_gas -> U256 = "excessBlobGas", hex::parse_u256;
        parent_beacon_block_root -> B256 = "parentBeaconBlockRoot", hex::parse_b256;
    }
}

impl Record for Block {
    const KIND: &'static str = "block";

    fn errors(&self) -> &FieldErrors {
        &self.errors
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(field_identifier, rename_all = "camelCase")]
enum BlockKey {
    Hash,
    Number,
    Timestamp,
    Size,
    Transactions,
    Uncles,
    ParentHash,
    Sha3Uncles,
    Miner,
    StateRoot,
    TransactionsRoot,
    ReceiptsRoot,
    LogsBloom,
    Difficulty,
    TotalDifficulty,
    GasLimit,
    GasUsed,
    ExtraData,
    Nonce,
    MixHash,
    BaseFeePerGas,
    WithdrawalsRoot,
    BlobGasUsed,
    ExcessBlobGas,
    ParentBeaconBlockRoot,
    #[serde(other)]
    Unknown,
}

impl BlockKey {
    const FIRST_COLD: u8 = Self::ParentHash as u8;

    fn cold_tag(self) -> Option<u8> {
        let key = self as u8;
        (Self::FIRST_COLD..Self::Unknown as u8)
            .contains(&key)
            .then(|| key - Self::FIRST_COLD)
    }
}

/// The list takes the form of its first element; elements of the other
/// form are errors.
fn block_transactions(reader: &mut FieldReader, list: WireList<Lenient<'_, Transaction>>) -> BlockTransactions {
    let items = match list {
        WireList::Items(items) => items,
        WireList::Null => return BlockTransactions::default(),
        WireList::Other(kind) => {
            reader.fail("transactions", format_args!("expected array, found {kind}"));
            return BlockTransactions::default();
        }
    };

    if matches!(items.first(), Some(Lenient::Record(_))) {
        let full = items
            .into_iter()
            .enumerate()
            .filter_map(|(i, item)| reader.element("transactions", i, item))
            .collect();
        return BlockTransactions::Full(full);
    }

    let hashes = items
        .into_iter()
        .enumerate()
        .filter_map(|(i, item)| {
            let path = format!("transactions[{i}]");
            match item {
                Lenient::Str(s) => reader.opt_b256(&path, WireValue::Str(s)),
                Lenient::Record(_) => {
                    reader.fail(&path, "expected hash, found object");
                    None
                }
                Lenient::Other(kind) => {
                    reader.fail(&path, format_args!("expected hash, found {kind}"));
                    None
                }
            }
        })
        .collect();
    BlockTransactions::Hashes(hashes)
}

impl<'de> Deserialize<'de> for Block {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(BlockVisitor)
    }
}

struct BlockVisitor;

impl<'de> Visitor<'de> for BlockVisitor {
    type Value = Block;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a block object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Block, A::Error> {
        let mut block = Block::default();
        let mut reader = FieldReader::default();
        let mut staging = ColdStaging::new();

        while let Some(key) = map.next_key::<BlockKey>()? {
            match key {
                BlockKey::Hash => block.hash = reader.b256("hash", map.next_value()?),
                BlockKey::Number => reader.quantity("number", map.next_value()?, &block.number),
                BlockKey::Timestamp => reader.quantity("timestamp", map.next_value()?, &block.timestamp),
                BlockKey::Size => reader.quantity("size", map.next_value()?, &block.size),
                BlockKey::Transactions => {
                    block.transactions = block_transactions(&mut reader, map.next_value()?)
                }
                BlockKey::Uncles => block.uncles = reader.hashes("uncles", map.next_value()?),
                BlockKey::Unknown => {
                    map.next_value::<IgnoredAny>()?;
                }
                key => {
                    if let Some(tag) = key.cold_tag() {
                        reader.cold(&mut staging, &BLOCK_COLD, tag, map.next_value()?);
                    }
                }
            }
        }

        (block.cold, block.errors) = reader.finish(staging);
        Ok(block)
    }
}

impl FromRpc for Block {
    fn from_rpc(raw: &RawValue) -> Result<Self, Partial<Self>> {
        decode_one(raw.get().as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainfetch_core::error::DecodeError;
    use chainfetch_core::hex::HexError;

    fn hash(byte: &str) -> String {
        format!("0x{}", byte.repeat(32))
    }

    fn header(number: &str, transactions: &str) -> String {
        format!(
            r#"{{
                "hash": "{}",
                "number": "{number}",
                "timestamp": "0x6650c0f7",
                "size": "0x2b4",
                "parentHash": "{}",
                "stateRoot": "{}",
                "miner": "0x95222290dd7278aa3ddd389cc1e1d165cc4bafe5",
                "gasLimit": "0x1c9c380",
                "gasUsed": 12000000,
                "extraData": "0x6265617665726275696c642e6f7267",
                "nonce": "0x0000000000000000",
                "baseFeePerGas": "0x3b9aca00",
                "totalDifficulty": null,
                "withdrawals": [{{"index": "0x1", "amount": "0x10"}}],
                "transactions": {transactions},
                "uncles": []
            }}"#,
            hash("aa"),
            hash("bb"),
            hash("cc"),
        )
    }

    fn decode(json: &str) -> Result<Block, Partial<Block>> {
        decode_one(json.as_bytes())
    }

    #[test]
    fn hot_fields_decode() {
        let txs = format!(r#"["{}", "{}"]"#, hash("01"), hash("02"));
        let block = decode(&header("0x14F8C31", &txs)).unwrap();
        assert_eq!(block.number(), 21_990_449);
        assert_eq!(block.timestamp(), 0x6650c0f7);
        assert_eq!(block.size(), 692);
        assert_eq!(block.hash().to_string(), hash("aa"));
        assert_eq!(block.transactions().len(), 2);
        assert!(block.transactions().as_full().is_none());
        assert!(block.uncles().is_empty());
        assert!(block.field_errors().is_empty());
    }

    #[test]
    fn cold_fields_read_concurrently_from_one_block() {
        let block = decode(&header("0x1", "[]")).unwrap();
        let root = block.state_root().unwrap();
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..50 {
                        assert_eq!(block.state_root().unwrap(), root);
                        assert_eq!(block.gas_limit().unwrap(), U256::from(30_000_000));
                    }
                });
            }
        });
    }

    #[test]
    fn default_block_has_no_cold_blob() {
        let block = Block::default();
        assert!(matches!(block.cold_fields(), Err(CodecError::Missing { record: "block" })));
        assert!(matches!(block.state_root(), Err(CodecError::Missing { .. })));
    }

    #[test]
    fn cold_fields_decode_on_each_access() {
        let block = decode(&header("0x1", "[]")).unwrap();
        let first = block.state_root().unwrap();
        assert_eq!(first.to_string(), hash("cc"));
        assert_eq!(block.state_root().unwrap(), first);
        assert_eq!(block.gas_limit().unwrap(), U256::from(30_000_000));
        assert_eq!(block.gas_used().unwrap(), U256::from(12_000_000));
        assert_eq!(block.extra_data().unwrap().as_ref(), b"beaverbuild.org");
        assert_eq!(block.nonce().unwrap(), B64::ZERO);
        assert_eq!(block.base_fee_per_gas().unwrap(), U256::from(1_000_000_000));
        assert!(matches!(block.total_difficulty(), Err(CodecError::Absent { .. })));
        assert!(matches!(block.withdrawals_root(), Err(CodecError::Absent { .. })));
        assert_eq!(block.cold_fields().unwrap(), block.cold_fields().unwrap());
        assert_eq!(block.cold_field("gasUsed").unwrap().as_deref(), Some("0xb71b00"));
    }

    #[test]
    fn bad_number_keeps_the_rest() {
        let txs = format!(r#"["{}"]"#, hash("01"));
        let partial = decode(&header("bogus", &txs)).unwrap_err();
        let block = partial.value.unwrap();
        assert_eq!(block.number(), 0);
        assert_eq!(block.hash().to_string(), hash("aa"));
        assert_eq!(block.transactions().len(), 1);
        let DecodeError::Fields(errors) = partial.error else {
            panic!("expected field errors");
        };
        assert!(errors.contains("number"));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn number_over_64_bits_is_rejected() {
        let partial = decode(&header("0x10000000000000000", "[]")).unwrap_err();
        assert_eq!(partial.value.as_ref().map(Block::number), Some(0));
        let reason = &partial.error.field_errors().unwrap().iter().next().unwrap().reason;
        assert_eq!(reason, &HexError::Overflow { bits: 64 }.to_string());
    }

    #[test]
    fn short_hash_is_rejected() {
        let json = r#"{"hash": "0xabcd", "number": "0x2"}"#;
        let partial = decode(json).unwrap_err();
        let block = partial.value.unwrap();
        assert_eq!(block.hash(), B256::ZERO);
        assert_eq!(block.number(), 2);
        assert!(block.field_errors().contains("hash"));
    }

    #[test]
    fn full_transaction_errors_are_indexed() {
        let good = r#"{"hash": "0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b", "value": "0x1"}"#;
        let bad = r#"{"value": "0xnope", "accessList": []}"#;
        let txs = format!("[{good}, {good}, {good}, {bad}]");
        let partial = decode(&header("0x5", &txs)).unwrap_err();
        let block = partial.value.unwrap();

        let full = block.transactions().as_full().unwrap();
        assert_eq!(full.len(), 4);
        assert_eq!(full[3].tx_type(), 1);
        assert_eq!(full[3].value(), U256::ZERO);
        assert_eq!(block.transactions().hashes()[0], full[0].hash());
        assert!(block.field_errors().contains("transactions[3].value"));
        assert_eq!(block.field_errors().len(), 1);
    }

    #[test]
    fn mixed_transaction_list_is_an_error() {
        let txs = format!(r#"["{}", {{"hash": "{}"}}, 1]"#, hash("01"), hash("02"));
        let partial = decode(&header("0x5", &txs)).unwrap_err();
        let block = partial.value.unwrap();
        assert_eq!(block.transactions().hashes(), vec![hash("01").parse::<B256>().unwrap()]);
        assert!(block.field_errors().contains("transactions[1]"));
        assert!(block.field_errors().contains("transactions[2]"));
    }

    #[test]
    fn wrong_kind_is_a_field_error() {
        let json = r#"{"number": true, "stateRoot": 5, "miner": {"a": 1}, "uncles": "none"}"#;
        let partial = decode(json).unwrap_err();
        let errors = partial.error.field_errors().unwrap();
        assert!(errors.contains("number"));
        assert!(errors.contains("miner"));
        assert!(errors.contains("uncles"));
        // a JSON number in a cold slot is kept as hex text
        let block = partial.value.unwrap();
        assert_eq!(block.cold_field("stateRoot").unwrap().as_deref(), Some("0x5"));
        assert!(matches!(block.state_root(), Err(CodecError::InvalidValue { .. })));
    }

    #[test]
    fn null_and_garbage_inputs() {
        assert!(matches!(decode("null").unwrap_err().error, DecodeError::Null));
        let partial = decode("{\"hash\": ").unwrap_err();
        assert!(partial.value.is_none());
        assert!(matches!(partial.error, DecodeError::Malformed(_)));
    }

    #[test]
    fn decode_is_deterministic() {
        let json = header("0x1", "[]");
        let a = decode(&json).unwrap();
        let b = decode(&json).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.cold_blob().as_bytes(), b.cold_blob().as_bytes());
    }

    #[test]
    fn keys_follow_the_cold_schema() {
        for (tag, name) in BLOCK_COLD.fields().iter().enumerate() {
            let key: BlockKey = serde_json::from_str(&format!("\"{name}\"")).unwrap();
            assert_eq!(key.cold_tag(), Some(tag as u8), "{name}");
        }
        let unknown: BlockKey = serde_json::from_str("\"withdrawals\"").unwrap();
        assert_eq!(unknown, BlockKey::Unknown);
    }
}
