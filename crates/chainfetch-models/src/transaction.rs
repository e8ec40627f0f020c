//! Transaction record.

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
use crate::wire::{decode_one, FieldReader, Record, WireValue};

/// Cold fields of a transaction, in tag order.
pub static TRANSACTION_COLD: ColdSchema = ColdSchema::new(
    "transaction",
    &[
        "blockHash",
        "transactionIndex",
        "nonce",
        "gas",
        "gasPrice",
        "maxFeePerGas",
        "maxPriorityFeePerGas",
        "maxFeePerBlobGas",
        "chainId",
        "yParity",
    ],
);

/// A transaction as returned by `eth_getTransactionByHash` or inside a full block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transaction {
    hash: B256,
    from: Address,
    to: Option<Address>,
    block_number: Quantity,
    pending: bool,
    value: U256,
    v: Quantity,
    r: U256,
    s: U256,
    input: Bytes,
    tx_type: u8,
    cold: ColdBlob,
    errors: FieldErrors,
}

impl Transaction {
    pub fn hash(&self) -> B256 {
        self.hash
    }

    pub fn from(&self) -> Address {
        self.from
    }

    /// `None` for contract creation.
    pub fn to(&self) -> Option<Address> {
        self.to
    }

    /// `None` while the transaction is pending.
    pub fn block_number(&self) -> Option<u64> {
        (!self.pending).then(|| self.block_number.get())
    }

    pub fn value(&self) -> U256 {
        self.value
    }

    pub fn v(&self) -> u64 {
        self.v.get()
    }

    pub fn r(&self) -> U256 {
        self.r
    }

    pub fn s(&self) -> U256 {
        self.s
    }

    pub fn input(&self) -> &Bytes {
        &self.input
    }

    /// EIP-2718 type: 0 legacy, 1 access list, 2 dynamic fee, 3 blob.
    ///
    /// When the node omits `type`, it is inferred from which typed fields
    /// are present.
    pub fn tx_type(&self) -> u8 {
        self.tx_type
    }

    /// Fields that failed to decode and were left at their zero value.
    pub fn field_errors(&self) -> &FieldErrors {
        &self.errors
    }

    pub fn cold_blob(&self) -> &ColdBlob {
        &self.cold
    }

    pub fn cold_fields(&self) -> Result<ColdFields, CodecError> {
        cold::decode(&TRANSACTION_COLD, &self.cold)
    }

    pub fn cold_field(&self, name: &str) -> Result<Option<String>, CodecError> {
        cold::decode_field(&TRANSACTION_COLD, &self.cold, name)
    }

    cold_accessors! { TRANSACTION_COLD;
        block_hash -> B256 = "blockHash", hex::parse_b256;
        transaction_index -> U256 = "transactionIndex", hex::parse_u256;
        nonce -> U256 = "nonce", hex::parse_u256;
        gas -> U256 = "gas", hex::parse_u256;
        /// Absent on dynamic-fee transactions from some clients.
        gas_price -> U256 = "gasPrice", hex::parse_u256;
        max_fee_per_gas -> U256 = "maxFeePerGas", hex::parse_u256;
        max_priority_fee_per_gas -> U256 = "maxPriorityFeePerGas", hex::parse_u256;
        max_fee_per_blob_gas -> U256 = "maxFeePerBlobGas", hex::parse_u256;
        chain_id -> U256 = "chainId", hex::parse_u256;
        y_parity -> U256 = "yParity", hex::parse_u256;
    }
}

impl Record for Transaction {
    const KIND: &'static str = "transaction";

    fn errors(&self) -> &FieldErrors {
        &self.errors
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(field_identifier, rename_all = "camelCase")]
enum TransactionKey {
    Hash,
    From,
    To,
    BlockNumber,
    Value,
    V,
    R,
    S,
    #[serde(alias = "data")]
    Input,
    Type,
    AccessList,
    BlobVersionedHashes,
    AuthorizationList,
    BeaconRoot,
    BlockHash,
    TransactionIndex,
    Nonce,
    Gas,
    GasPrice,
    MaxFeePerGas,
    MaxPriorityFeePerGas,
    MaxFeePerBlobGas,
    ChainId,
    YParity,
    #[serde(other)]
    Unknown,
}

impl TransactionKey {
    const FIRST_COLD: u8 = Self::BlockHash as u8;

    fn cold_tag(self) -> Option<u8> {
        let key = self as u8;
        (Self::FIRST_COLD..Self::Unknown as u8)
            .contains(&key)
            .then(|| key - Self::FIRST_COLD)
    }

    /// Type implied by the presence of this field.
    fn implied_type(self) -> u8 {
        match self {
            Self::AccessList => 1,
            Self::MaxFeePerGas | Self::MaxPriorityFeePerGas => 2,
            Self::MaxFeePerBlobGas | Self::BlobVersionedHashes => 3,
            Self::AuthorizationList | Self::BeaconRoot => 4,
            _ => 0,
        }
    }
}

impl<'de> Deserialize<'de> for Transaction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(TransactionVisitor)
    }
}

struct TransactionVisitor;

impl<'de> Visitor<'de> for TransactionVisitor {
    type Value = Transaction;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a transaction object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Transaction, A::Error> {
        use TransactionKey as K;

        let mut tx = Transaction::default();
        let mut reader = FieldReader::default();
        let mut staging = ColdStaging::new();
        let mut explicit_type = None;
        let mut implied_type = 0u8;
        let mut mined = false;

        while let Some(key) = map.next_key::<TransactionKey>()? {
            match key {
                K::Hash => tx.hash = reader.b256("hash", map.next_value()?),
                K::From => tx.from = reader.address("from", map.next_value()?),
                K::To => tx.to = reader.opt_address("to", map.next_value()?),
                K::BlockNumber => {
                    let value: WireValue<'de> = map.next_value()?;
                    mined = !value.is_null();
                    reader.quantity("blockNumber", value, &tx.block_number);
                }
                K::Value => tx.value = reader.u256("value", map.next_value()?),
                K::V => reader.quantity("v", map.next_value()?, &tx.v),
                K::R => tx.r = reader.u256("r", map.next_value()?),
                K::S => tx.s = reader.u256("s", map.next_value()?),
                K::Input => tx.input = reader.bytes("input", map.next_value()?),
                K::Type => explicit_type = reader.u8("type", map.next_value()?),
                K::Unknown => {
                    map.next_value::<IgnoredAny>()?;
                }
                key => {
                    let value: WireValue<'de> = map.next_value()?;
                    if !value.is_null() {
                        implied_type = implied_type.max(key.implied_type());
                    }
                    if let Some(tag) = key.cold_tag() {
                        reader.cold(&mut staging, &TRANSACTION_COLD, tag, value);
                    }
                }
            }
        }

        tx.pending = !mined;
        tx.tx_type = explicit_type.unwrap_or(implied_type);
        (tx.cold, tx.errors) = reader.finish(staging);
        Ok(tx)
    }
}

impl FromRpc for Transaction {
    fn from_rpc(raw: &RawValue) -> Result<Self, Partial<Self>> {
        decode_one(raw.get().as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainfetch_core::error::DecodeError;

    fn decode(json: &str) -> Result<Transaction, Partial<Transaction>> {
        decode_one(json.as_bytes())
    }

    const LEGACY: &str = r#"{
        "hash": "0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b",
        "from": "0xa7d9ddbe1f17865597fbd27ec712455208b6b76d",
        "to": "0xf02c1c8e6114b1dbe8937a39260b5b0a374432bb",
        "blockNumber": "0x5daf3b",
        "blockHash": "0x1d59ff54b1eb26b013ce3cb5fc9dab3705b415a67127a003c3e61eb445bb8df2",
        "transactionIndex": "0x41",
        "value": "0xf3dbb76162000",
        "gas": "0xc350",
        "gasPrice": "0x4a817c800",
        "input": "0x68656c6c6f21",
        "nonce": "0x15",
        "v": "0x25",
        "r": "0x1b5e176d927f8e9ab405058b2d2457392da3e20f328b16ddabcebc33eaac5fea",
        "s": "0x4ba69724e8f69de52f0125ad8b3c5c2cef33019bac3249e2c0a2192766d1721c"
    }"#;

    #[test]
    fn legacy_transaction_decodes() {
        let tx = decode(LEGACY).unwrap();
        assert_eq!(tx.block_number(), Some(6_139_707));
        assert_eq!(tx.value(), U256::from(4_290_000_000_000_000u64));
        assert_eq!(tx.v(), 37);
        assert_eq!(tx.input().as_ref(), b"hello!");
        assert_eq!(tx.tx_type(), 0);
        assert_eq!(tx.nonce().unwrap(), U256::from(21));
        assert_eq!(tx.gas_price().unwrap(), U256::from(20_000_000_000u64));
        assert!(matches!(tx.max_fee_per_gas(), Err(CodecError::Absent { .. })));
    }

    #[test]
    fn type_is_inferred_from_typed_fields() {
        let cases = [
            (r#"{"accessList": []}"#, 1),
            (r#"{"accessList": [], "maxFeePerGas": "0x1"}"#, 2),
            (r#"{"maxPriorityFeePerGas": "0x1"}"#, 2),
            (r#"{"blobVersionedHashes": [], "maxFeePerGas": "0x1"}"#, 3),
            (r#"{"beaconRoot": "0x00", "maxFeePerGas": "0x1"}"#, 4),
            (r#"{"authorizationList": [{"chainId": "0x1"}]}"#, 4),
            (r#"{"beaconRoot": null}"#, 0),
            (r#"{"maxFeePerGas": null, "accessList": null}"#, 0),
            (r#"{}"#, 0),
        ];
        for (json, expected) in cases {
            assert_eq!(decode(json).unwrap().tx_type(), expected, "{json}");
        }
    }

    #[test]
    fn explicit_type_wins() {
        let tx = decode(r#"{"type": "0x1", "maxFeePerGas": "0x1"}"#).unwrap();
        assert_eq!(tx.tx_type(), 1);
    }

    #[test]
    fn pending_has_no_block_number() {
        let tx = decode(r#"{"blockNumber": null, "to": null}"#).unwrap();
        assert_eq!(tx.block_number(), None);
        assert_eq!(tx.to(), None);
    }

    #[test]
    fn data_is_an_alias_for_input() {
        let tx = decode(r#"{"data": "0x01"}"#).unwrap();
        assert_eq!(tx.input().as_ref(), &[1]);
    }

    #[test]
    fn bad_value_is_reported_but_rest_decodes() {
        let partial = decode(r#"{"value": "0xzz", "nonce": "0x2", "v": "0x1b"}"#).unwrap_err();
        let tx = partial.value.unwrap();
        assert_eq!(tx.value(), U256::ZERO);
        assert_eq!(tx.v(), 27);
        assert_eq!(tx.nonce().unwrap(), U256::from(2));
        let DecodeError::Fields(errors) = partial.error else {
            panic!("expected field errors");
        };
        assert!(errors.contains("value"));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn keys_follow_the_cold_schema() {
        for (tag, name) in TRANSACTION_COLD.fields().iter().enumerate() {
            let key: TransactionKey = serde_json::from_str(&format!("\"{name}\"")).unwrap();
            assert_eq!(key.cold_tag(), Some(tag as u8), "{name}");
        }
        let hot: TransactionKey = serde_json::from_str("\"value\"").unwrap();
        assert_eq!(hot.cold_tag(), None);
    }
}
