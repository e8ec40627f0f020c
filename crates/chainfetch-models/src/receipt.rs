//! Transaction receipt record.

use std::fmt;

use alloy_primitives::{Address, Bloom, B256, U256};
use chainfetch_core::error::{CodecError, FieldErrors};
use chainfetch_core::from_rpc::{FromRpc, Partial};
use chainfetch_core::hex;
use serde::de::{IgnoredAny, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use serde_json::value::RawValue;

use crate::cold::{self, parse_bloom, ColdBlob, ColdFields, ColdSchema, ColdStaging};
use crate::log::Log;
use crate::quantity::Quantity;
use crate::wire::{decode_one, FieldReader, Record};

pub static RECEIPT_COLD: ColdSchema = ColdSchema::new(
    "receipt",
    &[
        "blockHash",
        "cumulativeGasUsed",
        "effectiveGasPrice",
        "gasUsed",
        "logsBloom",
        "root",
        "blobGasUsed",
        "blobGasPrice",
    ],
);

/// A receipt from `eth_getTransactionReceipt` or `eth_getBlockReceipts`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Receipt {
    transaction_hash: B256,
    transaction_index: Quantity,
    block_number: Quantity,
    from: Address,
    to: Option<Address>,
    contract_address: Option<Address>,
    tx_type: u8,
    status: Quantity,
    logs: Vec<Log>,
    cold: ColdBlob,
    errors: FieldErrors,
}

impl Receipt {
    pub fn transaction_hash(&self) -> B256 {
        self.transaction_hash
    }

    pub fn transaction_index(&self) -> u64 {
        self.transaction_index.get()
    }

    pub fn block_number(&self) -> u64 {
        self.block_number.get()
    }

    pub fn from(&self) -> Address {
        self.from
    }

    pub fn to(&self) -> Option<Address> {
        self.to
    }

    /// Set only for contract-creation transactions.
    pub fn contract_address(&self) -> Option<Address> {
        self.contract_address
    }

    pub fn tx_type(&self) -> u8 {
        self.tx_type
    }

    /// `1` for success, `0` for failure. Pre-Byzantium receipts carry `root` instead and read as 0.
    pub fn status(&self) -> u64 {
        self.status.get()
    }

    pub fn succeeded(&self) -> bool {
        self.status.get() == 1
    }

    pub fn logs(&self) -> &[Log] {
        &self.logs
    }

    pub fn field_errors(&self) -> &FieldErrors {
        &self.errors
    }

    pub fn cold_blob(&self) -> &ColdBlob {
        &self.cold
    }

    pub fn cold_fields(&self) -> Result<ColdFields, CodecError> {
        cold::decode(&RECEIPT_COLD, &self.cold)
    }

    pub fn cold_field(&self, name: &str) -> Result<Option<String>, CodecError> {
        cold::decode_field(&RECEIPT_COLD, &self.cold, name)
    }

    cold_accessors! { RECEIPT_COLD;
        block_hash -> B256 = "blockHash", hex::parse_b256;
        cumulative_gas_used -> U256 = "cumulativeGasUsed", hex::parse_u256;
        effective_gas_price -> U256 = "effectiveGasPrice", hex::parse_u256;
        gas_used -> U256 = "gasUsed", hex::parse_u256;
        logs_bloom -> Bloom = "logsBloom", parse_bloom;
        /// Post-state root of pre-Byzantium receipts.
        root -> B256 = "root", hex::parse_b256;
        blob_gas_used -> U256 = "blobGasUsed", hex::parse_u256;
        blob_gas_price -> U256 = "blobGasPrice", hex::parse_u256;
    }
}

impl Record for Receipt {
    const KIND: &'static str = "receipt";

    fn errors(&self) -> &FieldErrors {
        &self.errors
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(field_identifier, rename_all = "camelCase")]
enum ReceiptKey {
    TransactionHash,
    TransactionIndex,
    BlockNumber,
    From,
    To,
    ContractAddress,
    Type,
    Status,
    Logs,
    BlockHash,
    CumulativeGasUsed,
    EffectiveGasPrice,
    GasUsed,
    LogsBloom,
    Root,
    BlobGasUsed,
    BlobGasPrice,
    #[serde(other)]
    Unknown,
}

impl ReceiptKey {
    const FIRST_COLD: u8 = Self::BlockHash as u8;

    fn cold_tag(self) -> Option<u8> {
        let key = self as u8;
        (Self::FIRST_COLD..Self::Unknown as u8)
            .contains(&key)
            .then(|| key - Self::FIRST_COLD)
    }
}

impl<'de> Deserialize<'de> for Receipt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(ReceiptVisitor)
    }
}

struct ReceiptVisitor;

impl<'de> Visitor<'de> for ReceiptVisitor {
    type Value = Receipt;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a receipt object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Receipt, A::Error> {
        use ReceiptKey as K;

        let mut receipt = Receipt::default();
        let mut reader = FieldReader::default();
        let mut staging = ColdStaging::new();

        while let Some(key) = map.next_key::<ReceiptKey>()? {
            match key {
                K::TransactionHash => {
                    receipt.transaction_hash = reader.b256("transactionHash", map.next_value()?)
                }
                K::TransactionIndex => {
                    reader.quantity("transactionIndex", map.next_value()?, &receipt.transaction_index)
                }
                K::BlockNumber => reader.quantity("blockNumber", map.next_value()?, &receipt.block_number),
                K::From => receipt.from = reader.address("from", map.next_value()?),
                K::To => receipt.to = reader.opt_address("to", map.next_value()?),
                K::ContractAddress => {
                    receipt.contract_address = reader.opt_address("contractAddress", map.next_value()?)
                }
                K::Type => receipt.tx_type = reader.u8("type", map.next_value()?).unwrap_or_default(),
                K::Status => reader.quantity("status", map.next_value()?, &receipt.status),
                K::Logs => receipt.logs = reader.records("logs", map.next_value()?),
                K::Unknown => {
                    map.next_value::<IgnoredAny>()?;
                }
                key => {
                    if let Some(tag) = key.cold_tag() {
                        reader.cold(&mut staging, &RECEIPT_COLD, tag, map.next_value()?);
                    }
                }
            }
        }

        (receipt.cold, receipt.errors) = reader.finish(staging);
        Ok(receipt)
    }
}

impl FromRpc for Receipt {
    fn from_rpc(raw: &RawValue) -> Result<Self, Partial<Self>> {
        decode_one(raw.get().as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_log_errors_are_prefixed() {
        let json = r#"{
            "status": "0x1",
            "type": "0x2",
            "gasUsed": "0x5208",
            "logs": [
                {"logIndex": "0x0"},
                {"logIndex": "0x1", "topics": ["0x00", "0xzz"]}
            ]
        }"#;
        let partial = decode_one::<Receipt>(json.as_bytes()).unwrap_err();
        let receipt = partial.value.unwrap();
        assert!(receipt.succeeded());
        assert_eq!(receipt.tx_type(), 2);
        assert_eq!(receipt.logs().len(), 2);
        assert_eq!(receipt.gas_used().unwrap(), U256::from(21_000));

        let errors = receipt.field_errors();
        assert!(errors.contains("logs[1].topics[0]"));
        assert!(errors.contains("logs[1].topics[1]"));
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn contract_creation_has_no_recipient() {
        let json = r#"{
            "to": null,
            "contractAddress": "0x5fbdb2315678afecb367f032d93f642f64180aa3",
            "status": "0x0"
        }"#;
        let receipt: Receipt = decode_one(json.as_bytes()).unwrap();
        assert_eq!(receipt.to(), None);
        assert!(receipt.contract_address().is_some());
        assert!(!receipt.succeeded());
    }

    #[test]
    fn logs_bloom_is_read_on_demand() {
        let bloom = format!("0x{}", "00".repeat(255) + "80");
        let json = format!(r#"{{"logsBloom": "{bloom}"}}"#);
        let receipt: Receipt = decode_one(json.as_bytes()).unwrap();
        let read = receipt.logs_bloom().unwrap();
        assert_eq!(read.as_slice()[255], 0x80);
        assert_eq!(receipt.logs_bloom().unwrap(), read);
    }

    #[test]
    fn keys_follow_the_cold_schema() {
        for (tag, name) in RECEIPT_COLD.fields().iter().enumerate() {
            let key: ReceiptKey = serde_json::from_str(&format!("\"{name}\"")).unwrap();
            assert_eq!(key.cold_tag(), Some(tag as u8));
        }
    }
}
