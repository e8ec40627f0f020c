//! chainfetch-models: block, transaction, receipt and log records.
//!
//! Each record is decoded in one pass over the JSON-RPC response:
//!
//! - **hot** fields (hashes, numbers, addresses) are parsed straight into
//!   typed slots; 64-bit numbers use [`Quantity`]
//! - **cold** fields are copied as raw strings and packed into a
//!   [`ColdBlob`] that is parsed again on every typed access
//!
//! A field that fails to parse is left at its zero value and reported, so
//! a decode returns either the record or a [`Partial`] holding the record
//! together with every field error.
//!
//! ```ignore
//! let block = chainfetch_models::decode_block(raw.get().as_bytes())?;
//! println!("{} {}", block.number(), block.state_root()?);
//! ```

#[macro_use]
pub mod cold;
pub mod block;
pub mod log;
pub mod quantity;
pub mod receipt;
pub mod transaction;
mod wire;

pub use block::{Block, BlockTransactions, BLOCK_COLD};
pub use chainfetch_core::from_rpc::Partial;
pub use cold::{ColdBlob, ColdFields, ColdSchema, ColdStaging};
pub use log::{Log, LOG_COLD};
pub use quantity::Quantity;
pub use receipt::{Receipt, RECEIPT_COLD};
pub use transaction::{Transaction, TRANSACTION_COLD};

/// Decode one block object (`eth_getBlockByNumber`, `eth_getBlockByHash`).
pub fn decode_block(raw: &[u8]) -> Result<Block, Partial<Block>> {
    wire::decode_one(raw)
}

pub fn decode_transaction(raw: &[u8]) -> Result<Transaction, Partial<Transaction>> {
    wire::decode_one(raw)
}

pub fn decode_receipt(raw: &[u8]) -> Result<Receipt, Partial<Receipt>> {
    wire::decode_one(raw)
}

/// Decode an `eth_getLogs` result. Errors of element `i` are reported
/// under `[i]`.
pub fn decode_logs(raw: &[u8]) -> Result<Vec<Log>, Partial<Vec<Log>>> {
    wire::decode_many(raw)
}

/// Decode an `eth_getBlockReceipts` result.
pub fn decode_receipts(raw: &[u8]) -> Result<Vec<Receipt>, Partial<Vec<Receipt>>> {
    wire::decode_many(raw)
}
