//! chainfetch-core: transport, connection pool and batch dispatch for ChainFetch.
//!
//! # Overview
//!
//! ChainFetch pulls blocks, transactions, receipts and logs over JSON-RPC and
//! hands each raw response to a record decoder. The core crate defines:
//!
//! - [`RpcTransport`] / [`Connect`]: the transport boundary and its dialer
//! - [`JsonRpcRequest`] / [`JsonRpcResponse`]: wire types; results stay raw
//!   ([`RawValue`](serde_json::value::RawValue)) until a decoder consumes them
//! - [`FromRpc`]: how a raw result becomes a typed value, with [`Partial`]
//!   carrying best-effort results alongside their [`DecodeError`]
//! - [`ConnectionPool`]: fixed-size set of exclusively claimed connections
//! - [`Client`]: single, batched, concurrent and sequence calls
//! - [`error`] module: the error taxonomy shared by every crate

pub mod config;
pub mod dispatch;
pub mod error;
pub mod from_rpc;
pub mod hex;
pub mod method;
pub mod pool;
pub mod request;
pub mod sequence;
pub mod transport;

pub use config::ClientConfig;
pub use dispatch::{BatchReport, Client};
pub use error::{
    BatchError, CodecError, DecodeError, FieldError, FieldErrors, ItemError, RpcError,
    TransportError,
};
pub use from_rpc::{FromRpc, Partial};
pub use hex::HexError;
pub use method::{BlockTag, Method};
pub use pool::{ConnectionPool, PooledConnection};
pub use request::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcId, RpcParam};
pub use sequence::{ResponseSink, Sequence};
pub use transport::{Connect, RpcTransport};
