//! Error types for transports, record decoding and batch dispatch.

use std::fmt;

use thiserror::Error;

use crate::dispatch::BatchReport;
use crate::hex::HexError;
use crate::request::JsonRpcError;

/// Errors that can occur while moving bytes to and from the node.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request failed (connection refused, bad status, etc.).
    #[error("HTTP error: {0}")]
    Http(String),

    /// One of the pool's connections could not be established.
    #[error("failed to establish connection #{index} to {url}: {reason}")]
    Dial {
        index: usize,
        url: String,
        reason: String,
    },

    /// Request timed out after the configured duration.
    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// The connection pool was closed before or while claiming.
    #[error("connection pool is closed")]
    PoolClosed,

    /// The node answered with something that is not a JSON-RPC response.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Response could not be deserialized.
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// An unexpected error.
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Returns `true` if this error is transient. Retrying is left to the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Timeout { .. })
    }
}

// ─── Field-level decode errors ────────────────────────────────────────────────

/// One record field that failed to decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Wire name of the field, with an indexed path for nested records
    /// (`transactions[3].value`).
    pub field: String,
    pub reason: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// Accumulator of field errors for one record (and its nested records).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(Vec<FieldError>);

impl FieldErrors {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, error: FieldError) {
        self.0.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FieldError> {
        self.0.iter()
    }

    /// Returns `true` if `field` (exact path) failed.
    pub fn contains(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }

    /// Move every error of a nested record under `prefix`.
    pub fn absorb(&mut self, prefix: &str, nested: FieldErrors) {
        self.0.extend(nested.0.into_iter().map(|mut e| {
            e.field = if prefix.is_empty() {
                e.field
            } else if e.field.starts_with('[') {
                format!("{prefix}{}", e.field)
            } else {
                format!("{prefix}.{}", e.field)
            };
            e
        }));
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{e}")?;
        }
        Ok(())
    }
}

impl IntoIterator for FieldErrors {
    type Item = FieldError;
    type IntoIter = std::vec::IntoIter<FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a FieldErrors {
    type Item = &'a FieldError;
    type IntoIter = std::slice::Iter<'a, FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// ─── Record-level errors ──────────────────────────────────────────────────────

/// Errors produced while turning a raw result into a typed value.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The payload is not valid JSON, or not the JSON kind the target needs.
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The node returned `null` where a record was expected.
    #[error("expected a record, found null")]
    Null,

    /// The payload has the wrong top-level shape.
    #[error("expected {expected}, found {found}")]
    Shape {
        expected: &'static str,
        found: &'static str,
    },

    /// One or more fields failed; the record is still usable for the rest.
    #[error("{} field(s) failed to decode: {0}", .0.len())]
    Fields(FieldErrors),
}

impl DecodeError {
    /// The field errors, if this is a partial-record failure.
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            Self::Fields(errors) => Some(errors),
            _ => None,
        }
    }
}

/// Errors raised when a cold field is read back from its blob.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The blob is truncated or was not produced by the codec.
    #[error("cold blob is malformed: {0}")]
    Malformed(#[from] std::io::Error),

    /// The record carries no blob at all; it was never produced by a decode.
    #[error("{record} has no cold blob")]
    Missing { record: &'static str },

    /// The name is not part of this record's cold schema.
    #[error("'{field}' is not a cold field of {record}")]
    UnknownField { record: &'static str, field: String },

    /// The field was absent (or null) in the wire object.
    #[error("cold field '{field}' was absent from the wire object")]
    Absent { field: &'static str },

    /// The stored value does not parse as the accessor's type.
    #[error("cold field '{field}' holds an invalid value: {source}")]
    InvalidValue {
        field: &'static str,
        #[source]
        source: HexError,
    },
}

// ─── Dispatch errors ──────────────────────────────────────────────────────────

/// Failure of one logical request inside a batch. Never aborts its siblings.
#[derive(Debug, Error)]
pub enum ItemError {
    /// JSON-RPC error object returned by the node for this request.
    #[error("RPC error {}: {}", .0.code, .0.message)]
    Rpc(JsonRpcError),

    /// The batch response had no entry for this request's id.
    #[error("no response for request id {id}")]
    MissingResponse { id: u64 },

    /// A response carried neither `result` nor `error`.
    #[error("response carried neither result nor error")]
    EmptyResponse,

    /// The result arrived but did not decode cleanly. When the target is a
    /// record, the partially decoded record is still written to its slot.
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),
}

impl ItemError {
    /// The JSON-RPC error code, if the node rejected this request.
    pub fn rpc_code(&self) -> Option<i64> {
        match self {
            Self::Rpc(err) => Some(err.code),
            _ => None,
        }
    }
}

/// Error returned by single calls and pool construction.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// JSON-RPC protocol-level error returned by the node.
    #[error("RPC error {}: {}", .0.code, .0.message)]
    Rpc(JsonRpcError),

    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),

    /// Caller-supplied argument rejected before any request was sent.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl From<ItemError> for RpcError {
    fn from(err: ItemError) -> Self {
        match err {
            ItemError::Rpc(e) => Self::Rpc(e),
            ItemError::Decode(e) => Self::Decode(e),
            ItemError::MissingResponse { id } => Self::Transport(
                TransportError::MalformedResponse(format!("no response for request id {id}")),
            ),
            ItemError::EmptyResponse => Self::Transport(TransportError::MalformedResponse(
                "response carried neither result nor error".into(),
            )),
        }
    }
}

/// Overall error of a batch or sequence call.
#[derive(Debug, Error)]
pub enum BatchError {
    /// Caller-supplied argument rejected before any request was sent.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A whole batch failed at the transport level. Remaining batches were not
    /// submitted; `report` holds the per-item outcome of everything before it.
    #[error("batch {batch} failed: {source}")]
    Transport {
        batch: usize,
        #[source]
        source: TransportError,
        report: BatchReport,
    },
}

impl BatchError {
    /// Per-item outcome of the batches completed before the failure.
    pub fn report(&self) -> Option<&BatchReport> {
        match self {
            Self::Transport { report, .. } => Some(report),
            Self::InvalidArgument(_) => None,
        }
    }
}
