//! Heterogeneous batches: different methods, each with its own destination.

use serde_json::value::RawValue;
use serde_json::Value;
use tracing::{debug, warn};

use crate::dispatch::{check_batch_args, match_responses, BatchReport, Client};
use crate::error::{BatchError, DecodeError, ItemError, TransportError};
use crate::from_rpc::FromRpc;
use crate::method::Method;
use crate::request::{JsonRpcRequest, RpcId};
use crate::transport::RpcTransport;

/// Destination for one result of a [`Sequence`].
pub trait ResponseSink: Send {
    /// Store the decoded result. A partial value may be stored even on error.
    fn accept(&mut self, raw: &RawValue) -> Result<(), DecodeError>;

    /// Drop any stored value; called when the call produced no result.
    fn clear(&mut self);
}

impl<T: FromRpc + Send> ResponseSink for Option<T> {
    fn accept(&mut self, raw: &RawValue) -> Result<(), DecodeError> {
        match T::from_rpc(raw) {
            Ok(value) => {
                *self = Some(value);
                Ok(())
            }
            Err(partial) => {
                *self = partial.value;
                Err(partial.error)
            }
        }
    }

    fn clear(&mut self) {
        *self = None;
    }
}

struct Entry<'a> {
    method: Method,
    params: Vec<Value>,
    sink: &'a mut dyn ResponseSink,
}

/// An ordered list of calls, each writing into its own destination.
///
/// ```ignore
/// let (mut head, mut logs) = (None::<u64>, None::<Vec<Log>>);
/// let mut seq = Sequence::new();
/// seq.push(Method::BlockNumber, vec![], &mut head)
///    .push(Method::Logs, vec![filter], &mut logs);
/// client.sequence_batch_call(100, seq).await?;
/// ```
#[derive(Default)]
pub struct Sequence<'a> {
    entries: Vec<Entry<'a>>,
}

impl<'a> Sequence<'a> {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn with_capacity(n: usize) -> Self {
        Self {
            entries: Vec::with_capacity(n),
        }
    }

    /// Append a call whose result is decoded into `sink`.
    pub fn push(&mut self, method: Method, params: Vec<Value>, sink: &'a mut dyn ResponseSink) -> &mut Self {
        self.entries.push(Entry { method, params, sink });
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<C: RpcTransport> Client<C> {
    /// Send every call of `sequence`, `batch_limit` per round trip, in order.
    ///
    /// Requests share one buffer that is flushed each time it fills and once
    /// more for the remaining tail. Item errors are reported by position in
    /// the sequence, and a sink whose call returned no result is cleared.
    /// A transport failure stops the remaining batches.
    pub async fn sequence_batch_call(
        &self,
        batch_limit: usize,
        sequence: Sequence<'_>,
    ) -> Result<BatchReport, BatchError> {
        check_batch_args(batch_limit, sequence.len(), sequence.len())?;

        let mut report = BatchReport::new(sequence.len());
        let mut buffer: Vec<JsonRpcRequest> = Vec::with_capacity(batch_limit.min(sequence.len()));
        let mut sinks: Vec<(usize, &mut dyn ResponseSink)> = Vec::with_capacity(buffer.capacity());

        let mut entries = sequence.entries.into_iter().enumerate().peekable();
        while let Some((index, entry)) = entries.next() {
            buffer.push(JsonRpcRequest::new(0, entry.method.as_str(), entry.params));
            sinks.push((index, entry.sink));

            if buffer.len() == batch_limit || entries.peek().is_none() {
                let batch = report.batches_sent;
                if let Err(source) = self.flush(&mut buffer, &mut sinks, &mut report).await {
                    warn!(batch, error = %source, "sequence batch failed; aborting remaining batches");
                    return Err(BatchError::Transport {
                        batch,
                        source,
                        report,
                    });
                }
                report.batches_sent += 1;
            }
        }
        Ok(report)
    }

    /// Send the buffered requests as one round trip, feed each sink, and empty the buffer.
    async fn flush(
        &self,
        buffer: &mut Vec<JsonRpcRequest>,
        sinks: &mut Vec<(usize, &mut dyn ResponseSink)>,
        report: &mut BatchReport,
    ) -> Result<(), TransportError> {
        let first_id = self.reserve_ids(buffer.len());
        for (i, req) in buffer.iter_mut().enumerate() {
            req.id = RpcId::Number(first_id + i as u64);
        }
        debug!(size = buffer.len(), "flushing sequence buffer");

        let sent = self.round_trip_batch(&buffer[..]).await;
        let len = buffer.len();
        buffer.clear();
        let responses = match sent {
            Ok(responses) => responses,
            Err(e) => {
                sinks.clear();
                return Err(e);
            }
        };

        let matched = match_responses(first_id, len, responses);
        for (offset, ((index, sink), resp)) in sinks.drain(..).zip(matched).enumerate() {
            report.errors[index] = match resp {
                None => {
                    sink.clear();
                    Some(ItemError::MissingResponse {
                        id: first_id + offset as u64,
                    })
                }
                Some(resp) => match resp.into_result() {
                    Ok(raw) => sink.accept(&raw).err().map(ItemError::Decode),
                    Err(e) => {
                        sink.clear();
                        Some(e)
                    }
                },
            };
        }
        Ok(())
    }
}
