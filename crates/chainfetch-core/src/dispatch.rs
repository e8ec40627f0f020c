//! Batch dispatcher: single calls, chunked batches and concurrent batches.
//!
//! Every round trip claims one pooled connection, sends, and releases it when
//! the guard drops, whether the call succeeds, fails, times out or is
//! cancelled. Batch responses are matched to requests by id; per-request
//! failures land in the [`BatchReport`] and never abort sibling requests.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde_json::value::RawValue;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{BatchError, ItemError, RpcError, TransportError};
use crate::from_rpc::FromRpc;
use crate::method::Method;
use crate::pool::ConnectionPool;
use crate::request::{JsonRpcRequest, JsonRpcResponse};
use crate::transport::{Connect, RpcTransport};

/// Per-item outcome of a batch or sequence call.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub(crate) errors: Vec<Option<ItemError>>,
    pub(crate) batches_sent: usize,
}

impl BatchReport {
    pub(crate) fn new(items: usize) -> Self {
        Self {
            errors: (0..items).map(|_| None).collect(),
            batches_sent: 0,
        }
    }

    /// One slot per input item, `None` where the item succeeded.
    pub fn errors(&self) -> &[Option<ItemError>] {
        &self.errors
    }

    pub fn error(&self, index: usize) -> Option<&ItemError> {
        self.errors.get(index).and_then(Option::as_ref)
    }

    /// Items that failed, with their input index.
    pub fn failures(&self) -> impl Iterator<Item = (usize, &ItemError)> {
        self.errors
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.as_ref().map(|e| (i, e)))
    }

    /// Returns `true` if no item failed.
    pub fn is_clean(&self) -> bool {
        self.errors.iter().all(Option::is_none)
    }

    /// Round trips that completed.
    pub fn batches_sent(&self) -> usize {
        self.batches_sent
    }

    pub fn into_errors(self) -> Vec<Option<ItemError>> {
        self.errors
    }
}

/// JSON-RPC client over a [`ConnectionPool`].
pub struct Client<C> {
    pool: ConnectionPool<C>,
    next_id: AtomicU64,
    request_timeout: Duration,
    batch_limit: usize,
    max_parallel_batches: usize,
}

impl<C: RpcTransport> Client<C> {
    /// Wrap an existing pool, taking dispatcher settings from `config`.
    pub fn new(pool: ConnectionPool<C>, config: &ClientConfig) -> Self {
        Self {
            pool,
            next_id: AtomicU64::new(1),
            request_timeout: config.request_timeout(),
            batch_limit: config.batch_limit.max(1),
            max_parallel_batches: config.max_parallel_batches.max(1),
        }
    }

    /// Validate `config`, dial its pool and build a client.
    pub async fn connect<K>(connector: &K, config: &ClientConfig) -> Result<Self, RpcError>
    where
        K: Connect<Conn = C>,
    {
        config.validate()?;
        let pool = ConnectionPool::connect(connector, &config.url, config.pool_size).await?;
        Ok(Self::new(pool, config))
    }

    pub fn pool(&self) -> &ConnectionPool<C> {
        &self.pool
    }

    /// The configured batch size, for callers that do not pick their own.
    pub fn batch_limit(&self) -> usize {
        self.batch_limit
    }

    /// Reserve `n` consecutive request ids.
    pub(crate) fn reserve_ids(&self, n: usize) -> u64 {
        self.next_id.fetch_add(n as u64, Ordering::Relaxed)
    }

    fn timeout_error(&self) -> TransportError {
        TransportError::Timeout {
            ms: self.request_timeout.as_millis() as u64,
        }
    }

    async fn round_trip(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        let conn = self.pool.claim().await?;
        tokio::time::timeout(self.request_timeout, conn.send(req))
            .await
            .map_err(|_| self.timeout_error())?
    }

    /// One batch round trip on one claimed connection.
    pub(crate) async fn round_trip_batch(
        &self,
        reqs: &[JsonRpcRequest],
    ) -> Result<Vec<JsonRpcResponse>, TransportError> {
        let conn = self.pool.claim().await?;
        debug!(size = reqs.len(), slot = conn.index(), "dispatching batch");
        tokio::time::timeout(self.request_timeout, conn.send_batch(reqs))
            .await
            .map_err(|_| self.timeout_error())?
    }

    // ─── Single calls ─────────────────────────────────────────────────────────

    /// Call `method` and return the result undecoded.
    pub async fn call_raw(&self, method: &Method, params: Vec<Value>) -> Result<Box<RawValue>, RpcError> {
        let req = JsonRpcRequest::new(self.reserve_ids(1), method.as_str(), params);
        let resp = self.round_trip(req).await.map_err(|e| {
            warn!(method = %method, error = %e, "request failed");
            e
        })?;
        Ok(resp.into_result()?)
    }

    /// Call `method` and decode the result as `T`.
    ///
    /// A record that decodes only partially is reported as
    /// [`RpcError::Decode`]; use [`call_raw`](Self::call_raw) with the record
    /// decoders to keep the partial value.
    pub async fn call<T: FromRpc>(&self, method: &Method, params: Vec<Value>) -> Result<T, RpcError> {
        let raw = self.call_raw(method, params).await?;
        T::from_rpc(&raw).map_err(|partial| RpcError::Decode(partial.error))
    }

    // ─── Batches ──────────────────────────────────────────────────────────────

    /// Call `method` once per entry of `params`, `batch_limit` requests per
    /// round trip, one batch after another.
    ///
    /// `results[i]` receives the decoded result of `params[i]`, including a
    /// partially decoded record; the report holds each item's error. An item
    /// answered with an RPC error, or not answered at all, is reset to `None`.
    /// A transport failure stops the remaining batches and is returned with
    /// the report of what completed before it; slots of batches that were not
    /// answered keep their previous contents.
    pub async fn batch_call<T: FromRpc>(
        &self,
        batch_limit: usize,
        method: &Method,
        results: &mut [Option<T>],
        params: Vec<Vec<Value>>,
    ) -> Result<BatchReport, BatchError> {
        check_batch_args(batch_limit, results.len(), params.len())?;

        let mut report = BatchReport::new(results.len());
        let mut params = params.into_iter();
        let chunks = results
            .chunks_mut(batch_limit)
            .zip(report.errors.chunks_mut(batch_limit));

        let mut failure = None;
        for (batch, (slots, errors)) in chunks.enumerate() {
            let chunk: Vec<_> = params.by_ref().take(slots.len()).collect();
            if let Err(source) = self.dispatch_chunk(method, chunk, slots, errors).await {
                warn!(batch, method = %method, error = %source, "batch failed; aborting remaining batches");
                failure = Some((batch, source));
                break;
            }
            report.batches_sent += 1;
        }

        match failure {
            None => Ok(report),
            Some((batch, source)) => Err(BatchError::Transport {
                batch,
                source,
                report,
            }),
        }
    }

    /// Like [`batch_call`](Self::batch_call), but with up to
    /// `max_parallel_batches` batches in flight at once.
    ///
    /// Batches finish in any order; each writes only its own slots. After a
    /// transport failure no further batch is started, and batches already in
    /// flight are allowed to complete.
    pub async fn batch_call_concurrent<T: FromRpc>(
        &self,
        batch_limit: usize,
        method: &Method,
        results: &mut [Option<T>],
        params: Vec<Vec<Value>>,
    ) -> Result<BatchReport, BatchError> {
        check_batch_args(batch_limit, results.len(), params.len())?;

        let mut report = BatchReport::new(results.len());
        let aborted = AtomicBool::new(false);
        let mut params = params.into_iter();

        let jobs: Vec<_> = results
            .chunks_mut(batch_limit)
            .zip(report.errors.chunks_mut(batch_limit))
            .enumerate()
            .map(|(batch, (slots, errors))| {
                let chunk: Vec<_> = params.by_ref().take(slots.len()).collect();
                let aborted = &aborted;
                async move {
                    if aborted.load(Ordering::Acquire) {
                        return Ok(false);
                    }
                    match self.dispatch_chunk(method, chunk, slots, errors).await {
                        Ok(()) => Ok(true),
                        Err(source) => {
                            aborted.store(true, Ordering::Release);
                            Err((batch, source))
                        }
                    }
                }
            })
            .collect();

        let mut outcomes = stream::iter(jobs).buffer_unordered(self.max_parallel_batches);
        let mut sent = 0;
        let mut failure: Option<(usize, TransportError)> = None;
        while let Some(outcome) = outcomes.next().await {
            match outcome {
                Ok(true) => sent += 1,
                Ok(false) => {}
                Err((batch, source)) => {
                    warn!(batch, method = %method, error = %source, "batch failed; aborting remaining batches");
                    // Report the earliest failed batch.
                    if failure.as_ref().map_or(true, |(b, _)| batch < *b) {
                        failure = Some((batch, source));
                    }
                }
            }
        }
        drop(outcomes);

        report.batches_sent = sent;
        match failure {
            None => Ok(report),
            Some((batch, source)) => Err(BatchError::Transport {
                batch,
                source,
                report,
            }),
        }
    }

    /// Send one chunk as one round trip and fill its slots.
    async fn dispatch_chunk<T: FromRpc>(
        &self,
        method: &Method,
        params: Vec<Vec<Value>>,
        slots: &mut [Option<T>],
        errors: &mut [Option<ItemError>],
    ) -> Result<(), TransportError> {
        let first_id = self.reserve_ids(params.len());
        let reqs: Vec<JsonRpcRequest> = params
            .into_iter()
            .enumerate()
            .map(|(i, p)| JsonRpcRequest::new(first_id + i as u64, method.as_str(), p))
            .collect();

        let responses = self.round_trip_batch(&reqs).await?;
        let matched = match_responses(first_id, reqs.len(), responses);

        for (i, ((slot, error), resp)) in slots.iter_mut().zip(errors.iter_mut()).zip(matched).enumerate() {
            *error = match resp {
                None => {
                    *slot = None;
                    Some(ItemError::MissingResponse {
                        id: first_id + i as u64,
                    })
                }
                Some(resp) => match resp.into_result() {
                    Ok(raw) => decode_into(&raw, slot),
                    Err(e) => {
                        *slot = None;
                        Some(e)
                    }
                },
            };
        }
        Ok(())
    }

    /// Wait for outstanding calls to release their connections, then close the pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Decode `raw` into `slot`, keeping a partial value alongside its error.
pub(crate) fn decode_into<T: FromRpc>(raw: &RawValue, slot: &mut Option<T>) -> Option<ItemError> {
    match T::from_rpc(raw) {
        Ok(value) => {
            *slot = Some(value);
            None
        }
        Err(partial) => {
            *slot = partial.value;
            Some(ItemError::Decode(partial.error))
        }
    }
}

/// Place each response at `id - first_id`. Unknown and duplicate ids are dropped.
pub(crate) fn match_responses(
    first_id: u64,
    len: usize,
    responses: Vec<JsonRpcResponse>,
) -> Vec<Option<JsonRpcResponse>> {
    let mut matched: Vec<Option<JsonRpcResponse>> = (0..len).map(|_| None).collect();
    for resp in responses {
        let slot = resp
            .id
            .as_u64()
            .and_then(|id| id.checked_sub(first_id))
            .and_then(|offset| usize::try_from(offset).ok())
            .and_then(|offset| matched.get_mut(offset));
        match slot {
            Some(slot @ None) => *slot = Some(resp),
            Some(Some(_)) => debug!(id = %resp.id, "duplicate response id ignored"),
            None => debug!(id = %resp.id, "response for unknown id ignored"),
        }
    }
    matched
}

pub(crate) fn check_batch_args(batch_limit: usize, results: usize, params: usize) -> Result<(), BatchError> {
    if batch_limit == 0 {
        return Err(BatchError::InvalidArgument("batch limit must be positive".into()));
    }
    if results != params {
        return Err(BatchError::InvalidArgument(format!(
            "{results} result slots for {params} parameter sets"
        )));
    }
    Ok(())
}
