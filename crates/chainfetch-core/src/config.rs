//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::RpcError;

/// Configuration for one [`Client`](crate::Client) and its connection pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Upstream JSON-RPC endpoint, e.g. "https://eth.llamarpc.com"
    pub url: String,
    /// Number of pooled connections
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    /// Requests per batch round trip
    #[serde(default = "default_batch_limit")]
    pub batch_limit: usize,
    /// Batches in flight at once for concurrent batch calls
    #[serde(default = "default_max_parallel_batches")]
    pub max_parallel_batches: usize,
    /// Upper bound on one round trip, in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_pool_size() -> usize { 4 }
fn default_batch_limit() -> usize { 100 }
fn default_max_parallel_batches() -> usize { 4 }
fn default_request_timeout_ms() -> u64 { 30_000 }

impl ClientConfig {
    /// Default settings for `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            pool_size: default_pool_size(),
            batch_limit: default_batch_limit(),
            max_parallel_batches: default_max_parallel_batches(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Reject settings the pool or dispatcher cannot run with.
    pub fn validate(&self) -> Result<(), RpcError> {
        if self.pool_size == 0 {
            return Err(RpcError::InvalidArgument("pool_size must be positive".into()));
        }
        if self.batch_limit == 0 {
            return Err(RpcError::InvalidArgument("batch_limit must be positive".into()));
        }
        if self.max_parallel_batches == 0 {
            return Err(RpcError::InvalidArgument(
                "max_parallel_batches must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let cfg: ClientConfig = serde_json::from_str(r#"{"url":"http://localhost:8545"}"#).unwrap();
        assert_eq!(cfg, ClientConfig::new("http://localhost:8545"));
        assert_eq!(cfg.pool_size, 4);
        assert_eq!(cfg.batch_limit, 100);
        assert_eq!(cfg.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn zero_sizes_are_rejected() {
        let mut cfg = ClientConfig::new("http://localhost:8545");
        assert!(cfg.validate().is_ok());
        cfg.pool_size = 0;
        assert!(matches!(cfg.validate(), Err(RpcError::InvalidArgument(_))));
    }
}
