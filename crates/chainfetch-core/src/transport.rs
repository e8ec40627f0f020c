//! The `RpcTransport` trait (one connection to a node) and its dialer.

use async_trait::async_trait;

use crate::error::TransportError;
use crate::request::{JsonRpcRequest, JsonRpcResponse};

/// One connection to a node.
///
/// A pooled connection is claimed exclusively while a request is in flight,
/// so implementations never see two concurrent calls through the pool.
#[async_trait]
pub trait RpcTransport: Send + Sync + 'static {
    /// One request, one response.
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError>;

    /// Send a batch of JSON-RPC requests as one round trip.
    ///
    /// Responses may arrive in any order; callers match them by id. The
    /// default sends each request on its own, in order.
    async fn send_batch(
        &self,
        reqs: &[JsonRpcRequest],
    ) -> Result<Vec<JsonRpcResponse>, TransportError> {
        let mut responses = Vec::with_capacity(reqs.len());
        for req in reqs {
            responses.push(self.send(req.clone()).await?);
        }
        Ok(responses)
    }

    /// Endpoint this connection talks to.
    fn url(&self) -> &str;

    /// Release any resources held by the connection.
    async fn close(&self) {}
}

/// Establishes connections to an upstream node.
#[async_trait]
pub trait Connect: Send + Sync {
    type Conn: RpcTransport;

    /// Dial `url` once, returning a ready connection.
    async fn connect(&self, url: &str) -> Result<Self::Conn, TransportError>;
}
