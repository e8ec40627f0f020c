//! chainfetch-http: HTTP transport for ChainFetch.
//!
//! ```rust,no_run
//! use chainfetch_core::{Client, ClientConfig, Method};
//! use chainfetch_http::HttpConnector;
//!
//! # async fn run() -> Result<(), chainfetch_core::RpcError> {
//! let config = ClientConfig::new("https://eth.llamarpc.com");
//! let connector = HttpConnector::new((&config).into());
//! let client = Client::connect(&connector, &config).await?;
//! let head: u64 = client.call(&Method::BlockNumber, vec![]).await?;
//! # let _ = head;
//! # Ok(())
//! # }
//! ```

pub mod client;

pub use client::{HttpClientConfig, HttpConnector, HttpRpcClient};

use chainfetch_core::{Client, ClientConfig, RpcError};

/// Dial a pool of HTTP connections for `config` and wrap it in a [`Client`].
pub async fn connect(config: &ClientConfig) -> Result<Client<HttpRpcClient>, RpcError> {
    let connector = HttpConnector::new(HttpClientConfig::from(config));
    Client::connect(&connector, config).await
}
