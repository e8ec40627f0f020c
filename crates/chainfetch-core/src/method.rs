//! Catalogue of JSON-RPC method names and block tags.

use std::fmt;

use serde_json::Value;

/// A JSON-RPC method. Use [`Method::Custom`] for anything not listed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    BlockNumber,
    ChainId,
    GasPrice,
    BlockByHash,
    BlockByNumber,
    BlockReceipts,
    BlockTxCountByHash,
    BlockTxCountByNumber,
    UncleCountByBlockHash,
    UncleCountByBlockNumber,
    UncleByBlockHashAndIndex,
    UncleByBlockNumberAndIndex,
    TxByHash,
    TxByBlockHashAndIndex,
    TxByBlockNumberAndIndex,
    TxReceipt,
    TxCount,
    Balance,
    StorageAt,
    Code,
    Call,
    EstimateGas,
    Logs,
    NewFilter,
    NewBlockFilter,
    NewPendingTxFilter,
    UninstallFilter,
    FilterChanges,
    FilterLogs,
    Sign,
    SendRawTx,
    Subscribe,
    Unsubscribe,
    BadBlocks,
    RawBlock,
    NetVersion,
    NetListening,
    NetPeerCount,
    Custom(String),
}

const CATALOGUE: &[(Method, &str)] = &[
    (Method::BlockNumber, "eth_blockNumber"),
    (Method::ChainId, "eth_chainId"),
    (Method::GasPrice, "eth_gasPrice"),
    (Method::BlockByHash, "eth_getBlockByHash"),
    (Method::BlockByNumber, "eth_getBlockByNumber"),
    (Method::BlockReceipts, "eth_getBlockReceipts"),
    (Method::BlockTxCountByHash, "eth_getBlockTransactionCountByHash"),
    (Method::BlockTxCountByNumber, "eth_getBlockTransactionCountByNumber"),
    (Method::UncleCountByBlockHash, "eth_getUncleCountByBlockHash"),
    (Method::UncleCountByBlockNumber, "eth_getUncleCountByBlockNumber"),
    (Method::UncleByBlockHashAndIndex, "eth_getUncleByBlockHashAndIndex"),
    (Method::UncleByBlockNumberAndIndex, "eth_getUncleByBlockNumberAndIndex"),
    (Method::TxByHash, "eth_getTransactionByHash"),
    (Method::TxByBlockHashAndIndex, "eth_getTransactionByBlockHashAndIndex"),
    (Method::TxByBlockNumberAndIndex, "eth_getTransactionByBlockNumberAndIndex"),
    (Method::TxReceipt, "eth_getTransactionReceipt"),
    (Method::TxCount, "eth_getTransactionCount"),
    (Method::Balance, "eth_getBalance"),
    (Method::StorageAt, "eth_getStorageAt"),
    (Method::Code, "eth_getCode"),
    (Method::Call, "eth_call"),
    (Method::EstimateGas, "eth_estimateGas"),
    (Method::Logs, "eth_getLogs"),
    (Method::NewFilter, "eth_newFilter"),
    (Method::NewBlockFilter, "eth_newBlockFilter"),
    (Method::NewPendingTxFilter, "eth_newPendingTransactionFilter"),
    (Method::UninstallFilter, "eth_uninstallFilter"),
    (Method::FilterChanges, "eth_getFilterChanges"),
    (Method::FilterLogs, "eth_getFilterLogs"),
    (Method::Sign, "eth_sign"),
    (Method::SendRawTx, "eth_sendRawTransaction"),
    (Method::Subscribe, "eth_subscribe"),
    (Method::Unsubscribe, "eth_unsubscribe"),
    (Method::BadBlocks, "debug_getBadBlocks"),
    (Method::RawBlock, "debug_getRawBlock"),
    (Method::NetVersion, "net_version"),
    (Method::NetListening, "net_listening"),
    (Method::NetPeerCount, "net_peerCount"),
];

impl Method {
    /// The wire name sent in the request's `method` member.
    pub fn as_str(&self) -> &str {
        if let Self::Custom(name) = self {
            return name;
        }
        CATALOGUE
            .iter()
            .find(|(m, _)| m == self)
            .map(|(_, name)| *name)
            .unwrap_or_default()
    }

    /// Look a wire name up in the catalogue, falling back to `Custom`.
    pub fn from_name(name: &str) -> Self {
        CATALOGUE
            .iter()
            .find(|(_, n)| *n == name)
            .map(|(m, _)| m.clone())
            .unwrap_or_else(|| Self::Custom(name.to_owned()))
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Method {
    fn from(name: &str) -> Self {
        Self::from_name(name)
    }
}

/// Named block positions accepted wherever a block number is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockTag {
    Latest,
    Pending,
    Earliest,
    Safe,
    Finalized,
}

impl BlockTag {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Latest => "latest",
            Self::Pending => "pending",
            Self::Earliest => "earliest",
            Self::Safe => "safe",
            Self::Finalized => "finalized",
        }
    }
}

impl fmt::Display for BlockTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<BlockTag> for Value {
    fn from(tag: BlockTag) -> Self {
        Value::String(tag.as_str().to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names() {
        assert_eq!(Method::BlockByNumber.as_str(), "eth_getBlockByNumber");
        assert_eq!(Method::Logs.to_string(), "eth_getLogs");
        assert_eq!(Method::NetPeerCount.as_str(), "net_peerCount");
        assert_eq!(Method::Custom("trace_block".into()).as_str(), "trace_block");
    }

    #[test]
    fn every_catalogue_entry_round_trips() {
        for (method, name) in CATALOGUE {
            assert_eq!(method.as_str(), *name);
            assert_eq!(&Method::from_name(name), method);
        }
        assert_eq!(Method::from("foo_bar"), Method::Custom("foo_bar".into()));
    }

    #[test]
    fn block_tag_param() {
        assert_eq!(Value::from(BlockTag::Finalized), Value::String("finalized".into()));
    }
}
