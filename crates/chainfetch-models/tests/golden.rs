//! Golden fixture integration tests.
//!
//! Each test loads a recorded JSON-RPC response from `fixtures/rpc/`,
//! decodes it, and checks the record against the `expected` section of the
//! same fixture. The last group serves the fixtures through a mock
//! transport and decodes them via the batch client.

use std::collections::HashMap;

use alloy_primitives::{B256, U256};
use async_trait::async_trait;
use chainfetch_core::{
    BlockTag, Client, ClientConfig, ConnectionPool, JsonRpcRequest, JsonRpcResponse, Method,
    RpcTransport, Sequence, TransportError,
};
use chainfetch_models::{
    decode_block, decode_logs, decode_receipt, decode_receipts, Block, BlockTransactions, Log,
    Receipt,
};
use serde_json::value::RawValue;
use serde_json::{json, Value};

// ─── Helpers ──────────────────────────────────────────────────────────────────

/// The fixtures live two levels above the crate root.
fn fixture_path(name: &str) -> std::path::PathBuf {
    let mut p = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    p.push("../../fixtures/rpc");
    p.push(name);
    p
}

fn load(name: &str) -> Value {
    let text = std::fs::read_to_string(fixture_path(name)).expect("fixture not found");
    serde_json::from_str(&text).expect("fixture is not JSON")
}

/// The `result` member of the fixture's response, as raw bytes.
fn result_bytes(fixture: &Value) -> Vec<u8> {
    serde_json::to_vec(&fixture["response"]["result"]).unwrap()
}

fn hash(v: &Value) -> B256 {
    v.as_str().unwrap().parse().unwrap()
}

// ─── Blocks ───────────────────────────────────────────────────────────────────

#[test]
fn block_with_hashes_golden() {
    let f = load("block-hashes.json");
    let exp = &f["expected"];
    let block = decode_block(&result_bytes(&f)).expect("clean decode");

    assert_eq!(block.number(), exp["number"].as_u64().unwrap());
    assert_eq!(block.timestamp(), exp["timestamp"].as_u64().unwrap());
    assert_eq!(block.size(), exp["size"].as_u64().unwrap());
    assert_eq!(block.hash(), hash(&exp["hash"]));

    let expected_hashes: Vec<B256> = exp["transactionHashes"].as_array().unwrap().iter().map(hash).collect();
    assert_eq!(block.transactions(), &BlockTransactions::Hashes(expected_hashes));

    assert_eq!(block.gas_limit().unwrap(), U256::from(exp["gasLimit"].as_u64().unwrap()));
    assert_eq!(block.gas_used().unwrap(), U256::from(exp["gasUsed"].as_u64().unwrap()));
    assert_eq!(block.base_fee_per_gas().unwrap(), U256::from(exp["baseFeePerGas"].as_u64().unwrap()));
    assert_eq!(block.state_root().unwrap(), hash(&exp["stateRoot"]));
    assert_eq!(block.miner().unwrap().to_string().to_lowercase(), exp["miner"].as_str().unwrap());
    assert_eq!(block.extra_data().unwrap().as_ref(), exp["extraData"].as_str().unwrap().as_bytes());
    assert_eq!(block.cold_fields().unwrap().len() as u64, exp["coldFieldCount"].as_u64().unwrap());
}

#[test]
fn block_with_full_transactions_golden() {
    let f = load("block-full.json");
    let exp = &f["expected"];
    let block = decode_block(&result_bytes(&f)).expect("clean decode");
    assert_eq!(block.number(), exp["number"].as_u64().unwrap());

    let txs = block.transactions().as_full().expect("full transactions");
    let expected = exp["transactions"].as_array().unwrap();
    assert_eq!(txs.len(), expected.len());

    for (tx, e) in txs.iter().zip(expected) {
        assert_eq!(tx.hash(), hash(&e["hash"]));
        assert_eq!(u64::from(tx.tx_type()), e["type"].as_u64().unwrap());
        assert_eq!(tx.to().map(|a| a.to_string().to_lowercase()), e["to"].as_str().map(str::to_owned));
        assert_eq!(tx.value().to_string(), e["value"].as_str().unwrap());
        assert_eq!(tx.nonce().unwrap(), U256::from(e["nonce"].as_u64().unwrap()));
        assert_eq!(tx.v(), e["v"].as_u64().unwrap());
        assert_eq!(tx.block_number(), Some(block.number()));
        if let Some(max_fee) = e["maxFeePerGas"].as_u64() {
            assert_eq!(tx.max_fee_per_gas().unwrap(), U256::from(max_fee));
        }
    }
}

#[test]
fn block_decode_is_repeatable() {
    let raw = result_bytes(&load("block-full.json"));
    let a = decode_block(&raw).unwrap();
    let b = decode_block(&raw).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.cold_blob(), b.cold_blob());
    assert_eq!(a.cold_fields().unwrap(), a.cold_fields().unwrap());
}

#[test]
fn corrupted_fixture_reports_every_bad_field() {
    let mut f = load("block-full.json");
    let result = &mut f["response"]["result"];
    result["number"] = json!("bogus");
    result["transactions"][1]["value"] = json!("0xnot-hex");
    result["transactions"][1]["hash"] = json!("0x1234");

    let partial = decode_block(&serde_json::to_vec(result).unwrap()).unwrap_err();
    let block = partial.value.expect("partial block");
    let errors = block.field_errors();
    assert!(errors.contains("number"));
    assert!(errors.contains("transactions[1].value"));
    assert!(errors.contains("transactions[1].hash"));
    assert_eq!(errors.len(), 3);

    // everything else survived
    assert_eq!(block.number(), 0);
    assert_eq!(block.transactions().len(), 2);
    assert_eq!(block.gas_limit().unwrap(), U256::from(30_000_000));
}

// ─── Receipts and logs ────────────────────────────────────────────────────────

#[test]
fn receipt_golden() {
    let f = load("receipt.json");
    let exp = &f["expected"];
    let receipt = decode_receipt(&result_bytes(&f)).expect("clean decode");

    assert_eq!(receipt.status(), exp["status"].as_u64().unwrap());
    assert!(receipt.succeeded());
    assert_eq!(u64::from(receipt.tx_type()), exp["type"].as_u64().unwrap());
    assert_eq!(receipt.block_number(), exp["blockNumber"].as_u64().unwrap());
    assert_eq!(receipt.transaction_index(), exp["transactionIndex"].as_u64().unwrap());
    assert_eq!(receipt.logs().len() as u64, exp["logCount"].as_u64().unwrap());
    assert_eq!(receipt.contract_address(), None);
    assert_eq!(receipt.gas_used().unwrap(), U256::from(exp["gasUsed"].as_u64().unwrap()));
    assert_eq!(
        receipt.cumulative_gas_used().unwrap(),
        U256::from(exp["cumulativeGasUsed"].as_u64().unwrap())
    );
    assert_eq!(
        receipt.effective_gas_price().unwrap(),
        U256::from(exp["effectiveGasPrice"].as_u64().unwrap())
    );
}

#[test]
fn logs_golden() {
    let f = load("logs.json");
    let exp = &f["expected"];
    let logs = decode_logs(&result_bytes(&f)).expect("clean decode");

    assert_eq!(logs.len() as u64, exp["count"].as_u64().unwrap());
    let indexes: Vec<u64> = logs.iter().map(Log::log_index).collect();
    let expected: Vec<u64> = exp["logIndexes"].as_array().unwrap().iter().filter_map(Value::as_u64).collect();
    assert_eq!(indexes, expected);

    let topics: Vec<u64> = logs.iter().map(|l| l.topics().len() as u64).collect();
    let expected: Vec<u64> = exp["topicCounts"].as_array().unwrap().iter().filter_map(Value::as_u64).collect();
    assert_eq!(topics, expected);

    let amount = U256::from_be_slice(logs[0].data());
    assert_eq!(amount, U256::from(exp["transferAmount"].as_u64().unwrap()));
    assert_eq!(logs[0].block_timestamp().unwrap(), U256::from(exp["blockTimestamp"].as_u64().unwrap()));
}

#[test]
fn block_receipts_decode_as_a_list() {
    let receipt = load("receipt.json")["response"]["result"].clone();
    let raw = serde_json::to_vec(&json!([receipt.clone(), receipt, null])).unwrap();
    let partial = decode_receipts(&raw).unwrap_err();
    assert_eq!(partial.value.as_ref().map(Vec::len), Some(2));
    assert!(partial.error.field_errors().unwrap().contains("[2]"));
}

// ─── Through the client ───────────────────────────────────────────────────────

/// Serves fixture results by method name.
struct FixtureConn {
    results: HashMap<&'static str, Box<RawValue>>,
}

impl FixtureConn {
    fn new() -> Self {
        let mut results = HashMap::new();
        for (method, file) in [
            ("eth_getBlockByNumber", "block-full.json"),
            ("eth_getBlockByHash", "block-hashes.json"),
            ("eth_getTransactionReceipt", "receipt.json"),
            ("eth_getLogs", "logs.json"),
        ] {
            let raw = serde_json::value::to_raw_value(&load(file)["response"]["result"]).unwrap();
            results.insert(method, raw);
        }
        Self { results }
    }
}

#[async_trait]
impl RpcTransport for FixtureConn {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        let id = req.id.as_u64().unwrap_or_default();
        let raw = self
            .results
            .get(req.method.as_str())
            .cloned()
            .ok_or_else(|| TransportError::Other(format!("no fixture for {}", req.method)))?;
        Ok(JsonRpcResponse::success(id, raw))
    }

    fn url(&self) -> &str {
        "fixture://"
    }
}

fn fixture_client() -> Client<FixtureConn> {
    let pool = ConnectionPool::from_connections("fixture://", vec![FixtureConn::new()]).unwrap();
    Client::new(pool, &ClientConfig::new("fixture://"))
}

#[tokio::test]
async fn client_decodes_a_block() {
    let client = fixture_client();
    let block: Block = client
        .call(&Method::BlockByNumber, vec![BlockTag::Latest.into(), json!(true)])
        .await
        .unwrap();
    assert_eq!(block.number(), 21_990_449);
    assert_eq!(block.transactions().len(), 2);
}

#[tokio::test]
async fn client_batches_blocks() {
    let client = fixture_client();
    let mut blocks: Vec<Option<Block>> = vec![None; 5];
    let params = (0..5u64)
        .map(|n| vec![chainfetch_core::hex::quantity(n), json!(false)])
        .collect();

    let report = client
        .batch_call(2, &Method::BlockByNumber, &mut blocks, params)
        .await
        .unwrap();

    assert!(report.is_clean());
    assert_eq!(report.batches_sent(), 3);
    assert!(blocks.iter().all(|b| b.as_ref().map(Block::number) == Some(21_990_449)));
}

#[tokio::test]
async fn client_sequence_mixes_record_types() {
    let client = fixture_client();
    let mut block: Option<Block> = None;
    let mut receipt: Option<Receipt> = None;
    let mut logs: Option<Vec<Log>> = None;

    let mut seq = Sequence::new();
    seq.push(Method::BlockByHash, vec![json!("0x00"), json!(false)], &mut block)
        .push(Method::TxReceipt, vec![json!("0x00")], &mut receipt)
        .push(Method::Logs, vec![json!({"fromBlock": "latest"})], &mut logs);

    let report = client.sequence_batch_call(10, seq).await.unwrap();

    assert!(report.is_clean());
    assert!(matches!(block.map(|b| b.transactions().clone()), Some(BlockTransactions::Hashes(h)) if h.len() == 2));
    assert_eq!(receipt.map(|r| r.logs().len()), Some(2));
    assert_eq!(logs.map(|l| l.len()), Some(2));
}
