//! Shared test helpers: dummy values, config builders and JSON-RPC mocks.

#![allow(dead_code)]

use ethereum_types::H256;
use nexus_relay::config::{ChainDescriptor, Config, RelaySettings};
use nexus_relay::{Address, EvmSigner, MessageReceipt};
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// DUMMY VALUES
// ============================================================================

/// Relayer key used across tests (never funded anywhere)
pub const DUMMY_PRIVATE_KEY: &str =
    "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
/// Address of DUMMY_PRIVATE_KEY
pub const DUMMY_RELAYER_ADDR: &str = "0x2c7536e3605d9c16a7a3d7b1898e529396a65c23";

pub const DUMMY_MAILBOX_ADDR_SOURCE: &str = "0x00000000000000000000000000000000000000a1";
pub const DUMMY_MAILBOX_ADDR_DEST: &str = "0x00000000000000000000000000000000000000b2";
pub const DUMMY_RECIPIENT_ADDR: &str = "0x00000000000000000000000000000000000000c3";

pub const DUMMY_TX_HASH: &str =
    "0x1111111111111111111111111111111111111111111111111111111111111111";
pub const DUMMY_TX_HASH_2: &str =
    "0x2222222222222222222222222222222222222222222222222222222222222222";

pub const SOURCE_CHAIN_ID: u64 = 270;
pub const DEST_CHAIN_ID: u64 = 271;

pub fn source_app_id() -> H256 {
    H256::from_low_u64_be(0xa)
}

pub fn dest_app_id() -> H256 {
    H256::from_low_u64_be(0xb)
}

pub fn addr(value: &str) -> Address {
    nexus_relay::types::parse_address(value).unwrap()
}

pub fn hash(value: &str) -> H256 {
    nexus_relay::types::parse_h256(value).unwrap()
}

pub fn test_signer() -> EvmSigner {
    EvmSigner::from_hex(DUMMY_PRIVATE_KEY).unwrap()
}

// ============================================================================
// CONFIG BUILDERS
// ============================================================================

pub fn source_chain(rpc_url: &str) -> ChainDescriptor {
    ChainDescriptor {
        name: "source".to_string(),
        app_id: source_app_id(),
        rpc_url: rpc_url.to_string(),
        mailbox_addr: addr(DUMMY_MAILBOX_ADDR_SOURCE),
        chain_id: SOURCE_CHAIN_ID,
        proof_depth: None,
    }
}

pub fn dest_chain(rpc_url: &str) -> ChainDescriptor {
    ChainDescriptor {
        name: "dest".to_string(),
        app_id: dest_app_id(),
        rpc_url: rpc_url.to_string(),
        mailbox_addr: addr(DUMMY_MAILBOX_ADDR_DEST),
        chain_id: DEST_CHAIN_ID,
        proof_depth: None,
    }
}

/// Two-chain config with fast receipt polling.
pub fn build_test_config(source: ChainDescriptor, dest: ChainDescriptor, local_app_id: H256) -> Config {
    Config {
        relay: RelaySettings {
            local_app_id,
            private_key_env: "NEXUS_RELAY_TEST_UNUSED_KEY".to_string(),
            rpc_timeout_ms: 2_000,
            gas_limit: 2_000_000,
            receipt_poll_interval_ms: 10,
            receipt_poll_attempts: 3,
        },
        chains: vec![source, dest],
    }
}

/// Receipt sent from the source app to the destination app.
pub fn sample_receipt(nonce: u64) -> MessageReceipt {
    MessageReceipt {
        source_app_id: source_app_id(),
        dest_app_ids: vec![dest_app_id()],
        data: b"hello nexus".to_vec(),
        from: addr(DUMMY_RELAYER_ADDR),
        to: vec![addr(DUMMY_RECIPIENT_ADDR)],
        nonce,
    }
}

// ============================================================================
// JSON-RPC MOCKS
// ============================================================================

pub fn rpc_result(result: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "jsonrpc": "2.0",
        "id": 1,
        "result": result
    }))
}

pub fn rpc_error(code: i64, message: &str, data: Option<&str>) -> ResponseTemplate {
    let mut error = json!({"code": code, "message": message});
    if let Some(data) = data {
        error["data"] = json!(data);
    }
    ResponseTemplate::new(200).set_body_json(json!({
        "jsonrpc": "2.0",
        "id": 1,
        "error": error
    }))
}

/// Mount a mock answering every `rpc_method` call with `response`.
pub async fn mount_rpc(mock_server: &MockServer, rpc_method: &str, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": rpc_method})))
        .respond_with(response)
        .mount(mock_server)
        .await;
}

/// `Error(string)` revert payload as the node reports it in `error.data`.
pub fn revert_data(reason: &str) -> String {
    let mut payload = vec![0x08, 0xc3, 0x79, 0xa0];
    payload.extend(nexus_relay::abi::encode(&[nexus_relay::abi::Token::Bytes(
        reason.as_bytes().to_vec(),
    )]));
    format!("0x{}", hex::encode(payload))
}

pub fn tx_receipt_json(tx_hash: &str, status: &str) -> Value {
    json!({
        "transactionHash": tx_hash,
        "blockNumber": "0x10",
        "status": status,
        "l1BatchNumber": "0x2a"
    })
}

/// Mount nonce, gas price and raw-transaction mocks plus the receipt for `tx_hash`.
///
/// `eth_call` is left to the caller so each test decides how the dry run behaves.
pub async fn mount_submission_mocks(mock_server: &MockServer, tx_hash: &str, status: &str) {
    mount_rpc(mock_server, "eth_getTransactionCount", rpc_result(json!("0x0"))).await;
    mount_rpc(mock_server, "eth_gasPrice", rpc_result(json!("0x3b9aca00"))).await;
    mount_rpc(mock_server, "eth_sendRawTransaction", rpc_result(json!(tx_hash))).await;
    mount_rpc(
        mock_server,
        "eth_getTransactionReceipt",
        rpc_result(tx_receipt_json(tx_hash, status)),
    )
    .await;
}

/// `zks_getProof` result with a single storage entry.
pub fn zk_proof_json(account: Address, key: H256, value: H256, index: u64, path: &[H256]) -> Value {
    json!({
        "address": format!("{:#x}", account),
        "storageProof": [{
            "key": format!("{:#x}", key),
            "value": format!("{:#x}", value),
            "index": index,
            "proof": path.iter().map(|h| format!("{:#x}", h)).collect::<Vec<_>>()
        }]
    })
}

pub fn sibling_path(depth: usize) -> Vec<H256> {
    (0..depth).map(|i| H256::repeat_byte(i as u8 + 1)).collect()
}
