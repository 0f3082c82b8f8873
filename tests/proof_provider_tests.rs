//! Storage proof provider tests
//!
//! These tests verify that proofs are mapped from `zks_getProof` responses and
//! that every way of not getting a proof surfaces as a typed absence.

use async_trait::async_trait;
use ethereum_types::H256;
use nexus_relay::config::ChainDescriptor;
use nexus_relay::{
    Address, ProofSource, RawStorageProof, RelayError, StorageProofProvider, ZkSyncProofSource,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[path = "helpers.rs"]
mod test_helpers;
use test_helpers::{
    addr, mount_rpc, rpc_error, rpc_result, sibling_path, source_chain, zk_proof_json,
    DUMMY_MAILBOX_ADDR_SOURCE,
};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn zksync_provider(timeout: Duration) -> StorageProofProvider {
    StorageProofProvider::new(Arc::new(ZkSyncProofSource::new(timeout).unwrap()), timeout)
}

fn slot_key() -> H256 {
    H256::repeat_byte(0x42)
}

/// Proof source that never answers within any reasonable bound.
struct StalledSource;

#[async_trait]
impl ProofSource for StalledSource {
    async fn fetch_proof(
        &self,
        _chain: &ChainDescriptor,
        _account: Address,
        _key: H256,
        _batch_number: u64,
    ) -> Result<Option<RawStorageProof>, RelayError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(None)
    }
}

// ============================================================================
// TESTS
// ============================================================================

/// 1. Test: Proof Fields Are Mapped From The Node Response
/// What is tested: zks_getProof request shape and field-for-field mapping
/// Why: The encoded proof is built from these fields; the batch must be the caller's anchor
#[tokio::test]
async fn test_get_proof_maps_response() {
    let mock_server = MockServer::start().await;
    let mailbox = addr(DUMMY_MAILBOX_ADDR_SOURCE);
    let value = H256::from_low_u64_be(1);
    let path = sibling_path(3);

    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "method": "zks_getProof",
            "params": [DUMMY_MAILBOX_ADDR_SOURCE, [format!("{:#x}", slot_key())], 77]
        })))
        .respond_with(rpc_result(zk_proof_json(mailbox, slot_key(), value, 5, &path)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let chain = source_chain(&mock_server.uri());
    let proof = zksync_provider(Duration::from_secs(2))
        .get_proof(&chain, mailbox, slot_key(), 77)
        .await
        .unwrap();

    assert_eq!(proof.batch_number, 77);
    assert_eq!(proof.account, mailbox);
    assert_eq!(proof.key, slot_key());
    assert_eq!(proof.value, value);
    assert_eq!(proof.path, path);
    assert_eq!(proof.index, 5);
}

/// 2. Test: Null Result Is ProofNotFound
/// What is tested: A `null` result from the node
/// Why: Unknown batches answer null; that is an absence, not a transport failure
#[tokio::test]
async fn test_null_result_is_not_found() {
    let mock_server = MockServer::start().await;
    mount_rpc(&mock_server, "zks_getProof", rpc_result(json!(null))).await;

    let chain = source_chain(&mock_server.uri());
    let err = zksync_provider(Duration::from_secs(2))
        .get_proof(&chain, chain.mailbox_addr, slot_key(), 1)
        .await
        .unwrap_err();

    assert!(matches!(err, RelayError::ProofNotFound { batch_number: 1, .. }));
    assert!(err.is_proof_unavailable());
}

/// 3. Test: Empty Storage Proof Is ProofNotFound
/// What is tested: A response without an entry for the requested key
/// Why: A response lacking the key proves nothing about the message
#[tokio::test]
async fn test_empty_storage_proof_is_not_found() {
    let mock_server = MockServer::start().await;
    mount_rpc(
        &mock_server,
        "zks_getProof",
        rpc_result(json!({"address": DUMMY_MAILBOX_ADDR_SOURCE, "storageProof": []})),
    )
    .await;

    let chain = source_chain(&mock_server.uri());
    let err = zksync_provider(Duration::from_secs(2))
        .get_proof(&chain, chain.mailbox_addr, slot_key(), 1)
        .await
        .unwrap_err();

    assert!(matches!(err, RelayError::ProofNotFound { .. }));
}

/// 4. Test: Zero Value Is ProofNotFound
/// What is tested: A proof of an empty slot
/// Why: The message was never written at that batch; relaying would only revert
#[tokio::test]
async fn test_zero_value_is_not_found() {
    let mock_server = MockServer::start().await;
    let chain = source_chain(&mock_server.uri());
    mount_rpc(
        &mock_server,
        "zks_getProof",
        rpc_result(zk_proof_json(
            chain.mailbox_addr,
            slot_key(),
            H256::zero(),
            0,
            &sibling_path(2),
        )),
    )
    .await;

    let err = zksync_provider(Duration::from_secs(2))
        .get_proof(&chain, chain.mailbox_addr, slot_key(), 1)
        .await
        .unwrap_err();

    assert!(matches!(err, RelayError::ProofNotFound { .. }));
}

/// 5. Test: Node Error Is RpcFailure
/// What is tested: A JSON-RPC error object
/// Why: Node failures stay distinguishable from legitimate absence
#[tokio::test]
async fn test_node_error_is_rpc_failure() {
    let mock_server = MockServer::start().await;
    mount_rpc(
        &mock_server,
        "zks_getProof",
        rpc_error(-32602, "Invalid params", None),
    )
    .await;

    let chain = source_chain(&mock_server.uri());
    let err = zksync_provider(Duration::from_secs(2))
        .get_proof(&chain, chain.mailbox_addr, slot_key(), 1)
        .await
        .unwrap_err();

    match err {
        RelayError::RpcFailure { ref endpoint, ref message } => {
            assert_eq!(endpoint, &mock_server.uri());
            assert!(message.contains("Invalid params"), "message: {}", message);
        }
        other => panic!("expected RpcFailure, got {:?}", other),
    }
    assert!(err.is_proof_unavailable());
}

/// 6. Test: Malformed Response Is RpcFailure
/// What is tested: A result that is not a proof object
/// Why: Garbage from the node must not escape as a decode panic or a raw serde error
#[tokio::test]
async fn test_malformed_response_is_rpc_failure() {
    let mock_server = MockServer::start().await;
    mount_rpc(&mock_server, "zks_getProof", rpc_result(json!("0xdeadbeef"))).await;

    let chain = source_chain(&mock_server.uri());
    let err = zksync_provider(Duration::from_secs(2))
        .get_proof(&chain, chain.mailbox_addr, slot_key(), 1)
        .await
        .unwrap_err();

    assert!(matches!(err, RelayError::RpcFailure { .. }));
}

/// 7. Test: Unreachable Node Is RpcFailure
/// What is tested: Connection refused
/// Why: Transport errors are surfaced as a typed absence
#[tokio::test]
async fn test_unreachable_node_is_rpc_failure() {
    let chain = source_chain("http://127.0.0.1:1");
    let err = zksync_provider(Duration::from_secs(2))
        .get_proof(&chain, chain.mailbox_addr, slot_key(), 1)
        .await
        .unwrap_err();

    assert!(matches!(err, RelayError::RpcFailure { .. }));
}

/// 8. Test: Slow Node Is Timeout
/// What is tested: A response delayed beyond the configured bound
/// Why: The provider's wait must be bounded
#[tokio::test]
async fn test_slow_node_is_timeout() {
    let mock_server = MockServer::start().await;
    mount_rpc(
        &mock_server,
        "zks_getProof",
        rpc_result(json!(null)).set_delay(Duration::from_secs(5)),
    )
    .await;

    let chain = source_chain(&mock_server.uri());
    let err = zksync_provider(Duration::from_millis(200))
        .get_proof(&chain, chain.mailbox_addr, slot_key(), 1)
        .await
        .unwrap_err();

    assert!(matches!(err, RelayError::Timeout { .. }), "got {:?}", err);
}

/// 9. Test: Stalled Source Is Timeout
/// What is tested: The provider bound applies to any ProofSource
/// Why: Custom sources must not be able to hang a receive operation
#[tokio::test]
async fn test_stalled_source_is_timeout() {
    let provider = StorageProofProvider::new(Arc::new(StalledSource), Duration::from_millis(50));
    let chain = source_chain("http://127.0.0.1:1");

    let err = provider
        .get_proof(&chain, chain.mailbox_addr, slot_key(), 1)
        .await
        .unwrap_err();

    assert!(matches!(err, RelayError::Timeout { .. }));
    assert!(err.is_proof_unavailable());
}
