//! zkSync Era proof source (`zks_getProof`).

use async_trait::async_trait;
use ethereum_types::H256;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::{ProofSource, RawStorageProof};
use crate::config::ChainDescriptor;
use crate::error::RelayError;
use crate::evm_client::EvmClient;
use crate::types::Address;

/// `zks_getProof` result
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ZkProofResponse {
    address: Address,
    #[serde(default)]
    storage_proof: Vec<ZkStorageEntry>,
}

#[derive(Debug, Deserialize)]
struct ZkStorageEntry {
    key: H256,
    value: H256,
    index: u64,
    #[serde(default)]
    proof: Vec<H256>,
}

/// Queries zkSync Era nodes for storage proofs anchored at an L1 batch.
#[derive(Debug, Clone)]
pub struct ZkSyncProofSource {
    http_client: reqwest::Client,
    timeout: Duration,
}

impl ZkSyncProofSource {
    pub fn new(timeout: Duration) -> Result<Self, RelayError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            http_client,
            timeout,
        })
    }
}

#[async_trait]
impl ProofSource for ZkSyncProofSource {
    async fn fetch_proof(
        &self,
        chain: &ChainDescriptor,
        account: Address,
        key: H256,
        batch_number: u64,
    ) -> Result<Option<RawStorageProof>, RelayError> {
        let client = EvmClient::with_http_client(self.http_client.clone(), &chain.rpc_url, self.timeout);

        let response: Option<ZkProofResponse> = client
            .json_rpc(
                "zks_getProof",
                vec![
                    json!(format!("{:#x}", account)),
                    json!([format!("{:#x}", key)]),
                    json!(batch_number),
                ],
            )
            .await?;

        let Some(response) = response else {
            return Ok(None);
        };

        Ok(response
            .storage_proof
            .into_iter()
            .find(|entry| entry.key == key)
            .map(|entry| RawStorageProof {
                account: response.address,
                key: entry.key,
                value: entry.value,
                path: entry.proof,
                index: entry.index,
            }))
    }
}
