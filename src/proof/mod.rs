//! Storage Proof Provider
//!
//! Fetches inclusion proofs for a contract storage slot at a given batch and
//! turns every way of not getting one into a typed absence.
//!
//! The node query itself sits behind [`ProofSource`]; [`zksync::ZkSyncProofSource`]
//! is the implementation for zkSync Era (`zks_getProof`).

pub mod encoder;
pub mod zksync;

use async_trait::async_trait;
use ethereum_types::H256;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::config::ChainDescriptor;
use crate::error::RelayError;
use crate::types::{Address, StorageProof};

pub use encoder::ProofEncoder;
pub use zksync::ZkSyncProofSource;

/// Proof fields as returned by a node, before the caller's batch anchor is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawStorageProof {
    pub account: Address,
    pub key: H256,
    pub value: H256,
    pub path: Vec<H256>,
    pub index: u64,
}

/// A chain-specific way of asking a node for a storage proof.
#[async_trait]
pub trait ProofSource: Send + Sync {
    /// Issues one proof query against `chain`.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(proof))` - Node returned a proof for `key`
    /// * `Ok(None)` - Node answered but has no proof for `key` at `batch_number`
    /// * `Err(_)` - Transport or node failure
    async fn fetch_proof(
        &self,
        chain: &ChainDescriptor,
        account: Address,
        key: H256,
        batch_number: u64,
    ) -> Result<Option<RawStorageProof>, RelayError>;
}

/// Bounded, logged proof lookups on top of a [`ProofSource`].
#[derive(Clone)]
pub struct StorageProofProvider {
    source: Arc<dyn ProofSource>,
    timeout: Duration,
}

impl StorageProofProvider {
    pub fn new(source: Arc<dyn ProofSource>, timeout: Duration) -> Self {
        Self { source, timeout }
    }

    /// Fetch the proof that `account`'s slot `key` held its value at `batch_number`.
    ///
    /// The returned proof carries `batch_number` as given. Every failure is one of
    /// `ProofNotFound`, `RpcFailure` or `Timeout` and has already been logged here.
    pub async fn get_proof(
        &self,
        chain: &ChainDescriptor,
        account: Address,
        key: H256,
        batch_number: u64,
    ) -> Result<StorageProof, RelayError> {
        debug!(
            "Fetching proof from {} for {:?} slot {:?} at batch {}",
            chain.name, account, key, batch_number
        );

        let not_found = || RelayError::ProofNotFound {
            account,
            key,
            batch_number,
        };

        let fetched = tokio::time::timeout(
            self.timeout,
            self.source.fetch_proof(chain, account, key, batch_number),
        )
        .await;

        let raw = match fetched {
            Err(_) => {
                error!(
                    "Proof request to {} timed out after {:?} (slot {:?}, batch {})",
                    chain.name, self.timeout, key, batch_number
                );
                return Err(RelayError::Timeout {
                    operation: format!("storage proof from {}", chain.name),
                    after: self.timeout,
                });
            }
            Ok(Err(e)) => {
                error!("Proof request to {} failed: {}", chain.name, e);
                return Err(match e {
                    e if e.is_proof_unavailable() => e,
                    other => RelayError::RpcFailure {
                        endpoint: chain.rpc_url.clone(),
                        message: other.to_string(),
                    },
                });
            }
            Ok(Ok(None)) => {
                warn!(
                    "No proof on {} for {:?} slot {:?} at batch {}",
                    chain.name, account, key, batch_number
                );
                return Err(not_found());
            }
            Ok(Ok(Some(raw))) => raw,
        };

        if raw.key != key {
            warn!(
                "Proof from {} is for slot {:?}, requested {:?}",
                chain.name, raw.key, key
            );
            return Err(not_found());
        }
        if raw.value.is_zero() {
            warn!(
                "Slot {:?} of {:?} is empty on {} at batch {}",
                key, account, chain.name, batch_number
            );
            return Err(not_found());
        }

        Ok(StorageProof {
            batch_number,
            account: raw.account,
            key: raw.key,
            value: raw.value,
            path: raw.path,
            index: raw.index,
        })
    }
}
