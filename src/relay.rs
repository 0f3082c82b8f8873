//! Message Relay Client
//!
//! Sends messages through the local mailbox and receives messages from other
//! chains by proving the source mailbox's storage:
//!
//! ```text
//! Idle -> AcquiringProof -> Encoding -> Submitting -> Confirmed
//!              |               |            |
//!              +---------------+------------+------> Failed(reason)
//! ```
//!
//! Nothing is persisted between stages. A retry starts again from `Idle` with
//! the same inputs.

use ethereum_types::{H256, U256};
use futures::future::{join_all, try_join_all};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::config::{ChainDescriptor, ChainRegistry, Config, RelaySettings};
use crate::crypto::EvmSigner;
use crate::error::{FailureReason, RelayError};
use crate::mailbox::MailboxClient;
use crate::proof::{ProofEncoder, ProofSource, StorageProofProvider, ZkSyncProofSource};
use crate::storage_key::derive_storage_key;
use crate::types::{
    Address, AppId, Confirmation, EncodedProof, MessageReceipt, SentMessage, StorageProof,
};

// ============================================================================
// RECEIVE STATE
// ============================================================================

/// Stage of a single receive operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayStage {
    Idle,
    AcquiringProof,
    Encoding,
    Submitting,
    Confirmed,
    Failed(FailureReason),
}

impl RelayStage {
    /// Terminal stage for a finished receive operation.
    pub fn of(result: &Result<Confirmation, RelayError>) -> Self {
        match result {
            Ok(_) => RelayStage::Confirmed,
            Err(e) => RelayStage::Failed(e.failure_reason()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RelayStage::Confirmed | RelayStage::Failed(_))
    }
}

/// How the storage slot of a message is identified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveArgs {
    /// Slot of `logical_key` in the mapping declared at `slot_index`
    Derived { logical_key: H256, slot_index: U256 },
    /// Raw storage key supplied by the caller
    StorageKey(H256),
}

impl ReceiveArgs {
    pub fn storage_key(&self) -> H256 {
        match self {
            ReceiveArgs::Derived {
                logical_key,
                slot_index,
            } => derive_storage_key(*logical_key, *slot_index),
            ReceiveArgs::StorageKey(key) => *key,
        }
    }
}

/// Inputs of one receive operation.
#[derive(Debug, Clone)]
pub struct ReceiveRequest {
    /// Source-chain batch the message is proven at
    pub batch_number: u64,
    pub receipt: MessageReceipt,
    pub args: ReceiveArgs,
}

struct StageLog {
    nonce: u64,
    stage: RelayStage,
}

impl StageLog {
    fn new(nonce: u64) -> Self {
        Self {
            nonce,
            stage: RelayStage::Idle,
        }
    }

    fn enter(&mut self, next: RelayStage) {
        debug!("Receive nonce={}: {:?} -> {:?}", self.nonce, self.stage, next);
        self.stage = next;
    }
}

// ============================================================================
// RELAY CLIENT
// ============================================================================

/// Relay client bound to one local chain and one signer.
pub struct RelayClient {
    settings: RelaySettings,
    registry: ChainRegistry,
    signer: Arc<EvmSigner>,
    provider: StorageProofProvider,
    local_mailbox: MailboxClient,
}

impl RelayClient {
    /// Creates a client that reads proofs from zkSync Era nodes.
    pub fn new(config: &Config, signer: EvmSigner) -> Result<Self, RelayError> {
        let source = ZkSyncProofSource::new(config.relay.rpc_timeout())?;
        Self::with_proof_source(config, signer, Arc::new(source))
    }

    /// Creates a client with a custom proof source.
    ///
    /// The configuration is validated first; duplicate application ids would
    /// otherwise shadow each other in the registry.
    pub fn with_proof_source(
        config: &Config,
        signer: EvmSigner,
        source: Arc<dyn ProofSource>,
    ) -> Result<Self, RelayError> {
        config
            .validate()
            .map_err(|e| RelayError::Config(e.to_string()))?;
        let registry = config.registry();
        let local_chain = registry.get(&config.relay.local_app_id)?;
        let local_mailbox = MailboxClient::new(local_chain, &config.relay)?;

        info!(
            "Relay client for {} (app {:?}) using relayer {:?}",
            local_chain.name,
            config.relay.local_app_id,
            signer.address()
        );

        Ok(Self {
            settings: config.relay.clone(),
            provider: StorageProofProvider::new(source, config.relay.rpc_timeout()),
            registry,
            signer: Arc::new(signer),
            local_mailbox,
        })
    }

    pub fn local_app_id(&self) -> AppId {
        self.settings.local_app_id
    }

    pub fn relayer_address(&self) -> Address {
        self.signer.address()
    }

    pub fn registry(&self) -> &ChainRegistry {
        &self.registry
    }

    /// `keccak256(abi.encode(logical_key, slot_index))`
    pub fn calculate_storage_key(&self, logical_key: H256, slot_index: U256) -> H256 {
        derive_storage_key(logical_key, slot_index)
    }

    // ========================================================================
    // SEND
    // ========================================================================

    /// Submits a message to the local mailbox.
    ///
    /// Terminal on inclusion or revert. The returned receipt is what the
    /// destination needs to receive the message; on zkSync `l1_batch_number`
    /// is the batch to prove it at.
    pub async fn send_message(
        &self,
        dest_app_ids: Vec<AppId>,
        to: Vec<Address>,
        nonce: u64,
        data: Vec<u8>,
    ) -> Result<SentMessage, RelayError> {
        let receipt = MessageReceipt {
            source_app_id: self.settings.local_app_id,
            dest_app_ids,
            data,
            from: self.signer.address(),
            to,
            nonce,
        };
        receipt.validate()?;

        let tx = self
            .local_mailbox
            .send_message(
                &self.signer,
                &receipt.dest_app_ids,
                &receipt.to,
                receipt.nonce,
                &receipt.data,
            )
            .await?;

        info!(
            "Message nonce={} sent in {:#x} (block {:?}, batch {:?})",
            receipt.nonce,
            tx.transaction_hash,
            tx.block_number(),
            tx.l1_batch_number()
        );

        Ok(SentMessage {
            tx_hash: tx.transaction_hash,
            block_number: tx.block_number(),
            l1_batch_number: tx.l1_batch_number(),
            receipt,
        })
    }

    // ========================================================================
    // RECEIVE
    // ========================================================================

    fn source_chain(&self, receipt: &MessageReceipt) -> Result<&ChainDescriptor, RelayError> {
        self.registry.get(&receipt.source_app_id)
    }

    /// Fetches the proof of `receipt`'s slot in the source mailbox at `batch_number`.
    pub async fn get_receive_message_proof(
        &self,
        batch_number: u64,
        receipt: &MessageReceipt,
        args: &ReceiveArgs,
    ) -> Result<StorageProof, RelayError> {
        let chain = self.source_chain(receipt)?;
        self.provider
            .get_proof(chain, chain.mailbox_addr, args.storage_key(), batch_number)
            .await
    }

    /// Encodes `proof` for the verifier, using the source chain's tree depth.
    pub fn encode_message_proof(
        &self,
        source_app_id: &AppId,
        proof: &StorageProof,
    ) -> Result<EncodedProof, RelayError> {
        let chain = self.registry.get(source_app_id)?;
        ProofEncoder::new(chain.proof_depth).encode(proof)
    }

    /// Proves and delivers one message to the local mailbox.
    ///
    /// The receipt is checked before any network call. Failures carry the
    /// stage they ended in through [`RelayError::failure_reason`].
    pub async fn receive_message(
        &self,
        request: &ReceiveRequest,
    ) -> Result<Confirmation, RelayError> {
        let result = self.run_receive(request).await;
        match &result {
            Ok(confirmation) => info!(
                "Message nonce={} received in {:#x}",
                request.receipt.nonce, confirmation.tx_hash
            ),
            Err(e) => error!(
                "Receive of nonce={} ended in {:?}: {}",
                request.receipt.nonce,
                RelayStage::of(&result),
                e
            ),
        }
        result
    }

    async fn run_receive(&self, request: &ReceiveRequest) -> Result<Confirmation, RelayError> {
        let receipt = &request.receipt;
        let mut stage = StageLog::new(receipt.nonce);

        receipt.validate()?;
        if !receipt.is_destined_for(&self.settings.local_app_id) {
            return Err(RelayError::MalformedReceipt(format!(
                "local application {:?} is not a destination of this receipt",
                self.settings.local_app_id
            )));
        }

        stage.enter(RelayStage::AcquiringProof);
        let proof = self
            .get_receive_message_proof(request.batch_number, receipt, &request.args)
            .await?;

        stage.enter(RelayStage::Encoding);
        let encoded = self.encode_message_proof(&receipt.source_app_id, &proof)?;

        stage.enter(RelayStage::Submitting);
        let tx = self
            .local_mailbox
            .receive_message(&self.signer, request.batch_number, receipt, &encoded)
            .await?;

        stage.enter(RelayStage::Confirmed);
        Ok(Confirmation {
            tx_hash: tx.transaction_hash,
            batch_number: request.batch_number,
            block_number: tx.block_number(),
        })
    }

    /// Runs independent receive operations concurrently.
    ///
    /// Results are returned in request order. Submissions share the local
    /// mailbox client, which hands out the relayer's nonces one at a time.
    pub async fn receive_messages(
        &self,
        requests: &[ReceiveRequest],
    ) -> Vec<Result<Confirmation, RelayError>> {
        join_all(requests.iter().map(|r| self.receive_message(r))).await
    }

    // ========================================================================
    // STARTUP CHECKS
    // ========================================================================

    /// Confirms every configured mailbox reports the application id it is configured under.
    pub async fn check_mailboxes(&self) -> Result<(), RelayError> {
        let checks = self.registry.iter().map(|chain| async move {
            let mailbox = MailboxClient::new(chain, &self.settings)?;
            let reported = mailbox.nexus_app_id().await?;
            if reported != chain.app_id {
                return Err(RelayError::Config(format!(
                    "mailbox {:?} on {} reports app id {:?}, configured {:?}",
                    chain.mailbox_addr, chain.name, reported, chain.app_id
                )));
            }
            info!("Mailbox on {} verified (app {:?})", chain.name, chain.app_id);
            Ok::<(), RelayError>(())
        });

        try_join_all(checks).await.map(|_| ())
    }
}
