//! Nexus Proof Relay Library
//!
//! Moves messages between Nexus mailboxes on different chains. Instead of
//! vouching for a message, the relayer proves it: it locates the message's
//! storage slot in the source mailbox, fetches an inclusion proof for that slot
//! at a batch, encodes the proof and hands it to the destination mailbox, whose
//! verifier accepts or rejects it.
pub mod abi;
pub mod config;
pub mod crypto;
pub mod error;
pub mod evm_client;
pub mod mailbox;
pub mod proof;
pub mod relay;
pub mod storage_key;
pub mod types;

// Re-export commonly used types
pub use config::{ChainDescriptor, ChainRegistry, Config, RelaySettings};
pub use crypto::EvmSigner;
pub use error::{FailureReason, RelayError};
pub use proof::{ProofEncoder, ProofSource, RawStorageProof, StorageProofProvider, ZkSyncProofSource};
pub use relay::{ReceiveArgs, ReceiveRequest, RelayClient, RelayStage};
pub use storage_key::derive_storage_key;
pub use types::{
    Address, AppId, Confirmation, EncodedProof, MessageReceipt, ProofTuple, SentMessage,
    StorageProof,
};
