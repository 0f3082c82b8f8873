//! Relay error kinds.

use ethereum_types::H256;
use std::time::Duration;
use thiserror::Error;

use crate::types::{Address, AppId};

#[derive(Error, Debug)]
pub enum RelayError {
    /// The node answered but has nothing provable at this slot and batch.
    #[error("No proof for key {key:?} of {account:?} at batch {batch_number}")]
    ProofNotFound {
        account: Address,
        key: H256,
        batch_number: u64,
    },

    /// Transport or node failure, distinct from a legitimate absence.
    #[error("RPC failure from {endpoint}: {message}")]
    RpcFailure { endpoint: String, message: String },

    #[error("Timed out after {after:?} waiting for {operation}")]
    Timeout { operation: String, after: Duration },

    #[error("Malformed proof: {0}")]
    Encoding(String),

    #[error("Malformed receipt: {0}")]
    MalformedReceipt(String),

    /// The destination contract rejected the call. `reason` is passed through as returned.
    #[error("Mailbox call reverted: {reason}")]
    SubmissionReverted {
        reason: String,
        tx_hash: Option<H256>,
    },

    #[error("Unknown application id {0:?}")]
    UnknownApp(AppId),

    #[error("Signer error: {0}")]
    Signer(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Why a relay operation ended in the `Failed` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    NoProof,
    Rpc,
    Timeout,
    Encoding,
    MalformedReceipt,
    Reverted,
    Setup,
}

impl RelayError {
    /// True for every outcome of a proof lookup that yielded no proof.
    ///
    /// All three currently call for the same action: retry at a later batch or
    /// re-check the storage key derivation.
    pub fn is_proof_unavailable(&self) -> bool {
        matches!(
            self,
            RelayError::ProofNotFound { .. } | RelayError::RpcFailure { .. } | RelayError::Timeout { .. }
        )
    }

    pub fn failure_reason(&self) -> FailureReason {
        match self {
            RelayError::ProofNotFound { .. } => FailureReason::NoProof,
            RelayError::RpcFailure { .. } => FailureReason::Rpc,
            RelayError::Timeout { .. } => FailureReason::Timeout,
            RelayError::Encoding(_) => FailureReason::Encoding,
            RelayError::MalformedReceipt(_) => FailureReason::MalformedReceipt,
            RelayError::SubmissionReverted { .. } => FailureReason::Reverted,
            RelayError::UnknownApp(_) | RelayError::Signer(_) | RelayError::Config(_) => {
                FailureReason::Setup
            }
        }
    }
}
