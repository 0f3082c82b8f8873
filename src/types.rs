//! Core Data Types
//!
//! Message receipts, storage proofs and the encoded proof artifact shared by the
//! provider, encoder and relay client, plus the hex helpers used to move them
//! in and out of JSON-RPC payloads.

use anyhow::{Context, Result};
use ethereum_types::{H160, H256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::abi::{self, Token};
use crate::error::RelayError;

/// EVM account address (20 bytes)
pub type Address = H160;

/// Nexus application identifier (bytes32), distinct from the native chain id
pub type AppId = H256;

// ============================================================================
// MESSAGE RECEIPT
// ============================================================================

/// A cross-chain message as emitted by the source mailbox and delivered to the
/// destination mailbox.
///
/// Field order matches the mailbox contract struct
/// `(bytes32 nexusAppIDFrom, bytes32[] nexusAppIDTo, bytes data, address from, address[] to, uint256 nonce)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageReceipt {
    /// Application the message was sent from
    pub source_app_id: AppId,
    /// Destination applications, positionally paired with `to`
    pub dest_app_ids: Vec<AppId>,
    /// Opaque payload (hex encoded in JSON)
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
    /// Sender address on the source chain
    pub from: Address,
    /// Recipient address per destination application
    pub to: Vec<Address>,
    /// Per-sender nonce used for replay protection
    pub nonce: u64,
}

impl MessageReceipt {
    /// Checks the local invariants the destination contract relies on.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Receipt is well formed
    /// * `Err(RelayError::MalformedReceipt)` - Destinations and recipients do not line up
    pub fn validate(&self) -> Result<(), RelayError> {
        if self.dest_app_ids.is_empty() {
            return Err(RelayError::MalformedReceipt(
                "receipt has no destination applications".to_string(),
            ));
        }
        if self.dest_app_ids.len() != self.to.len() {
            return Err(RelayError::MalformedReceipt(format!(
                "{} destination app ids but {} recipient addresses",
                self.dest_app_ids.len(),
                self.to.len()
            )));
        }
        Ok(())
    }

    /// Returns true if `app_id` is one of the receipt's destinations.
    pub fn is_destined_for(&self, app_id: &AppId) -> bool {
        self.dest_app_ids.contains(app_id)
    }

    /// ABI tuple token in contract struct order.
    pub fn to_token(&self) -> Token {
        Token::Tuple(vec![
            Token::FixedBytes(self.source_app_id),
            Token::Array(self.dest_app_ids.iter().copied().map(Token::FixedBytes).collect()),
            Token::Bytes(self.data.clone()),
            Token::Address(self.from),
            Token::Array(self.to.iter().copied().map(Token::Address).collect()),
            Token::Uint(U256::from(self.nonce)),
        ])
    }

    /// `keccak256(abi.encode(receipt))`, usable as the logical key of the message slot.
    pub fn receipt_hash(&self) -> H256 {
        abi::keccak256(&abi::encode(&[self.to_token()]))
    }
}

// ============================================================================
// STORAGE PROOF
// ============================================================================

/// Inclusion proof of a storage slot value at a source-chain batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageProof {
    /// Batch the proof is anchored at (the caller's anchor, not taken from the node)
    pub batch_number: u64,
    /// Contract whose storage is proven
    pub account: Address,
    /// Storage slot key
    pub key: H256,
    /// Slot value
    pub value: H256,
    /// Sibling hashes from leaf to root
    pub path: Vec<H256>,
    /// Leaf index in the tree
    pub index: u64,
}

impl StorageProof {
    /// Projects the proof onto the fields carried on the wire.
    pub fn to_tuple(&self) -> ProofTuple {
        ProofTuple {
            batch_number: self.batch_number,
            account: self.account,
            value: self.value,
            path: self.path.clone(),
            index: self.index,
        }
    }
}

/// The fields of a [`StorageProof`] that the destination verifier decodes.
///
/// The slot key is implied by the receipt on-chain and is not transmitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofTuple {
    pub batch_number: u64,
    pub account: Address,
    pub value: H256,
    pub path: Vec<H256>,
    pub index: u64,
}

/// ABI-encoded proof bytes handed to `receiveMessage`.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedProof(Vec<u8>);

impl EncodedProof {
    pub(crate) fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Hex string with 0x prefix
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.0))
    }
}

impl fmt::Debug for EncodedProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncodedProof({})", self.to_hex())
    }
}

impl fmt::Display for EncodedProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

// ============================================================================
// RELAY RESULTS
// ============================================================================

/// Result of a successful `sendMessage` submission.
#[derive(Debug, Clone, Serialize)]
pub struct SentMessage {
    pub tx_hash: H256,
    pub block_number: Option<u64>,
    /// zkSync batch containing the transaction, when the node reports it
    pub l1_batch_number: Option<u64>,
    /// The receipt the destination will need to receive this message
    pub receipt: MessageReceipt,
}

/// Result of a confirmed `receiveMessage` submission.
#[derive(Debug, Clone, Serialize)]
pub struct Confirmation {
    pub tx_hash: H256,
    pub batch_number: u64,
    pub block_number: Option<u64>,
}

// ============================================================================
// HEX HELPERS
// ============================================================================

/// Convert hex string (with or without 0x prefix) to bytes.
pub fn hex_to_bytes(hex_str: &str) -> Result<Vec<u8>> {
    let hex_clean = hex_str.strip_prefix("0x").unwrap_or(hex_str);
    hex::decode(hex_clean).with_context(|| format!("Invalid hex string: {}", hex_str))
}

/// Parse a 32-byte value, left-padding shorter inputs with zeros.
pub fn parse_h256(value: &str) -> Result<H256> {
    let clean = value.strip_prefix("0x").unwrap_or(value);
    if clean.len() > 64 {
        anyhow::bail!("Value longer than 32 bytes: {}", value);
    }
    let bytes = hex::decode(format!("{:0>64}", clean))
        .with_context(|| format!("Invalid bytes32 hex: {}", value))?;
    Ok(H256::from_slice(&bytes))
}

/// Parse a 20-byte EVM address.
pub fn parse_address(value: &str) -> Result<Address> {
    let bytes = hex_to_bytes(value)?;
    if bytes.len() != 20 {
        anyhow::bail!("Invalid EVM address length {}: {}", bytes.len(), value);
    }
    Ok(Address::from_slice(&bytes))
}

/// Parse a JSON-RPC hex quantity ("0x1a") into a u64.
pub fn parse_quantity(value: &str) -> Result<u64> {
    let clean = value.strip_prefix("0x").unwrap_or(value);
    if clean.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(clean, 16).with_context(|| format!("Invalid hex quantity: {}", value))
}

/// Serde adapter for `Vec<u8>` as a 0x-prefixed hex string.
pub mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.strip_prefix("0x").unwrap_or(&s)).map_err(serde::de::Error::custom)
    }
}
