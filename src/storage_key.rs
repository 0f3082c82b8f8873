//! Storage Key Derivation
//!
//! Computes the storage slot of a Solidity `mapping(bytes32 => ...)` entry:
//! `keccak256(abi.encode(bytes32 key, uint256 slot))`.

use ethereum_types::{H256, U256};

use crate::abi::{self, Token};

/// Derive the storage slot holding `logical_key` in the mapping declared at `slot_index`.
///
/// Pure and deterministic. Both inputs are encoded as full 32-byte words, so the
/// result matches what the mailbox contract computes on-chain.
pub fn derive_storage_key(logical_key: H256, slot_index: U256) -> H256 {
    abi::keccak256(&abi::encode(&[
        Token::FixedBytes(logical_key),
        Token::Uint(slot_index),
    ]))
}
