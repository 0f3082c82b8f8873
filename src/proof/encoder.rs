//! Proof Encoder
//!
//! Serializes a [`StorageProof`] into the bytes `receiveMessage` takes as its
//! `proof` argument:
//!
//! ```text
//! abi.encode(uint64 batchNumber, address account, bytes32 value, bytes32[] path, uint64 index)
//! ```
//!
//! The slot key is not transmitted; the mailbox recomputes it from the receipt.

use ethereum_types::U256;

use crate::abi::{self, Reader, Token};
use crate::error::RelayError;
use crate::types::{EncodedProof, ProofTuple, StorageProof};

const WORD: usize = 32;
/// Head of the five-field layout: four static words plus the path offset
const HEAD_LEN: usize = 5 * WORD;

/// Encodes proofs for a destination verifier with an optional fixed tree depth.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProofEncoder {
    depth: Option<usize>,
}

impl ProofEncoder {
    /// `depth` is the sibling-path length the verifier expects, if it expects one.
    pub fn new(depth: Option<usize>) -> Self {
        Self { depth }
    }

    pub fn depth(&self) -> Option<usize> {
        self.depth
    }

    /// Encode `proof`. Pure and deterministic.
    ///
    /// Fails with `RelayError::Encoding` when the path length or index does not
    /// fit the configured depth.
    pub fn encode(&self, proof: &StorageProof) -> Result<EncodedProof, RelayError> {
        self.check_shape(proof.path.len(), proof.index)?;

        Ok(EncodedProof::new(abi::encode(&[
            Token::Uint(U256::from(proof.batch_number)),
            Token::Address(proof.account),
            Token::FixedBytes(proof.value),
            Token::Array(proof.path.iter().copied().map(Token::FixedBytes).collect()),
            Token::Uint(U256::from(proof.index)),
        ])))
    }

    /// Decode bytes produced by [`ProofEncoder::encode`].
    ///
    /// Only the canonical layout is accepted: the path offset must point right
    /// after the head and nothing may trail the path.
    pub fn decode(&self, data: &[u8]) -> Result<ProofTuple, RelayError> {
        let reader = Reader::new(data);

        let batch_number = reader.uint64(0)?;
        let account = reader.address(WORD)?;
        let value = reader.bytes32(2 * WORD)?;
        let path_offset = reader.usize(3 * WORD)?;
        let index = reader.uint64(4 * WORD)?;

        if path_offset != HEAD_LEN {
            return Err(RelayError::Encoding(format!(
                "path offset {} is not {}",
                path_offset, HEAD_LEN
            )));
        }
        let path = reader.bytes32_array(path_offset)?;

        let expected_len = HEAD_LEN + WORD + path.len() * WORD;
        if data.len() != expected_len {
            return Err(RelayError::Encoding(format!(
                "encoded proof is {} bytes, expected {}",
                data.len(),
                expected_len
            )));
        }

        self.check_shape(path.len(), index)?;

        Ok(ProofTuple {
            batch_number,
            account,
            value,
            path,
            index,
        })
    }

    fn check_shape(&self, path_len: usize, index: u64) -> Result<(), RelayError> {
        let Some(depth) = self.depth else {
            return Ok(());
        };
        if path_len != depth {
            return Err(RelayError::Encoding(format!(
                "path has {} siblings, tree depth is {}",
                path_len, depth
            )));
        }
        if depth < 64 && index >= (1u64 << depth) {
            return Err(RelayError::Encoding(format!(
                "leaf index {} out of range for depth {}",
                index, depth
            )));
        }
        Ok(())
    }
}
