//! Solidity ABI Encoding
//!
//! Minimal head/tail encoder for the types the mailbox contract uses
//! (`uint`, `address`, `bytes32`, `bytes`, dynamic arrays and tuples) and a
//! word reader for decoding fixed layouts.

use ethereum_types::{H256, U256};
use sha3::{Digest, Keccak256};

use crate::error::RelayError;
use crate::types::Address;

const WORD: usize = 32;

/// Selector of `Error(string)` revert payloads.
const ERROR_STRING_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

/// An ABI value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Any `uintN`, left-padded to one word
    Uint(U256),
    Address(Address),
    /// `bytes32`
    FixedBytes(H256),
    /// Dynamic `bytes`
    Bytes(Vec<u8>),
    /// Dynamic `T[]`
    Array(Vec<Token>),
    Tuple(Vec<Token>),
}

impl Token {
    fn is_dynamic(&self) -> bool {
        match self {
            Token::Bytes(_) | Token::Array(_) => true,
            Token::Tuple(items) => items.iter().any(Token::is_dynamic),
            _ => false,
        }
    }

    /// Size of the token's head slot.
    fn head_size(&self) -> usize {
        match self {
            Token::Tuple(items) if !self.is_dynamic() => items.iter().map(Token::head_size).sum(),
            _ => WORD,
        }
    }
}

/// Compute keccak256 of arbitrary bytes.
pub fn keccak256(data: &[u8]) -> H256 {
    H256::from_slice(&Keccak256::digest(data))
}

/// Function selector: keccak256(signature)[0..4]
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = Keccak256::digest(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// `abi.encode(tokens...)`
pub fn encode(tokens: &[Token]) -> Vec<u8> {
    encode_sequence(tokens)
}

/// Selector followed by the encoded arguments.
pub fn encode_function_call(signature: &str, tokens: &[Token]) -> Vec<u8> {
    let mut data = selector(signature).to_vec();
    data.extend(encode_sequence(tokens));
    data
}

fn encode_sequence(tokens: &[Token]) -> Vec<u8> {
    let head_len: usize = tokens.iter().map(Token::head_size).sum();
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for token in tokens {
        if token.is_dynamic() {
            head.extend_from_slice(&usize_word(head_len + tail.len()));
            tail.extend(encode_token(token));
        } else {
            head.extend(encode_token(token));
        }
    }

    head.extend(tail);
    head
}

fn encode_token(token: &Token) -> Vec<u8> {
    match token {
        Token::Uint(value) => uint_word(*value).to_vec(),
        Token::Address(addr) => {
            let mut word = [0u8; WORD];
            word[12..].copy_from_slice(addr.as_bytes());
            word.to_vec()
        }
        Token::FixedBytes(value) => value.as_bytes().to_vec(),
        Token::Bytes(bytes) => {
            let mut out = usize_word(bytes.len()).to_vec();
            out.extend_from_slice(bytes);
            let padding = (WORD - bytes.len() % WORD) % WORD;
            out.extend(std::iter::repeat(0u8).take(padding));
            out
        }
        Token::Array(items) => {
            let mut out = usize_word(items.len()).to_vec();
            out.extend(encode_sequence(items));
            out
        }
        Token::Tuple(items) => encode_sequence(items),
    }
}

fn uint_word(value: U256) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    value.to_big_endian(&mut word);
    word
}

fn usize_word(value: usize) -> [u8; WORD] {
    uint_word(U256::from(value))
}

// ============================================================================
// DECODING
// ============================================================================

/// Reads ABI words out of an encoded buffer.
///
/// Offsets are byte offsets relative to the start of the buffer.
pub struct Reader<'a> {
    data: &'a [u8],
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub fn word(&self, offset: usize) -> Result<&'a [u8], RelayError> {
        offset
            .checked_add(WORD)
            .and_then(|end| self.data.get(offset..end))
            .ok_or_else(|| {
                RelayError::Encoding(format!(
                    "buffer of {} bytes too short for word at offset {}",
                    self.data.len(),
                    offset
                ))
            })
    }

    pub fn uint64(&self, offset: usize) -> Result<u64, RelayError> {
        let word = self.word(offset)?;
        if word[..24].iter().any(|b| *b != 0) {
            return Err(RelayError::Encoding(format!(
                "value at offset {} does not fit in uint64",
                offset
            )));
        }
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&word[24..]);
        Ok(u64::from_be_bytes(buf))
    }

    pub fn usize(&self, offset: usize) -> Result<usize, RelayError> {
        let value = self.uint64(offset)?;
        usize::try_from(value)
            .map_err(|_| RelayError::Encoding(format!("length {} overflows usize", value)))
    }

    pub fn address(&self, offset: usize) -> Result<Address, RelayError> {
        let word = self.word(offset)?;
        if word[..12].iter().any(|b| *b != 0) {
            return Err(RelayError::Encoding(format!(
                "address at offset {} has non-zero padding",
                offset
            )));
        }
        Ok(Address::from_slice(&word[12..]))
    }

    pub fn bytes32(&self, offset: usize) -> Result<H256, RelayError> {
        Ok(H256::from_slice(self.word(offset)?))
    }

    /// Reads a `bytes32[]` whose length word sits at `offset`.
    pub fn bytes32_array(&self, offset: usize) -> Result<Vec<H256>, RelayError> {
        let len = self.usize(offset)?;
        let start = offset + WORD;
        if len > (self.data.len().saturating_sub(start)) / WORD {
            return Err(RelayError::Encoding(format!(
                "array of {} elements overruns buffer",
                len
            )));
        }
        (0..len).map(|i| self.bytes32(start + i * WORD)).collect()
    }

    /// Reads a dynamic `bytes` / `string` whose length word sits at `offset`.
    pub fn bytes(&self, offset: usize) -> Result<&'a [u8], RelayError> {
        let len = self.usize(offset)?;
        let start = offset + WORD;
        start
            .checked_add(len)
            .and_then(|end| self.data.get(start..end))
            .ok_or_else(|| RelayError::Encoding(format!("bytes of length {} overrun buffer", len)))
    }
}

/// Extracts a human-readable message from revert data.
///
/// Returns the decoded string for `Error(string)` payloads and `None` for
/// anything else (custom errors, panics, empty data).
pub fn decode_revert_reason(data: &[u8]) -> Option<String> {
    if data.len() < 4 || data[..4] != ERROR_STRING_SELECTOR {
        return None;
    }
    let reader = Reader::new(&data[4..]);
    let offset = reader.usize(0).ok()?;
    let raw = reader.bytes(offset).ok()?;
    Some(String::from_utf8_lossy(raw).into_owned())
}
