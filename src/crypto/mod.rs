//! Cryptographic Operations Module
//!
//! Holds the relayer's secp256k1 key, signs legacy EVM transaction hashes and
//! derives the relayer's EVM address.
//!
//! ## Security Requirements
//!
//! **CRITICAL**: Private keys must never be exposed or logged. The key is read
//! from the environment variable named in config, never from the config file.

use anyhow::{Context, Result};
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use tracing::info;

use crate::abi::keccak256;
use crate::config::Config;
use crate::error::RelayError;
use crate::types::{hex_to_bytes, Address};

/// secp256k1 transaction signer for the relayer account.
pub struct EvmSigner {
    signing_key: SigningKey,
    address: Address,
}

impl EvmSigner {
    /// Creates a signer from the key in the environment variable named by config.
    pub fn from_config(config: &Config) -> Result<Self> {
        let private_key_hex = config.relay.get_private_key()?;
        let signer = Self::from_hex(&private_key_hex).with_context(|| {
            format!(
                "Environment variable '{}' does not hold a valid secp256k1 key",
                config.relay.private_key_env
            )
        })?;
        info!("Relayer signer initialized for {:?}", signer.address());
        Ok(signer)
    }

    /// Creates a signer from a 32-byte hex private key (0x prefix optional).
    pub fn from_hex(private_key_hex: &str) -> Result<Self> {
        let bytes = hex_to_bytes(private_key_hex.trim())?;
        if bytes.len() != 32 {
            return Err(anyhow::anyhow!(
                "Invalid private key length: expected 32 bytes, got {}",
                bytes.len()
            ));
        }
        let signing_key = SigningKey::from_slice(&bytes)
            .map_err(|e| anyhow::anyhow!("Failed to create ECDSA signing key: {}", e))?;
        Ok(Self::from_signing_key(signing_key))
    }

    /// Generates a fresh random key.
    pub fn random() -> Self {
        Self::from_signing_key(SigningKey::random(&mut rand::thread_rng()))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let address = address_of(signing_key.verifying_key());
        Self {
            signing_key,
            address,
        }
    }

    /// The relayer's EVM address: keccak256(uncompressed_public_key[1..])[12..32]
    pub fn address(&self) -> Address {
        self.address
    }

    /// Private key as 0x-prefixed hex. Only for key generation output.
    pub fn private_key_hex(&self) -> String {
        format!("0x{}", hex::encode(self.signing_key.to_bytes()))
    }

    /// Signs a raw transaction hash (no message prefix).
    ///
    /// # Returns
    ///
    /// * `Ok((r, s, recovery_id))` - r and s are 32-byte big-endian, recovery_id is 0 or 1
    pub fn sign_transaction_hash(
        &self,
        tx_hash: &[u8; 32],
    ) -> Result<([u8; 32], [u8; 32], u8), RelayError> {
        // k256 returns low-s signatures with the recovery id already adjusted
        let (signature, recovery_id): (Signature, RecoveryId) = self
            .signing_key
            .sign_prehash_recoverable(tx_hash)
            .map_err(|e| RelayError::Signer(format!("Failed to sign transaction hash: {}", e)))?;

        let sig_bytes = signature.to_bytes();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&sig_bytes[..32]);
        s.copy_from_slice(&sig_bytes[32..64]);

        Ok((r, s, recovery_id.to_byte()))
    }
}

fn address_of(verifying_key: &VerifyingKey) -> Address {
    let point = verifying_key.to_encoded_point(false);
    // Uncompressed format: 0x04 || x (32 bytes) || y (32 bytes)
    let hash = keccak256(&point.as_bytes()[1..]);
    Address::from_slice(&hash.as_bytes()[12..])
}

#[cfg(test)]
mod tests {
    use super::*;

    const KNOWN_KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    #[test]
    fn test_address_from_known_key() {
        let signer = EvmSigner::from_hex(KNOWN_KEY).unwrap();
        assert_eq!(
            format!("{:#x}", signer.address()),
            "0x2c7536e3605d9c16a7a3d7b1898e529396a65c23"
        );
    }

    #[test]
    fn test_rejects_short_key() {
        assert!(EvmSigner::from_hex("0x1234").is_err());
    }

    #[test]
    fn test_signature_recovers_signer() {
        let signer = EvmSigner::random();
        let hash = keccak256(b"relay").to_fixed_bytes();
        let (r, s, rec) = signer.sign_transaction_hash(&hash).unwrap();

        let mut sig_bytes = [0u8; 64];
        sig_bytes[..32].copy_from_slice(&r);
        sig_bytes[32..].copy_from_slice(&s);
        let signature = Signature::from_slice(&sig_bytes).unwrap();
        assert!(signature.normalize_s().is_none(), "s must be low");

        let recovered = VerifyingKey::recover_from_prehash(
            &hash,
            &signature,
            RecoveryId::try_from(rec).unwrap(),
        )
        .unwrap();
        assert_eq!(address_of(&recovered), signer.address());
    }
}
