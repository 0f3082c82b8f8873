//! Nexus Mailbox Contract Client
//!
//! Calldata builders for the mailbox entry points and a client that submits
//! them as signed transactions on one chain.

use ethereum_types::{H256, U256};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::abi::{self, Token};
use crate::config::{ChainDescriptor, RelaySettings};
use crate::crypto::EvmSigner;
use crate::error::RelayError;
use crate::evm_client::{EvmClient, RpcError, TransactionReceipt, TxParams};
use crate::types::{Address, AppId, EncodedProof, MessageReceipt};

/// `sendMessage(bytes32[] nexusAppIDTo, address[] to, uint256 nonce, bytes data)`
pub const SEND_MESSAGE_SIG: &str = "sendMessage(bytes32[],address[],uint256,bytes)";

/// `receiveMessage(uint64 chainblockNumber, MailboxMessage receipt, bytes proof)`
pub const RECEIVE_MESSAGE_SIG: &str =
    "receiveMessage(uint64,(bytes32,bytes32[],bytes,address,address[],uint256),bytes)";

/// `nexusAppId() returns (bytes32)`
pub const NEXUS_APP_ID_SIG: &str = "nexusAppId()";

/// Reason reported when a reverted transaction cannot be replayed for its message.
const UNKNOWN_REVERT: &str = "transaction reverted";

pub fn encode_send_message(
    dest_app_ids: &[AppId],
    to: &[Address],
    nonce: u64,
    data: &[u8],
) -> Vec<u8> {
    abi::encode_function_call(
        SEND_MESSAGE_SIG,
        &[
            Token::Array(dest_app_ids.iter().copied().map(Token::FixedBytes).collect()),
            Token::Array(to.iter().copied().map(Token::Address).collect()),
            Token::Uint(U256::from(nonce)),
            Token::Bytes(data.to_vec()),
        ],
    )
}

pub fn encode_receive_message(
    batch_number: u64,
    receipt: &MessageReceipt,
    proof: &EncodedProof,
) -> Vec<u8> {
    abi::encode_function_call(
        RECEIVE_MESSAGE_SIG,
        &[
            Token::Uint(U256::from(batch_number)),
            receipt.to_token(),
            Token::Bytes(proof.as_bytes().to_vec()),
        ],
    )
}

/// Whether a node error reports an execution revert rather than a node-side failure.
///
/// Geth-style nodes use code 3 with revert data; others only say so in the message.
pub fn is_revert(code: i64, message: &str, data: Option<&str>) -> bool {
    code == 3 || data.is_some() || message.to_ascii_lowercase().contains("revert")
}

/// Builds a human-readable revert reason from a node error.
///
/// `Error(string)` payloads are decoded; anything else is passed through as
/// the node reported it.
pub fn revert_reason(message: &str, data: Option<&str>) -> String {
    let Some(data) = data else {
        return message.to_string();
    };
    let decoded = abi::decode_revert_reason(
        &hex::decode(data.strip_prefix("0x").unwrap_or(data)).unwrap_or_default(),
    );
    match decoded {
        Some(reason) => reason,
        None => format!("{} (data: {})", message, data),
    }
}

/// Mailbox contract on one chain.
///
/// Submissions sharing a client are given consecutive nonces per sender, so
/// concurrent receives from one relayer key do not collide.
pub struct MailboxClient {
    client: EvmClient,
    name: String,
    address: Address,
    tx_params: TxParams,
    settings: RelaySettings,
    /// Next nonce to use per sender; held from nonce lookup until broadcast
    next_nonces: Mutex<HashMap<Address, u64>>,
}

impl MailboxClient {
    pub fn new(chain: &ChainDescriptor, settings: &RelaySettings) -> Result<Self, RelayError> {
        Ok(Self {
            client: EvmClient::new(&chain.rpc_url, settings.rpc_timeout())?,
            name: chain.name.clone(),
            address: chain.mailbox_addr,
            tx_params: TxParams {
                chain_id: chain.chain_id,
                gas_limit: settings.gas_limit,
            },
            settings: settings.clone(),
            next_nonces: Mutex::new(HashMap::new()),
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Reads the application id the contract was deployed with.
    pub async fn nexus_app_id(&self) -> Result<AppId, RelayError> {
        let data = abi::encode_function_call(NEXUS_APP_ID_SIG, &[]);
        let result = self.client.call(None, self.address, &data, "latest").await?;
        abi::Reader::new(&result).bytes32(0)
    }

    /// Submits `sendMessage` and waits for inclusion.
    pub async fn send_message(
        &self,
        signer: &EvmSigner,
        dest_app_ids: &[AppId],
        to: &[Address],
        nonce: u64,
        data: &[u8],
    ) -> Result<TransactionReceipt, RelayError> {
        self.submit(signer, &encode_send_message(dest_app_ids, to, nonce, data))
            .await
    }

    /// Submits `receiveMessage` and waits for inclusion.
    pub async fn receive_message(
        &self,
        signer: &EvmSigner,
        batch_number: u64,
        receipt: &MessageReceipt,
        proof: &EncodedProof,
    ) -> Result<TransactionReceipt, RelayError> {
        self.submit(signer, &encode_receive_message(batch_number, receipt, proof))
            .await
    }

    /// Dry-runs `calldata`, then signs, sends and waits for the receipt.
    ///
    /// Reverts, whether caught by the dry run or on-chain, become
    /// `SubmissionReverted` carrying the contract's reason. Nothing is retried.
    pub async fn submit(
        &self,
        signer: &EvmSigner,
        calldata: &[u8],
    ) -> Result<TransactionReceipt, RelayError> {
        let from = signer.address();

        match self
            .client
            .call(Some(from), self.address, calldata, "latest")
            .await
        {
            Ok(_) => {}
            Err(RpcError::Node {
                code,
                message,
                data,
                ..
            }) if is_revert(code, &message, data.as_deref()) => {
                let reason = revert_reason(&message, data.as_deref());
                warn!("Mailbox call on {} would revert: {}", self.name, reason);
                return Err(RelayError::SubmissionReverted {
                    reason,
                    tx_hash: None,
                });
            }
            Err(e) => return Err(e.into()),
        }

        let tx_hash = self.broadcast(signer, calldata).await?;
        info!("Submitted mailbox transaction {:#x} on {}", tx_hash, self.name);

        let receipt = self
            .client
            .wait_for_receipt(
                tx_hash,
                self.settings.receipt_poll_interval(),
                self.settings.receipt_poll_attempts,
            )
            .await?;

        if receipt.succeeded() {
            return Ok(receipt);
        }

        let reason = self.replay_revert_reason(from, calldata, &receipt).await;
        warn!(
            "Mailbox transaction {:#x} on {} reverted: {}",
            tx_hash, self.name, reason
        );
        Err(RelayError::SubmissionReverted {
            reason,
            tx_hash: Some(tx_hash),
        })
    }

    /// Signs and sends `calldata`, assigning the sender's next nonce.
    ///
    /// The node's pending count is authoritative unless this client has
    /// already broadcast past it.
    async fn broadcast(&self, signer: &EvmSigner, calldata: &[u8]) -> Result<H256, RelayError> {
        let from = signer.address();
        let mut next_nonces = self.next_nonces.lock().await;

        let pending = self.client.transaction_count(from).await?;
        let nonce = next_nonces
            .get(&from)
            .map_or(pending, |&next| next.max(pending));
        debug!("Using nonce {} for {:?} on {} (pending {})", nonce, from, self.name, pending);

        let tx_hash = self
            .client
            .send_transaction(signer, nonce, self.address, calldata, self.tx_params)
            .await?;
        next_nonces.insert(from, nonce + 1);
        Ok(tx_hash)
    }

    /// Re-executes a reverted transaction as a call at its block to recover the reason.
    async fn replay_revert_reason(
        &self,
        from: Address,
        calldata: &[u8],
        receipt: &TransactionReceipt,
    ) -> String {
        let block = receipt
            .block_number()
            .map(|n| format!("0x{:x}", n))
            .unwrap_or_else(|| "latest".to_string());

        match self.client.call(Some(from), self.address, calldata, &block).await {
            Err(RpcError::Node {
                code,
                message,
                data,
                ..
            }) if is_revert(code, &message, data.as_deref()) => {
                revert_reason(&message, data.as_deref())
            }
            Err(e) => {
                warn!("Could not replay reverted transaction on {}: {}", self.name, e);
                UNKNOWN_REVERT.to_string()
            }
            Ok(_) => UNKNOWN_REVERT.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethereum_types::H256;

    #[test]
    fn test_send_message_calldata_layout() {
        let data = encode_send_message(
            &[H256::from_low_u64_be(2)],
            &[Address::from_low_u64_be(4)],
            1,
            &[0xab],
        );
        assert_eq!(&data[..4], &abi::selector(SEND_MESSAGE_SIG));
        let args = &data[4..];
        // head: offset(bytes32[]), offset(address[]), nonce, offset(bytes)
        assert_eq!(args[31], 0x80);
        assert_eq!(args[63], 0xc0);
        assert_eq!(args[95], 1);
        assert_eq!(&args[126..128], &[0x01, 0x00]);
    }

    #[test]
    fn test_revert_reason_prefers_decoded_string() {
        let mut payload = abi::selector("Error(string)").to_vec();
        payload.extend(abi::encode(&[Token::Bytes(b"Already received".to_vec())]));
        let data = format!("0x{}", hex::encode(payload));
        assert_eq!(
            revert_reason("execution reverted", Some(&data)),
            "Already received"
        );
        assert_eq!(
            revert_reason("execution reverted", Some("0x1234")),
            "execution reverted (data: 0x1234)"
        );
        assert_eq!(revert_reason("execution reverted", None), "execution reverted");
    }

    #[test]
    fn test_is_revert_separates_node_failures() {
        assert!(is_revert(3, "execution reverted", Some("0x")));
        assert!(is_revert(-32000, "execution reverted", None));
        assert!(is_revert(-32015, "VM Exception while processing transaction: revert", None));
        assert!(!is_revert(-32005, "rate limit exceeded", None));
        assert!(!is_revert(-32000, "header not found", None));
    }
}
