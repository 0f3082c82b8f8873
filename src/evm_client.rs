//! EVM JSON-RPC Client
//!
//! Thin JSON-RPC client for one EVM-compatible endpoint (zkSync Era included):
//! view calls, legacy EIP-155 transaction submission and receipt polling.

use ethereum_types::H256;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::abi::keccak256;
use crate::crypto::EvmSigner;
use crate::error::RelayError;
use crate::types::{hex_to_bytes, parse_quantity, Address};

/// Failure of a single JSON-RPC round trip.
#[derive(Error, Debug, Clone)]
pub enum RpcError {
    #[error("Failed to reach {endpoint} for {method}: {message}")]
    Transport {
        endpoint: String,
        method: String,
        message: String,
    },

    /// The node answered with a JSON-RPC `error` object.
    #[error("JSON-RPC error from {endpoint} ({method}): {message} (code: {code})")]
    Node {
        endpoint: String,
        method: String,
        code: i64,
        message: String,
        /// Revert data when the node includes it (hex string)
        data: Option<String>,
    },

    #[error("Unexpected {method} response from {endpoint}: {message}")]
    InvalidResponse {
        endpoint: String,
        method: String,
        message: String,
    },

    #[error("Timed out after {after:?} waiting for {method} from {endpoint}")]
    Timeout {
        endpoint: String,
        method: String,
        after: Duration,
    },
}

impl From<RpcError> for RelayError {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::Timeout {
                endpoint,
                method,
                after,
            } => RelayError::Timeout {
                operation: format!("{} from {}", method, endpoint),
                after,
            },
            other => RelayError::RpcFailure {
                endpoint: other.endpoint().to_string(),
                message: other.to_string(),
            },
        }
    }
}

impl RpcError {
    pub fn endpoint(&self) -> &str {
        match self {
            RpcError::Transport { endpoint, .. }
            | RpcError::Node { endpoint, .. }
            | RpcError::InvalidResponse { endpoint, .. }
            | RpcError::Timeout { endpoint, .. } => endpoint,
        }
    }
}

/// Transaction receipt fields the relay reads.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: H256,
    #[serde(default)]
    pub block_number: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    /// zkSync only: batch the transaction was committed in
    #[serde(default)]
    pub l1_batch_number: Option<String>,
}

impl TransactionReceipt {
    pub fn succeeded(&self) -> bool {
        self.status.as_deref() == Some("0x1")
    }

    pub fn block_number(&self) -> Option<u64> {
        self.block_number
            .as_deref()
            .and_then(|v| parse_quantity(v).ok())
    }

    pub fn l1_batch_number(&self) -> Option<u64> {
        self.l1_batch_number
            .as_deref()
            .and_then(|v| parse_quantity(v).ok())
    }
}

/// Parameters for a signed contract call.
#[derive(Debug, Clone, Copy)]
pub struct TxParams {
    pub chain_id: u64,
    pub gas_limit: u64,
}

/// Client for a single EVM JSON-RPC endpoint.
#[derive(Debug, Clone)]
pub struct EvmClient {
    http_client: reqwest::Client,
    rpc_url: String,
    timeout: Duration,
}

impl EvmClient {
    /// Creates a client with a per-request timeout.
    pub fn new(rpc_url: &str, timeout: Duration) -> Result<Self, RelayError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self::with_http_client(http_client, rpc_url, timeout))
    }

    /// Creates a client sharing an existing connection pool.
    pub fn with_http_client(http_client: reqwest::Client, rpc_url: &str, timeout: Duration) -> Self {
        Self {
            http_client,
            rpc_url: rpc_url.to_string(),
            timeout,
        }
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    /// Generic JSON-RPC call helper.
    ///
    /// A `null` result deserializes into `Option<T>` callers as `None`.
    pub async fn json_rpc<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, RpcError> {
        let request = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1,
        });

        let rpc_future = async {
            let resp = self
                .http_client
                .post(&self.rpc_url)
                .json(&request)
                .send()
                .await
                .map_err(|e| self.transport_error(method, e))?;
            resp.json::<Value>()
                .await
                .map_err(|e| self.invalid_response(method, e.to_string()))
        };

        let response = tokio::time::timeout(self.timeout, rpc_future)
            .await
            .map_err(|_| RpcError::Timeout {
                endpoint: self.rpc_url.clone(),
                method: method.to_string(),
                after: self.timeout,
            })??;

        if let Some(error) = response.get("error") {
            let code = error.get("code").and_then(|c| c.as_i64()).unwrap_or(0);
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown error")
                .to_string();
            let data = error
                .get("data")
                .and_then(|d| d.as_str())
                .map(str::to_string);
            return Err(RpcError::Node {
                endpoint: self.rpc_url.clone(),
                method: method.to_string(),
                code,
                message,
                data,
            });
        }

        let result = response
            .get("result")
            .ok_or_else(|| self.invalid_response(method, "No result in response".to_string()))?;

        serde_json::from_value(result.clone())
            .map_err(|e| self.invalid_response(method, e.to_string()))
    }

    fn transport_error(&self, method: &str, err: reqwest::Error) -> RpcError {
        if err.is_timeout() {
            return RpcError::Timeout {
                endpoint: self.rpc_url.clone(),
                method: method.to_string(),
                after: self.timeout,
            };
        }
        RpcError::Transport {
            endpoint: self.rpc_url.clone(),
            method: method.to_string(),
            message: err.to_string(),
        }
    }

    fn invalid_response(&self, method: &str, message: String) -> RpcError {
        RpcError::InvalidResponse {
            endpoint: self.rpc_url.clone(),
            method: method.to_string(),
            message,
        }
    }

    fn parse_hex_result(&self, method: &str, value: &str) -> Result<u64, RpcError> {
        parse_quantity(value).map_err(|e| self.invalid_response(method, e.to_string()))
    }

    // ========================================================================
    // READS
    // ========================================================================

    /// Get the current block number.
    pub async fn block_number(&self) -> Result<u64, RpcError> {
        let block_hex: String = self.json_rpc("eth_blockNumber", vec![]).await?;
        self.parse_hex_result("eth_blockNumber", &block_hex)
    }

    /// `eth_call` against `block` ("latest" or a hex block number).
    pub async fn call(
        &self,
        from: Option<Address>,
        to: Address,
        data: &[u8],
        block: &str,
    ) -> Result<Vec<u8>, RpcError> {
        let mut tx = json!({
            "to": format!("{:#x}", to),
            "data": format!("0x{}", hex::encode(data)),
        });
        if let Some(from) = from {
            tx["from"] = json!(format!("{:#x}", from));
        }

        let result: String = self.json_rpc("eth_call", vec![tx, json!(block)]).await?;
        hex_to_bytes(&result).map_err(|e| self.invalid_response("eth_call", e.to_string()))
    }

    pub async fn transaction_count(&self, address: Address) -> Result<u64, RpcError> {
        let nonce_hex: String = self
            .json_rpc(
                "eth_getTransactionCount",
                vec![json!(format!("{:#x}", address)), json!("pending")],
            )
            .await?;
        self.parse_hex_result("eth_getTransactionCount", &nonce_hex)
    }

    pub async fn gas_price(&self) -> Result<u64, RpcError> {
        let gas_price_hex: String = self.json_rpc("eth_gasPrice", vec![]).await?;
        self.parse_hex_result("eth_gasPrice", &gas_price_hex)
    }

    pub async fn transaction_receipt(
        &self,
        tx_hash: H256,
    ) -> Result<Option<TransactionReceipt>, RpcError> {
        self.json_rpc(
            "eth_getTransactionReceipt",
            vec![json!(format!("{:#x}", tx_hash))],
        )
        .await
    }

    // ========================================================================
    // WRITES
    // ========================================================================

    pub async fn send_raw_transaction(&self, raw_tx: &[u8]) -> Result<H256, RpcError> {
        self.json_rpc(
            "eth_sendRawTransaction",
            vec![json!(format!("0x{}", hex::encode(raw_tx)))],
        )
        .await
    }

    /// Send a locally-signed legacy transaction calling `to` with `data`.
    ///
    /// Builds a pre-EIP-1559 transaction with the given nonce, signs it with
    /// the relayer key and broadcasts via `eth_sendRawTransaction`. Works with
    /// public RPCs that don't hold keys. Returns the transaction hash reported
    /// by the node.
    pub async fn send_transaction(
        &self,
        signer: &EvmSigner,
        nonce: u64,
        to: Address,
        data: &[u8],
        params: TxParams,
    ) -> Result<H256, RelayError> {
        let gas_price = self.gas_price().await?;

        let raw_tx = sign_legacy_transaction(
            signer,
            LegacyTransaction {
                nonce,
                gas_price,
                gas_limit: params.gas_limit,
                to,
                data,
                chain_id: params.chain_id,
            },
        )?;

        debug!(
            "EVM raw tx: nonce={}, gas_price={}, chain_id={}, from={:?}",
            nonce,
            gas_price,
            params.chain_id,
            signer.address()
        );

        Ok(self.send_raw_transaction(&raw_tx).await?)
    }

    /// Polls for a transaction receipt.
    ///
    /// Returns the receipt whatever its status; fails with `Timeout` when no
    /// receipt shows up within `attempts` polls.
    pub async fn wait_for_receipt(
        &self,
        tx_hash: H256,
        poll_interval: Duration,
        attempts: u32,
    ) -> Result<TransactionReceipt, RelayError> {
        for _ in 0..attempts {
            if let Some(receipt) = self.transaction_receipt(tx_hash).await? {
                return Ok(receipt);
            }
            tokio::time::sleep(poll_interval).await;
        }

        Err(RelayError::Timeout {
            operation: format!("receipt of {:#x}", tx_hash),
            after: poll_interval * attempts,
        })
    }
}

// ============================================================================
// LEGACY TRANSACTION SIGNING
// ============================================================================

/// Unsigned legacy transaction (value is always zero).
pub struct LegacyTransaction<'a> {
    pub nonce: u64,
    pub gas_price: u64,
    pub gas_limit: u64,
    pub to: Address,
    pub data: &'a [u8],
    pub chain_id: u64,
}

/// RLP-encodes and signs `tx` per EIP-155, returning the raw signed bytes.
pub fn sign_legacy_transaction(
    signer: &EvmSigner,
    tx: LegacyTransaction<'_>,
) -> Result<Vec<u8>, RelayError> {
    // [nonce, gasPrice, gasLimit, to, value, data, chainId, 0, 0]
    let unsigned_items: Vec<Vec<u8>> = vec![
        rlp_encode_u64(tx.nonce),
        rlp_encode_u64(tx.gas_price),
        rlp_encode_u64(tx.gas_limit),
        tx.to.as_bytes().to_vec(),
        vec![],
        tx.data.to_vec(),
        rlp_encode_u64(tx.chain_id),
        vec![],
        vec![],
    ];
    let sighash = keccak256(&rlp_encode_list(&unsigned_items));

    let (r, s, recovery_id) = signer.sign_transaction_hash(sighash.as_fixed_bytes())?;

    // EIP-155: v = recovery_id + chainId * 2 + 35
    let v = tx
        .chain_id
        .checked_mul(2)
        .and_then(|c| c.checked_add(35 + recovery_id as u64))
        .ok_or_else(|| RelayError::Signer(format!("chain id {} too large", tx.chain_id)))?;

    let signed_items: Vec<Vec<u8>> = vec![
        rlp_encode_u64(tx.nonce),
        rlp_encode_u64(tx.gas_price),
        rlp_encode_u64(tx.gas_limit),
        tx.to.as_bytes().to_vec(),
        vec![],
        tx.data.to_vec(),
        rlp_encode_u64(v),
        strip_leading_zeros(&r).to_vec(),
        strip_leading_zeros(&s).to_vec(),
    ];
    Ok(rlp_encode_list(&signed_items))
}

// ============================================================================
// RLP ENCODING HELPERS (for legacy EVM transactions)
// ============================================================================

/// RLP integers carry no leading zeros.
fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

/// Encode a u64 as big-endian bytes with no leading zeros (RLP integer format).
pub fn rlp_encode_u64(val: u64) -> Vec<u8> {
    strip_leading_zeros(&val.to_be_bytes()).to_vec()
}

/// RLP-encode a single byte-string item.
pub fn rlp_encode_item(data: &[u8]) -> Vec<u8> {
    if data.len() == 1 && data[0] < 0x80 {
        vec![data[0]]
    } else if data.len() <= 55 {
        let mut out = vec![0x80 + data.len() as u8];
        out.extend_from_slice(data);
        out
    } else {
        let len_bytes = rlp_encode_u64(data.len() as u64);
        let mut out = vec![0xb7 + len_bytes.len() as u8];
        out.extend_from_slice(&len_bytes);
        out.extend_from_slice(data);
        out
    }
}

/// RLP-encode a list of items (each item is raw bytes, not yet RLP-encoded).
pub fn rlp_encode_list(items: &[Vec<u8>]) -> Vec<u8> {
    let payload: Vec<u8> = items.iter().flat_map(|item| rlp_encode_item(item)).collect();

    if payload.len() <= 55 {
        let mut out = vec![0xc0 + payload.len() as u8];
        out.extend(payload);
        out
    } else {
        let len_bytes = rlp_encode_u64(payload.len() as u64);
        let mut out = vec![0xf7 + len_bytes.len() as u8];
        out.extend_from_slice(&len_bytes);
        out.extend(payload);
        out
    }
}
