//! Nexus Relay CLI
//!
//! Operator entry point for the proof relay. Besides sending and receiving
//! messages it can derive storage keys and fetch proofs for inspection.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin nexus-relay -- --config config/nexus-relay.toml check
//! cargo run --bin nexus-relay -- receive --batch 1234 --receipt receipt.json
//! ```
//!
//! The config path may also come from `NEXUS_RELAY_CONFIG_PATH`. The relayer key
//! is read from the environment variable named in the config.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ethereum_types::{H256, U256};
use tracing::info;

use nexus_relay::config::{Config, CONFIG_PATH_ENV};
use nexus_relay::types::{hex_to_bytes, parse_address, parse_h256};
use nexus_relay::{
    derive_storage_key, EvmSigner, MessageReceipt, ProofEncoder, ReceiveArgs, ReceiveRequest,
    RelayClient, StorageProofProvider, ZkSyncProofSource,
};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "nexus-relay")]
#[command(about = "Proof-based message relay between Nexus mailboxes")]
struct Args {
    /// Path to configuration file (default: config/nexus-relay.toml or NEXUS_RELAY_CONFIG_PATH env var)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute keccak256(abi.encode(key, slot))
    StorageKey {
        /// Logical mapping key (bytes32 hex)
        #[arg(long)]
        key: String,
        /// Mapping slot index (decimal or 0x hex)
        #[arg(long, default_value = "0")]
        slot: String,
    },
    /// Fetch and encode the proof of a source mailbox slot
    Proof {
        /// Source application id
        #[arg(long)]
        app: String,
        /// Batch to prove at
        #[arg(long)]
        batch: u64,
        #[command(flatten)]
        slot: SlotArgs,
    },
    /// Send a message through the local mailbox
    Send {
        /// Destination application ids, positionally paired with --to
        #[arg(long = "dest", required = true)]
        dest_app_ids: Vec<String>,
        /// Recipient addresses
        #[arg(long, required = true)]
        to: Vec<String>,
        #[arg(long)]
        nonce: u64,
        /// Payload (hex)
        #[arg(long, default_value = "0x")]
        data: String,
    },
    /// Prove a message and deliver it to the local mailbox
    Receive {
        /// Source-chain batch the message is proven at
        #[arg(long)]
        batch: u64,
        /// JSON file holding the message receipt
        #[arg(long)]
        receipt: String,
        #[command(flatten)]
        slot: SlotArgs,
    },
    /// Check every configured mailbox reports its configured application id
    Check,
}

#[derive(clap::Args, Debug)]
struct SlotArgs {
    /// Raw storage key; skips derivation
    #[arg(long, conflicts_with_all = ["logical_key", "slot"])]
    storage_key: Option<String>,
    /// Logical key (default for `receive`: the receipt hash)
    #[arg(long)]
    logical_key: Option<String>,
    /// Mapping slot index (decimal or 0x hex)
    #[arg(long, default_value = "0")]
    slot: String,
}

impl SlotArgs {
    fn resolve(&self, default_logical_key: Option<H256>) -> Result<ReceiveArgs> {
        if let Some(key) = &self.storage_key {
            return Ok(ReceiveArgs::StorageKey(parse_h256(key)?));
        }
        let logical_key = match (&self.logical_key, default_logical_key) {
            (Some(key), _) => parse_h256(key)?,
            (None, Some(default)) => default,
            (None, None) => anyhow::bail!("Either --storage-key or --logical-key is required"),
        };
        Ok(ReceiveArgs::Derived {
            logical_key,
            slot_index: parse_u256(&self.slot)?,
        })
    }
}

fn parse_u256(value: &str) -> Result<U256> {
    match value.strip_prefix("0x") {
        Some(hex) => U256::from_str_radix(hex, 16).with_context(|| format!("Invalid hex slot: {}", value)),
        None => U256::from_dec_str(value).with_context(|| format!("Invalid slot: {}", value)),
    }
}

fn load_config(path: Option<&str>) -> Result<Config> {
    match path {
        Some(path) => {
            info!("Loading configuration from: {}", path);
            Config::load_from_path(path)
        }
        None => {
            if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
                info!("Loading configuration from {}: {}", CONFIG_PATH_ENV, path);
            }
            Config::load()
        }
    }
}

fn relay_client(config: &Config) -> Result<RelayClient> {
    let signer = EvmSigner::from_config(config)?;
    Ok(RelayClient::new(config, signer)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt::init();

    match args.command {
        Command::StorageKey { key, slot } => {
            let key = derive_storage_key(parse_h256(&key)?, parse_u256(&slot)?);
            println!("{:#x}", key);
        }
        Command::Proof { app, batch, slot } => {
            let config = load_config(args.config.as_deref())?;
            let registry = config.registry();
            let chain = registry.get(&parse_h256(&app)?)?;
            let storage_key = slot.resolve(None)?.storage_key();

            let source = ZkSyncProofSource::new(config.relay.rpc_timeout())?;
            let provider = StorageProofProvider::new(Arc::new(source), config.relay.rpc_timeout());
            let proof = provider
                .get_proof(chain, chain.mailbox_addr, storage_key, batch)
                .await?;
            let encoded = ProofEncoder::new(chain.proof_depth).encode(&proof)?;

            println!("{}", serde_json::to_string_pretty(&proof)?);
            println!("{}", encoded);
        }
        Command::Send {
            dest_app_ids,
            to,
            nonce,
            data,
        } => {
            let config = load_config(args.config.as_deref())?;
            let client = relay_client(&config)?;
            let dest_app_ids = dest_app_ids
                .iter()
                .map(|id| parse_h256(id))
                .collect::<Result<Vec<_>>>()?;
            let to = to
                .iter()
                .map(|addr| parse_address(addr))
                .collect::<Result<Vec<_>>>()?;

            let sent = client
                .send_message(dest_app_ids, to, nonce, hex_to_bytes(&data)?)
                .await?;
            println!("{}", serde_json::to_string_pretty(&sent)?);
        }
        Command::Receive {
            batch,
            receipt,
            slot,
        } => {
            let config = load_config(args.config.as_deref())?;
            let client = relay_client(&config)?;
            let content = std::fs::read_to_string(&receipt)
                .with_context(|| format!("Failed to read receipt file {}", receipt))?;
            let receipt: MessageReceipt =
                serde_json::from_str(&content).context("Failed to parse receipt JSON")?;

            let request = ReceiveRequest {
                batch_number: batch,
                args: slot.resolve(Some(receipt.receipt_hash()))?,
                receipt,
            };
            let confirmation = client.receive_message(&request).await?;
            println!("{}", serde_json::to_string_pretty(&confirmation)?);
        }
        Command::Check => {
            let config = load_config(args.config.as_deref())?;
            let client = relay_client(&config)?;
            client.check_mailboxes().await?;
            println!(
                "All {} mailboxes report their configured application ids",
                client.registry().len()
            );
        }
    }

    Ok(())
}
