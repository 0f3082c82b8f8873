//! Get Relayer Address
//!
//! Reads the relay configuration and prints the EVM address of the configured key.
//!
//! ## Usage
//!
//! ```bash
//! NEXUS_RELAY_CONFIG_PATH=config/nexus-relay.toml cargo run --bin get_relayer_address
//! ```

use anyhow::Result;
use nexus_relay::{Config, EvmSigner};

fn main() -> Result<()> {
    let config = Config::load()?;
    let signer = EvmSigner::from_config(&config)?;

    println!("NEXUS_RELAYER_ADDRESS={:#x}", signer.address());

    Ok(())
}
