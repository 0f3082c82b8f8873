//! Relayer Key Generation Utility
//!
//! Generates a new secp256k1 key for the relayer and prints its EVM address.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin generate_keys
//! ```
//!
//! Export the private key under the variable named by `private_key_env` in
//! the relay config and fund the address on every chain the relayer submits to.

use nexus_relay::EvmSigner;

fn main() {
    let signer = EvmSigner::random();

    println!("Generated secp256k1 relayer key:");
    println!();
    println!("NEXUS_RELAYER_PRIVATE_KEY={}", signer.private_key_hex());
    println!("NEXUS_RELAYER_ADDRESS={:#x}", signer.address());
}
