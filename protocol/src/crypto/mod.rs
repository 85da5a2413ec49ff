//! # Cryptographic Primitives
//!
//! The two primitives the chain actually needs: SHA-256 hashing and Ed25519
//! signatures. Everything else (Merkle roots, PoH slots, transaction IDs)
//! is built from these in the modules that own the data.
//!
//! - **hash** — SHA-256 helpers returning hex strings or fixed arrays.
//! - **keys** — Ed25519 keypair generation, signing, verification, and the
//!   address derivation used by the consensus layer.

pub mod hash;
pub mod keys;

pub use hash::{sha256_array, sha256_hex};
pub use keys::{derive_address, KeyError, Keypair, PublicKey, Signature};
