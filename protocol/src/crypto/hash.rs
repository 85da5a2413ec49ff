//! # Hashing Utilities
//!
//! SHA-256 is the only digest in Pulsar. Transaction hashes, Merkle roots,
//! block header hashes, and PoH slots all use it, so every digest on the
//! chain is comparable and every tool that speaks SHA-256 can verify us.
//!
//! Most call sites want the hex string form (hashes travel inside blocks as
//! JSON), so that variant comes first.

use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash of the input and return it hex-encoded.
///
/// This is the workhorse: chain structures carry their digests as lowercase
/// hex strings, so hashing and encoding in one step keeps call sites short.
///
/// # Example
///
/// ```
/// use pulsar_protocol::crypto::sha256_hex;
///
/// let digest = sha256_hex(b"pulsar");
/// assert_eq!(digest.len(), 64);
/// ```
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256_array(data))
}

/// Compute the SHA-256 hash and return the raw 32-byte digest.
///
/// Use this in paths that do arithmetic on the digest (the VRF reduction)
/// or feed it into another hash, where the hex round-trip is pure waste.
pub fn sha256_array(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}
