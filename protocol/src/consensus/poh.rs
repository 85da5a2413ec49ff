//! # Proof of History
//!
//! An append-only chain of SHA-256 digests, each binding its predecessor,
//! a data tag, and the wall-clock nanosecond at which it was produced.
//! Pulsar does not use PoH for ordering the way Solana does — here it is a
//! verifiable seed source: every commit tick advances the chain by one
//! slot, and the new digest seeds proposer selection.

use parking_lot::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::crypto::hash::sha256_hex;

/// Current wall clock in nanoseconds since the Unix epoch.
fn now_nanos() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before UNIX epoch")
        .as_nanos()
}

/// Digest of one slot: `SHA-256("prev|data|timestamp_ns")` hex.
fn slot_digest(prev: &str, data: &str, timestamp_ns: u128) -> String {
    let input = format!("{}|{}|{}", prev, data, timestamp_ns);
    sha256_hex(input.as_bytes())
}

/// The append-only slot chain.
pub struct PohChain {
    slots: RwLock<Vec<String>>,
}

impl PohChain {
    /// Creates a chain seeded with its genesis slot.
    pub fn new() -> Self {
        let genesis = slot_digest("genesis", "init", now_nanos());
        Self {
            slots: RwLock::new(vec![genesis]),
        }
    }

    /// Appends the next slot, binding `data` and the current wall clock to
    /// the previous digest, and returns the new digest.
    pub fn next_slot(&self, data: &str) -> String {
        let mut slots = self.slots.write();
        let prev = slots.last().expect("chain is seeded at construction");
        let digest = slot_digest(prev, data, now_nanos());
        slots.push(digest.clone());
        digest
    }

    /// The most recent slot digest.
    pub fn latest(&self) -> String {
        self.slots
            .read()
            .last()
            .expect("chain is seeded at construction")
            .clone()
    }

    /// Number of slots produced so far (genesis included).
    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    /// Never true — the chain is seeded at construction. Present to keep
    /// clippy's `len_without_is_empty` satisfied.
    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }
}

impl Default for PohChain {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_with_genesis_slot() {
        let poh = PohChain::new();
        assert_eq!(poh.len(), 1);
        assert_eq!(poh.latest().len(), 64);
    }

    #[test]
    fn slots_chain_and_differ() {
        let poh = PohChain::new();
        let s1 = poh.next_slot("block-commit");
        let s2 = poh.next_slot("block-commit");

        assert_eq!(poh.len(), 3);
        assert_ne!(s1, s2);
        assert_eq!(poh.latest(), s2);
    }

    #[test]
    fn digest_binds_predecessor() {
        // Same data and timestamp, different predecessor → different digest.
        let a = slot_digest("prev-a", "data", 42);
        let b = slot_digest("prev-b", "data", 42);
        assert_ne!(a, b);
    }

    #[test]
    fn digest_binds_wall_clock() {
        let a = slot_digest("prev", "data", 1);
        let b = slot_digest("prev", "data", 2);
        assert_ne!(a, b);
    }
}
