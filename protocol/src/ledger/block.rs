//! # Block Structure
//!
//! A block is the atomic unit of the chain: an ordered list of committed
//! transactions, a link to the previous block, and cryptographic proofs of
//! integrity. Everything travels as JSON, so digests are lowercase hex
//! strings rather than raw bytes.
//!
//! ## Hash Computation
//!
//! The header hash covers `index|timestamp|prev_hash|merkle_root|proposer`,
//! pipe-joined and SHA-256'd.
//!
//! ## Merkle Root
//!
//! Leaves are each transaction's hash (which itself covers the signature).
//! Levels with an odd count pair the trailing leaf with itself, `H(x ‖ x)`.
//! An empty block has an empty-string root.

use serde::{Deserialize, Serialize};

use crate::config::GENESIS_PREV_HASH;
use crate::crypto::hash::sha256_hex;
use crate::ledger::transaction::Transaction;

// ---------------------------------------------------------------------------
// Block
// ---------------------------------------------------------------------------

/// A full Pulsar block: chain linkage, transaction list, proposer identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// 0-based height; strictly monotonic.
    pub index: u64,
    /// Unix timestamp in seconds; non-decreasing across the chain.
    pub timestamp: u64,
    /// Hex hash of the previous block's header; `"0"` for genesis.
    pub prev_hash: String,
    /// Merkle root over the transaction hashes; empty string for no txs.
    pub merkle_root: String,
    /// Address of the proposing validator; empty for genesis.
    pub proposer: String,
    /// Ordered transactions committed in this block.
    pub transactions: Vec<Transaction>,
    /// SHA-256 hex of the canonical header.
    pub hash: String,
}

impl Block {
    /// Constructs the genesis block at the given timestamp.
    ///
    /// Genesis has no transactions, no proposer, and a `prev_hash` of `"0"`.
    /// It is created exactly once, when the ledger is initialized.
    pub fn genesis(timestamp: u64) -> Self {
        Self::build(0, timestamp, GENESIS_PREV_HASH.to_string(), String::new(), Vec::new())
    }

    /// Constructs a block and computes its Merkle root and header hash.
    pub fn build(
        index: u64,
        timestamp: u64,
        prev_hash: String,
        proposer: String,
        transactions: Vec<Transaction>,
    ) -> Self {
        let merkle_root = compute_merkle_root(&transactions);
        let hash = compute_header_hash(index, timestamp, &prev_hash, &merkle_root, &proposer);
        Self {
            index,
            timestamp,
            prev_hash,
            merkle_root,
            proposer,
            transactions,
            hash,
        }
    }

    /// Recomputes the header hash from the stored fields.
    pub fn compute_hash(&self) -> String {
        compute_header_hash(
            self.index,
            self.timestamp,
            &self.prev_hash,
            &self.merkle_root,
            &self.proposer,
        )
    }

    /// Verifies structural integrity: stored hash matches the recomputed
    /// header hash, stored root matches the recomputed Merkle root, and —
    /// when the parent is supplied — the linkage and monotonicity rules.
    pub fn verify(&self, parent: Option<&Block>) -> Result<(), String> {
        let expected_hash = self.compute_hash();
        if self.hash != expected_hash {
            return Err(format!(
                "block {} hash mismatch: stored={}, computed={}",
                self.index, self.hash, expected_hash
            ));
        }

        let expected_root = compute_merkle_root(&self.transactions);
        if self.merkle_root != expected_root {
            return Err(format!(
                "block {} merkle root mismatch: stored={}, computed={}",
                self.index, self.merkle_root, expected_root
            ));
        }

        if self.index == 0 && self.prev_hash != GENESIS_PREV_HASH {
            return Err("genesis block must have prev_hash \"0\"".to_string());
        }

        if let Some(parent) = parent {
            if self.prev_hash != parent.hash {
                return Err(format!(
                    "block {} does not extend block {}: prev_hash={}, parent hash={}",
                    self.index, parent.index, self.prev_hash, parent.hash
                ));
            }
            if self.index != parent.index + 1 {
                return Err(format!(
                    "block index {} does not follow parent index {}",
                    self.index, parent.index
                ));
            }
            if self.timestamp < parent.timestamp {
                return Err(format!(
                    "block {} timestamp {} precedes parent timestamp {}",
                    self.index, self.timestamp, parent.timestamp
                ));
            }
        }

        Ok(())
    }

    /// Sum of fees over all included transactions.
    pub fn total_fees(&self) -> u64 {
        self.transactions.iter().map(|tx| tx.fee).sum()
    }
}

// ---------------------------------------------------------------------------
// Checkpoint
// ---------------------------------------------------------------------------

/// A `(block_index, hash)` pair emitted at fixed intervals for fast-sync
/// recovery. A syncing node can trust a checkpointed prefix and replay only
/// the tail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub block_index: u64,
    pub hash: String,
}

// ---------------------------------------------------------------------------
// Hashing
// ---------------------------------------------------------------------------

/// SHA-256 hex over the pipe-joined canonical header.
fn compute_header_hash(
    index: u64,
    timestamp: u64,
    prev_hash: &str,
    merkle_root: &str,
    proposer: &str,
) -> String {
    let header = format!(
        "{}|{}|{}|{}|{}",
        index, timestamp, prev_hash, merkle_root, proposer
    );
    sha256_hex(header.as_bytes())
}

/// Computes a binary Merkle root over the transaction hashes.
///
/// Leaves are the hex transaction hashes (signature included). Internal
/// nodes hash the concatenation of the two child hex strings; a trailing
/// odd node is paired with itself. Empty input yields the empty string.
pub fn compute_merkle_root(transactions: &[Transaction]) -> String {
    if transactions.is_empty() {
        return String::new();
    }

    let mut level: Vec<String> = transactions.iter().map(|tx| tx.tx_hash()).collect();

    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            let combined = if pair.len() == 2 {
                format!("{}{}", pair[0], pair[1])
            } else {
                format!("{}{}", pair[0], pair[0])
            };
            next.push(sha256_hex(combined.as_bytes()));
        }
        level = next;
    }

    level.into_iter().next().unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::Keypair;

    fn make_tx(nonce: u64) -> Transaction {
        let kp = Keypair::from_seed(&[nonce as u8; 32]);
        Transaction::build(&kp, "plsEdreceiver", 100, nonce)
    }

    #[test]
    fn genesis_properties() {
        let genesis = Block::genesis(1_700_000_000);
        assert_eq!(genesis.index, 0);
        assert_eq!(genesis.prev_hash, "0");
        assert_eq!(genesis.merkle_root, "");
        assert_eq!(genesis.proposer, "");
        assert!(genesis.transactions.is_empty());
        assert!(genesis.verify(None).is_ok());
    }

    #[test]
    fn genesis_hash_deterministic() {
        assert_eq!(
            Block::genesis(1_700_000_000).hash,
            Block::genesis(1_700_000_000).hash
        );
        assert_ne!(
            Block::genesis(1_700_000_000).hash,
            Block::genesis(1_700_000_001).hash
        );
    }

    #[test]
    fn build_links_to_parent() {
        let genesis = Block::genesis(1_700_000_000);
        let block = Block::build(
            1,
            1_700_000_001,
            genesis.hash.clone(),
            "plsEdvalidator".to_string(),
            vec![make_tx(1)],
        );
        assert!(block.verify(Some(&genesis)).is_ok());
    }

    #[test]
    fn tampered_hash_fails() {
        let genesis = Block::genesis(1_700_000_000);
        let mut block = Block::build(
            1,
            1_700_000_001,
            genesis.hash.clone(),
            "plsEdvalidator".to_string(),
            vec![],
        );
        block.hash = format!("ff{}", &block.hash[2..]);
        assert!(block.verify(Some(&genesis)).is_err());
    }

    #[test]
    fn tampered_merkle_root_fails() {
        let genesis = Block::genesis(1_700_000_000);
        let mut block = Block::build(
            1,
            1_700_000_001,
            genesis.hash.clone(),
            "plsEdvalidator".to_string(),
            vec![make_tx(1)],
        );
        block.merkle_root = sha256_hex(b"forged");
        // Recompute the hash so only the root is inconsistent.
        block.hash = block.compute_hash();
        assert!(block.verify(Some(&genesis)).is_err());
    }

    #[test]
    fn timestamp_regression_fails() {
        let genesis = Block::genesis(1_700_000_000);
        let block = Block::build(
            1,
            1_699_999_999,
            genesis.hash.clone(),
            "plsEdvalidator".to_string(),
            vec![],
        );
        assert!(block.verify(Some(&genesis)).is_err());
    }

    #[test]
    fn merkle_root_empty_is_empty_string() {
        assert_eq!(compute_merkle_root(&[]), "");
    }

    #[test]
    fn merkle_root_single_is_leaf_hash() {
        let tx = make_tx(1);
        assert_eq!(compute_merkle_root(&[tx.clone()]), tx.tx_hash());
    }

    #[test]
    fn merkle_root_odd_count_pairs_last_with_itself() {
        let txs = vec![make_tx(1), make_tx(2), make_tx(3)];
        let l1 = txs[0].tx_hash();
        let l2 = txs[1].tx_hash();
        let l3 = txs[2].tx_hash();

        let n12 = sha256_hex(format!("{}{}", l1, l2).as_bytes());
        let n33 = sha256_hex(format!("{}{}", l3, l3).as_bytes());
        let expected = sha256_hex(format!("{}{}", n12, n33).as_bytes());

        assert_eq!(compute_merkle_root(&txs), expected);
    }

    #[test]
    fn merkle_root_order_sensitive() {
        let a = make_tx(1);
        let b = make_tx(2);
        assert_ne!(
            compute_merkle_root(&[a.clone(), b.clone()]),
            compute_merkle_root(&[b, a])
        );
    }

    #[test]
    fn total_fees_sums() {
        let txs = vec![make_tx(1), make_tx(2)];
        let expected: u64 = txs.iter().map(|t| t.fee).sum();
        let block = Block::build(1, 1_700_000_001, "p".into(), "v".into(), txs);
        assert_eq!(block.total_fees(), expected);
    }
}
