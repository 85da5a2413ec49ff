//! # Parallel Batch Executor
//!
//! Turns an ordered batch of candidate transactions into the largest
//! per-sender prefix that can actually be applied, then applies it in one
//! atomic commit.
//!
//! ## Why sender partitioning works
//!
//! Within a batch, the only write-write conflicts are a sender's own
//! balance and nonce. Partitioning by sender makes every partition
//! independent on the debit side; the credit side (receivers) is
//! add-only and therefore commutative across partitions. So partitions
//! can be validated in parallel with zero coordination, and the final
//! commit is a single critical section whose length is bounded by the
//! accepted count, not the partition count.
//!
//! ## Partition rules
//!
//! Each partition walks its transactions in ascending nonce order with a
//! local `(nonce, balance)` view. The first failure — nonce gap, bad
//! signature, short balance — stops the partition: nonce gaps are not
//! allowed, so nothing after a failure can commit either.

use rayon::prelude::*;
use std::collections::HashMap;
use tracing::debug;

use crate::ledger::state::Ledger;
use crate::ledger::transaction::Transaction;

/// Validates `batch` against a fresh snapshot and commits the accepted
/// subset. Returns the accepted transactions; each sender's slice preserves
/// nonce order, order across senders is unspecified.
///
/// Re-running the returned set against the post-commit state accepts
/// nothing: every nonce in it is already consumed.
pub fn execute_batch(ledger: &Ledger, batch: &[Transaction]) -> Vec<Transaction> {
    if batch.is_empty() {
        return Vec::new();
    }

    // Partition by sender, preserving batch order within each partition.
    let mut partitions: HashMap<&str, Vec<&Transaction>> = HashMap::new();
    for tx in batch {
        partitions.entry(&tx.from).or_default().push(tx);
    }

    // Ascending nonce per partition. The sort is stable, so equal nonces
    // (duplicates) keep batch order and the second one fails its check.
    for txs in partitions.values_mut() {
        txs.sort_by_key(|tx| tx.nonce);
    }

    // Snapshot each sender's committed nonce and balance. The read locks
    // are held only for the duration of the copy.
    let senders: Vec<&str> = partitions.keys().copied().collect();
    let mut nonce_snap: HashMap<&str, u64> = HashMap::with_capacity(senders.len());
    let mut balance_snap: HashMap<&str, u64> = HashMap::with_capacity(senders.len());
    {
        let nonces = ledger.nonces.read();
        for &sender in &senders {
            nonce_snap.insert(sender, nonces.get(sender).copied().unwrap_or(0));
        }
    }
    {
        let balances = ledger.balances.read();
        for &sender in &senders {
            balance_snap.insert(sender, balances.get(sender).copied().unwrap_or(0));
        }
    }

    // Validate partitions in parallel. The pool is sized by the runtime;
    // with fewer partitions than cores the extra workers simply idle.
    let parts: Vec<(&str, Vec<&Transaction>)> = partitions.into_iter().collect();
    let accepted: Vec<Transaction> = parts
        .par_iter()
        .flat_map_iter(|(sender, txs)| {
            let mut local_nonce = nonce_snap[sender];
            let mut local_balance = balance_snap[sender];
            let mut accepted = Vec::with_capacity(txs.len());

            for tx in txs {
                if tx.nonce != local_nonce + 1 {
                    break;
                }
                if !tx.verify_signature() {
                    break;
                }
                let cost = tx.cost();
                if local_balance < cost {
                    break;
                }
                local_balance -= cost;
                local_nonce = tx.nonce;
                accepted.push((*tx).clone());
            }
            accepted
        })
        .collect();

    // Single global commit. Balances first, then nonces — every writer of
    // both locks uses this order.
    if !accepted.is_empty() {
        let mut balances = ledger.balances.write();
        let mut nonces = ledger.nonces.write();
        for tx in &accepted {
            *balances.entry(tx.from.clone()).or_insert(0) -= tx.cost();
            *balances.entry(tx.to.clone()).or_insert(0) += tx.amount;
            nonces.insert(tx.from.clone(), tx.nonce);
        }
    }

    debug!(
        candidates = batch.len(),
        accepted = accepted.len(),
        "batch executed"
    );

    accepted
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
