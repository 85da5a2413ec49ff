//! # Stake-Weighted Proposer Selection
//!
//! A VRF-style lottery: the slot digest is hashed to a 256-bit integer,
//! reduced modulo the total stake, and the winner is the validator whose
//! cumulative stake interval contains the residue. Twice the stake, twice
//! the odds — and the whole thing is a pure function of the seed and the
//! registry, so every node agrees on the winner without a message.
//!
//! The 256-bit reduction folds the digest bytes through a running
//! `(acc << 8 | byte) % m` in `u128`; `m` fits in 64 bits so the
//! intermediate never overflows and no bigint is needed.

use crate::crypto::hash::sha256_array;
use crate::ledger::validator::Validator;

/// Reduces the SHA-256 of `seed` modulo `modulus`.
fn seed_residue(seed: &str, modulus: u64) -> u128 {
    let digest = sha256_array(seed.as_bytes());
    let m = modulus as u128;
    digest
        .iter()
        .fold(0u128, |acc, &byte| ((acc << 8) | byte as u128) % m)
}

/// Picks the proposer for `seed` by stake weight.
///
/// Returns `None` when the registry is empty or carries zero total stake.
/// Deterministic: same seed, same registry → same pick.
pub fn select_proposer<'a>(seed: &str, validators: &'a [Validator]) -> Option<&'a Validator> {
    let total_stake: u64 = validators.iter().map(|v| v.stake).sum();
    if total_stake == 0 {
        return None;
    }

    let r = seed_residue(seed, total_stake);
    let mut cumulative = 0u128;
    for v in validators {
        cumulative += v.stake as u128;
        if r < cumulative {
            return Some(v);
        }
    }
    // Unreachable given r < total_stake, but the registry's first entry is
    // a deterministic fallback either way.
    validators.first()
}

/// Picks the proposer, skipping a suspension.
///
/// If the stake-weighted pick is suspended (per `is_suspended`), the first
/// non-suspended validator in registry order takes its place. If everyone
/// is suspended, the original pick is returned — the caller deals with it.
pub fn select_eligible<'a>(
    seed: &str,
    validators: &'a [Validator],
    is_suspended: impl Fn(&str) -> bool,
) -> Option<&'a Validator> {
    let pick = select_proposer(seed, validators)?;
    if !is_suspended(&pick.address) {
        return Some(pick);
    }
    validators
        .iter()
        .find(|v| !is_suspended(&v.address))
        .or(Some(pick))
}
