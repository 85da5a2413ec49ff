//! # Protocol Configuration & Constants
//!
//! Every magic number in Pulsar lives here. If you're hardcoding a constant
//! somewhere else, you're doing it wrong and you owe the team coffee.
//!
//! These values define the DNA of the network. Changing them after launch
//! is somewhere between "difficult" and "career-ending", so choose wisely
//! during devnet.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

/// Target time between consensus ticks. 350 ms is aggressive but achievable:
/// the executor is sender-partitioned and the BFT round is local, so a tick
/// comfortably finishes well under budget on commodity hardware.
pub const BLOCK_TIME: Duration = Duration::from_millis(350);

/// Block time as milliseconds — because some APIs want a u64, not a Duration.
/// Keep this in sync with [`BLOCK_TIME`] or face the wrath of integration tests.
pub const BLOCK_TIME_MS: u64 = 350;

// ---------------------------------------------------------------------------
// Economics
// ---------------------------------------------------------------------------

/// Fee charged per byte of a transaction's canonical encoding. Deliberately
/// cheap; the fee exists to price spam, not to fund the network.
pub const FEE_PER_BYTE: u64 = 1;

/// Fixed block reward credited to the proposer on top of collected fees.
pub const FIXED_REWARD: u64 = 5;

/// Flat penalty applied to a proposer whose block fails the BFT vote.
pub const VOTE_REJECT_SLASH: u64 = 10;

// ---------------------------------------------------------------------------
// Chain
// ---------------------------------------------------------------------------

/// `prev_hash` value of the genesis block.
pub const GENESIS_PREV_HASH: &str = "0";

/// A checkpoint `(index, hash)` is emitted every this many blocks for
/// fast-sync recovery.
pub const CHECKPOINT_EVERY: u64 = 100;

// ---------------------------------------------------------------------------
// Validators
// ---------------------------------------------------------------------------

/// Size of the delegate set: the top-N validators by stake.
pub const DELEGATE_TOP_N: usize = 5;

/// Number of validators generated by `fix-validators` when the registry and
/// the keystore directory are both empty.
pub const DEFAULT_VALIDATOR_COUNT: usize = 6;

/// Stake assigned to freshly generated or imported validators.
pub const DEFAULT_VALIDATOR_STAKE: u64 = 100_000;

/// Directory holding per-validator keystore files (`<address>.json`).
pub const VALIDATOR_KEYSTORE_DIR: &str = "validators";

// ---------------------------------------------------------------------------
// Slashing policy
// ---------------------------------------------------------------------------

/// Downtime slash: fraction of current stake (0.01%), minimum 1 token when
/// any stake remains. Burned in full.
pub const DOWNTIME_SLASH_PERCENT: f64 = 0.0001;

/// Downtime offenders lose the right to propose for this long.
pub const DOWNTIME_SUSPENSION: Duration = Duration::from_secs(5 * 60);

/// Safety-fault distribution: burn / treasury / whistleblower / honest.
/// Must sum to 1.0 — the conservation test will catch you if they don't.
pub const SAFETY_BURN_PCT: f64 = 0.70;
pub const SAFETY_TREASURY_PCT: f64 = 0.15;
pub const SAFETY_WHISTLE_PCT: f64 = 0.10;
pub const SAFETY_HONEST_PCT: f64 = 0.05;

/// Safety-fault offenders are barred from every consensus role for a day.
pub const SAFETY_SUSPENSION: Duration = Duration::from_secs(24 * 60 * 60);

// ---------------------------------------------------------------------------
// Gateway / QoS lanes
// ---------------------------------------------------------------------------

/// Fee at or above which a submission rides the fast lane.
pub const FEE_LANE_FAST: u64 = 5_000;

/// Fee at or above which a submission rides the normal lane.
pub const FEE_LANE_NORMAL: u64 = 1_200;

/// Token-bucket refill rates (tokens/second) and burst capacities per lane.
pub const FAST_LANE_RATE: f64 = 4_000.0;
pub const FAST_LANE_BURST: f64 = 8_000.0;
pub const NORMAL_LANE_RATE: f64 = 1_800.0;
pub const NORMAL_LANE_BURST: f64 = 3_600.0;
pub const SLOW_LANE_RATE: f64 = 600.0;
pub const SLOW_LANE_BURST: f64 = 1_200.0;

/// Validators get a rate-limit weight of `1 + stake / this`, capped at
/// [`VALIDATOR_WEIGHT_CAP`]. A validator with 30k stake submits at 4x the
/// base rate; beyond that, stake buys no further priority.
pub const VALIDATOR_WEIGHT_DIVISOR: f64 = 10_000.0;
pub const VALIDATOR_WEIGHT_CAP: f64 = 4.0;

/// Buffered depth of each ingress shard queue. Full shards drop.
pub const SHARD_QUEUE_DEPTH: usize = 4_096;

// ---------------------------------------------------------------------------
// Addresses
// ---------------------------------------------------------------------------

/// Prefix of Ed25519-derived addresses (the consensus scheme).
pub const ADDRESS_PREFIX_ED: &str = "plsEd";

/// Prefix of secp256k1-derived addresses (reserved; not used by consensus).
pub const ADDRESS_PREFIX_SEC: &str = "plsSec";

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_time_constants_agree() {
        assert_eq!(BLOCK_TIME.as_millis() as u64, BLOCK_TIME_MS);
    }

    #[test]
    fn safety_distribution_sums_to_one() {
        let total = SAFETY_BURN_PCT + SAFETY_TREASURY_PCT + SAFETY_WHISTLE_PCT + SAFETY_HONEST_PCT;
        assert!((total - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn lane_thresholds_ordered() {
        assert!(FEE_LANE_FAST > FEE_LANE_NORMAL);
        assert!(FAST_LANE_RATE > NORMAL_LANE_RATE);
        assert!(NORMAL_LANE_RATE > SLOW_LANE_RATE);
    }

    #[test]
    fn address_prefixes_distinct() {
        assert_ne!(ADDRESS_PREFIX_ED, ADDRESS_PREFIX_SEC);
    }
}
