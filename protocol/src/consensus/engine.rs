//! # Consensus Engine
//!
//! The tick-driven commit pipeline. Every [`BLOCK_TIME`] the ticker fires
//! and runs one pass:
//!
//! ```text
//! 1. Mempool empty? → done.
//! 2. Advance PoH → slot digest.
//! 3. Stake-weighted VRF pick from the slot digest, skipping validators
//!    suspended from proposing.
//! 4. Resolve the proposer's signing key; missing key aborts the tick.
//! 5. BFT vote across non-suspended voters; below quorum the proposer is
//!    slashed a flat penalty and the tick aborts.
//! 6. Snapshot mempool → parallel executor → block build → drain committed
//!    transactions → broadcast.
//! ```
//!
//! ## Reentrancy
//!
//! `commit_block` is guarded by an atomic flag: the dedicated ticker task
//! is the normal driver, but the CLI can force a commit at any time, and
//! two overlapping passes would double-spend the mempool snapshot. The
//! loser of the flag race returns immediately with nothing to report.
//!
//! ## Vote threshold
//!
//! The quorum is `⌊2N/3⌋ + 1` where `N` is the total registry size —
//! including suspended validators, who are skipped as voters but still
//! counted in the denominator. With more than a third of the registry
//! suspended the threshold is unreachable and no block commits until
//! suspensions lapse; switching the denominator to the eligible voter
//! count would trade that stall for weaker quorums.

use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{BLOCK_TIME, VOTE_REJECT_SLASH};
use crate::consensus::poh::PohChain;
use crate::consensus::selection;
use crate::ledger::executor::execute_batch;
use crate::ledger::validator::SuspensionScope;
use crate::ledger::{Block, Ledger, Validator};
use crate::network::Transport;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tunable parameters for the consensus engine.
#[derive(Debug, Clone)]
pub struct ConsensusConfig {
    /// Time between ticks of the block producer.
    pub block_time: std::time::Duration,
    /// Flat slash applied to a proposer whose block the vote rejects.
    pub vote_reject_slash: u64,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            block_time: BLOCK_TIME,
            vote_reject_slash: VOTE_REJECT_SLASH,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Ways a commit tick can abort. None of these are fatal to the ticker —
/// the next tick starts from scratch.
#[derive(Debug, Error)]
pub enum ConsensusError {
    /// The registry is empty (or carries no stake); nobody can propose.
    #[error("no validators registered")]
    NoValidators,

    /// The selected proposer has no signing key loaded.
    #[error("no signing key for proposer {0}")]
    ProposerKeyMissing(String),

    /// The BFT round fell short of quorum.
    #[error("vote rejected: {yes} yes votes, quorum {quorum}")]
    VoteRejected { yes: usize, quorum: usize },
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Block-production metrics, updated on each successful commit.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommitMetrics {
    /// Transactions per second over the last inter-block interval.
    pub last_tps: f64,
    /// Seconds between the last two committed blocks.
    pub last_interval_secs: f64,
}

/// Drives block production for a node.
///
/// Owns the PoH chain and the reentrancy guard; everything else — state,
/// registry, persistence — lives in the shared [`Ledger`].
pub struct ConsensusEngine {
    ledger: Arc<Ledger>,
    transport: Transport,
    poh: PohChain,
    committing: AtomicBool,
    config: ConsensusConfig,
    metrics: parking_lot::Mutex<(Option<Instant>, CommitMetrics)>,
}

impl ConsensusEngine {
    /// Creates an engine over the given ledger and transport.
    pub fn new(ledger: Arc<Ledger>, transport: Transport, config: ConsensusConfig) -> Self {
        info!(
            block_time_ms = config.block_time.as_millis() as u64,
            "consensus engine initialized"
        );
        Self {
            ledger,
            transport,
            poh: PohChain::new(),
            committing: AtomicBool::new(false),
            config,
            metrics: parking_lot::Mutex::new((None, CommitMetrics::default())),
        }
    }

    /// Runs the ticker until the shutdown signal flips.
    ///
    /// One dedicated task drives the cadence; a tick that overlaps an
    /// in-flight manual commit simply loses the guard race and waits for
    /// the next interval. The tick itself never waits on network acks —
    /// broadcasting is fire-and-forget.
    pub async fn run(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        info!("block producer starting");
        let mut interval = tokio::time::interval(self.config.block_time);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.commit_block() {
                        Ok(Some(block)) => {
                            info!(
                                index = block.index,
                                txs = block.transactions.len(),
                                proposer = %block.proposer,
                                "block committed"
                            );
                        }
                        Ok(None) => {}
                        Err(e) => warn!(error = %e, "commit tick aborted"),
                    }
                }
                _ = shutdown.changed() => {
                    info!("block producer shutting down");
                    return;
                }
            }
        }
    }

    /// Runs one commit pass. Returns the committed block, or `None` when
    /// there was nothing to do (empty mempool, or another commit in
    /// flight).
    pub fn commit_block(&self) -> Result<Option<Block>, ConsensusError> {
        if self
            .committing
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            debug!("commit already in progress, skipping");
            return Ok(None);
        }
        let result = self.commit_block_inner();
        self.committing.store(false, Ordering::Release);
        result
    }

    fn commit_block_inner(&self) -> Result<Option<Block>, ConsensusError> {
        let started = Instant::now();

        if self.ledger.mempool_len() == 0 {
            return Ok(None);
        }

        // Advance PoH; the fresh slot digest seeds proposer selection.
        let slot_hash = self.poh.next_slot("block-commit");

        let validators = self.ledger.validators_snapshot();
        if validators.is_empty() {
            return Err(ConsensusError::NoValidators);
        }

        let proposer = selection::select_eligible(&slot_hash, &validators, |addr| {
            self.ledger.is_suspended(addr, SuspensionScope::Propose)
        })
        .ok_or(ConsensusError::NoValidators)?
        .clone();

        if !self.ledger.has_signer(&proposer.address) {
            return Err(ConsensusError::ProposerKeyMissing(proposer.address.clone()));
        }

        debug!(
            proposer = %proposer.address,
            stake = proposer.stake,
            slot = %&slot_hash[..12],
            "proposer selected"
        );

        // BFT round. A rejection costs the proposer a flat slash.
        if let Err(e) = self.bft_vote(&slot_hash, &validators) {
            self.ledger
                .slash_safety(&proposer.address, self.config.vote_reject_slash, "", 1.0);
            return Err(e);
        }

        // Execute against a mempool snapshot, build the block, drain the
        // committed subset. Transactions the executor dropped stay pending
        // and simply never become committable.
        let snapshot = self.ledger.mempool_snapshot();
        let accepted = execute_batch(&self.ledger, &snapshot);
        let block = self.ledger.append_block(&proposer.address, accepted);
        self.ledger.remove_committed(&block.transactions);

        // Best effort: a down transport is logged and swallowed.
        if let Err(e) = self.transport.broadcast_block(&block) {
            warn!(error = %e, "block broadcast failed");
        }

        self.record_metrics(&block);
        debug!(
            index = block.index,
            latency_ms = started.elapsed().as_millis() as u64,
            mempool_after = self.ledger.mempool_len(),
            "commit pass finished"
        );

        Ok(Some(block))
    }

    /// Collects yes-votes from every validator not suspended from voting,
    /// in parallel, and checks them against the quorum.
    fn bft_vote(&self, slot_hash: &str, validators: &[Validator]) -> Result<(), ConsensusError> {
        let voters: Vec<&Validator> = validators
            .iter()
            .filter(|v| !self.ledger.is_suspended(&v.address, SuspensionScope::Vote))
            .filter(|v| !self.ledger.is_suspended(&v.address, SuspensionScope::All))
            .collect();

        let yes = voters
            .par_iter()
            .filter(|v| {
                let approve = validate_block(slot_hash);
                debug!(voter = %v.address, approve, "vote cast");
                approve
            })
            .count();

        // Quorum over the full registry size, suspended voters included.
        let quorum = validators.len() * 2 / 3 + 1;
        if yes >= quorum {
            debug!(yes, quorum, total = validators.len(), "quorum reached");
            Ok(())
        } else {
            Err(ConsensusError::VoteRejected { yes, quorum })
        }
    }

    /// Snapshot of the block-production metrics.
    pub fn metrics(&self) -> CommitMetrics {
        self.metrics.lock().1
    }

    /// The latest PoH slot digest.
    pub fn poh_latest(&self) -> String {
        self.poh.latest()
    }

    fn record_metrics(&self, block: &Block) {
        let mut guard = self.metrics.lock();
        let now = Instant::now();
        if let Some(last) = guard.0 {
            let dt = now.duration_since(last).as_secs_f64().max(1e-6);
            guard.1 = CommitMetrics {
                last_tps: block.transactions.len() as f64 / dt,
                last_interval_secs: dt,
            };
        }
        guard.0 = Some(now);
    }
}

/// Block validity check run by each voter.
///
/// The slot digest is produced locally and the executor re-validates every
/// transaction before commit, so there is nothing external left to check —
/// every honest voter approves. The hook exists so a networked deployment
/// can wire real verification in without touching the round logic.
fn validate_block(_slot_hash: &str) -> bool {
    true
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
