//! # Consensus
//!
//! A hybrid of three mechanisms, each doing the one job it is good at:
//!
//! - **PoH** (`poh.rs`) — an append-only hash chain binding wall-clock time
//!   into a verifiable seed source. One slot per commit tick.
//! - **Stake-weighted VRF** (`selection.rs`) — deterministic proposer
//!   selection from the slot digest. No grinding, no extra messages.
//! - **BFT vote** (`engine.rs`) — a `⌊2N/3⌋+1` quorum over the registry
//!   approves each commit; rejection slashes the proposer.
//!
//! The [`ConsensusEngine`] ties them to the ledger and runs the 350 ms
//! ticker that turns mempool contents into blocks.

pub mod engine;
pub mod poh;
pub mod selection;

pub use engine::{CommitMetrics, ConsensusConfig, ConsensusEngine, ConsensusError};
pub use poh::PohChain;
pub use selection::{select_eligible, select_proposer};
