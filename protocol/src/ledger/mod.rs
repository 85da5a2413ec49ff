//! # Ledger
//!
//! The chain's bookkeeping: accounts, transactions, blocks, validators.
//!
//! ```text
//! transaction.rs — signed transfer record, canonical payload, fee rule
//! state.rs       — the Ledger context: all maps, locks, sinks, persistence
//! executor.rs    — sender-partitioned parallel batch execution
//! block.rs       — block structure, Merkle root, header hash, checkpoints
//! validator.rs   — registry, suspension scopes, slashing policies
//! ```
//!
//! The [`Ledger`] struct is the spine of the node: admission, execution,
//! block building, and slashing are all operations on it, split across the
//! files above by concern.

pub mod block;
pub mod executor;
pub mod state;
pub mod transaction;
pub mod validator;

pub use block::{compute_merkle_root, Block, Checkpoint};
pub use executor::execute_batch;
pub use state::Ledger;
pub use transaction::{AdmissionError, Transaction};
pub use validator::{
    SlashKind, SlashOutcome, SlashParams, SuspensionScope, Validator, ValidatorRuntime,
};
