//! # Pulsar Protocol — Core Library
//!
//! The beating heart of Pulsar: a permissioned DPoS chain that accepts
//! signed transfers, buffers them in a mempool, and on a fixed 350 ms tempo
//! picks a proposer, runs a BFT vote, executes the batch in parallel, and
//! appends a hash-linked block.
//!
//! ## Architecture
//!
//! The crate is split into modules that mirror the actual concerns of a
//! chain node:
//!
//! - **crypto** — SHA-256 and Ed25519. Don't roll your own.
//! - **ledger** — balances, nonces, mempool, blocks, validators, slashing,
//!   and the sender-partitioned parallel executor.
//! - **consensus** — PoH slot chain, stake-weighted VRF proposer selection,
//!   BFT voting, and the tick-driven commit loop.
//! - **network** — the submission gateway (QoS lanes + sharded ingress)
//!   and the pluggable block transport. The core runs fine with the no-op
//!   transport; peers are an optimization, not a dependency.
//! - **storage** — five JSON blobs in an embedded sled store.
//! - **wallet** — dual-scheme keypairs and the JSON keystore.
//! - **config** — protocol constants and network parameters.
//!
//! ## Design Philosophy
//!
//! 1. Correctness over performance (but we're still fast).
//! 2. State changes happen at commit, in one critical section. Admission
//!    only ever says no.
//! 3. If it touches money, it has tests. Plural.

pub mod config;
pub mod consensus;
pub mod crypto;
pub mod ledger;
pub mod network;
pub mod storage;
pub mod wallet;
