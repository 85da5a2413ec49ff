//! # Persistence
//!
//! The chain's durable state is five JSON blobs in an embedded sled
//! database, keyed by well-known names. The store knows nothing about the
//! ledger's types — it moves serializable values in and out of fixed keys,
//! and the ledger decides what lives under each one.

pub mod db;

pub use db::{
    Store, StoreError, KEY_BALANCES, KEY_BLOCKCHAIN, KEY_MEMPOOL, KEY_NONCE_TABLE, KEY_VALIDATORS,
};
