//! # Store — Persistent Blob Storage
//!
//! A thin adapter over sled's embedded key-value store. All on-disk data
//! flows through this module as JSON under five well-known keys:
//!
//! | Key           | Value                          |
//! |---------------|--------------------------------|
//! | `balances`    | `address → integer` object     |
//! | `blockchain`  | ordered array of blocks        |
//! | `mempool`     | ordered array of transactions  |
//! | `nonce_table` | `address → integer` object     |
//! | `validators`  | ordered `{address, stake}` array |
//!
//! ## Write serialization
//!
//! Multi-key save sequences (the ledger's `save_all`) take the store's
//! write guard for the whole sequence. Two loops writing the same keys
//! concurrently would otherwise interleave and leave the five blobs
//! describing different moments in time.

use parking_lot::{Mutex, MutexGuard};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::Db;
use std::path::Path;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Well-known keys
// ---------------------------------------------------------------------------

pub const KEY_BALANCES: &str = "balances";
pub const KEY_BLOCKCHAIN: &str = "blockchain";
pub const KEY_MEMPOOL: &str = "mempool";
pub const KEY_NONCE_TABLE: &str = "nonce_table";
pub const KEY_VALIDATORS: &str = "validators";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Persistent blob store for chain state.
///
/// sled supports lock-free concurrent reads and serialized single-key
/// writes on its own; the extra mutex here serializes *sequences* of writes
/// so a snapshot of all five keys is internally consistent.
#[derive(Debug)]
pub struct Store {
    db: Db,
    write_guard: Mutex<()>,
}

impl Store {
    /// Open or create a database at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = sled::open(path)?;
        Ok(Self {
            db,
            write_guard: Mutex::new(()),
        })
    }

    /// Create a temporary database that lives in memory and is cleaned up
    /// automatically when dropped. Ideal for tests — no filesystem side
    /// effects, no cleanup needed.
    pub fn open_temporary() -> StoreResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self {
            db,
            write_guard: Mutex::new(()),
        })
    }

    /// Serialize a value as JSON and write it under `key`.
    pub fn put_json<T: Serialize>(&self, key: &str, value: &T) -> StoreResult<()> {
        let bytes =
            serde_json::to_vec(value).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.db.insert(key, bytes)?;
        Ok(())
    }

    /// Read and deserialize the JSON value under `key`, or `None` if absent.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        match self.db.get(key)? {
            Some(bytes) => {
                let value = serde_json::from_slice(&bytes)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Flush pending writes to disk.
    pub fn flush(&self) -> StoreResult<()> {
        self.db.flush()?;
        Ok(())
    }

    /// Take the write guard for a multi-key save sequence. Held for the
    /// duration of the sequence; single-key writes don't need it.
    pub fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.write_guard.lock()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn put_get_roundtrip() {
        let store = Store::open_temporary().unwrap();

        let mut balances: HashMap<String, u64> = HashMap::new();
        balances.insert("plsEdaaaa".to_string(), 1_000);
        balances.insert("plsEdbbbb".to_string(), 250);

        store.put_json(KEY_BALANCES, &balances).unwrap();
        let loaded: HashMap<String, u64> = store.get_json(KEY_BALANCES).unwrap().unwrap();
        assert_eq!(loaded, balances);
    }

    #[test]
    fn missing_key_is_none() {
        let store = Store::open_temporary().unwrap();
        let loaded: Option<Vec<u64>> = store.get_json("absent").unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn overwrite_replaces_value() {
        let store = Store::open_temporary().unwrap();
        store.put_json(KEY_NONCE_TABLE, &vec![1u64, 2, 3]).unwrap();
        store.put_json(KEY_NONCE_TABLE, &vec![9u64]).unwrap();

        let loaded: Vec<u64> = store.get_json(KEY_NONCE_TABLE).unwrap().unwrap();
        assert_eq!(loaded, vec![9]);
    }

    #[test]
    fn values_are_json_on_disk() {
        let store = Store::open_temporary().unwrap();
        let mut nonces: HashMap<String, u64> = HashMap::new();
        nonces.insert("plsEdcccc".to_string(), 7);
        store.put_json(KEY_NONCE_TABLE, &nonces).unwrap();

        let raw = store.db.get(KEY_NONCE_TABLE).unwrap().unwrap();
        let text = std::str::from_utf8(&raw).unwrap();
        assert!(text.contains("\"plsEdcccc\":7"));
    }

    #[test]
    fn write_guard_serializes_sequences() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(Store::open_temporary().unwrap());
        let mut handles = Vec::new();

        // Two writers race full save sequences; the guard means the final
        // state is one writer's complete set, never a mix.
        for value in [1u64, 2] {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                for _ in 0..50 {
                    let _g = store.lock_writes();
                    store.put_json(KEY_BALANCES, &value).unwrap();
                    store.put_json(KEY_NONCE_TABLE, &value).unwrap();
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        let balances: u64 = store.get_json(KEY_BALANCES).unwrap().unwrap();
        let nonces: u64 = store.get_json(KEY_NONCE_TABLE).unwrap().unwrap();
        assert_eq!(balances, nonces);
    }
}
