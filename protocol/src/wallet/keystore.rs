//! # Keystore
//!
//! Per-address JSON keystore files. Each file holds one identity's key
//! material, hex-encoded, for both schemes:
//!
//! ```json
//! {
//!   "address_ed":  "plsEd…",
//!   "pub_ed":      "…64 hex chars…",
//!   "priv_ed":     "…64 hex chars…",
//!   "address_sec": "plsSec…",
//!   "pub_sec":     "…66 hex chars (compressed point)…",
//!   "priv_sec":    "…64 hex chars…"
//! }
//! ```
//!
//! Validator keystores live under `validators/` as `<address>.json`. Files
//! are written with mode 0600 on Unix — the key material is not encrypted,
//! so filesystem permissions are the only lock on the door.

use k256::ecdsa::SigningKey as SecpSigningKey;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use super::Wallet;
use crate::crypto::keys::Keypair;

/// Errors raised by keystore file operations.
#[derive(Debug, Error)]
pub enum KeystoreError {
    #[error("keystore io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("keystore parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("keystore holds invalid key material: {0}")]
    InvalidKey(String),
}

/// The JSON shape of one keystore file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeystoreRecord {
    pub address_ed: String,
    pub pub_ed: String,
    pub priv_ed: String,
    pub address_sec: String,
    pub pub_sec: String,
    pub priv_sec: String,
}

impl KeystoreRecord {
    /// Reconstructs a wallet from this record.
    ///
    /// Addresses are re-derived from the private keys rather than trusted
    /// from the file, so a hand-edited address cannot point a key at
    /// somebody else's account.
    pub fn into_wallet(self) -> Result<Wallet, KeystoreError> {
        let ed = Keypair::from_hex(&self.priv_ed)
            .map_err(|e| KeystoreError::InvalidKey(e.to_string()))?;

        let secp_bytes = hex::decode(&self.priv_sec)
            .map_err(|e| KeystoreError::InvalidKey(e.to_string()))?;
        let secp = SecpSigningKey::from_slice(&secp_bytes)
            .map_err(|e| KeystoreError::InvalidKey(e.to_string()))?;

        Ok(Wallet::from_keys(ed, secp))
    }
}

/// Writes a wallet to `path` as pretty-printed JSON, mode 0600 on Unix.
pub fn save_wallet(wallet: &Wallet, path: &Path) -> Result<(), KeystoreError> {
    let record = wallet.to_record();
    let json = serde_json::to_vec_pretty(&record)?;
    fs::write(path, json)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }

    Ok(())
}

/// Loads a wallet from a single keystore file.
pub fn load_wallet(path: &Path) -> Result<Wallet, KeystoreError> {
    let data = fs::read(path)?;
    let record: KeystoreRecord = serde_json::from_slice(&data)?;
    record.into_wallet()
}

/// Loads every parseable `.json` keystore in a directory.
///
/// Unreadable or malformed files are skipped, not fatal — a keystore
/// directory accumulates junk over time and one bad file should not take
/// the validator set down with it.
pub fn load_wallet_dir(dir: &Path) -> Vec<Wallet> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut wallets = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        match load_wallet(&path) {
            Ok(w) => wallets.push(w),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unreadable keystore file");
            }
        }
    }
    wallets
}

/// Finds the keystore for `address` in a directory: tries `<address>.json`
/// first, then falls back to scanning every file for a matching identity.
pub fn find_wallet(dir: &Path, address: &str) -> Option<Wallet> {
    let direct = dir.join(format!("{}.json", address));
    if direct.is_file() {
        if let Ok(w) = load_wallet(&direct) {
            if w.address() == address {
                return Some(w);
            }
        }
    }
    load_wallet_dir(dir).into_iter().find(|w| w.address() == address)
}
