//! # Wallets
//!
//! A [`Wallet`] bundles the two keypairs a Pulsar identity carries:
//!
//! - **Ed25519** — the scheme consensus actually uses. Transaction and block
//!   signatures are Ed25519; the ledger address is derived from this key.
//! - **secp256k1** — reserved. Generated and persisted alongside the Ed25519
//!   keys so existing keystores stay valid when cross-chain tooling lands,
//!   but nothing on the signing path touches it today.
//!
//! Keystore files are plain JSON with hex-encoded key material — see
//! [`keystore`] for the on-disk format and the loading helpers.

pub mod keystore;

use k256::ecdsa::SigningKey as SecpSigningKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use std::fmt;

use crate::config::ADDRESS_PREFIX_SEC;
use crate::crypto::hash::sha256_array;
use crate::crypto::keys::{Keypair, PublicKey, Signature};

pub use keystore::{KeystoreError, KeystoreRecord};

/// Derives the secp256k1 address: prefix + first four bytes of the SHA-256
/// of the compressed public key, hex-encoded.
pub fn derive_secp_address(compressed_pub: &[u8]) -> String {
    let digest = sha256_array(compressed_pub);
    format!("{}{}", ADDRESS_PREFIX_SEC, hex::encode(&digest[..4]))
}

/// A dual-scheme identity: the Ed25519 keypair consensus signs with, plus
/// the reserved secp256k1 keypair.
pub struct Wallet {
    ed: Keypair,
    secp: SecpSigningKey,
    address_ed: String,
    address_sec: String,
}

impl Wallet {
    /// Generates a fresh wallet with both keypairs from the OS RNG.
    pub fn generate() -> Self {
        let ed = Keypair::generate();
        let secp = SecpSigningKey::random(&mut OsRng);
        Self::from_keys(ed, secp)
    }

    /// Assembles a wallet from existing key material, deriving both addresses.
    pub fn from_keys(ed: Keypair, secp: SecpSigningKey) -> Self {
        let address_ed = ed.address();
        let compressed = secp
            .verifying_key()
            .to_encoded_point(true)
            .as_bytes()
            .to_vec();
        let address_sec = derive_secp_address(&compressed);
        Self {
            ed,
            secp,
            address_ed,
            address_sec,
        }
    }

    /// The Ed25519 (consensus) address. This is what the ledger knows.
    pub fn address(&self) -> &str {
        &self.address_ed
    }

    /// The reserved secp256k1 address.
    pub fn secp_address(&self) -> &str {
        &self.address_sec
    }

    /// Signs a message with the Ed25519 key.
    pub fn sign(&self, message: &[u8]) -> Signature {
        self.ed.sign(message)
    }

    /// The Ed25519 public key.
    pub fn public_key(&self) -> PublicKey {
        self.ed.public_key()
    }

    /// Borrow the Ed25519 keypair (for transaction building).
    pub fn keypair(&self) -> &Keypair {
        &self.ed
    }

    /// Serializes this wallet into a keystore record.
    pub fn to_record(&self) -> KeystoreRecord {
        let compressed = self
            .secp
            .verifying_key()
            .to_encoded_point(true)
            .as_bytes()
            .to_vec();
        KeystoreRecord {
            address_ed: self.address_ed.clone(),
            pub_ed: self.ed.public_key().to_hex(),
            priv_ed: self.ed.secret_hex(),
            address_sec: self.address_sec.clone(),
            pub_sec: hex::encode(&compressed),
            priv_sec: hex::encode(self.secp.to_bytes()),
        }
    }
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Addresses only. Key material stays out of logs.
        f.debug_struct("Wallet")
            .field("address_ed", &self.address_ed)
            .field("address_sec", &self.address_sec)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ADDRESS_PREFIX_ED;

    #[test]
    fn generate_derives_both_addresses() {
        let w = Wallet::generate();
        assert!(w.address().starts_with(ADDRESS_PREFIX_ED));
        assert!(w.secp_address().starts_with(ADDRESS_PREFIX_SEC));
    }

    #[test]
    fn sign_verifies_with_public_key() {
        let w = Wallet::generate();
        let sig = w.sign(b"pay the validator");
        assert!(w.public_key().verify(b"pay the validator", &sig));
    }

    #[test]
    fn record_roundtrip_preserves_identity() {
        let w = Wallet::generate();
        let record = w.to_record();
        let restored = record.into_wallet().unwrap();
        assert_eq!(w.address(), restored.address());
        assert_eq!(w.secp_address(), restored.secp_address());

        // The restored Ed25519 key signs for the same public key.
        let sig = restored.sign(b"hello");
        assert!(w.public_key().verify(b"hello", &sig));
    }
}
