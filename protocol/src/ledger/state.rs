//! # Ledger State
//!
//! The [`Ledger`] is the node's entire mutable state bundled into one owned
//! context: balances, per-sender nonces, the mempool, the chain, the
//! validator registry and its runtime status, the monetary sinks, and an
//! optional persistence handle. Tests construct isolated instances; the
//! node constructs exactly one and shares it behind an `Arc`.
//!
//! ## Locking
//!
//! Every map gets its own `parking_lot::RwLock`, so a balance query never
//! waits on a mempool append. The two invariant-critical rules:
//!
//! - The executor's commit takes the balances and nonces writer locks
//!   together, always balances first. No other path takes them in the
//!   reverse order.
//! - Admission and reads never block on I/O; persistence happens after
//!   state changes, outside any state lock.
//!
//! ## Admission vs commit
//!
//! `admit` only validates and buffers. Balances and nonces change at block
//! commit, inside the executor's single critical section. A transaction can
//! therefore be admitted against a stale view — the executor re-checks
//! against a fresh snapshot before anything is applied.

use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

use crate::config::{CHECKPOINT_EVERY, FIXED_REWARD};
use crate::ledger::block::{Block, Checkpoint};
use crate::ledger::transaction::{AdmissionError, Transaction};
use crate::ledger::validator::{Validator, ValidatorRuntime};
use crate::storage::{
    Store, StoreError, KEY_BALANCES, KEY_BLOCKCHAIN, KEY_MEMPOOL, KEY_NONCE_TABLE, KEY_VALIDATORS,
};
use crate::wallet::Wallet;

/// Current wall-clock time as seconds since the Unix epoch.
pub(crate) fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before UNIX epoch")
        .as_secs()
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// The node's complete in-memory state.
pub struct Ledger {
    /// On-chain balances, `address → tokens`.
    pub(crate) balances: RwLock<HashMap<String, u64>>,
    /// Last committed nonce per address (0 if the address has never sent).
    pub(crate) nonces: RwLock<HashMap<String, u64>>,
    /// Admitted but uncommitted transactions, insertion order preserved.
    pub(crate) mempool: RwLock<Vec<Transaction>>,
    /// The chain itself. Never empty — genesis is inserted at construction.
    pub(crate) chain: RwLock<Vec<Block>>,
    /// Fast-sync checkpoints, one per `CHECKPOINT_EVERY` blocks.
    pub(crate) checkpoints: RwLock<Vec<Checkpoint>>,
    /// Validator registry in insertion order.
    pub(crate) validators: RwLock<Vec<Validator>>,
    /// Runtime suspension records per validator address.
    pub(crate) status: RwLock<HashMap<String, ValidatorRuntime>>,
    /// Signing wallets for validators whose keystores were loaded.
    pub(crate) signers: RwLock<HashMap<String, Wallet>>,
    /// Accumulated treasury income. Monotonic non-decreasing.
    treasury: AtomicU64,
    /// Tokens destroyed by slashing. Monotonic non-decreasing.
    burned: AtomicU64,
    /// Persistence handle. Absent for test instances.
    store: Option<Arc<Store>>,
}

impl Ledger {
    /// Creates an in-memory ledger with a fresh genesis block and no
    /// persistence. This is what tests want.
    pub fn new() -> Self {
        let ledger = Self::empty(None);
        ledger.chain.write().push(Block::genesis(now_unix()));
        ledger
    }

    /// Opens a persistent ledger: loads all five blobs from the store and
    /// inserts genesis if the chain is empty (first boot).
    pub fn open(store: Arc<Store>) -> Result<Self, StoreError> {
        let ledger = Self::empty(Some(Arc::clone(&store)));

        if let Some(balances) = store.get_json(KEY_BALANCES)? {
            *ledger.balances.write() = balances;
        }
        if let Some(chain) = store.get_json::<Vec<Block>>(KEY_BLOCKCHAIN)? {
            *ledger.chain.write() = chain;
        }
        if let Some(mempool) = store.get_json(KEY_MEMPOOL)? {
            *ledger.mempool.write() = mempool;
        }
        if let Some(nonces) = store.get_json(KEY_NONCE_TABLE)? {
            *ledger.nonces.write() = nonces;
        }
        if let Some(validators) = store.get_json(KEY_VALIDATORS)? {
            *ledger.validators.write() = validators;
        }

        let fresh = {
            let mut chain = ledger.chain.write();
            if chain.is_empty() {
                chain.push(Block::genesis(now_unix()));
                true
            } else {
                false
            }
        };
        if fresh {
            info!("genesis block created");
            ledger.save_all()?;
        } else {
            info!(
                height = ledger.chain_height(),
                validators = ledger.validators.read().len(),
                "ledger state loaded"
            );
        }

        Ok(ledger)
    }

    fn empty(store: Option<Arc<Store>>) -> Self {
        Self {
            balances: RwLock::new(HashMap::new()),
            nonces: RwLock::new(HashMap::new()),
            mempool: RwLock::new(Vec::new()),
            chain: RwLock::new(Vec::new()),
            checkpoints: RwLock::new(Vec::new()),
            validators: RwLock::new(Vec::new()),
            status: RwLock::new(HashMap::new()),
            signers: RwLock::new(HashMap::new()),
            treasury: AtomicU64::new(0),
            burned: AtomicU64::new(0),
            store,
        }
    }

    // -----------------------------------------------------------------------
    // Balances & nonces
    // -----------------------------------------------------------------------

    /// Balance of an address; 0 if unknown.
    pub fn balance_of(&self, address: &str) -> u64 {
        self.balances.read().get(address).copied().unwrap_or(0)
    }

    /// The last committed nonce for an address; 0 for a fresh address.
    pub fn committed_nonce(&self, address: &str) -> u64 {
        self.nonces.read().get(address).copied().unwrap_or(0)
    }

    /// The nonce the address's next transaction must carry.
    pub fn next_nonce(&self, address: &str) -> u64 {
        self.committed_nonce(address) + 1
    }

    /// Credits an address out of thin air (faucet / test funding) and
    /// persists balances.
    pub fn airdrop(&self, address: &str, amount: u64) {
        {
            let mut balances = self.balances.write();
            *balances.entry(address.to_string()).or_insert(0) += amount;
        }
        info!(address, amount, "airdrop credited");
        self.persist_key(KEY_BALANCES);
    }

    // -----------------------------------------------------------------------
    // Admission
    // -----------------------------------------------------------------------

    /// Validates a transaction against the current committed state and
    /// appends it to the mempool.
    ///
    /// Checks, in order: nonce contiguity, balance coverage of
    /// `amount + fee`, signature. Nothing is debited here — the executor
    /// re-checks everything at commit time with a fresh snapshot.
    pub fn admit(&self, tx: Transaction) -> Result<(), AdmissionError> {
        let expected = self.next_nonce(&tx.from);
        if tx.nonce != expected {
            return Err(AdmissionError::InvalidNonce {
                expected,
                got: tx.nonce,
            });
        }

        let balance = self.balance_of(&tx.from);
        if balance < tx.cost() {
            return Err(AdmissionError::InsufficientBalance {
                need: tx.cost(),
                have: balance,
            });
        }

        if !tx.verify_signature() {
            return Err(AdmissionError::InvalidSignature);
        }

        self.mempool.write().push(tx);
        Ok(())
    }

    /// Builds, signs, and returns a transfer from `wallet` using the
    /// wallet's next expected nonce. Does not admit it.
    pub fn create_transaction(&self, wallet: &Wallet, to: &str, amount: u64) -> Transaction {
        let nonce = self.next_nonce(wallet.address());
        Transaction::build(wallet.keypair(), to, amount, nonce)
    }

    // -----------------------------------------------------------------------
    // Mempool
    // -----------------------------------------------------------------------

    /// Copies the current mempool contents, preserving insertion order.
    pub fn mempool_snapshot(&self) -> Vec<Transaction> {
        self.mempool.read().clone()
    }

    /// Number of pending transactions.
    pub fn mempool_len(&self) -> usize {
        self.mempool.read().len()
    }

    /// Removes committed transactions from the mempool by hash.
    ///
    /// Anything in `committed` that is no longer present is silently
    /// ignored. Dropped-but-uncommitted transactions stay out: a nonce-gap
    /// transaction the executor discarded was already excluded from
    /// `committed` and is filtered separately by the caller if desired.
    pub fn remove_committed(&self, committed: &[Transaction]) {
        if committed.is_empty() {
            return;
        }
        let drop_set: HashSet<String> = committed.iter().map(|tx| tx.tx_hash()).collect();
        let mut mempool = self.mempool.write();
        mempool.retain(|tx| !drop_set.contains(&tx.tx_hash()));
    }

    /// Empties the mempool entirely.
    pub fn clear_mempool(&self) {
        self.mempool.write().clear();
    }

    // -----------------------------------------------------------------------
    // Chain
    // -----------------------------------------------------------------------

    /// Number of blocks in the chain (genesis included).
    pub fn chain_height(&self) -> usize {
        self.chain.read().len()
    }

    /// Clone of the chain tip.
    pub fn tip(&self) -> Block {
        self.chain
            .read()
            .last()
            .cloned()
            .expect("chain always holds genesis")
    }

    /// Full copy of the chain.
    pub fn chain_snapshot(&self) -> Vec<Block> {
        self.chain.read().clone()
    }

    /// Copy of the emitted checkpoints.
    pub fn checkpoints_snapshot(&self) -> Vec<Checkpoint> {
        self.checkpoints.read().clone()
    }

    /// Builds the next block from executor-accepted transactions, appends
    /// it, credits the proposer, emits a checkpoint when due, and persists
    /// committed state.
    ///
    /// The proposer is credited `Σ fees + FIXED_REWARD` under the balances
    /// writer lock.
    pub fn append_block(&self, proposer: &str, transactions: Vec<Transaction>) -> Block {
        let block = {
            let mut chain = self.chain.write();
            let tail = chain.last().expect("chain always holds genesis");
            let index = tail.index + 1;
            // Wall clock, clamped so timestamps never regress across blocks.
            let timestamp = now_unix().max(tail.timestamp);
            let block = Block::build(
                index,
                timestamp,
                tail.hash.clone(),
                proposer.to_string(),
                transactions,
            );
            chain.push(block.clone());
            block
        };

        let reward = block.total_fees() + FIXED_REWARD;
        {
            let mut balances = self.balances.write();
            *balances.entry(proposer.to_string()).or_insert(0) += reward;
        }

        if block.index % CHECKPOINT_EVERY == 0 {
            let checkpoint = Checkpoint {
                block_index: block.index,
                hash: block.hash.clone(),
            };
            info!(index = block.index, hash = %block.hash, "checkpoint emitted");
            self.checkpoints.write().push(checkpoint);
        }

        debug!(
            index = block.index,
            txs = block.transactions.len(),
            proposer,
            reward,
            "block appended"
        );

        self.persist_committed();
        block
    }

    /// Appends a block received from a peer after it has been verified
    /// against the current tip.
    pub fn append_foreign_block(&self, block: Block) -> Result<(), String> {
        {
            let mut chain = self.chain.write();
            let tail = chain.last().expect("chain always holds genesis");
            block.verify(Some(tail))?;
            chain.push(block);
        }
        self.persist_committed();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Monetary sinks
    // -----------------------------------------------------------------------

    /// Accumulated treasury balance.
    pub fn treasury(&self) -> u64 {
        self.treasury.load(Ordering::Relaxed)
    }

    /// Total burned supply.
    pub fn burned(&self) -> u64 {
        self.burned.load(Ordering::Relaxed)
    }

    pub(crate) fn add_treasury(&self, amount: u64) {
        self.treasury.fetch_add(amount, Ordering::Relaxed);
    }

    pub(crate) fn add_burned(&self, amount: u64) {
        self.burned.fetch_add(amount, Ordering::Relaxed);
    }

    // -----------------------------------------------------------------------
    // Signers
    // -----------------------------------------------------------------------

    /// Whether a signing wallet is loaded for `address`.
    pub fn has_signer(&self, address: &str) -> bool {
        self.signers.read().contains_key(address)
    }

    /// Registers a signing wallet for its own address.
    pub fn register_signer(&self, wallet: Wallet) {
        self.signers
            .write()
            .insert(wallet.address().to_string(), wallet);
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Persists all five blobs. Used by init and explicit CLI mutations.
    pub fn save_all(&self) -> Result<(), StoreError> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let _guard = store.lock_writes();
        store.put_json(KEY_BALANCES, &*self.balances.read())?;
        store.put_json(KEY_BLOCKCHAIN, &*self.chain.read())?;
        store.put_json(KEY_MEMPOOL, &*self.mempool.read())?;
        store.put_json(KEY_NONCE_TABLE, &*self.nonces.read())?;
        store.put_json(KEY_VALIDATORS, &*self.validators.read())?;
        store.flush()?;
        Ok(())
    }

    /// Persists everything except the mempool. This is the hot path run
    /// after every commit; pending transactions are cheap to re-admit, so
    /// they don't earn a disk write per tick.
    pub fn persist_committed(&self) {
        let Some(store) = &self.store else {
            return;
        };
        let result = (|| -> Result<(), StoreError> {
            let _guard = store.lock_writes();
            store.put_json(KEY_BALANCES, &*self.balances.read())?;
            store.put_json(KEY_BLOCKCHAIN, &*self.chain.read())?;
            store.put_json(KEY_NONCE_TABLE, &*self.nonces.read())?;
            store.put_json(KEY_VALIDATORS, &*self.validators.read())?;
            store.flush()?;
            Ok(())
        })();
        if let Err(e) = result {
            // Non-fatal: the next commit writes a fresh snapshot.
            warn!(error = %e, "failed to persist committed state");
        }
    }

    /// Persists one named blob, logging on failure.
    pub(crate) fn persist_key(&self, key: &str) {
        let Some(store) = &self.store else {
            return;
        };
        let result = match key {
            KEY_BALANCES => store.put_json(key, &*self.balances.read()),
            KEY_BLOCKCHAIN => store.put_json(key, &*self.chain.read()),
            KEY_MEMPOOL => store.put_json(key, &*self.mempool.read()),
            KEY_NONCE_TABLE => store.put_json(key, &*self.nonces.read()),
            KEY_VALIDATORS => store.put_json(key, &*self.validators.read()),
            _ => Ok(()),
        }
        .and_then(|_| store.flush());
        if let Err(e) = result {
            warn!(key, error = %e, "failed to persist blob");
        }
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::Wallet;

    fn funded_wallet(ledger: &Ledger, amount: u64) -> Wallet {
        let wallet = Wallet::generate();
        ledger.airdrop(wallet.address(), amount);
        wallet
    }

    #[test]
    fn new_ledger_has_genesis() {
        let ledger = Ledger::new();
        assert_eq!(ledger.chain_height(), 1);
        let tip = ledger.tip();
        assert_eq!(tip.index, 0);
        assert_eq!(tip.prev_hash, "0");
    }

    #[test]
    fn airdrop_credits_balance() {
        let ledger = Ledger::new();
        ledger.airdrop("plsEdaaaa", 500);
        ledger.airdrop("plsEdaaaa", 250);
        assert_eq!(ledger.balance_of("plsEdaaaa"), 750);
    }

    #[test]
    fn fresh_address_next_nonce_is_one() {
        let ledger = Ledger::new();
        assert_eq!(ledger.committed_nonce("plsEdnew"), 0);
        assert_eq!(ledger.next_nonce("plsEdnew"), 1);
    }

    #[test]
    fn admit_valid_transaction() {
        let ledger = Ledger::new();
        let wallet = funded_wallet(&ledger, 10_000);
        let tx = ledger.create_transaction(&wallet, "plsEdto", 100);

        assert!(ledger.admit(tx).is_ok());
        assert_eq!(ledger.mempool_len(), 1);
        // Admission does not touch committed state.
        assert_eq!(ledger.balance_of(wallet.address()), 10_000);
        assert_eq!(ledger.committed_nonce(wallet.address()), 0);
    }

    #[test]
    fn admit_rejects_bad_nonce() {
        let ledger = Ledger::new();
        let wallet = funded_wallet(&ledger, 10_000);
        let tx = Transaction::build(wallet.keypair(), "plsEdto", 100, 5);

        let err = ledger.admit(tx).unwrap_err();
        assert_eq!(err, AdmissionError::InvalidNonce { expected: 1, got: 5 });
        assert_eq!(ledger.mempool_len(), 0);
    }

    #[test]
    fn admit_rejects_insufficient_balance() {
        let ledger = Ledger::new();
        let wallet = funded_wallet(&ledger, 50);
        let tx = ledger.create_transaction(&wallet, "plsEdto", 100);

        assert!(matches!(
            ledger.admit(tx),
            Err(AdmissionError::InsufficientBalance { .. })
        ));
        assert_eq!(ledger.mempool_len(), 0);
    }

    #[test]
    fn admit_rejects_tampered_signature() {
        let ledger = Ledger::new();
        let wallet = funded_wallet(&ledger, 10_000);
        let mut tx = ledger.create_transaction(&wallet, "plsEdto", 100);
        tx.amount = 1; // invalidates the signature

        // Amount tampering keeps nonce/balance checks green, so the
        // signature check is what must fire.
        assert_eq!(ledger.admit(tx), Err(AdmissionError::InvalidSignature));
        assert_eq!(ledger.mempool_len(), 0);
    }

    #[test]
    fn remove_committed_filters_by_hash() {
        let ledger = Ledger::new();
        let w1 = funded_wallet(&ledger, 10_000);
        let w2 = funded_wallet(&ledger, 10_000);

        let tx1 = ledger.create_transaction(&w1, "plsEdto", 100);
        let tx2 = ledger.create_transaction(&w2, "plsEdto", 100);
        ledger.admit(tx1.clone()).unwrap();
        ledger.admit(tx2.clone()).unwrap();

        ledger.remove_committed(&[tx1]);
        let remaining = ledger.mempool_snapshot();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].tx_hash(), tx2.tx_hash());
    }

    #[test]
    fn append_block_links_and_rewards() {
        let ledger = Ledger::new();
        let genesis_hash = ledger.tip().hash.clone();

        let block = ledger.append_block("plsEdproposer", Vec::new());
        assert_eq!(block.index, 1);
        assert_eq!(block.prev_hash, genesis_hash);
        assert_eq!(ledger.chain_height(), 2);
        // Empty block still pays the fixed reward.
        assert_eq!(ledger.balance_of("plsEdproposer"), FIXED_REWARD);
    }

    #[test]
    fn append_block_timestamps_never_regress() {
        let ledger = Ledger::new();
        let mut last = ledger.tip().timestamp;
        for _ in 0..3 {
            let block = ledger.append_block("plsEdproposer", Vec::new());
            assert!(block.timestamp >= last);
            last = block.timestamp;
        }
    }

    #[test]
    fn registered_signer_gates_block_production() {
        let ledger = Ledger::new();
        let wallet = Wallet::generate();
        let address = wallet.address().to_string();

        assert!(!ledger.has_signer(&address));
        ledger.register_signer(wallet);
        assert!(ledger.has_signer(&address));
    }

    #[test]
    fn foreign_block_must_extend_tip() {
        let ledger = Ledger::new();
        let bogus = Block::build(
            5,
            now_unix(),
            "unrelated".to_string(),
            "plsEdpeer".to_string(),
            Vec::new(),
        );
        assert!(ledger.append_foreign_block(bogus).is_err());
        assert_eq!(ledger.chain_height(), 1);
    }

    #[test]
    fn sinks_are_monotonic() {
        let ledger = Ledger::new();
        ledger.add_treasury(10);
        ledger.add_burned(20);
        ledger.add_treasury(5);
        assert_eq!(ledger.treasury(), 15);
        assert_eq!(ledger.burned(), 20);
    }

    #[test]
    fn open_roundtrips_through_store() {
        let store = Arc::new(Store::open_temporary().unwrap());
        let genesis_hash;
        {
            let ledger = Ledger::open(Arc::clone(&store)).unwrap();
            genesis_hash = ledger.tip().hash.clone();
            ledger.airdrop("plsEdsaved", 1_234);
            ledger.append_block("plsEdproposer", Vec::new());
        }

        let reopened = Ledger::open(store).unwrap();
        assert_eq!(reopened.balance_of("plsEdsaved"), 1_234);
        assert_eq!(reopened.chain_height(), 2);
        assert_eq!(reopened.chain_snapshot()[0].hash, genesis_hash);
    }
}
