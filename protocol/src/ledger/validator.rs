//! # Validator Registry, Suspension & Slashing
//!
//! Validators are `(address, stake)` pairs kept in insertion order; the
//! delegate set is the top-N re-sorted by stake on demand. Misbehavior is
//! handled by two policy kinds:
//!
//! - **Downtime** — a sliver of stake (0.01%, minimum 1), burned in full,
//!   plus a short proposing ban. The validator was absent, not malicious.
//! - **Safety** — double-signing, invalid blocks. An absolute amount split
//!   70% burn / 15% treasury / 10% whistleblower / 5% honest redistribution,
//!   plus a 24-hour ban from every consensus role.
//!
//! All distribution arithmetic is integer floors with the residue folded
//! into the deterministic sinks, so `burn + treasury + whistle + honest`
//! always equals the amount actually slashed — the conservation tests below
//! hold the line.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::{
    DEFAULT_VALIDATOR_COUNT, DEFAULT_VALIDATOR_STAKE, DELEGATE_TOP_N, DOWNTIME_SLASH_PERCENT,
    DOWNTIME_SUSPENSION, SAFETY_BURN_PCT, SAFETY_HONEST_PCT, SAFETY_SUSPENSION,
    SAFETY_TREASURY_PCT, SAFETY_WHISTLE_PCT,
};
use crate::ledger::state::{now_unix, Ledger};
use crate::storage::KEY_VALIDATORS;
use crate::wallet::keystore::{self, KeystoreError};
use crate::wallet::Wallet;

// ---------------------------------------------------------------------------
// Registry types
// ---------------------------------------------------------------------------

/// One registered validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    pub address: String,
    pub stake: u64,
}

/// Which consensus roles a suspension removes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SuspensionScope {
    /// No restriction. The state of a record that was never suspended.
    #[default]
    None,
    /// Barred from being selected as block proposer.
    Propose,
    /// Barred from voting in BFT rounds.
    Vote,
    /// Barred from everything.
    All,
}

impl SuspensionScope {
    /// Parses the CLI spelling of a scope.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Some(Self::None),
            "propose" => Some(Self::Propose),
            "vote" => Some(Self::Vote),
            "all" => Some(Self::All),
            _ => None,
        }
    }
}

impl fmt::Display for SuspensionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Propose => write!(f, "propose"),
            Self::Vote => write!(f, "vote"),
            Self::All => write!(f, "all"),
        }
    }
}

/// Per-validator runtime record. Exists only for validators that have been
/// suspended at least once.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ValidatorRuntime {
    /// Unix second at which the suspension lapses.
    pub suspended_until: u64,
    /// Scope of the active suspension.
    pub scope: SuspensionScope,
}

// ---------------------------------------------------------------------------
// Slash policy
// ---------------------------------------------------------------------------

/// The two offense classes, with different distribution rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlashKind {
    Downtime,
    Safety,
}

/// Everything `apply_slash` needs to know about one slashing event.
#[derive(Debug, Clone)]
pub struct SlashParams {
    /// Absolute amount to slash. When 0, `percent` of current stake is used.
    pub amount: u64,
    /// Fraction of current stake (e.g. 0.0001 = 0.01%). Only consulted when
    /// `amount` is 0.
    pub percent: f64,
    /// Distribution fractions. Downtime ignores these and burns everything.
    pub burn_pct: f64,
    pub treasury_pct: f64,
    pub whistle_pct: f64,
    pub honest_pct: f64,
    pub kind: SlashKind,
    /// Multiplier for correlated offenses (several validators failing the
    /// same way at once). 1.0 for isolated events.
    pub correlation_mul: f64,
    pub suspend_scope: SuspensionScope,
    pub suspend_for: Duration,
}

impl SlashParams {
    /// The downtime policy: 0.01% of stake (minimum 1), burned in full,
    /// five-minute proposing ban.
    pub fn downtime() -> Self {
        Self {
            amount: 0,
            percent: DOWNTIME_SLASH_PERCENT,
            burn_pct: 1.0,
            treasury_pct: 0.0,
            whistle_pct: 0.0,
            honest_pct: 0.0,
            kind: SlashKind::Downtime,
            correlation_mul: 1.0,
            suspend_scope: SuspensionScope::Propose,
            suspend_for: DOWNTIME_SUSPENSION,
        }
    }

    /// The safety-fault policy: absolute amount, 70/15/10/5 distribution,
    /// 24-hour full suspension.
    pub fn safety(amount: u64) -> Self {
        Self {
            amount,
            percent: 0.0,
            burn_pct: SAFETY_BURN_PCT,
            treasury_pct: SAFETY_TREASURY_PCT,
            whistle_pct: SAFETY_WHISTLE_PCT,
            honest_pct: SAFETY_HONEST_PCT,
            kind: SlashKind::Safety,
            correlation_mul: 1.0,
            suspend_scope: SuspensionScope::All,
            suspend_for: SAFETY_SUSPENSION,
        }
    }
}

/// Where one slash's tokens ended up. `slashed` always equals the sum of
/// the other four fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlashOutcome {
    /// Stake actually deducted after clamping.
    pub slashed: u64,
    pub burned: u64,
    pub treasury: u64,
    pub whistleblower: u64,
    /// Total credited to non-offender validators.
    pub honest: u64,
}

// ---------------------------------------------------------------------------
// Ledger operations
// ---------------------------------------------------------------------------

impl Ledger {
    /// Adds a validator if the address is not already registered.
    pub fn register_validator(&self, address: &str, stake: u64) {
        let mut validators = self.validators.write();
        if validators.iter().any(|v| v.address == address) {
            return;
        }
        validators.push(Validator {
            address: address.to_string(),
            stake,
        });
    }

    /// Copy of the registry in insertion order.
    pub fn validators_snapshot(&self) -> Vec<Validator> {
        self.validators.read().clone()
    }

    /// Stake of a registered validator, or `None` for strangers.
    pub fn stake_of(&self, address: &str) -> Option<u64> {
        self.validators
            .read()
            .iter()
            .find(|v| v.address == address)
            .map(|v| v.stake)
    }

    /// Combined stake of the whole registry.
    pub fn total_stake(&self) -> u64 {
        self.validators.read().iter().map(|v| v.stake).sum()
    }

    /// The delegate set: top-N validators by stake, descending. Ties keep
    /// registry order (the sort is stable).
    pub fn delegates(&self) -> Vec<Validator> {
        let mut sorted = self.validators_snapshot();
        sorted.sort_by(|a, b| b.stake.cmp(&a.stake));
        sorted.truncate(DELEGATE_TOP_N);
        sorted
    }

    // -- Suspension ---------------------------------------------------------

    /// Suspends a validator for `scope` until `now + duration`.
    pub fn suspend(&self, address: &str, scope: SuspensionScope, duration: Duration) {
        let until = now_unix() + duration.as_secs();
        self.status.write().insert(
            address.to_string(),
            ValidatorRuntime {
                suspended_until: until,
                scope,
            },
        );
        info!(address, %scope, until, "validator suspended");
    }

    /// Whether `address` is currently suspended for the role `need`.
    ///
    /// True iff a record exists, its deadline is in the future, and its
    /// scope is either `All` or exactly `need`.
    pub fn is_suspended(&self, address: &str, need: SuspensionScope) -> bool {
        let status = self.status.read();
        let Some(rt) = status.get(address) else {
            return false;
        };
        if now_unix() >= rt.suspended_until {
            return false;
        }
        match rt.scope {
            SuspensionScope::All => true,
            SuspensionScope::None => false,
            scope => scope == need,
        }
    }

    /// The runtime record for an address, if one was ever created.
    pub fn validator_runtime(&self, address: &str) -> Option<ValidatorRuntime> {
        self.status.read().get(address).copied()
    }

    // -- Slashing -----------------------------------------------------------

    /// Convenience: slash for downtime under the default policy.
    pub fn slash_downtime(&self, offender: &str) -> SlashOutcome {
        self.apply_slash(offender, SlashParams::downtime(), "")
    }

    /// Convenience: slash a safety fault of `amount`, optionally crediting
    /// a whistleblower and scaling for correlated failures.
    pub fn slash_safety(
        &self,
        offender: &str,
        amount: u64,
        reporter: &str,
        correlation_mul: f64,
    ) -> SlashOutcome {
        let mut params = SlashParams::safety(amount);
        if correlation_mul > 0.0 {
            params.correlation_mul = correlation_mul;
        }
        self.apply_slash(offender, params, reporter)
    }

    /// Executes one slashing event.
    ///
    /// 1. Resolve the amount from `params.amount` or `percent × stake`
    ///    (minimum 1 when stake remains), then apply `correlation_mul`.
    /// 2. Clamp to current stake and deduct.
    /// 3. Distribute: downtime burns everything; safety splits into
    ///    burn/treasury/whistleblower/honest with integer floors. A missing
    ///    reporter folds the whistle share into the treasury; the honest
    ///    pot is paid pro-rata by stake to non-offenders with any rounding
    ///    residue (or the whole pot, absent honest stake) folded into the
    ///    treasury.
    /// 4. Apply the policy's suspension.
    /// 5. Persist the validator set.
    pub fn apply_slash(&self, offender: &str, params: SlashParams, reporter: &str) -> SlashOutcome {
        // Step 1: resolve the amount.
        let mut amount = params.amount;
        if amount == 0 && params.percent > 0.0 {
            if let Some(stake) = self.stake_of(offender) {
                amount = (stake as f64 * params.percent) as u64;
                if amount == 0 && stake > 0 {
                    amount = 1;
                }
            }
        }
        if params.correlation_mul > 0.0 && params.correlation_mul != 1.0 {
            amount = (amount as f64 * params.correlation_mul) as u64;
        }
        if amount == 0 {
            return SlashOutcome::default();
        }

        // Step 2: clamp and deduct.
        let actual = {
            let mut validators = self.validators.write();
            match validators.iter_mut().find(|v| v.address == offender) {
                Some(v) => {
                    let actual = amount.min(v.stake);
                    v.stake -= actual;
                    actual
                }
                None => {
                    warn!(offender, "slash target is not a registered validator");
                    0
                }
            }
        };
        if actual == 0 {
            return SlashOutcome::default();
        }
        info!(offender, actual, kind = ?params.kind, "validator slashed");

        // Step 3: distribute.
        let outcome = match params.kind {
            SlashKind::Downtime => {
                self.add_burned(actual);
                SlashOutcome {
                    slashed: actual,
                    burned: actual,
                    ..SlashOutcome::default()
                }
            }
            SlashKind::Safety => self.distribute_slashed(actual, &params, reporter, offender),
        };

        // Step 4: suspension.
        if !params.suspend_for.is_zero() && params.suspend_scope != SuspensionScope::None {
            self.suspend(offender, params.suspend_scope, params.suspend_for);
        }

        // Step 5: persist.
        self.persist_key(KEY_VALIDATORS);

        outcome
    }

    /// Splits a safety slash into its four pots. Integer floors throughout;
    /// every unit lands somewhere.
    fn distribute_slashed(
        &self,
        total: u64,
        params: &SlashParams,
        reporter: &str,
        offender: &str,
    ) -> SlashOutcome {
        let burn = (total as f64 * params.burn_pct) as u64;
        let mut treasury = (total as f64 * params.treasury_pct) as u64;
        let mut whistle = (total as f64 * params.whistle_pct) as u64;
        let honest_pot = total - burn - treasury - whistle;

        self.add_burned(burn);

        // Whistleblower share, or treasury when nobody reported.
        if !reporter.is_empty() && whistle > 0 {
            let mut balances = self.balances.write();
            *balances.entry(reporter.to_string()).or_insert(0) += whistle;
        } else {
            treasury += whistle;
            whistle = 0;
        }

        // Honest redistribution, pro-rata by stake, offender excluded.
        let mut honest_credited = 0u64;
        if honest_pot > 0 {
            let validators = self.validators_snapshot();
            let honest_stake: u64 = validators
                .iter()
                .filter(|v| v.address != offender)
                .map(|v| v.stake)
                .sum();

            if honest_stake > 0 {
                let mut balances = self.balances.write();
                for v in validators.iter().filter(|v| v.address != offender) {
                    let share =
                        ((honest_pot as u128 * v.stake as u128) / honest_stake as u128) as u64;
                    if share > 0 {
                        *balances.entry(v.address.clone()).or_insert(0) += share;
                        honest_credited += share;
                    }
                }
            }
            // Rounding residue, or the whole pot when no honest stake exists.
            treasury += honest_pot - honest_credited;
        }

        self.add_treasury(treasury);

        info!(
            total,
            burn,
            treasury,
            whistle,
            honest = honest_credited,
            "slash distributed"
        );

        SlashOutcome {
            slashed: total,
            burned: burn,
            treasury,
            whistleblower: whistle,
            honest: honest_credited,
        }
    }

    // -- Bootstrap ----------------------------------------------------------

    /// Repairs the validator registry and its keystores.
    ///
    /// With an empty registry, imports every wallet found in `dir` at the
    /// default stake; if the directory is also empty, generates
    /// [`DEFAULT_VALIDATOR_COUNT`] fresh wallets and writes their keystores.
    /// Finally loads signing wallets for every registered validator.
    /// Returns the number of signers loaded.
    pub fn fix_validators(&self, dir: &Path) -> Result<usize, KeystoreError> {
        std::fs::create_dir_all(dir)?;

        if self.validators.read().is_empty() {
            for wallet in keystore::load_wallet_dir(dir) {
                info!(address = wallet.address(), "validator imported from keystore");
                self.register_validator(wallet.address(), DEFAULT_VALIDATOR_STAKE);
                self.register_signer(wallet);
            }
        }

        if self.validators.read().is_empty() {
            for _ in 0..DEFAULT_VALIDATOR_COUNT {
                let wallet = Wallet::generate();
                let path = dir.join(format!("{}.json", wallet.address()));
                keystore::save_wallet(&wallet, &path)?;
                info!(address = wallet.address(), "validator generated");
                self.register_validator(wallet.address(), DEFAULT_VALIDATOR_STAKE);
                self.register_signer(wallet);
            }
        }

        self.persist_key(KEY_VALIDATORS);
        Ok(self.auto_load_signers(dir))
    }

    /// Loads signing wallets from `dir` for every registered validator that
    /// doesn't have one yet. Returns how many signers are loaded in total.
    pub fn auto_load_signers(&self, dir: &Path) -> usize {
        for v in self.validators_snapshot() {
            if self.has_signer(&v.address) {
                continue;
            }
            match keystore::find_wallet(dir, &v.address) {
                Some(wallet) => self.register_signer(wallet),
                None => {
                    warn!(address = %v.address, "no keystore found for validator");
                }
            }
        }
        let loaded = self.signers.read().len();
        info!(loaded, "validator signers loaded");
        loaded
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger_with_validators(stakes: &[(&str, u64)]) -> Ledger {
        let ledger = Ledger::new();
        for (addr, stake) in stakes {
            ledger.register_validator(addr, *stake);
        }
        ledger
    }

    // -- Registry -----------------------------------------------------------

    #[test]
    fn register_ignores_duplicates() {
        let ledger = ledger_with_validators(&[("v1", 100)]);
        ledger.register_validator("v1", 999);
        assert_eq!(ledger.stake_of("v1"), Some(100));
        assert_eq!(ledger.validators_snapshot().len(), 1);
    }

    #[test]
    fn delegates_are_top_n_by_stake() {
        let ledger = ledger_with_validators(&[
            ("v1", 10),
            ("v2", 60),
            ("v3", 30),
            ("v4", 50),
            ("v5", 20),
            ("v6", 40),
            ("v7", 70),
        ]);
        let delegates = ledger.delegates();
        let addresses: Vec<&str> = delegates.iter().map(|v| v.address.as_str()).collect();
        assert_eq!(addresses, vec!["v7", "v2", "v4", "v6", "v3"]);
        // The registry itself keeps insertion order.
        assert_eq!(ledger.validators_snapshot()[0].address, "v1");
    }

    // -- Suspension ---------------------------------------------------------

    #[test]
    fn suspend_propose_scope() {
        let ledger = ledger_with_validators(&[("v1", 100)]);
        ledger.suspend("v1", SuspensionScope::Propose, Duration::from_secs(600));

        assert!(ledger.is_suspended("v1", SuspensionScope::Propose));
        assert!(!ledger.is_suspended("v1", SuspensionScope::Vote));
        assert!(!ledger.is_suspended("v2", SuspensionScope::Propose));
    }

    #[test]
    fn suspend_all_covers_every_role() {
        let ledger = ledger_with_validators(&[("v1", 100)]);
        ledger.suspend("v1", SuspensionScope::All, Duration::from_secs(600));

        assert!(ledger.is_suspended("v1", SuspensionScope::Propose));
        assert!(ledger.is_suspended("v1", SuspensionScope::Vote));
        assert!(ledger.is_suspended("v1", SuspensionScope::All));
    }

    #[test]
    fn expired_suspension_clears() {
        let ledger = ledger_with_validators(&[("v1", 100)]);
        ledger.suspend("v1", SuspensionScope::All, Duration::from_secs(0));
        // suspended_until == now, and the check is `now < until`.
        assert!(!ledger.is_suspended("v1", SuspensionScope::Propose));
    }

    #[test]
    fn scope_parsing() {
        assert_eq!(SuspensionScope::parse("propose"), Some(SuspensionScope::Propose));
        assert_eq!(SuspensionScope::parse("VOTE"), Some(SuspensionScope::Vote));
        assert_eq!(SuspensionScope::parse("all"), Some(SuspensionScope::All));
        assert_eq!(SuspensionScope::parse("sideways"), None);
    }

    // -- Slashing -----------------------------------------------------------

    #[test]
    fn downtime_slash_burns_minimum_one() {
        let ledger = ledger_with_validators(&[("v1", 100)]);
        // 0.01% of 100 floors to 0, so the minimum of 1 applies.
        let outcome = ledger.slash_downtime("v1");

        assert_eq!(outcome.slashed, 1);
        assert_eq!(outcome.burned, 1);
        assert_eq!(ledger.stake_of("v1"), Some(99));
        assert_eq!(ledger.burned(), 1);
        assert!(ledger.is_suspended("v1", SuspensionScope::Propose));
        assert!(!ledger.is_suspended("v1", SuspensionScope::Vote));
    }

    #[test]
    fn downtime_slash_percent_of_large_stake() {
        let ledger = ledger_with_validators(&[("v1", 10_000_000)]);
        let outcome = ledger.slash_downtime("v1");
        // 0.01% of 10M = 1000.
        assert_eq!(outcome.slashed, 1_000);
        assert_eq!(ledger.burned(), 1_000);
        assert_eq!(ledger.stake_of("v1"), Some(9_999_000));
    }

    #[test]
    fn safety_slash_distribution_with_reporter() {
        let ledger = ledger_with_validators(&[("v1", 10_000), ("v2", 3_000), ("v3", 1_000)]);
        let outcome = ledger.slash_safety("v1", 1_000, "plsEdreporter", 1.0);

        assert_eq!(outcome.slashed, 1_000);
        assert_eq!(outcome.burned, 700);
        assert_eq!(outcome.whistleblower, 100);
        assert_eq!(ledger.balance_of("plsEdreporter"), 100);
        assert_eq!(ledger.stake_of("v1"), Some(9_000));

        // Honest pot of 50 over stakes 3000:1000 → 37 and 12, residue 1.
        assert_eq!(ledger.balance_of("v2"), 37);
        assert_eq!(ledger.balance_of("v3"), 12);
        assert_eq!(outcome.honest, 49);
        assert_eq!(outcome.treasury, 150 + 1);

        // Conservation.
        assert_eq!(
            outcome.burned + outcome.treasury + outcome.whistleblower + outcome.honest,
            outcome.slashed
        );
        assert!(ledger.is_suspended("v1", SuspensionScope::Vote));
    }

    #[test]
    fn safety_slash_no_reporter_folds_whistle_into_treasury() {
        let ledger = ledger_with_validators(&[("v1", 10_000), ("v2", 5_000)]);
        let outcome = ledger.slash_safety("v1", 1_000, "", 1.0);

        assert_eq!(outcome.whistleblower, 0);
        // 150 treasury + 100 unclaimed whistle; honest pot 50 goes entirely
        // to v2 (sole honest staker), no residue.
        assert_eq!(outcome.treasury, 250);
        assert_eq!(outcome.honest, 50);
        assert_eq!(ledger.balance_of("v2"), 50);
        assert_eq!(
            outcome.burned + outcome.treasury + outcome.whistleblower + outcome.honest,
            outcome.slashed
        );
    }

    #[test]
    fn safety_slash_sole_validator_honest_pot_to_treasury() {
        let ledger = ledger_with_validators(&[("v1", 10_000)]);
        let outcome = ledger.slash_safety("v1", 1_000, "", 1.0);

        assert_eq!(outcome.honest, 0);
        // 150 + 100 whistle fold + 50 honest fold.
        assert_eq!(outcome.treasury, 300);
        assert_eq!(ledger.treasury(), 300);
    }

    #[test]
    fn slash_clamps_to_stake() {
        let ledger = ledger_with_validators(&[("v1", 500)]);
        let outcome = ledger.slash_safety("v1", 10_000, "", 1.0);
        assert_eq!(outcome.slashed, 500);
        assert_eq!(ledger.stake_of("v1"), Some(0));
    }

    #[test]
    fn correlation_multiplier_scales_amount() {
        let ledger = ledger_with_validators(&[("v1", 10_000)]);
        let outcome = ledger.slash_safety("v1", 100, "", 3.0);
        assert_eq!(outcome.slashed, 300);
    }

    #[test]
    fn slash_unknown_address_is_noop() {
        let ledger = ledger_with_validators(&[("v1", 100)]);
        let outcome = ledger.slash_safety("ghost", 1_000, "", 1.0);
        assert_eq!(outcome, SlashOutcome::default());
        assert_eq!(ledger.burned(), 0);
        assert_eq!(ledger.treasury(), 0);
    }

    #[test]
    fn slash_zero_stake_validator_is_noop() {
        let ledger = ledger_with_validators(&[("v1", 0)]);
        let outcome = ledger.slash_downtime("v1");
        assert_eq!(outcome, SlashOutcome::default());
        // No suspension either: nothing was actually slashed.
        assert!(!ledger.is_suspended("v1", SuspensionScope::Propose));
    }

    // -- Bootstrap ----------------------------------------------------------

    #[test]
    fn fix_validators_generates_defaults() {
        let dir = std::env::temp_dir().join(format!("pulsar-fixval-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);

        let ledger = Ledger::new();
        let loaded = ledger.fix_validators(&dir).unwrap();

        assert_eq!(loaded, DEFAULT_VALIDATOR_COUNT);
        let validators = ledger.validators_snapshot();
        assert_eq!(validators.len(), DEFAULT_VALIDATOR_COUNT);
        assert!(validators.iter().all(|v| v.stake == DEFAULT_VALIDATOR_STAKE));
        assert!(validators.iter().all(|v| ledger.has_signer(&v.address)));

        // A second ledger imports the same keystores instead of generating.
        let reimported = Ledger::new();
        let loaded = reimported.fix_validators(&dir).unwrap();
        assert_eq!(loaded, DEFAULT_VALIDATOR_COUNT);
        let mut a: Vec<String> = validators.into_iter().map(|v| v.address).collect();
        let mut b: Vec<String> = reimported
            .validators_snapshot()
            .into_iter()
            .map(|v| v.address)
            .collect();
        a.sort();
        b.sort();
        assert_eq!(a, b);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
