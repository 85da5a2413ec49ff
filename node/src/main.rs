//! # Pulsar Node
//!
//! Entry point for the `pulsar-node` binary. Parses the CLI, initializes
//! logging, opens the ledger, and dispatches to the requested verb. The
//! `start` verb runs the full node — consensus ticker plus ingress
//! gateway — until SIGINT/SIGTERM; everything else is a one-shot command
//! against the same database.

mod cli;
mod logging;

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;

use pulsar_protocol::consensus::{ConsensusConfig, ConsensusEngine};
use pulsar_protocol::ledger::{Ledger, SuspensionScope};
use pulsar_protocol::network::{bootstrap_peers, Gateway, Role, Transport};
use pulsar_protocol::storage::Store;
use pulsar_protocol::wallet::keystore;

use cli::{parse_duration, Commands, PulsarCli, TxCommands};
use logging::LogFormat;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = PulsarCli::parse();

    let level = &cli.log_level;
    logging::init_logging(
        &format!("pulsar_node={level},pulsar_protocol={level}"),
        LogFormat::Pretty,
    );

    match cli.command {
        Commands::Init => init_ledger(&cli.db),
        Commands::Start => start_node(&cli.db, &cli.keystore).await,
        Commands::Tx(TxCommands::Send { to, amount, walletfile }) => {
            tx_send(&cli.db, &to, amount, &walletfile)
        }
        Commands::TxBulk { count, to, walletfile } => tx_bulk(&cli.db, count, &to, &walletfile),
        Commands::WalletBulk { count, dir } => wallet_bulk(count, &dir),
        Commands::Commit => commit_once(&cli.db, &cli.keystore),
        Commands::Airdrop { amount, folder } => airdrop(&cli.db, amount, &folder),
        Commands::FixValidators => fix_validators(&cli.db, &cli.keystore),
        Commands::Metrics => metrics(&cli.db),
        Commands::ValidatorStatus { address } => validator_status(&cli.db, &address),
        Commands::Suspend { address, scope, duration } => {
            suspend(&cli.db, &address, &scope, &duration)
        }
        Commands::Slash { address, amount, reporter } => {
            slash(&cli.db, &address, amount, reporter.as_deref())
        }
        Commands::ShowEcon => show_econ(&cli.db),
        Commands::StressTest {
            wallet_count,
            per_wallet,
            rounds,
            interval_secs,
            dir,
        } => {
            stress_test(
                &cli.db,
                &cli.keystore,
                wallet_count,
                per_wallet,
                rounds,
                interval_secs,
                &dir,
            )
            .await
        }
    }
}

/// Opens the store and loads (or initializes) the ledger.
fn open_ledger(db_path: &Path) -> Result<Arc<Ledger>> {
    let store = Arc::new(
        Store::open(db_path)
            .with_context(|| format!("failed to open database at {}", db_path.display()))?,
    );
    let ledger = Ledger::open(store).context("failed to load ledger state")?;
    Ok(Arc::new(ledger))
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

fn init_ledger(db_path: &Path) -> Result<()> {
    let ledger = open_ledger(db_path)?;
    ledger.save_all().context("failed to persist initial state")?;

    println!("Ledger initialized.");
    println!("  Database    : {}", db_path.display());
    println!("  Chain height: {}", ledger.chain_height());
    println!("  Genesis hash: {}", ledger.chain_snapshot()[0].hash);
    Ok(())
}

async fn start_node(db_path: &Path, keystore_dir: &Path) -> Result<()> {
    let ledger = open_ledger(db_path)?;
    let signers = ledger.auto_load_signers(keystore_dir);
    let validators = ledger.validators_snapshot();
    if validators.is_empty() {
        tracing::warn!("no validators registered — run fix-validators first");
    } else {
        tracing::info!(
            validators = validators.len(),
            delegates = ledger.delegates().len(),
            signers,
            "validator set ready"
        );
    }

    let role = Role::from_env();
    let peers = bootstrap_peers();
    tracing::info!(?role, bootstrap = peers.len(), "network configured");

    // The gateway is the node's front door: its shard consumers run for
    // the life of the process.
    let _gateway = Gateway::new(Arc::clone(&ledger), role);

    let engine = Arc::new(ConsensusEngine::new(
        Arc::clone(&ledger),
        Transport::noop(),
        ConsensusConfig::default(),
    ));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let producer = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.run(shutdown_rx).await })
    };

    shutdown_signal().await;
    tracing::info!("shutdown signal received");
    let _ = shutdown_tx.send(true);
    let _ = producer.await;

    ledger.save_all().context("failed to persist state on shutdown")?;
    tracing::info!("pulsar-node stopped");
    Ok(())
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

fn tx_send(db_path: &Path, to: &str, amount: u64, walletfile: &Path) -> Result<()> {
    let ledger = open_ledger(db_path)?;
    let wallet = keystore::load_wallet(walletfile)
        .with_context(|| format!("failed to load wallet {}", walletfile.display()))?;

    let tx = ledger.create_transaction(&wallet, to, amount);
    let hash = tx.tx_hash();
    ledger
        .admit(tx)
        .map_err(|e| anyhow::anyhow!("transaction rejected: {e}"))?;
    ledger.save_all()?;

    println!("Transaction admitted.");
    println!("  Hash: {}", hash);
    Ok(())
}

fn tx_bulk(db_path: &Path, count: u64, to: &str, walletfile: &Path) -> Result<()> {
    let ledger = open_ledger(db_path)?;
    let wallet = keystore::load_wallet(walletfile)
        .with_context(|| format!("failed to load wallet {}", walletfile.display()))?;

    let mut admitted = 0u64;
    for _ in 0..count {
        let tx = ledger.create_transaction(&wallet, to, 1);
        if ledger.admit(tx).is_ok() {
            admitted += 1;
        }
    }
    ledger.save_all()?;

    // With a strict nonce rule only one transfer per sender can sit in the
    // mempool between commits; the rest are rejected by design.
    println!("{} of {} transactions admitted to mempool", admitted, count);
    Ok(())
}

fn wallet_bulk(count: usize, dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;

    for _ in 0..count {
        let wallet = pulsar_protocol::wallet::Wallet::generate();
        let path = dir.join(format!("{}.json", wallet.address()));
        keystore::save_wallet(&wallet, &path)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    println!("{} wallets written to {}", count, dir.display());
    Ok(())
}

fn commit_once(db_path: &Path, keystore_dir: &Path) -> Result<()> {
    let ledger = open_ledger(db_path)?;
    ledger.auto_load_signers(keystore_dir);

    let engine = ConsensusEngine::new(
        Arc::clone(&ledger),
        Transport::noop(),
        ConsensusConfig::default(),
    );

    match engine.commit_block() {
        Ok(Some(block)) => {
            ledger.save_all()?;
            println!("Block {} committed.", block.index);
            println!("  Hash        : {}", block.hash);
            println!("  Proposer    : {}", block.proposer);
            println!("  Transactions: {}", block.transactions.len());
            Ok(())
        }
        Ok(None) => {
            println!("Nothing to commit (mempool empty).");
            Ok(())
        }
        Err(e) => bail!("commit failed: {e}"),
    }
}

// ---------------------------------------------------------------------------
// Tooling
// ---------------------------------------------------------------------------

fn airdrop(db_path: &Path, amount: u64, folder: &Path) -> Result<()> {
    let ledger = open_ledger(db_path)?;
    let wallets = keystore::load_wallet_dir(folder);
    if wallets.is_empty() {
        bail!("no wallets found in {}", folder.display());
    }

    for wallet in &wallets {
        ledger.airdrop(wallet.address(), amount);
    }
    ledger.save_all()?;

    println!("Airdropped {} tokens to {} wallets", amount, wallets.len());
    Ok(())
}

fn fix_validators(db_path: &Path, keystore_dir: &Path) -> Result<()> {
    let ledger = open_ledger(db_path)?;
    let signers = ledger
        .fix_validators(keystore_dir)
        .context("failed to repair validator set")?;
    ledger.save_all()?;

    println!(
        "Validator set ready: {} validators, {} signers loaded",
        ledger.validators_snapshot().len(),
        signers
    );
    Ok(())
}

fn metrics(db_path: &Path) -> Result<()> {
    let ledger = open_ledger(db_path)?;
    let tip = ledger.tip();

    println!("Chain metrics");
    println!("  Height      : {}", ledger.chain_height());
    println!("  Tip         : #{} {}", tip.index, tip.hash);
    println!("  Mempool     : {}", ledger.mempool_len());
    println!("  Validators  : {}", ledger.validators_snapshot().len());
    println!("  Total stake : {}", ledger.total_stake());
    println!("  Checkpoints : {}", ledger.checkpoints_snapshot().len());
    println!("  Treasury    : {}", ledger.treasury());
    println!("  Burned      : {}", ledger.burned());
    Ok(())
}

// ---------------------------------------------------------------------------
// Validator security
// ---------------------------------------------------------------------------

fn validator_status(db_path: &Path, address: &str) -> Result<()> {
    let ledger = open_ledger(db_path)?;
    let Some(stake) = ledger.stake_of(address) else {
        bail!("{} is not a registered validator", address);
    };

    println!("Validator {}", address);
    println!("  Stake: {}", stake);
    match ledger.validator_runtime(address) {
        Some(rt) if ledger.is_suspended(address, rt.scope) => {
            println!("  Suspended: scope={} until={}", rt.scope, rt.suspended_until);
        }
        _ => println!("  Suspended: no"),
    }
    Ok(())
}

fn suspend(db_path: &Path, address: &str, scope: &str, duration: &str) -> Result<()> {
    let ledger = open_ledger(db_path)?;
    let scope = SuspensionScope::parse(scope)
        .ok_or_else(|| anyhow::anyhow!("unknown scope {:?}: use propose, vote, or all", scope))?;
    let duration = parse_duration(duration).map_err(|e| anyhow::anyhow!(e))?;

    ledger.suspend(address, scope, duration);
    println!(
        "Suspended {} (scope={}) for {}s",
        address,
        scope,
        duration.as_secs()
    );
    Ok(())
}

fn slash(db_path: &Path, address: &str, amount: u64, reporter: Option<&str>) -> Result<()> {
    let ledger = open_ledger(db_path)?;
    let outcome = ledger.slash_safety(address, amount, reporter.unwrap_or(""), 1.0);
    if outcome.slashed == 0 {
        bail!("nothing slashed: {} has no stake or is not registered", address);
    }
    ledger.save_all()?;

    println!("Slashed {} from {}", outcome.slashed, address);
    println!("  Burned       : {}", outcome.burned);
    println!("  Treasury     : {}", outcome.treasury);
    println!("  Whistleblower: {}", outcome.whistleblower);
    println!("  Honest       : {}", outcome.honest);
    Ok(())
}

fn show_econ(db_path: &Path) -> Result<()> {
    let ledger = open_ledger(db_path)?;
    println!("Economy");
    println!("  Treasury    : {}", ledger.treasury());
    println!("  Burned      : {}", ledger.burned());
    println!("  Total stake : {}", ledger.total_stake());
    println!("  Validators  : {}", ledger.validators_snapshot().len());
    Ok(())
}

// ---------------------------------------------------------------------------
// Stress testing
// ---------------------------------------------------------------------------

async fn stress_test(
    db_path: &Path,
    keystore_dir: &Path,
    wallet_count: usize,
    per_wallet: u64,
    rounds: u64,
    interval_secs: u64,
    dir: &Path,
) -> Result<()> {
    let ledger = open_ledger(db_path)?;
    ledger.auto_load_signers(keystore_dir);

    let mut wallets = keystore::load_wallet_dir(dir);
    if wallets.is_empty() {
        bail!(
            "no wallets in {} — run wallet-bulk (and airdrop) first",
            dir.display()
        );
    }
    wallets.truncate(wallet_count);

    let gateway = Gateway::new(Arc::clone(&ledger), Role::from_env());
    let engine = ConsensusEngine::new(
        Arc::clone(&ledger),
        Transport::noop(),
        ConsensusConfig::default(),
    );

    println!(
        "Stress test: {} wallets x {} tx per round, {} rounds, commit every {}s",
        wallets.len(),
        per_wallet,
        rounds,
        interval_secs
    );

    for round in 1..=rounds {
        for wallet in &wallets {
            for _ in 0..per_wallet {
                let tx = ledger.create_transaction(wallet, "plsEdstress", 1);
                let _ = gateway.submit(tx);
            }
        }
        // Let the ingress shards drain before committing the round.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        match engine.commit_block() {
            Ok(Some(block)) => println!(
                "round {}/{}: block {} with {} transactions",
                round,
                rounds,
                block.index,
                block.transactions.len()
            ),
            Ok(None) => println!("round {}/{}: nothing to commit", round, rounds),
            Err(e) => println!("round {}/{}: commit aborted: {}", round, rounds, e),
        }
        ledger.save_all()?;

        tokio::time::sleep(std::time::Duration::from_secs(interval_secs)).await;
    }

    let (accepted, dropped) = gateway.stats();
    let metrics = engine.metrics();
    println!(
        "Stress test finished: accepted={} dropped={} last_tps={:.2}",
        accepted, dropped, metrics.last_tps
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Shutdown
// ---------------------------------------------------------------------------

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
