//! # CLI Interface
//!
//! Verb-first command surface for `pulsar-node`, defined with clap derive.
//! The verbs fall into four groups: node lifecycle (`init`, `start`),
//! transactions (`tx send`, `tx-bulk`, `commit`), tooling (`wallet-bulk`,
//! `airdrop`, `metrics`, `stress-test`), and validator security
//! (`fix-validators`, `validator-status`, `suspend`, `slash`, `show-econ`).
//!
//! Exit code 0 on success, non-zero on fatal error. Durations accept the
//! suffixes `s`, `m`, `h` (`90s`, `15m`, `24h`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Pulsar validator node.
///
/// A full node for the Pulsar chain: accepts transactions, produces blocks
/// on a 350 ms tempo, and manages the validator set.
#[derive(Parser, Debug)]
#[command(name = "pulsar-node", about = "Pulsar blockchain node", version)]
pub struct PulsarCli {
    /// Path to the node database directory.
    #[arg(long, env = "PULSAR_DB", default_value = "pulsar_db")]
    pub db: PathBuf,

    /// Directory holding validator keystore files.
    #[arg(
        long,
        env = "PULSAR_KEYSTORE",
        default_value = pulsar_protocol::config::VALIDATOR_KEYSTORE_DIR
    )]
    pub keystore: PathBuf,

    /// Log verbosity when RUST_LOG is unset: trace, debug, info, warn, error.
    #[arg(long, env = "PULSAR_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level verbs.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize the ledger: open the database and create genesis.
    Init,

    /// Start the node: consensus ticker, ingress gateway, until SIGINT.
    Start,

    /// Transaction operations.
    #[command(subcommand)]
    Tx(TxCommands),

    /// Submit many 1-token transfers from one wallet.
    TxBulk {
        /// Number of transactions to submit.
        count: u64,
        /// Receiver address.
        to: String,
        /// Path to the sender's keystore file.
        walletfile: PathBuf,
    },

    /// Generate a batch of wallets into the bulk-wallet directory.
    WalletBulk {
        /// Number of wallets to generate.
        count: usize,
        /// Where to write them.
        #[arg(long, default_value = "bulk-wallets")]
        dir: PathBuf,
    },

    /// Force one commit pass immediately.
    Commit,

    /// Credit every wallet in a folder with free tokens.
    Airdrop {
        /// Amount per wallet.
        amount: u64,
        /// Folder of keystore files to credit.
        folder: PathBuf,
    },

    /// Repair the validator registry and keystores.
    FixValidators,

    /// Print chain metrics.
    Metrics,

    /// Show one validator's stake and suspension state.
    ValidatorStatus {
        /// Validator address.
        address: String,
    },

    /// Suspend a validator from a consensus role.
    Suspend {
        /// Validator address.
        address: String,
        /// Role to remove: propose, vote, or all.
        scope: String,
        /// How long, with suffix s/m/h (e.g. 15m, 24h).
        duration: String,
    },

    /// Slash a validator's stake (safety-fault policy).
    Slash {
        /// Offending validator address.
        address: String,
        /// Tokens to slash.
        amount: u64,
        /// Optional whistleblower address to credit.
        reporter: Option<String>,
    },

    /// Show the monetary sinks: treasury, burned supply, total stake.
    ShowEcon,

    /// Rounds of bulk submission with a commit after each round.
    StressTest {
        /// How many bulk wallets to draw from.
        wallet_count: usize,
        /// Transactions submitted per wallet per round.
        per_wallet: u64,
        /// Number of rounds.
        rounds: u64,
        /// Seconds to sleep between rounds.
        interval_secs: u64,
        /// Bulk wallet directory.
        #[arg(long, default_value = "bulk-wallets")]
        dir: PathBuf,
    },
}

/// Transaction verbs.
#[derive(Subcommand, Debug)]
pub enum TxCommands {
    /// Build, sign, and submit one transfer.
    Send {
        /// Receiver address.
        to: String,
        /// Amount in tokens.
        amount: u64,
        /// Path to the sender's keystore file.
        walletfile: PathBuf,
    },
}

/// Parses a duration of the form `<number><s|m|h>`.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    if input.len() < 2 {
        return Err(format!("invalid duration {:?}: expected e.g. 30s, 15m, 24h", input));
    }
    let (value, suffix) = input.split_at(input.len() - 1);
    let value: u64 = value
        .parse()
        .map_err(|_| format!("invalid duration {:?}: {:?} is not a number", input, value))?;
    let seconds = match suffix {
        "s" => value,
        "m" => value * 60,
        "h" => value * 3_600,
        _ => {
            return Err(format!(
                "invalid duration {:?}: unknown suffix {:?} (use s, m, or h)",
                input, suffix
            ))
        }
    };
    Ok(Duration::from_secs(seconds))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        PulsarCli::command().debug_assert();
    }

    #[test]
    fn tx_send_parses() {
        let cli = PulsarCli::parse_from([
            "pulsar-node",
            "tx",
            "send",
            "plsEdreceiver",
            "250",
            "wallet.json",
        ]);
        match cli.command {
            Commands::Tx(TxCommands::Send { to, amount, walletfile }) => {
                assert_eq!(to, "plsEdreceiver");
                assert_eq!(amount, 250);
                assert_eq!(walletfile, PathBuf::from("wallet.json"));
            }
            other => panic!("expected tx send, got {:?}", other),
        }
    }

    #[test]
    fn suspend_parses() {
        let cli = PulsarCli::parse_from([
            "pulsar-node",
            "suspend",
            "plsEdval",
            "propose",
            "10m",
        ]);
        match cli.command {
            Commands::Suspend { address, scope, duration } => {
                assert_eq!(address, "plsEdval");
                assert_eq!(scope, "propose");
                assert_eq!(duration, "10m");
            }
            other => panic!("expected suspend, got {:?}", other),
        }
    }

    #[test]
    fn slash_reporter_is_optional() {
        let cli = PulsarCli::parse_from(["pulsar-node", "slash", "plsEdval", "1000"]);
        match cli.command {
            Commands::Slash { amount, reporter, .. } => {
                assert_eq!(amount, 1000);
                assert!(reporter.is_none());
            }
            other => panic!("expected slash, got {:?}", other),
        }

        let cli = PulsarCli::parse_from([
            "pulsar-node",
            "slash",
            "plsEdval",
            "1000",
            "plsEdsnitch",
        ]);
        match cli.command {
            Commands::Slash { reporter, .. } => assert_eq!(reporter.as_deref(), Some("plsEdsnitch")),
            other => panic!("expected slash, got {:?}", other),
        }
    }

    #[test]
    fn db_flag_defaults() {
        let cli = PulsarCli::parse_from(["pulsar-node", "init"]);
        assert_eq!(cli.db, PathBuf::from("pulsar_db"));
        assert_eq!(cli.keystore, PathBuf::from("validators"));
    }

    #[test]
    fn duration_suffixes() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("15m").unwrap(), Duration::from_secs(900));
        assert_eq!(parse_duration("24h").unwrap(), Duration::from_secs(86_400));
    }

    #[test]
    fn duration_rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("10d").is_err());
        assert!(parse_duration("xs").is_err());
        assert!(parse_duration("-5m").is_err());
    }
}
