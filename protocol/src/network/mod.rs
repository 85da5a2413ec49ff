//! # Network Edge
//!
//! Pulsar's core is transport-agnostic: consensus runs to completion with
//! a no-op transport, and nothing in the commit path waits on a peer. What
//! lives here is the edge the outside world touches:
//!
//! - **gateway** — rate-limited client submission with QoS lanes, fanned
//!   into per-sender ingress shards.
//! - **transport** — a tagged publish/subscribe sink for committed blocks;
//!   either a no-op or an in-process broadcast channel.
//!
//! The node's role and its bootstrap peers come from the environment:
//! `ROLE` is one of `boot|public|main|sub` (default `public`), and
//! `BOOTSTRAP` is a comma-separated peer list.

pub mod gateway;
pub mod transport;

pub use gateway::{Gateway, GatewayError};
pub use transport::{spawn_block_listener, Transport, TransportError};

/// What kind of node this process is. Only `Public` nodes rate-limit
/// client submissions; the other roles trust their callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Boot,
    Public,
    Main,
    Sub,
}

impl Role {
    /// Reads the role from the `ROLE` environment variable. Unknown or
    /// missing values default to `Public` — the safe, rate-limited choice.
    pub fn from_env() -> Self {
        match std::env::var("ROLE").unwrap_or_default().to_lowercase().as_str() {
            "boot" => Role::Boot,
            "main" => Role::Main,
            "sub" => Role::Sub,
            _ => Role::Public,
        }
    }
}

/// Parses the `BOOTSTRAP` environment variable into a peer address list.
/// Empty entries and surrounding whitespace are discarded.
pub fn bootstrap_peers() -> Vec<String> {
    std::env::var("BOOTSTRAP")
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
