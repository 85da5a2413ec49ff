//! # Block Transport
//!
//! A tagged publish/subscribe sink for committed blocks. Two variants:
//!
//! - [`Transport::Noop`] — the default. Broadcasting goes nowhere, and the
//!   core is correct anyway: consensus never depends on receiving a block.
//! - [`Transport::Local`] — an in-process broadcast channel carrying the
//!   JSON-serialized block, the same bytes a wire transport would put on a
//!   gossip topic. Tests and single-host multi-node setups subscribe to it.
//!
//! The receive side verifies a foreign block against the local tip before
//! appending; anything that doesn't extend the chain is logged and dropped.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::ledger::{Block, Ledger};

/// How many serialized blocks the local channel buffers before lagging
/// subscribers start losing the oldest entries.
const LOCAL_CHANNEL_CAPACITY: usize = 256;

/// Errors surfaced by the broadcast path. All of them are swallowed by the
/// consensus engine after logging — a down transport never stalls a tick.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("block serialization failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// The publish side of the block sink.
#[derive(Debug, Clone)]
pub enum Transport {
    /// Broadcasts vanish. The correct choice for an isolated node.
    Noop,
    /// Broadcasts go to an in-process channel of serialized blocks.
    Local(broadcast::Sender<String>),
}

impl Transport {
    /// A transport that drops everything.
    pub fn noop() -> Self {
        Transport::Noop
    }

    /// A transport backed by an in-process broadcast channel.
    pub fn local() -> Self {
        let (tx, _) = broadcast::channel(LOCAL_CHANNEL_CAPACITY);
        Transport::Local(tx)
    }

    /// Publishes a committed block, serialized to JSON.
    ///
    /// Best-effort by contract: a `Noop` transport and a channel with no
    /// subscribers both succeed silently.
    pub fn broadcast_block(&self, block: &Block) -> Result<(), TransportError> {
        match self {
            Transport::Noop => Ok(()),
            Transport::Local(tx) => {
                let encoded = serde_json::to_string(block)?;
                // A send error only means nobody is subscribed right now.
                if tx.send(encoded).is_err() {
                    debug!(index = block.index, "no subscribers for block broadcast");
                }
                Ok(())
            }
        }
    }

    /// Subscribes to the serialized block stream. `None` for `Noop`.
    pub fn subscribe(&self) -> Option<broadcast::Receiver<String>> {
        match self {
            Transport::Noop => None,
            Transport::Local(tx) => Some(tx.subscribe()),
        }
    }
}

impl Default for Transport {
    fn default() -> Self {
        Transport::Noop
    }
}

/// Spawns a task that verifies and appends foreign blocks from `transport`
/// into `ledger`. Returns `None` when the transport has no receive side.
///
/// Invalid or non-extending blocks are dropped with a log line; the local
/// chain's integrity never rests on what peers send.
pub fn spawn_block_listener(
    ledger: Arc<Ledger>,
    transport: &Transport,
) -> Option<tokio::task::JoinHandle<()>> {
    let mut rx = transport.subscribe()?;
    Some(tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(encoded) => {
                    let block: Block = match serde_json::from_str(&encoded) {
                        Ok(block) => block,
                        Err(e) => {
                            warn!(error = %e, "discarding undecodable foreign block");
                            continue;
                        }
                    };
                    let index = block.index;
                    match ledger.append_foreign_block(block) {
                        Ok(()) => info!(index, "foreign block appended"),
                        Err(reason) => debug!(index, reason, "foreign block rejected"),
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "block listener lagged; peer sync would catch up here");
                }
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
