//! Fixed-interval receipt polling with an overall deadline.
use std::time::{Duration, Instant};

use alloy_primitives::B256;
use async_trait::async_trait;
use tracing::debug;

use crate::{error::RpcCallError, receipt::UserOperationReceipt};

/// Anything that can look up a user operation receipt.
#[async_trait]
pub trait ReceiptSource: Send + Sync {
    /// `None` while the operation has not been included.
    async fn fetch_receipt(&self, hash: B256) -> Result<Option<UserOperationReceipt>, RpcCallError>;
}

/// Result of waiting for a receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// A receipt was found. It may still report `success = false`.
    Included(Box<UserOperationReceipt>),
    /// The deadline passed without a receipt.
    TimedOut {
        /// Time spent polling.
        waited: Duration,
    },
}

/// Polls every `interval` until a receipt appears or `timeout` elapses.
///
/// Dropping the returned future stops polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptPoller {
    interval: Duration,
    timeout: Duration,
}

impl Default for ReceiptPoller {
    fn default() -> Self {
        Self::new(Duration::from_secs(2), Duration::from_secs(60))
    }
}

impl ReceiptPoller {
    /// Poller with the given cadence and deadline.
    pub const fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    /// Waits for the receipt of `hash`. Lookup errors are treated as "not yet"
    /// since they are usually transient.
    pub async fn wait<S>(&self, source: &S, hash: B256) -> PollOutcome
    where
        S: ReceiptSource + ?Sized,
    {
        let started = Instant::now();
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let poll = async {
            loop {
                interval.tick().await;
                match source.fetch_receipt(hash).await {
                    Ok(Some(receipt)) => {
                        debug!(message = "receipt found", user_op_hash = %hash, elapsed = ?started.elapsed());
                        return receipt;
                    }
                    Ok(None) => {}
                    Err(err) => {
                        debug!(message = "receipt lookup failed", user_op_hash = %hash, error = %err);
                    }
                }
            }
        };

        match tokio::time::timeout(self.timeout, poll).await {
            Ok(receipt) => PollOutcome::Included(Box::new(receipt)),
            Err(_) => PollOutcome::TimedOut { waited: started.elapsed() },
        }
    }
}
