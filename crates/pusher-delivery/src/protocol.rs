//! Broadcast / rebroadcast / confirm-or-timeout loop for one transaction.
//!
//! ```text
//! broadcast once
//! until deadline:
//!     rebroadcast if the timer elapsed and the budget allows
//!     (each send is abandoned at the next rebroadcast slot or the deadline)
//!     race { query_status(id), probe_timeout }
//!     confirmed -> return
//!     sleep the rest of poll_interval
//! return timed out
//! ```
//!
//! Timing out does not mean the transaction failed: it may have landed
//! without being observed. Callers log the outcome and move on.

use std::sync::Arc;
use std::time::Duration;

use pusher_types::Commitment;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::channel::{BroadcastChannel, TxStatus};
use crate::{DeliveryError, Result};

/// Default time to keep trying before giving up (2 minutes).
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(120);

/// Default spacing between confirmation probes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default time a single probe may take before it is abandoned.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(500);

/// Default spacing between rebroadcasts.
pub const DEFAULT_REBROADCAST_INTERVAL: Duration = Duration::from_secs(5);

/// Default rebroadcast budget (not counting the initial broadcast).
pub const DEFAULT_MAX_REBROADCASTS: u32 = 40;

/// Delivery timing parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryConfig {
    /// Time after the first broadcast at which delivery gives up.
    pub deadline: Duration,
    /// Spacing between confirmation probes.
    pub poll_interval: Duration,
    /// Time a single probe may take. Must be shorter than `poll_interval`.
    pub probe_timeout: Duration,
    /// Minimum time between sends of the same transaction.
    pub rebroadcast_interval: Duration,
    /// Rebroadcast budget, not counting the initial broadcast.
    pub max_rebroadcasts: u32,
    /// Commitment level that counts as confirmed.
    pub commitment: Commitment,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            deadline: DEFAULT_DEADLINE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            rebroadcast_interval: DEFAULT_REBROADCAST_INTERVAL,
            max_rebroadcasts: DEFAULT_MAX_REBROADCASTS,
            commitment: Commitment::default(),
        }
    }
}

impl DeliveryConfig {
    /// # Errors
    ///
    /// Returns [`DeliveryError::InvalidConfig`] for a zero deadline or poll
    /// interval, or a probe timeout that is not shorter than the poll interval.
    pub fn validate(&self) -> Result<()> {
        if self.deadline.is_zero() {
            return Err(DeliveryError::InvalidConfig("deadline must be nonzero".into()));
        }
        if self.poll_interval.is_zero() {
            return Err(DeliveryError::InvalidConfig(
                "poll interval must be nonzero".into(),
            ));
        }
        if self.probe_timeout >= self.poll_interval {
            return Err(DeliveryError::InvalidConfig(format!(
                "probe timeout ({} ms) must be shorter than poll interval ({} ms)",
                self.probe_timeout.as_millis(),
                self.poll_interval.as_millis()
            )));
        }
        Ok(())
    }
}

/// One transaction being delivered. Owned by a single [`deliver`] call.
#[derive(Debug)]
pub struct InFlightTransaction<Tx, Id> {
    /// Network identifier, fixed for every rebroadcast.
    pub id: Id,
    /// Signed transaction sent on every broadcast.
    pub payload: Tx,
    /// Instant at which delivery gives up.
    pub deadline: Instant,
    /// When the most recent send started.
    pub last_broadcast_at: Instant,
    /// Broadcasts issued so far, including the first.
    pub broadcast_count: u32,
}

impl<Tx, Id> InFlightTransaction<Tx, Id> {
    fn rebroadcasts(&self) -> u32 {
        self.broadcast_count.saturating_sub(1)
    }
}

/// How a delivery ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Confirmed,
    /// Landed but failed on-chain.
    Rejected(String),
    /// Deadline passed with no confirmation observed.
    TimedOut,
}

/// Result of one [`deliver`] call.
#[derive(Debug, Clone)]
pub struct DeliveryResult<Id> {
    /// Identifier of the delivered transaction.
    pub id: Id,
    /// How delivery ended.
    pub outcome: DeliveryOutcome,
    /// Total broadcasts, including the first.
    pub broadcasts: u32,
    /// Confirmation probes issued.
    pub polls: u32,
    /// Time from the first broadcast to the outcome.
    pub elapsed: Duration,
}

impl<Id> DeliveryResult<Id> {
    pub fn confirmed(&self) -> bool {
        self.outcome == DeliveryOutcome::Confirmed
    }
}

/// Drive `tx` to confirmation or until `cfg.deadline` elapses.
///
/// Individual broadcast and status failures are logged and treated as
/// "no result yet"; they never end the delivery early.
pub async fn deliver<C>(channel: &C, tx: C::Tx, cfg: &DeliveryConfig) -> DeliveryResult<C::TxId>
where
    C: BroadcastChannel + ?Sized,
{
    let start = Instant::now();
    let mut inflight = InFlightTransaction {
        id: channel.transaction_id(&tx),
        payload: tx,
        deadline: start + cfg.deadline,
        last_broadcast_at: start,
        broadcast_count: 0,
    };
    let mut polls = 0u32;

    broadcast(channel, &mut inflight, cfg).await;

    let outcome = loop {
        let now = Instant::now();
        if now >= inflight.deadline {
            break DeliveryOutcome::TimedOut;
        }

        if inflight.rebroadcasts() < cfg.max_rebroadcasts
            && now.duration_since(inflight.last_broadcast_at) >= cfg.rebroadcast_interval
        {
            broadcast(channel, &mut inflight, cfg).await;
        }

        let probe_started = Instant::now();
        let probe_wait = (probe_started + cfg.probe_timeout).min(inflight.deadline);
        polls += 1;

        // Unbiased: neither branch has priority.
        let status = tokio::select! {
            status = channel.query_status(&inflight.id, cfg.commitment) => match status {
                Ok(status) => status,
                Err(e) => {
                    debug!(id = %inflight.id, error = %e, "status probe failed");
                    None
                }
            },
            _ = sleep_until(probe_wait) => None,
        };

        match status {
            Some(TxStatus::Confirmed) => break DeliveryOutcome::Confirmed,
            Some(TxStatus::Failed(reason)) => break DeliveryOutcome::Rejected(reason),
            None => {}
        }

        sleep_until((probe_started + cfg.poll_interval).min(inflight.deadline)).await;
    };

    let result = DeliveryResult {
        id: inflight.id,
        outcome,
        broadcasts: inflight.broadcast_count,
        polls,
        elapsed: start.elapsed(),
    };
    log_outcome(&result);
    result
}

/// Send once, giving up at the next rebroadcast slot or the deadline,
/// whichever comes first.
async fn broadcast<C>(
    channel: &C,
    inflight: &mut InFlightTransaction<C::Tx, C::TxId>,
    cfg: &DeliveryConfig,
) where
    C: BroadcastChannel + ?Sized,
{
    let now = Instant::now();
    inflight.last_broadcast_at = now;
    inflight.broadcast_count += 1;
    let give_up = (now + cfg.rebroadcast_interval).min(inflight.deadline);
    match timeout_at(give_up, channel.broadcast(&inflight.payload)).await {
        Err(_) => debug!(
            id = %inflight.id,
            attempt = inflight.broadcast_count,
            "broadcast timed out"
        ),
        Ok(Ok(id)) => debug!(
            %id,
            attempt = inflight.broadcast_count,
            "broadcast accepted"
        ),
        Ok(Err(e)) => debug!(
            id = %inflight.id,
            attempt = inflight.broadcast_count,
            error = %e,
            "broadcast failed"
        ),
    }
}

fn log_outcome<Id: std::fmt::Display>(result: &DeliveryResult<Id>) {
    let elapsed_ms = result.elapsed.as_millis() as u64;
    match &result.outcome {
        DeliveryOutcome::Confirmed => info!(
            id = %result.id,
            broadcasts = result.broadcasts,
            polls = result.polls,
            elapsed_ms,
            "transaction confirmed"
        ),
        DeliveryOutcome::Rejected(reason) => warn!(
            id = %result.id,
            reason = %reason,
            elapsed_ms,
            "transaction landed but failed"
        ),
        DeliveryOutcome::TimedOut => warn!(
            id = %result.id,
            broadcasts = result.broadcasts,
            elapsed_ms,
            "transaction not confirmed before deadline"
        ),
    }
}

/// Start [`deliver`] as a detached task.
///
/// The caller is not expected to await the handle; the task logs its own
/// outcome and is abandoned if the runtime shuts down first.
pub fn spawn_delivery<C>(
    channel: Arc<C>,
    tx: C::Tx,
    cfg: DeliveryConfig,
) -> JoinHandle<DeliveryResult<C::TxId>>
where
    C: BroadcastChannel + 'static,
    C::Tx: 'static,
    C::TxId: 'static,
{
    tokio::spawn(async move { deliver(channel.as_ref(), tx, &cfg).await })
}
