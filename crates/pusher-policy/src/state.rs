//! Local record of the last submitted update.
//!
//! The publisher updates this at *submission*, not confirmation. Delivery
//! runs detached from the tick loop, so waiting for confirmation would stall
//! the publish cadence. The record may therefore run ahead of on-chain truth
//! until the next publish reconciles it.

use std::time::Instant;

use pusher_types::PriceStatus;

/// What the publisher last submitted for its oracle account.
///
/// Starts at zero / [`PriceStatus::Invalid`] with no timestamp and is never
/// persisted across restarts.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OracleState {
    /// Last submitted price (unscaled).
    pub last_price: f64,
    /// Last submitted status.
    pub last_status: PriceStatus,
    /// When the last update was submitted. `None` until the first publish.
    pub last_update: Option<Instant>,
}

impl OracleState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a submitted update.
    pub fn record_submission(&mut self, price: f64, status: PriceStatus, at: Instant) {
        self.last_price = price;
        self.last_status = status;
        self.last_update = Some(at);
    }

    /// Whether there is a nonzero price to measure deviation against.
    pub fn has_baseline(&self) -> bool {
        self.last_update.is_some() && self.last_price != 0.0 && self.last_price.is_finite()
    }
}
