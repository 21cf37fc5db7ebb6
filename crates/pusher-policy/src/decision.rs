//! Update decision for a fresh observation.
//!
//! Two independent triggers, checked against the state the publisher last
//! submitted:
//!
//! ```text
//! freshness floor:  now >= last_update + update_interval
//! deviation gate:   |price - last_price| / last_price * 100 > update_threshold
//! ```
//!
//! With no baseline (nothing submitted yet, or a zero last price) the
//! observation is always published. The status attached to a publish is
//! computed separately by [`compute_status`].

use std::time::Instant;

use pusher_types::{PriceObservation, PriceStatus};

use crate::config::PolicyConfig;
use crate::state::OracleState;

/// Why an update is being published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishReason {
    /// No usable baseline yet.
    Baseline,
    /// The freshness floor elapsed.
    Heartbeat,
    /// The price moved past the deviation gate.
    Deviation,
    /// The inactivity rule forced the oracle invalid.
    Inactivity,
}

/// Output of the decision policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PublishDecision {
    /// Whether an update should be submitted.
    pub publish: bool,
    /// Price to submit.
    pub price: f64,
    /// Status to submit. Only meaningful when `publish` is set.
    pub status: PriceStatus,
    /// Trigger that fired, if any.
    pub reason: Option<PublishReason>,
}

impl PublishDecision {
    fn skip(state: &OracleState) -> Self {
        Self {
            publish: false,
            price: state.last_price,
            status: state.last_status,
            reason: None,
        }
    }

    fn publish(price: f64, status: PriceStatus, reason: PublishReason) -> Self {
        Self {
            publish: true,
            price,
            status,
            reason: Some(reason),
        }
    }
}

/// Decide whether `observed` should be published at `now`.
pub fn should_publish(
    observed: &PriceObservation,
    state: &OracleState,
    cfg: &PolicyConfig,
    now: Instant,
) -> PublishDecision {
    let reason = match state.last_update {
        None => Some(PublishReason::Baseline),
        Some(last) if now.saturating_duration_since(last) >= cfg.update_interval => {
            Some(PublishReason::Heartbeat)
        }
        Some(_) if !state.has_baseline() => Some(PublishReason::Baseline),
        Some(_) => match deviation_pct(observed.value, state.last_price) {
            Some(pct) if pct > cfg.update_threshold => Some(PublishReason::Deviation),
            _ => None,
        },
    };

    match reason {
        Some(reason) => {
            let status = compute_status(observed.value, observed.negative_spread, cfg);
            PublishDecision::publish(observed.value, status, reason)
        }
        None => PublishDecision::skip(state),
    }
}

/// Relative deviation of `price` from `last_price` in percent.
///
/// Returns `None` when `last_price` is zero or not finite. The divisor keeps
/// its sign, so a negative baseline never passes the gate and only the
/// freshness floor refreshes it.
pub fn deviation_pct(price: f64, last_price: f64) -> Option<f64> {
    if last_price == 0.0 || !last_price.is_finite() {
        return None;
    }
    Some((price - last_price).abs() / last_price * 100.0)
}

/// Status for a price about to be published.
///
/// Invalid when the quotes crossed and crossed quotes are not allowed, or
/// when the price lies outside the configured band; valid otherwise.
pub fn compute_status(price: f64, negative_spread: bool, cfg: &PolicyConfig) -> PriceStatus {
    if negative_spread && !cfg.allow_negative_spread {
        return PriceStatus::Invalid;
    }
    if cfg.min_threshold.is_some_and(|min| price < min) {
        return PriceStatus::Invalid;
    }
    if cfg.max_threshold.is_some_and(|max| price > max) {
        return PriceStatus::Invalid;
    }
    PriceStatus::Valid
}
