//! Inactivity rule.
//!
//! If no update has been submitted within the inactivity window while the
//! oracle still reads as valid, the last submitted price is republished with
//! status forced to [`PriceStatus::Invalid`]. The rule is evaluated every
//! tick independently of the decision policy, so it still fires when the
//! observation source produced nothing.
//!
//! The stale numeric value is kept on purpose: consumers are expected to
//! honour the status flag.

use std::time::Instant;

use pusher_types::PriceStatus;

use crate::config::PolicyConfig;
use crate::decision::{PublishDecision, PublishReason};
use crate::state::OracleState;

/// Evaluate the inactivity rule at `now`.
///
/// Returns a forced invalid publish when the window is nonzero, has been
/// exceeded, and the last submitted status was valid.
pub fn check_inactivity(
    state: &OracleState,
    cfg: &PolicyConfig,
    now: Instant,
) -> Option<PublishDecision> {
    if cfg.inactive_duration.is_zero() || state.last_status != PriceStatus::Valid {
        return None;
    }
    let last = state.last_update?;
    if now.saturating_duration_since(last) <= cfg.inactive_duration {
        return None;
    }
    tracing::warn!(
        last_price = state.last_price,
        idle_ms = now.saturating_duration_since(last).as_millis() as u64,
        "inactivity window exceeded, forcing oracle invalid"
    );
    Some(PublishDecision {
        publish: true,
        price: state.last_price,
        status: PriceStatus::Invalid,
        reason: Some(PublishReason::Inactivity),
    })
}
