//! Policy thresholds.

use std::time::Duration;

use crate::{PolicyError, Result};

/// Default deviation gate in percent.
pub const DEFAULT_UPDATE_THRESHOLD: f64 = 1.0;

/// Default freshness floor (1 minute).
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(60);

/// Thresholds consulted by the decision policy on every tick.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyConfig {
    /// Relative deviation, in percent, above which a new price is published.
    pub update_threshold: f64,
    /// Maximum time between publishes regardless of price movement.
    pub update_interval: Duration,
    /// Window after which a valid oracle is forced invalid. Zero disables.
    pub inactive_duration: Duration,
    /// Prices below this bound are published as invalid.
    pub min_threshold: Option<f64>,
    /// Prices above this bound are published as invalid.
    pub max_threshold: Option<f64>,
    /// Publish crossed quotes (bid above ask) as valid.
    pub allow_negative_spread: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            update_threshold: DEFAULT_UPDATE_THRESHOLD,
            update_interval: DEFAULT_UPDATE_INTERVAL,
            inactive_duration: Duration::ZERO,
            min_threshold: None,
            max_threshold: None,
            allow_negative_spread: false,
        }
    }
}

impl PolicyConfig {
    /// Check the invariants that must hold before the publisher starts.
    ///
    /// # Errors
    ///
    /// - [`PolicyError::InactiveWindowTooShort`] if a nonzero inactivity
    ///   window does not exceed the update interval
    /// - [`PolicyError::InvalidThreshold`] for a negative or non-finite gate or bound
    /// - [`PolicyError::EmptyBand`] if `min_threshold > max_threshold`
    pub fn validate(&self) -> Result<()> {
        if !self.inactive_duration.is_zero() && self.inactive_duration <= self.update_interval {
            return Err(PolicyError::InactiveWindowTooShort {
                inactive_ms: self.inactive_duration.as_millis(),
                update_ms: self.update_interval.as_millis(),
            });
        }
        if !self.update_threshold.is_finite() || self.update_threshold < 0.0 {
            return Err(PolicyError::InvalidThreshold {
                name: "update_threshold",
                value: self.update_threshold,
            });
        }
        for (name, bound) in [
            ("min_threshold", self.min_threshold),
            ("max_threshold", self.max_threshold),
        ] {
            if let Some(value) = bound {
                if !value.is_finite() {
                    return Err(PolicyError::InvalidThreshold { name, value });
                }
            }
        }
        if let (Some(min), Some(max)) = (self.min_threshold, self.max_threshold) {
            if min > max {
                return Err(PolicyError::EmptyBand { min, max });
            }
        }
        Ok(())
    }
}
