//! # pusher-policy
//!
//! Decides when an observed price warrants an on-chain write, and when a
//! stale oracle must be forced into the invalid state.
//!
//! ## Modules
//!
//! - [`config`]: thresholds and the startup invariant check
//! - [`state`]: the publisher's record of what it last submitted
//! - [`decision`]: freshness floor, deviation gate and status computation
//! - [`staleness`]: the inactivity rule

pub mod config;
pub mod decision;
pub mod staleness;
pub mod state;

pub use config::PolicyConfig;
pub use decision::{compute_status, should_publish, PublishDecision, PublishReason};
pub use staleness::check_inactivity;
pub use state::OracleState;

/// Error types for policy configuration.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    /// The inactivity window does not exceed the freshness floor.
    #[error(
        "inactive duration ({inactive_ms} ms) must exceed update interval ({update_ms} ms)"
    )]
    InactiveWindowTooShort {
        /// Configured inactivity window in milliseconds.
        inactive_ms: u128,
        /// Configured update interval in milliseconds.
        update_ms: u128,
    },

    /// A threshold is negative or not a finite number.
    #[error("invalid {name}: {value}")]
    InvalidThreshold {
        /// Name of the offending setting.
        name: &'static str,
        /// The configured value.
        value: f64,
    },

    /// The valid price band is empty.
    #[error("min threshold {min} exceeds max threshold {max}")]
    EmptyBand {
        /// Lower bound.
        min: f64,
        /// Upper bound.
        max: f64,
    },
}

/// Convenience result type for policy operations.
pub type Result<T> = std::result::Result<T, PolicyError>;
