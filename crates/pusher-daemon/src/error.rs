//! Daemon error taxonomy.
//!
//! Configuration errors stop the process without publishing anything.
//! Session errors are retried by the publisher's outer loop after the
//! reconnect backoff.

use pusher_delivery::DeliveryError;
use pusher_policy::PolicyError;

#[derive(Debug, thiserror::Error)]
pub enum PusherError {
    /// Missing or invalid setting.
    #[error("configuration error: {0}")]
    Config(String),

    /// Policy thresholds violate a startup invariant.
    #[error("configuration error: {0}")]
    Policy(#[from] PolicyError),

    /// Delivery timing is inconsistent.
    #[error("configuration error: {0}")]
    Delivery(#[from] DeliveryError),

    /// Network or session failure; recoverable by reconnecting.
    #[error("session error: {0:#}")]
    Session(anyhow::Error),
}

impl PusherError {
    /// Whether retrying cannot help.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Session(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatality() {
        assert!(PusherError::Config("x".into()).is_fatal());
        assert!(!PusherError::Session(anyhow::anyhow!("connection refused")).is_fatal());
    }

    #[test]
    fn test_session_error_display_includes_chain() {
        let err = PusherError::Session(
            anyhow::anyhow!("connection refused").context("fetching blockhash"),
        );
        assert_eq!(
            err.to_string(),
            "session error: fetching blockhash: connection refused"
        );
    }
}
