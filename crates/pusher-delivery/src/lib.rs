//! # pusher-delivery
//!
//! Resilient delivery of one signed transaction over an unreliable
//! broadcast network: broadcast, rebroadcast on a timer, poll for
//! confirmation, give up at a deadline.
//!
//! ## Architecture
//!
//! ```text
//! Publisher tick
//!     |  spawn_delivery (not awaited)
//!     v
//! deliver (protocol.rs)      -- rebroadcast timer + confirmation polling
//!     |
//!     v
//! BroadcastChannel (channel.rs) -- broadcast(tx) / query_status(id)
//! ```

pub mod channel;
pub mod protocol;

pub use channel::{BroadcastChannel, TxStatus};
pub use protocol::{
    deliver, spawn_delivery, DeliveryConfig, DeliveryOutcome, DeliveryResult, InFlightTransaction,
};

/// Error types for delivery operations.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The network rejected or failed to accept a broadcast.
    #[error("broadcast failed: {0}")]
    Broadcast(String),

    /// A status query failed.
    #[error("status query failed: {0}")]
    Status(String),

    /// Delivery parameters are inconsistent.
    #[error("invalid delivery config: {0}")]
    InvalidConfig(String),
}

/// Result type alias for delivery operations.
pub type Result<T> = std::result::Result<T, DeliveryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DeliveryError::Broadcast("node is behind".to_string());
        assert_eq!(err.to_string(), "broadcast failed: node is behind");
        let err = DeliveryError::Status("timeout".into());
        assert_eq!(err.to_string(), "status query failed: timeout");
    }
}
