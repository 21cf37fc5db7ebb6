//! # pusher-types
//!
//! Shared domain types used across the oracle pusher workspace.

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Fixed-point scale applied to prices on the wire (`price * 1e8`).
pub const PRICE_SCALE: f64 = 100_000_000.0;

/// Fixed-point scale applied to confidence on the wire (`confidence * 1e4`).
pub const CONFIDENCE_SCALE: f64 = 10_000.0;

/// Decimal exponent recorded by the oracle program for stored prices.
pub const PRICE_EXPONENT: i32 = -8;

/// Validity flag published alongside every price.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceStatus {
    /// Consumers must ignore the accompanying price.
    #[default]
    Invalid,
    /// The price may be used.
    Valid,
}

impl PriceStatus {
    /// Wire code for [`PriceStatus::Invalid`] (the "unknown" status).
    pub const INVALID_CODE: u32 = 0;
    /// Wire code for [`PriceStatus::Valid`] (the "trading" status).
    pub const VALID_CODE: u32 = 1;

    /// Encode as the `u32` stored in the oracle account.
    pub fn code(self) -> u32 {
        match self {
            Self::Invalid => Self::INVALID_CODE,
            Self::Valid => Self::VALID_CODE,
        }
    }

    /// Decode a wire status. Any code other than trading is treated as invalid.
    pub fn from_code(code: u32) -> Self {
        if code == Self::VALID_CODE {
            Self::Valid
        } else {
            Self::Invalid
        }
    }
}

impl fmt::Display for PriceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid => f.write_str("invalid"),
            Self::Valid => f.write_str("valid"),
        }
    }
}

/// A single price reading taken from an observation source.
///
/// Transient: produced once per tick and consumed by the decision policy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PriceObservation {
    /// Observed reference price (mid-price when built from quotes).
    pub value: f64,
    /// When the reading was taken.
    pub observed_at: Instant,
    /// `true` when the source quoted a bid above its ask.
    pub negative_spread: bool,
}

impl PriceObservation {
    /// Observation from a single reference price.
    pub fn reference(value: f64, observed_at: Instant) -> Self {
        Self {
            value,
            observed_at,
            negative_spread: false,
        }
    }

    /// Observation from a bid/ask pair. The value is the mid-price.
    pub fn from_quotes(bid: f64, ask: f64, observed_at: Instant) -> Self {
        Self {
            value: (bid + ask) / 2.0,
            observed_at,
            negative_spread: bid > ask,
        }
    }
}

/// Confirmation level requested when probing transaction status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    #[default]
    Confirmed,
    Finalized,
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Processed => f.write_str("processed"),
            Self::Confirmed => f.write_str("confirmed"),
            Self::Finalized => f.write_str("finalized"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(PriceStatus::Valid.code(), 1);
        assert_eq!(PriceStatus::Invalid.code(), 0);
        assert_eq!(PriceStatus::from_code(1), PriceStatus::Valid);
        assert_eq!(PriceStatus::from_code(0), PriceStatus::Invalid);
        // Halted / auction codes are not tradable
        assert_eq!(PriceStatus::from_code(2), PriceStatus::Invalid);
    }

    #[test]
    fn test_default_status_is_invalid() {
        assert_eq!(PriceStatus::default(), PriceStatus::Invalid);
    }

    #[test]
    fn test_mid_price() {
        let obs = PriceObservation::from_quotes(99.0, 101.0, Instant::now());
        assert_eq!(obs.value, 100.0);
        assert!(!obs.negative_spread);
    }

    #[test]
    fn test_negative_spread_flagged() {
        let obs = PriceObservation::from_quotes(101.0, 99.0, Instant::now());
        assert_eq!(obs.value, 100.0);
        assert!(obs.negative_spread);
    }

    #[test]
    fn test_commitment_serde() {
        let c: Commitment = serde_json::from_str("\"finalized\"").expect("parse");
        assert_eq!(c, Commitment::Finalized);
        assert_eq!(Commitment::default(), Commitment::Confirmed);
        assert_eq!(Commitment::Processed.to_string(), "processed");
    }
}
