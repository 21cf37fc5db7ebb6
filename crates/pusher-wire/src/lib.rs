//! # pusher-wire
//!
//! Binary formats shared with the on-chain oracle program.
//!
//! ## Modules
//!
//! - [`instruction`]: the fixed little-endian "update price" instruction
//! - [`account`]: read-only decoding of the oracle data account

pub mod account;
pub mod instruction;

/// Error types for wire encoding and decoding.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// Empty input, unknown discriminator, or truncated field.
    #[error("invalid instruction: {0}")]
    InvalidInstruction(String),

    /// A value cannot be represented in its fixed-point wire field.
    #[error("{field} out of range: {value}")]
    OutOfRange {
        /// Name of the offending field.
        field: &'static str,
        /// The unscaled input value.
        value: f64,
    },

    /// The account buffer is smaller than the oracle layout.
    #[error("account data too short: need {required} bytes, have {available}")]
    AccountTooShort {
        /// Bytes required by the layout.
        required: usize,
        /// Bytes supplied.
        available: usize,
    },

    /// The account does not start with the oracle magic number.
    #[error("bad account magic: {0:#010x}")]
    BadMagic(u32),
}

/// Convenience result type for wire operations.
pub type Result<T> = std::result::Result<T, WireError>;
