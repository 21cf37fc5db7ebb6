//! Oracle "update price" instruction.
//!
//! ## Wire format
//!
//! ```text
//! UpdateInstruction {
//!     tag:        u8,   // 0 = update price
//!     price:      i64,  // price * 1e8, little-endian
//!     confidence: u64,  // confidence * 1e4, little-endian
//!     status:     u32,  // 1 = valid (trading), 0 = invalid (unknown)
//! }
//! ```
//!
//! The consuming program reads the fields in this order and width; any
//! change breaks compatibility.

use pusher_types::{PriceStatus, CONFIDENCE_SCALE, PRICE_SCALE};

use crate::{Result, WireError};

/// Discriminator byte for the update instruction.
pub const UPDATE_TAG: u8 = 0;

/// Encoded length of an update instruction in bytes.
pub const UPDATE_LEN: usize = 1 + 8 + 8 + 4;

/// Decoded update instruction carrying already-scaled integers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UpdateInstruction {
    /// Price scaled by 1e8.
    pub price: i64,
    /// Confidence scaled by 1e4.
    pub confidence: u64,
    /// Wire status code.
    pub status: u32,
}

impl UpdateInstruction {
    /// Build an instruction from unscaled values.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::OutOfRange`] if either value is non-finite or
    /// does not fit its fixed-point field after scaling.
    pub fn from_price(price: f64, confidence: f64, status: PriceStatus) -> Result<Self> {
        Ok(Self {
            price: scale_price(price)?,
            confidence: scale_confidence(confidence)?,
            status: status.code(),
        })
    }

    /// Status decoded from the wire code.
    pub fn price_status(&self) -> PriceStatus {
        PriceStatus::from_code(self.status)
    }

    /// Price converted back to a float.
    pub fn price_f64(&self) -> f64 {
        self.price as f64 / PRICE_SCALE
    }

    /// Serialize to the fixed instruction layout.
    pub fn pack(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(UPDATE_LEN);
        buf.push(UPDATE_TAG);
        buf.extend_from_slice(&self.price.to_le_bytes());
        buf.extend_from_slice(&self.confidence.to_le_bytes());
        buf.extend_from_slice(&self.status.to_le_bytes());
        buf
    }

    /// Parse an instruction. Bytes after the status field are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::InvalidInstruction`] on empty input, an unknown
    /// tag, or a truncated field.
    pub fn unpack(input: &[u8]) -> Result<Self> {
        let (&tag, rest) = input
            .split_first()
            .ok_or_else(|| WireError::InvalidInstruction("empty input".to_string()))?;
        if tag != UPDATE_TAG {
            return Err(WireError::InvalidInstruction(format!("unknown tag {tag}")));
        }
        let (price, rest) = take::<8>(rest, "price")?;
        let (confidence, rest) = take::<8>(rest, "confidence")?;
        let (status, _rest) = take::<4>(rest, "status")?;
        Ok(Self {
            price: i64::from_le_bytes(price),
            confidence: u64::from_le_bytes(confidence),
            status: u32::from_le_bytes(status),
        })
    }
}

fn take<'a, const N: usize>(input: &'a [u8], field: &str) -> Result<([u8; N], &'a [u8])> {
    if input.len() < N {
        return Err(WireError::InvalidInstruction(format!(
            "truncated {field}: need {N} bytes, have {}",
            input.len()
        )));
    }
    let (head, rest) = input.split_at(N);
    let value = head
        .try_into()
        .map_err(|_| WireError::InvalidInstruction(format!("truncated {field}")))?;
    Ok((value, rest))
}

/// Scale a price by 1e8, rounding to the nearest integer.
pub fn scale_price(price: f64) -> Result<i64> {
    let scaled = (price * PRICE_SCALE).round();
    // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive.
    if !scaled.is_finite() || scaled < i64::MIN as f64 || scaled >= i64::MAX as f64 {
        return Err(WireError::OutOfRange {
            field: "price",
            value: price,
        });
    }
    Ok(scaled as i64)
}

/// Scale a confidence interval by 1e4, rounding to the nearest integer.
pub fn scale_confidence(confidence: f64) -> Result<u64> {
    let scaled = (confidence * CONFIDENCE_SCALE).round();
    if !scaled.is_finite() || scaled < 0.0 || scaled >= u64::MAX as f64 {
        return Err(WireError::OutOfRange {
            field: "confidence",
            value: confidence,
        });
    }
    Ok(scaled as u64)
}
