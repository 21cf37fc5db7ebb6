//! Read-only view of the oracle data account.
//!
//! The program rewrites the whole account on every update. Only the fields
//! the pusher reports to operators are decoded; the reserved per-quoter
//! buffer at the tail is skipped.

use pusher_types::{PriceStatus, CONFIDENCE_SCALE, PRICE_SCALE};

use crate::{Result, WireError};

/// Magic number at offset 0 of every oracle account.
pub const ORACLE_MAGIC: u32 = 0xa1b2_c3d4;

/// Total size of the account layout in bytes.
pub const ORACLE_ACCOUNT_LEN: usize = 3312;

// Byte offsets of the decoded fields.
const OFF_MAGIC: usize = 0;
const OFF_VERSION: usize = 4;
const OFF_EXPONENT: usize = 20;
const OFF_LAST_SLOT: usize = 32;
const OFF_TIMESTAMP: usize = 96;
const OFF_PRODUCT_KEY: usize = 112;
const OFF_PREV_SLOT: usize = 176;
const OFF_PREV_PRICE: usize = 184;
const OFF_PREV_CONFIDENCE: usize = 192;
const OFF_PREV_TIMESTAMP: usize = 200;
const OFF_PRICE: usize = 208;
const OFF_CONFIDENCE: usize = 216;
const OFF_STATUS: usize = 224;
const OFF_PUBLISH_SLOT: usize = 232;

/// Decoded oracle account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OracleAccount {
    /// Layout version written by the program.
    pub version: u32,
    /// Decimal exponent of stored prices.
    pub exponent: i32,
    /// Slot of the last update.
    pub last_slot: u64,
    /// Unix timestamp (seconds) of the last update.
    pub timestamp: i64,
    /// The program stores the data account's own key here.
    pub product_key: [u8; 32],
    /// Slot of the previous update.
    pub previous_slot: u64,
    /// Previous price, scaled by 1e8.
    pub previous_price: i64,
    /// Previous confidence, scaled by 1e4.
    pub previous_confidence: u64,
    /// Unix timestamp (seconds) of the previous update.
    pub previous_timestamp: i64,
    /// Current price, scaled by 1e8.
    pub price: i64,
    /// Current confidence, scaled by 1e4.
    pub confidence: u64,
    /// Raw status code.
    pub status: u32,
    /// Slot in which the current price was published.
    pub publish_slot: u64,
}

impl OracleAccount {
    /// Decode an oracle account from raw account data.
    ///
    /// # Errors
    ///
    /// - [`WireError::AccountTooShort`] if `data` is smaller than [`ORACLE_ACCOUNT_LEN`]
    /// - [`WireError::BadMagic`] if the account was not written by the oracle program
    pub fn unpack(data: &[u8]) -> Result<Self> {
        if data.len() < ORACLE_ACCOUNT_LEN {
            return Err(WireError::AccountTooShort {
                required: ORACLE_ACCOUNT_LEN,
                available: data.len(),
            });
        }
        let magic = u32::from_le_bytes(field(data, OFF_MAGIC));
        if magic != ORACLE_MAGIC {
            return Err(WireError::BadMagic(magic));
        }
        Ok(Self {
            version: u32::from_le_bytes(field(data, OFF_VERSION)),
            exponent: i32::from_le_bytes(field(data, OFF_EXPONENT)),
            last_slot: u64::from_le_bytes(field(data, OFF_LAST_SLOT)),
            timestamp: i64::from_le_bytes(field(data, OFF_TIMESTAMP)),
            product_key: field(data, OFF_PRODUCT_KEY),
            previous_slot: u64::from_le_bytes(field(data, OFF_PREV_SLOT)),
            previous_price: i64::from_le_bytes(field(data, OFF_PREV_PRICE)),
            previous_confidence: u64::from_le_bytes(field(data, OFF_PREV_CONFIDENCE)),
            previous_timestamp: i64::from_le_bytes(field(data, OFF_PREV_TIMESTAMP)),
            price: i64::from_le_bytes(field(data, OFF_PRICE)),
            confidence: u64::from_le_bytes(field(data, OFF_CONFIDENCE)),
            status: u32::from_le_bytes(field(data, OFF_STATUS)),
            publish_slot: u64::from_le_bytes(field(data, OFF_PUBLISH_SLOT)),
        })
    }

    pub fn price_status(&self) -> PriceStatus {
        PriceStatus::from_code(self.status)
    }

    pub fn price_f64(&self) -> f64 {
        self.price as f64 / PRICE_SCALE
    }

    pub fn confidence_f64(&self) -> f64 {
        self.confidence as f64 / CONFIDENCE_SCALE
    }
}

/// Copy `N` bytes at `offset`. Callers have checked the total length.
fn field<const N: usize>(data: &[u8], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&data[offset..offset + N]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put(buf: &mut [u8], offset: usize, bytes: &[u8]) {
        buf[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    fn sample_account() -> Vec<u8> {
        let mut buf = vec![0u8; ORACLE_ACCOUNT_LEN];
        put(&mut buf, OFF_MAGIC, &ORACLE_MAGIC.to_le_bytes());
        put(&mut buf, OFF_VERSION, &2u32.to_le_bytes());
        put(&mut buf, OFF_EXPONENT, &(-8i32).to_le_bytes());
        put(&mut buf, OFF_LAST_SLOT, &1234u64.to_le_bytes());
        put(&mut buf, OFF_TIMESTAMP, &1_700_000_000i64.to_le_bytes());
        put(&mut buf, OFF_PRODUCT_KEY, &[7u8; 32]);
        put(&mut buf, OFF_PREV_PRICE, &(-150_000_000i64).to_le_bytes());
        put(&mut buf, OFF_PRICE, &10_050_000_000i64.to_le_bytes());
        put(&mut buf, OFF_CONFIDENCE, &25_000u64.to_le_bytes());
        put(&mut buf, OFF_STATUS, &1u32.to_le_bytes());
        put(&mut buf, OFF_PUBLISH_SLOT, &1234u64.to_le_bytes());
        buf
    }

    #[test]
    fn test_unpack_fields() {
        let acct = OracleAccount::unpack(&sample_account()).expect("unpack");
        assert_eq!(acct.version, 2);
        assert_eq!(acct.exponent, -8);
        assert_eq!(acct.last_slot, 1234);
        assert_eq!(acct.timestamp, 1_700_000_000);
        assert_eq!(acct.product_key, [7u8; 32]);
        assert_eq!(acct.previous_price, -150_000_000);
        assert_eq!(acct.price_f64(), 100.5);
        assert_eq!(acct.confidence_f64(), 2.5);
        assert_eq!(acct.price_status(), PriceStatus::Valid);
        assert_eq!(acct.publish_slot, 1234);
    }

    #[test]
    fn test_short_buffer_rejected() {
        let err = OracleAccount::unpack(&[0u8; 100]).expect_err("too short");
        assert!(matches!(
            err,
            WireError::AccountTooShort {
                required: ORACLE_ACCOUNT_LEN,
                available: 100
            }
        ));
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut buf = sample_account();
        put(&mut buf, OFF_MAGIC, &0u32.to_le_bytes());
        assert!(matches!(
            OracleAccount::unpack(&buf),
            Err(WireError::BadMagic(0))
        ));
    }
}
