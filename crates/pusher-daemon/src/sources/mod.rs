//! Observation sources.
//!
//! A source produces at most one price observation per tick. Venue-specific
//! price discovery lives behind this interface so the publisher stays
//! venue-agnostic.

pub mod fixed;
pub mod http;

use std::time::Duration;

use async_trait::async_trait;
use pusher_types::PriceObservation;

use crate::config::SourceConfig;
use crate::error::PusherError;

pub use fixed::FixedSource;
pub use http::HttpSource;

/// Something that can be asked for the current price.
#[async_trait]
pub trait ObservationSource: Send + Sync {
    /// Take one reading. `Ok(None)` means nothing is available this tick.
    async fn observe(&self) -> anyhow::Result<Option<PriceObservation>>;
}

/// Build the source described by `cfg`.
///
/// # Errors
///
/// Returns [`PusherError::Config`] when neither a single price nor a full
/// bid/ask pair is configured, or the HTTP client cannot be built.
pub fn build(cfg: &SourceConfig) -> Result<Box<dyn ObservationSource>, PusherError> {
    match cfg {
        SourceConfig::Fixed { price, bid, ask } => match (price, bid, ask) {
            (Some(price), None, None) => Ok(Box::new(FixedSource::with_price(*price))),
            (None, Some(bid), Some(ask)) => Ok(Box::new(FixedSource::with_quotes(*bid, *ask))),
            _ => Err(PusherError::Config(
                "fixed source needs either `price` or both `bid` and `ask`".into(),
            )),
        },
        SourceConfig::Http {
            url,
            price_pointer,
            bid_pointer,
            ask_pointer,
            timeout_ms,
        } => {
            let fields = match (price_pointer, bid_pointer, ask_pointer) {
                (Some(price), None, None) => http::QuoteFields::Price(price.clone()),
                (None, Some(bid), Some(ask)) => http::QuoteFields::BidAsk {
                    bid: bid.clone(),
                    ask: ask.clone(),
                },
                _ => {
                    return Err(PusherError::Config(
                        "http source needs either `price_pointer` or both `bid_pointer` and `ask_pointer`"
                            .into(),
                    ))
                }
            };
            let source = HttpSource::new(url.clone(), fields, Duration::from_millis(*timeout_ms))
                .map_err(|e| PusherError::Config(format!("building http client: {e}")))?;
            Ok(Box::new(source))
        }
    }
}
