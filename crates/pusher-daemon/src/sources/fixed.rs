//! Constant-price source.
//!
//! Publishes a configured price (or bid/ask pair) on every tick. Used for
//! development networks and for exercising the publisher without a venue.

use async_trait::async_trait;
use pusher_types::PriceObservation;

use super::ObservationSource;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Quote {
    Reference(f64),
    Pair { bid: f64, ask: f64 },
}

/// A source that returns the same quote on every tick.
#[derive(Debug)]
pub struct FixedSource {
    quote: Quote,
}

impl FixedSource {
    /// Source returning a single reference price.
    pub fn with_price(price: f64) -> Self {
        Self {
            quote: Quote::Reference(price),
        }
    }

    /// Source returning a bid/ask pair; observations carry the mid-price.
    pub fn with_quotes(bid: f64, ask: f64) -> Self {
        Self {
            quote: Quote::Pair { bid, ask },
        }
    }
}

#[async_trait]
impl ObservationSource for FixedSource {
    async fn observe(&self) -> anyhow::Result<Option<PriceObservation>> {
        let now = tokio::time::Instant::now().into_std();
        let obs = match self.quote {
            Quote::Reference(price) => PriceObservation::reference(price, now),
            Quote::Pair { bid, ask } => PriceObservation::from_quotes(bid, ask, now),
        };
        Ok(Some(obs))
    }
}
