//! HTTP JSON source.
//!
//! Fetches a JSON document and extracts either a reference price or a
//! bid/ask pair by JSON pointer. Numeric strings (`"101.25"`) are accepted
//! as well as JSON numbers.

use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use pusher_types::PriceObservation;
use reqwest::Client;
use serde_json::Value;

use super::ObservationSource;

/// Which fields of the document carry the quote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuoteFields {
    Price(String),
    BidAsk { bid: String, ask: String },
}

pub struct HttpSource {
    client: Client,
    url: String,
    fields: QuoteFields,
}

impl HttpSource {
    pub fn new(url: String, fields: QuoteFields, timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url, fields })
    }

    async fn fetch(&self) -> anyhow::Result<Value> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("requesting {}", self.url))?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("{} returned {status}", self.url));
        }
        response
            .json::<Value>()
            .await
            .with_context(|| format!("decoding {}", self.url))
    }
}

#[async_trait]
impl ObservationSource for HttpSource {
    async fn observe(&self) -> anyhow::Result<Option<PriceObservation>> {
        let doc = self.fetch().await?;
        let now = tokio::time::Instant::now().into_std();
        extract(&doc, &self.fields, now)
    }
}

/// Build an observation from `doc`. A missing field or JSON `null` yields
/// `Ok(None)`; a present field that is not a number is an error.
pub(crate) fn extract(
    doc: &Value,
    fields: &QuoteFields,
    now: std::time::Instant,
) -> anyhow::Result<Option<PriceObservation>> {
    match fields {
        QuoteFields::Price(pointer) => {
            Ok(number_at(doc, pointer)?.map(|price| PriceObservation::reference(price, now)))
        }
        QuoteFields::BidAsk { bid, ask } => {
            match (number_at(doc, bid)?, number_at(doc, ask)?) {
                (Some(bid), Some(ask)) => Ok(Some(PriceObservation::from_quotes(bid, ask, now))),
                _ => Ok(None),
            }
        }
    }
}

fn number_at(doc: &Value, pointer: &str) -> anyhow::Result<Option<f64>> {
    let value = match doc.pointer(pointer) {
        None | Some(Value::Null) => return Ok(None),
        Some(value) => value,
    };
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match number {
        Some(n) if n.is_finite() => Ok(Some(n)),
        _ => Err(anyhow!("{pointer} is not a finite number: {value}")),
    }
}
