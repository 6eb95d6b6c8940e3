use serde::Deserialize;
use serde_json::Value;

use crate::error::{Context, Result};

/// Rolling 24h mini ticker pushed once per second per pair.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TickerEvent {
    #[serde(rename = "e", default)]
    pub event_type: String,
    #[serde(rename = "E", default)]
    pub event_time: i64,
    #[serde(rename = "s")]
    pub pair: String,
    #[serde(rename = "c")]
    pub close: String,
    #[serde(rename = "o", default)]
    pub open: String,
    #[serde(rename = "h")]
    pub high: String,
    #[serde(rename = "l")]
    pub low: String,
    #[serde(rename = "v")]
    pub base_volume: String,
    #[serde(rename = "q", default)]
    pub quote_volume: String,
}

/// Envelope used by combined streams: `{"stream": "...", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CombinedEnvelope {
    pub stream: String,
    pub data: TickerEvent,
}

/// Every inbound frame resolves to exactly one of these shapes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum StreamMessage {
    Combined(CombinedEnvelope),
    Ticker(TickerEvent),
    Other(Value),
}

impl StreamMessage {
    pub fn into_ticker(self) -> Option<TickerEvent> {
        match self {
            StreamMessage::Combined(envelope) => Some(envelope.data),
            StreamMessage::Ticker(event) => Some(event),
            StreamMessage::Other(_) => None,
        }
    }
}

pub fn decode_message(text: &str) -> Result<StreamMessage> {
    let message =
        serde_json::from_str::<StreamMessage>(text).context("Failed to decode stream frame")?;
    Ok(message)
}
