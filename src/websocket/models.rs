//! Typed payloads for every stream category and the decoder that maps an
//! envelope's opaque `data` onto them.
//!
//! Prices and quantities stay as the exchange's decimal strings; event times
//! are decoded from epoch milliseconds.

use crate::error::{BinanceError, Result};
use crate::types::StreamType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outer wrapper of every data frame on a combined stream connection.
#[derive(Deserialize, Debug, Clone)]
pub struct StreamEnvelope {
    pub stream: String,
    pub data: Value,
}

impl StreamEnvelope {
    /// Parses a text frame. Control replies (`{"result": null, "id": 1}`) and
    /// anything else without both fields fail here.
    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AggregateTradeEvent {
    #[serde(rename = "e")]
    pub event_type: String,
    #[serde(rename = "E", with = "chrono::serde::ts_milliseconds")]
    pub event_time: DateTime<Utc>,
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "a")]
    pub aggregate_trade_id: u64,
    #[serde(rename = "p")]
    pub price: String,
    #[serde(rename = "q")]
    pub quantity: String,
    #[serde(rename = "f")]
    pub first_trade_id: u64,
    #[serde(rename = "l")]
    pub last_trade_id: u64,
    #[serde(rename = "T", with = "chrono::serde::ts_milliseconds")]
    pub trade_time: DateTime<Utc>,
    #[serde(rename = "m")]
    pub is_buyer_market_maker: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TradeEvent {
    #[serde(rename = "e")]
    pub event_type: String,
    #[serde(rename = "E", with = "chrono::serde::ts_milliseconds")]
    pub event_time: DateTime<Utc>,
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "t")]
    pub trade_id: u64,
    #[serde(rename = "p")]
    pub price: String,
    #[serde(rename = "q")]
    pub quantity: String,
    // Dropped from newer payloads; kept optional.
    #[serde(rename = "b", default)]
    pub buyer_order_id: Option<u64>,
    #[serde(rename = "a", default)]
    pub seller_order_id: Option<u64>,
    #[serde(rename = "T", with = "chrono::serde::ts_milliseconds")]
    pub trade_time: DateTime<Utc>,
    #[serde(rename = "m")]
    pub is_buyer_market_maker: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct KlineEvent {
    #[serde(rename = "e")]
    pub event_type: String,
    #[serde(rename = "E", with = "chrono::serde::ts_milliseconds")]
    pub event_time: DateTime<Utc>,
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "k")]
    pub kline: Kline,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Kline {
    #[serde(rename = "t", with = "chrono::serde::ts_milliseconds")]
    pub start_time: DateTime<Utc>,
    #[serde(rename = "T", with = "chrono::serde::ts_milliseconds")]
    pub close_time: DateTime<Utc>,
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "i")]
    pub interval: String,
    #[serde(rename = "f")]
    pub first_trade_id: i64,
    #[serde(rename = "L")]
    pub last_trade_id: i64,
    #[serde(rename = "o")]
    pub open_price: String,
    #[serde(rename = "c")]
    pub close_price: String,
    #[serde(rename = "h")]
    pub high_price: String,
    #[serde(rename = "l")]
    pub low_price: String,
    #[serde(rename = "v")]
    pub base_asset_volume: String,
    #[serde(rename = "n")]
    pub number_of_trades: u64,
    #[serde(rename = "x")]
    pub is_closed: bool,
    #[serde(rename = "q")]
    pub quote_asset_volume: String,
    #[serde(rename = "V")]
    pub taker_buy_base_asset_volume: String,
    #[serde(rename = "Q")]
    pub taker_buy_quote_asset_volume: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MiniTickerEvent {
    #[serde(rename = "e")]
    pub event_type: String,
    #[serde(rename = "E", with = "chrono::serde::ts_milliseconds")]
    pub event_time: DateTime<Utc>,
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "c")]
    pub close_price: String,
    #[serde(rename = "o")]
    pub open_price: String,
    #[serde(rename = "h")]
    pub high_price: String,
    #[serde(rename = "l")]
    pub low_price: String,
    #[serde(rename = "v")]
    pub total_traded_base_asset_volume: String,
    #[serde(rename = "q")]
    pub total_traded_quote_asset_volume: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TickerEvent {
    #[serde(rename = "e")]
    pub event_type: String,
    #[serde(rename = "E", with = "chrono::serde::ts_milliseconds")]
    pub event_time: DateTime<Utc>,
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "p")]
    pub price_change: String,
    #[serde(rename = "P")]
    pub price_change_percent: String,
    #[serde(rename = "w")]
    pub weighted_average_price: String,
    #[serde(rename = "x", default)]
    pub first_trade_price: Option<String>,
    #[serde(rename = "c")]
    pub last_price: String,
    #[serde(rename = "Q")]
    pub last_quantity: String,
    #[serde(rename = "b")]
    pub best_bid_price: String,
    #[serde(rename = "B")]
    pub best_bid_quantity: String,
    #[serde(rename = "a")]
    pub best_ask_price: String,
    #[serde(rename = "A")]
    pub best_ask_quantity: String,
    #[serde(rename = "o")]
    pub open_price: String,
    #[serde(rename = "h")]
    pub high_price: String,
    #[serde(rename = "l")]
    pub low_price: String,
    #[serde(rename = "v")]
    pub total_traded_base_asset_volume: String,
    #[serde(rename = "q")]
    pub total_traded_quote_asset_volume: String,
    #[serde(rename = "O", with = "chrono::serde::ts_milliseconds")]
    pub statistics_open_time: DateTime<Utc>,
    #[serde(rename = "C", with = "chrono::serde::ts_milliseconds")]
    pub statistics_close_time: DateTime<Utc>,
    #[serde(rename = "F")]
    pub first_trade_id: i64,
    #[serde(rename = "L")]
    pub last_trade_id: i64,
    #[serde(rename = "n")]
    pub total_number_of_trades: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BookTickerEvent {
    #[serde(rename = "u")]
    pub order_book_update_id: u64,
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "b")]
    pub best_bid_price: String,
    #[serde(rename = "B")]
    pub best_bid_quantity: String,
    #[serde(rename = "a")]
    pub best_ask_price: String,
    #[serde(rename = "A")]
    pub best_ask_quantity: String,
}

/// One `[price, quantity]` pair of an order book side.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PriceLevel {
    pub price: String,
    pub quantity: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PartialBookDepthEvent {
    #[serde(rename = "lastUpdateId")]
    pub last_update_id: u64,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DiffDepthEvent {
    #[serde(rename = "e")]
    pub event_type: String,
    #[serde(rename = "E", with = "chrono::serde::ts_milliseconds")]
    pub event_time: DateTime<Utc>,
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "U")]
    pub first_update_id: u64,
    #[serde(rename = "u")]
    pub final_update_id: u64,
    #[serde(rename = "b", alias = "bids")]
    pub bids: Vec<PriceLevel>,
    #[serde(rename = "a", alias = "asks")]
    pub asks: Vec<PriceLevel>,
}

/// A decoded payload tagged by the category it was decoded for.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    AggregateTrade(AggregateTradeEvent),
    Trade(TradeEvent),
    Kline(KlineEvent),
    IndividualMiniTicker(MiniTickerEvent),
    AllMarketMiniTickers(Vec<MiniTickerEvent>),
    IndividualTicker(TickerEvent),
    AllMarketTickers(Vec<TickerEvent>),
    IndividualBookTicker(BookTickerEvent),
    AllBookTickers(BookTickerEvent),
    PartialBookDepth(PartialBookDepthEvent),
    DiffDepth(DiffDepthEvent),
}

impl StreamEvent {
    pub fn stream_type(&self) -> StreamType {
        match self {
            StreamEvent::AggregateTrade(_) => StreamType::AggregateTrade,
            StreamEvent::Trade(_) => StreamType::Trade,
            StreamEvent::Kline(_) => StreamType::Kline,
            StreamEvent::IndividualMiniTicker(_) => StreamType::IndividualMiniTicker,
            StreamEvent::AllMarketMiniTickers(_) => StreamType::AllMarketMiniTickers,
            StreamEvent::IndividualTicker(_) => StreamType::IndividualTicker,
            StreamEvent::AllMarketTickers(_) => StreamType::AllMarketTickers,
            StreamEvent::IndividualBookTicker(_) => StreamType::IndividualBookTicker,
            StreamEvent::AllBookTickers(_) => StreamType::AllBookTickers,
            StreamEvent::PartialBookDepth(_) => StreamType::PartialBookDepth,
            StreamEvent::DiffDepth(_) => StreamType::DiffDepth,
        }
    }
}

/// Decodes `payload` with the decoder registered for `stream_type`.
///
/// Failures are per message and carry the category for logging.
pub fn decode(stream_type: StreamType, payload: Value) -> Result<StreamEvent> {
    let wrap = |source| BinanceError::DecodeFailure {
        stream_type,
        source,
    };
    let event = match stream_type {
        StreamType::AggregateTrade => {
            StreamEvent::AggregateTrade(serde_json::from_value(payload).map_err(wrap)?)
        }
        StreamType::Trade => StreamEvent::Trade(serde_json::from_value(payload).map_err(wrap)?),
        StreamType::Kline => StreamEvent::Kline(serde_json::from_value(payload).map_err(wrap)?),
        StreamType::IndividualMiniTicker => {
            StreamEvent::IndividualMiniTicker(serde_json::from_value(payload).map_err(wrap)?)
        }
        StreamType::AllMarketMiniTickers => {
            StreamEvent::AllMarketMiniTickers(serde_json::from_value(payload).map_err(wrap)?)
        }
        StreamType::IndividualTicker => {
            StreamEvent::IndividualTicker(serde_json::from_value(payload).map_err(wrap)?)
        }
        StreamType::AllMarketTickers => {
            StreamEvent::AllMarketTickers(serde_json::from_value(payload).map_err(wrap)?)
        }
        StreamType::IndividualBookTicker => {
            StreamEvent::IndividualBookTicker(serde_json::from_value(payload).map_err(wrap)?)
        }
        StreamType::AllBookTickers => {
            StreamEvent::AllBookTickers(serde_json::from_value(payload).map_err(wrap)?)
        }
        StreamType::PartialBookDepth => {
            StreamEvent::PartialBookDepth(serde_json::from_value(payload).map_err(wrap)?)
        }
        StreamType::DiffDepth => {
            StreamEvent::DiffDepth(serde_json::from_value(payload).map_err(wrap)?)
        }
    };
    Ok(event)
}
