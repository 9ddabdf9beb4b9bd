//! Stream name builders and per-category validation.
//!
//! Names follow the exchange grammar: a lower-cased symbol token, an `@`, and a
//! channel suffix, optionally parameterized by a kline interval or a depth
//! level. Every name is checked against its category's pattern before it is
//! ever written to the socket.

use crate::error::{BinanceError, Result};
use crate::types::{DepthLevel, Interval, StreamType, UpdateSpeed};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

const AGG_TRADE_PATTERN: &str = r"^[a-z0-9]+@aggTrade$";
const TRADE_PATTERN: &str = r"^[a-z0-9]+@trade$";
const KLINE_PATTERN: &str =
    r"^[a-z0-9]+@kline_(1m|3m|5m|15m|30m|1h|2h|4h|6h|8h|12h|1d|3d|1w|1M)$";
const MINI_TICKER_PATTERN: &str = r"^[a-z0-9]+@miniTicker$";
const ALL_MINI_TICKERS_PATTERN: &str = r"^!miniTicker@arr$";
const TICKER_PATTERN: &str = r"^[a-z0-9]+@ticker$";
const ALL_TICKERS_PATTERN: &str = r"^!ticker@arr$";
const BOOK_TICKER_PATTERN: &str = r"^[a-z0-9]+@bookTicker$";
const ALL_BOOK_TICKERS_PATTERN: &str = r"^!bookTicker$";
const PARTIAL_DEPTH_PATTERN: &str = r"^[a-z0-9]+@depth(5|10|20)(@100ms)?$";
const DIFF_DEPTH_PATTERN: &str = r"^[a-z0-9]+@depth(@100ms)?$";

static PATTERNS: LazyLock<HashMap<StreamType, Regex>> = LazyLock::new(|| {
    StreamType::ALL
        .iter()
        .map(|t| (*t, Regex::new(pattern_source(*t)).unwrap()))
        .collect()
});

pub const ALL_MARKET_MINI_TICKERS: &str = "!miniTicker@arr";
pub const ALL_MARKET_TICKERS: &str = "!ticker@arr";
pub const ALL_BOOK_TICKERS: &str = "!bookTicker";

fn pattern_source(stream_type: StreamType) -> &'static str {
    match stream_type {
        StreamType::AggregateTrade => AGG_TRADE_PATTERN,
        StreamType::Trade => TRADE_PATTERN,
        StreamType::Kline => KLINE_PATTERN,
        StreamType::IndividualMiniTicker => MINI_TICKER_PATTERN,
        StreamType::AllMarketMiniTickers => ALL_MINI_TICKERS_PATTERN,
        StreamType::IndividualTicker => TICKER_PATTERN,
        StreamType::AllMarketTickers => ALL_TICKERS_PATTERN,
        StreamType::IndividualBookTicker => BOOK_TICKER_PATTERN,
        StreamType::AllBookTickers => ALL_BOOK_TICKERS_PATTERN,
        StreamType::PartialBookDepth => PARTIAL_DEPTH_PATTERN,
        StreamType::DiffDepth => DIFF_DEPTH_PATTERN,
    }
}

fn pattern(stream_type: StreamType) -> &'static Regex {
    &PATTERNS[&stream_type]
}

/// Checks one name against the pattern of `stream_type`.
pub fn validate_stream(stream: &str, stream_type: StreamType) -> Result<()> {
    if pattern(stream_type).is_match(stream) {
        Ok(())
    } else {
        Err(BinanceError::InvalidStreamIdentifier {
            stream: stream.to_string(),
            pattern: pattern_source(stream_type).to_string(),
        })
    }
}

/// Checks a batch of names. An empty batch is rejected.
pub fn validate_streams(streams: &[String], stream_type: StreamType) -> Result<()> {
    if streams.is_empty() {
        return Err(BinanceError::StreamRequired);
    }
    streams
        .iter()
        .try_for_each(|stream| validate_stream(stream, stream_type))
}

/// Substitutes `<symbol>`, `<interval>` and `<levels>` into the template of
/// `stream_type` and validates the result.
///
/// A parameter is only required when the template contains its placeholder.
pub fn build_stream_name(
    stream_type: StreamType,
    symbol: Option<&str>,
    interval: Option<Interval>,
    levels: Option<DepthLevel>,
) -> Result<String> {
    let mut name = stream_type.template().to_string();

    if name.contains("<symbol>") {
        let symbol = symbol
            .filter(|s| !s.is_empty())
            .ok_or_else(|| required("symbol"))?;
        name = name.replacen("<symbol>", &symbol.to_lowercase(), 1);
    }
    if name.contains("<interval>") {
        let interval = interval.ok_or_else(|| required("interval"))?;
        name = name.replacen("<interval>", interval.as_str(), 1);
    }
    if name.contains("<levels>") {
        let levels = levels.ok_or_else(|| required("levels"))?;
        name = name.replacen("<levels>", levels.as_str(), 1);
    }

    validate_stream(&name, stream_type)?;
    Ok(name)
}

fn required(param: &str) -> BinanceError {
    BinanceError::ParameterRequiredError {
        param: param.to_string(),
    }
}

fn with_speed(name: String, speed: UpdateSpeed) -> String {
    match speed {
        UpdateSpeed::Standard => name,
        UpdateSpeed::Fast => format!("{}@100ms", name),
    }
}

/// `<symbol>@aggTrade`
pub fn aggregate_trade(symbol: &str) -> Result<String> {
    build_stream_name(StreamType::AggregateTrade, Some(symbol), None, None)
}

/// `<symbol>@trade`
pub fn trade(symbol: &str) -> Result<String> {
    build_stream_name(StreamType::Trade, Some(symbol), None, None)
}

/// `<symbol>@kline_<interval>`
pub fn kline(symbol: &str, interval: Interval) -> Result<String> {
    build_stream_name(StreamType::Kline, Some(symbol), Some(interval), None)
}

/// `<symbol>@miniTicker`
pub fn individual_mini_ticker(symbol: &str) -> Result<String> {
    build_stream_name(StreamType::IndividualMiniTicker, Some(symbol), None, None)
}

/// `<symbol>@ticker`
pub fn individual_ticker(symbol: &str) -> Result<String> {
    build_stream_name(StreamType::IndividualTicker, Some(symbol), None, None)
}

/// `<symbol>@bookTicker`
pub fn individual_book_ticker(symbol: &str) -> Result<String> {
    build_stream_name(StreamType::IndividualBookTicker, Some(symbol), None, None)
}

/// `<symbol>@depth<levels>` or `<symbol>@depth<levels>@100ms`
pub fn partial_book_depth(symbol: &str, levels: DepthLevel, speed: UpdateSpeed) -> Result<String> {
    let name = build_stream_name(StreamType::PartialBookDepth, Some(symbol), None, Some(levels))?;
    Ok(with_speed(name, speed))
}

/// `<symbol>@depth` or `<symbol>@depth@100ms`
pub fn diff_depth(symbol: &str, speed: UpdateSpeed) -> Result<String> {
    let name = build_stream_name(StreamType::DiffDepth, Some(symbol), None, None)?;
    Ok(with_speed(name, speed))
}
