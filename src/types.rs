use serde::{Deserialize, Serialize};
use std::fmt;

// --- Enums ---

/// Category of a market-data stream. Each category has exactly one payload
/// decoder and one handler chain.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamType {
    AggregateTrade,
    Trade,
    Kline,
    IndividualMiniTicker,
    AllMarketMiniTickers,
    IndividualTicker,
    AllMarketTickers,
    IndividualBookTicker,
    AllBookTickers,
    PartialBookDepth, // <symbol>@depth<levels> and <symbol>@depth<levels>@100ms
    DiffDepth,        // <symbol>@depth and <symbol>@depth@100ms
}

impl StreamType {
    pub const ALL: [StreamType; 11] = [
        StreamType::AggregateTrade,
        StreamType::Trade,
        StreamType::Kline,
        StreamType::IndividualMiniTicker,
        StreamType::AllMarketMiniTickers,
        StreamType::IndividualTicker,
        StreamType::AllMarketTickers,
        StreamType::IndividualBookTicker,
        StreamType::AllBookTickers,
        StreamType::PartialBookDepth,
        StreamType::DiffDepth,
    ];

    /// Name template with `<symbol>`, `<interval>` and `<levels>` placeholders.
    pub fn template(&self) -> &'static str {
        match self {
            StreamType::AggregateTrade => "<symbol>@aggTrade",
            StreamType::Trade => "<symbol>@trade",
            StreamType::Kline => "<symbol>@kline_<interval>",
            StreamType::IndividualMiniTicker => "<symbol>@miniTicker",
            StreamType::AllMarketMiniTickers => "!miniTicker@arr",
            StreamType::IndividualTicker => "<symbol>@ticker",
            StreamType::AllMarketTickers => "!ticker@arr",
            StreamType::IndividualBookTicker => "<symbol>@bookTicker",
            StreamType::AllBookTickers => "!bookTicker",
            StreamType::PartialBookDepth => "<symbol>@depth<levels>",
            StreamType::DiffDepth => "<symbol>@depth",
        }
    }

    /// Whether the category is a single fixed stream covering every symbol.
    pub fn is_all_market(&self) -> bool {
        matches!(
            self,
            StreamType::AllMarketMiniTickers
                | StreamType::AllMarketTickers
                | StreamType::AllBookTickers
        )
    }
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StreamType::AggregateTrade => "aggregate trade",
            StreamType::Trade => "trade",
            StreamType::Kline => "kline",
            StreamType::IndividualMiniTicker => "individual mini ticker",
            StreamType::AllMarketMiniTickers => "all market mini tickers",
            StreamType::IndividualTicker => "individual ticker",
            StreamType::AllMarketTickers => "all market tickers",
            StreamType::IndividualBookTicker => "individual book ticker",
            StreamType::AllBookTickers => "all book tickers",
            StreamType::PartialBookDepth => "partial book depth",
            StreamType::DiffDepth => "diff depth",
        };
        f.write_str(name)
    }
}

/// Kline/candlestick interval.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interval {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "3m")]
    ThreeMinutes,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "2h")]
    TwoHours,
    #[serde(rename = "4h")]
    FourHours,
    #[serde(rename = "6h")]
    SixHours,
    #[serde(rename = "8h")]
    EightHours,
    #[serde(rename = "12h")]
    TwelveHours,
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "3d")]
    ThreeDays,
    #[serde(rename = "1w")]
    OneWeek,
    #[serde(rename = "1M")]
    OneMonth,
}

impl Interval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::OneMinute => "1m",
            Interval::ThreeMinutes => "3m",
            Interval::FiveMinutes => "5m",
            Interval::FifteenMinutes => "15m",
            Interval::ThirtyMinutes => "30m",
            Interval::OneHour => "1h",
            Interval::TwoHours => "2h",
            Interval::FourHours => "4h",
            Interval::SixHours => "6h",
            Interval::EightHours => "8h",
            Interval::TwelveHours => "12h",
            Interval::OneDay => "1d",
            Interval::ThreeDays => "3d",
            Interval::OneWeek => "1w",
            Interval::OneMonth => "1M",
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Number of price levels in a partial book depth stream.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepthLevel {
    #[serde(rename = "5")]
    Five,
    #[serde(rename = "10")]
    Ten,
    #[serde(rename = "20")]
    Twenty,
}

impl DepthLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DepthLevel::Five => "5",
            DepthLevel::Ten => "10",
            DepthLevel::Twenty => "20",
        }
    }
}

impl fmt::Display for DepthLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Push frequency of the depth streams.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UpdateSpeed {
    #[default]
    #[serde(rename = "1000ms")]
    Standard,
    #[serde(rename = "100ms")]
    Fast,
}

/// Lifecycle state of the physical connection.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    ShuttingDown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_serializes_to_wire_token() {
        assert_eq!(
            serde_json::to_string(&Interval::OneMonth).unwrap(),
            "\"1M\""
        );
        assert_eq!(Interval::FifteenMinutes.to_string(), "15m");
    }

    #[test]
    fn test_all_market_categories() {
        let all_market: Vec<_> = StreamType::ALL
            .iter()
            .filter(|t| t.is_all_market())
            .collect();
        assert_eq!(all_market.len(), 3);
        for t in all_market {
            assert!(!t.template().contains("<symbol>"));
        }
    }

    #[test]
    fn test_stream_type_serde_name() {
        let json = serde_json::to_string(&StreamType::PartialBookDepth).unwrap();
        assert_eq!(json, "\"PARTIAL_BOOK_DEPTH\"");
    }
}
