use crate::types::StreamType;
use crate::websocket::models::{
    AggregateTradeEvent, BookTickerEvent, DiffDepthEvent, KlineEvent, MiniTickerEvent,
    PartialBookDepthEvent, StreamEvent, TickerEvent, TradeEvent,
};
use parking_lot::RwLock;
use std::sync::Arc;

pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Returning `Err` from a handler stops the remaining handlers of the chain
/// for the current message only.
pub type HandlerResult = std::result::Result<(), HandlerError>;

/// Consumer callback: `(stream_name, payload) -> HandlerResult`.
pub type StreamHandler<T> = Arc<dyn Fn(&str, &T) -> HandlerResult + Send + Sync + 'static>;

pub type AggTradeStreamHandler = StreamHandler<AggregateTradeEvent>;
pub type TradeStreamHandler = StreamHandler<TradeEvent>;
pub type KlineStreamHandler = StreamHandler<KlineEvent>;
pub type IndividualMiniTickerStreamHandler = StreamHandler<MiniTickerEvent>;
pub type AllMarketMiniTickersStreamHandler = StreamHandler<Vec<MiniTickerEvent>>;
pub type IndividualTickerStreamHandler = StreamHandler<TickerEvent>;
pub type AllMarketTickersStreamHandler = StreamHandler<Vec<TickerEvent>>;
pub type IndividualBookTickerStreamHandler = StreamHandler<BookTickerEvent>;
pub type AllBookTickersStreamHandler = StreamHandler<BookTickerEvent>;
pub type PartialBookDepthStreamHandler = StreamHandler<PartialBookDepthEvent>;
pub type DiffDepthStreamHandler = StreamHandler<DiffDepthEvent>;

/// Ordered list of handlers for one payload type. Handlers are only removed
/// when the subscribe call that added them fails.
pub struct HandlerChain<T> {
    handlers: RwLock<Vec<StreamHandler<T>>>,
}

impl<T> Default for HandlerChain<T> {
    fn default() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
        }
    }
}

impl<T> HandlerChain<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, handlers: Vec<StreamHandler<T>>) {
        self.handlers.write().extend(handlers);
    }

    /// Removes exactly the given handlers, compared by pointer. Other handlers
    /// keep their order.
    pub fn retract(&self, handlers: &[StreamHandler<T>]) {
        if handlers.is_empty() {
            return;
        }
        let mut guard = self.handlers.write();
        for handler in handlers {
            if let Some(pos) = guard.iter().rposition(|h| Arc::ptr_eq(h, handler)) {
                guard.remove(pos);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }

    /// Calls every handler in registration order until one returns `Err`.
    ///
    /// The lock is released before the first call, so a handler may itself
    /// subscribe and extend this chain; the extension applies from the next
    /// message on.
    pub fn invoke(&self, stream: &str, payload: &T) -> HandlerResult {
        let snapshot: Vec<StreamHandler<T>> = self.handlers.read().clone();
        for handler in snapshot.iter() {
            handler(stream, payload)?;
        }
        Ok(())
    }
}

/// One chain per stream category.
#[derive(Default)]
pub struct HandlerRegistry {
    pub aggregate_trade: HandlerChain<AggregateTradeEvent>,
    pub trade: HandlerChain<TradeEvent>,
    pub kline: HandlerChain<KlineEvent>,
    pub individual_mini_ticker: HandlerChain<MiniTickerEvent>,
    pub all_market_mini_tickers: HandlerChain<Vec<MiniTickerEvent>>,
    pub individual_ticker: HandlerChain<TickerEvent>,
    pub all_market_tickers: HandlerChain<Vec<TickerEvent>>,
    pub individual_book_ticker: HandlerChain<BookTickerEvent>,
    pub all_book_tickers: HandlerChain<BookTickerEvent>,
    pub partial_book_depth: HandlerChain<PartialBookDepthEvent>,
    pub diff_depth: HandlerChain<DiffDepthEvent>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chain_len(&self, stream_type: StreamType) -> usize {
        match stream_type {
            StreamType::AggregateTrade => self.aggregate_trade.len(),
            StreamType::Trade => self.trade.len(),
            StreamType::Kline => self.kline.len(),
            StreamType::IndividualMiniTicker => self.individual_mini_ticker.len(),
            StreamType::AllMarketMiniTickers => self.all_market_mini_tickers.len(),
            StreamType::IndividualTicker => self.individual_ticker.len(),
            StreamType::AllMarketTickers => self.all_market_tickers.len(),
            StreamType::IndividualBookTicker => self.individual_book_ticker.len(),
            StreamType::AllBookTickers => self.all_book_tickers.len(),
            StreamType::PartialBookDepth => self.partial_book_depth.len(),
            StreamType::DiffDepth => self.diff_depth.len(),
        }
    }

    /// Routes a decoded event to the chain of its category.
    pub fn dispatch(&self, stream: &str, event: &StreamEvent) -> HandlerResult {
        match event {
            StreamEvent::AggregateTrade(e) => self.aggregate_trade.invoke(stream, e),
            StreamEvent::Trade(e) => self.trade.invoke(stream, e),
            StreamEvent::Kline(e) => self.kline.invoke(stream, e),
            StreamEvent::IndividualMiniTicker(e) => self.individual_mini_ticker.invoke(stream, e),
            StreamEvent::AllMarketMiniTickers(e) => self.all_market_mini_tickers.invoke(stream, e),
            StreamEvent::IndividualTicker(e) => self.individual_ticker.invoke(stream, e),
            StreamEvent::AllMarketTickers(e) => self.all_market_tickers.invoke(stream, e),
            StreamEvent::IndividualBookTicker(e) => self.individual_book_ticker.invoke(stream, e),
            StreamEvent::AllBookTickers(e) => self.all_book_tickers.invoke(stream, e),
            StreamEvent::PartialBookDepth(e) => self.partial_book_depth.invoke(stream, e),
            StreamEvent::DiffDepth(e) => self.diff_depth.invoke(stream, e),
        }
    }
}
