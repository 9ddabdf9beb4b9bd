use crate::config::StreamConfig;
use crate::error::{BinanceError, Result};
use crate::types::{ConnectionState, StreamType};
use crate::websocket::command::CommandCodec;
use crate::websocket::connection::{Connector, TungsteniteConnector};
use crate::websocket::dispatcher;
use crate::websocket::handler::*;
use crate::websocket::registry::SubscriptionRegistry;
use crate::websocket::stream_name::{
    self, ALL_BOOK_TICKERS, ALL_MARKET_MINI_TICKERS, ALL_MARKET_TICKERS,
};
use crate::websocket::transport::Transport;
use log::*;
use std::collections::HashMap;
use std::sync::Arc;

/// Client for the combined market data streams.
///
/// One instance owns one connection. Subscriptions are remembered and
/// replayed after every reconnect, and each inbound payload is decoded and
/// handed to the handlers registered for its category.
pub struct WebsocketStreamClient {
    transport: Transport,
    registry: Arc<SubscriptionRegistry>,
    handlers: Arc<HandlerRegistry>,
    codec: Arc<CommandCodec>,
}

impl WebsocketStreamClient {
    /// Connects to `config.base_url` and starts dispatching.
    ///
    /// Retries with backoff until the first connection succeeds.
    pub async fn connect(config: StreamConfig) -> Result<Self> {
        Self::connect_with(config, Arc::new(TungsteniteConnector)).await
    }

    /// Same as [`WebsocketStreamClient::connect`] over any [`Connector`].
    pub async fn connect_with(config: StreamConfig, connector: Arc<dyn Connector>) -> Result<Self> {
        config.validate()?;

        let transport = Transport::new(config.clone(), connector);
        let registry = Arc::new(SubscriptionRegistry::new());
        let handlers = Arc::new(HandlerRegistry::new());
        let codec = Arc::new(CommandCodec::new());

        transport.set_on_connect({
            let registry = Arc::clone(&registry);
            let codec = Arc::clone(&codec);
            let id = transport.id();
            Arc::new(move || {
                let streams = registry.all_identifiers();
                if streams.is_empty() {
                    return Vec::new();
                }
                info!("websocket[{}] resubscribing to {} streams", id, streams.len());
                match codec.build_subscribe(&streams).to_json() {
                    Ok(frame) => vec![frame],
                    Err(e) => {
                        error!("websocket[{}] failed to encode resubscription: {}", id, e);
                        Vec::new()
                    }
                }
            })
        });

        info!("websocket[{}] connecting to {}", transport.id(), config.base_url);
        transport.connect().await?;
        dispatcher::spawn(&transport, Arc::clone(&registry), Arc::clone(&handlers), &config);

        Ok(Self {
            transport,
            registry,
            handlers,
            codec,
        })
    }

    async fn subscribe_with<T>(
        &self,
        streams: &[String],
        stream_type: StreamType,
        chain: &HandlerChain<T>,
        handlers: Vec<StreamHandler<T>>,
    ) -> Result<()> {
        if handlers.is_empty() && chain.is_empty() {
            return Err(BinanceError::NoHandlerRegistered { stream_type });
        }
        stream_name::validate_streams(streams, stream_type)?;

        let command = self.codec.build_subscribe(streams);
        let text = command.to_json()?;

        // Registered before the write so frames answering it are routed. A
        // reconnect during a failed write may already have replayed these
        // names; their frames are dropped as unknown after the rollback.
        let added = self.registry.add_all(streams, stream_type);
        chain.append(handlers.clone());
        if let Err(err) = self.transport.write(&text).await {
            self.registry.remove_all(&added);
            chain.retract(&handlers);
            return Err(err);
        }
        debug!(
            "websocket[{}] subscribed to {:?} (id {})",
            self.transport.id(),
            streams,
            command.id
        );
        Ok(())
    }

    pub async fn subscribe_aggregate_trade_streams(
        &self,
        streams: &[String],
        handlers: Vec<AggTradeStreamHandler>,
    ) -> Result<()> {
        self.subscribe_with(streams, StreamType::AggregateTrade, &self.handlers.aggregate_trade, handlers)
            .await
    }

    pub async fn subscribe_trade_streams(&self, streams: &[String], handlers: Vec<TradeStreamHandler>) -> Result<()> {
        self.subscribe_with(streams, StreamType::Trade, &self.handlers.trade, handlers)
            .await
    }

    pub async fn subscribe_kline_streams(&self, streams: &[String], handlers: Vec<KlineStreamHandler>) -> Result<()> {
        self.subscribe_with(streams, StreamType::Kline, &self.handlers.kline, handlers)
            .await
    }

    pub async fn subscribe_individual_mini_ticker_streams(
        &self,
        streams: &[String],
        handlers: Vec<IndividualMiniTickerStreamHandler>,
    ) -> Result<()> {
        self.subscribe_with(
            streams,
            StreamType::IndividualMiniTicker,
            &self.handlers.individual_mini_ticker,
            handlers,
        )
        .await
    }

    /// Subscribes to `!miniTicker@arr`.
    pub async fn subscribe_all_market_mini_tickers_stream(
        &self,
        handlers: Vec<AllMarketMiniTickersStreamHandler>,
    ) -> Result<()> {
        self.subscribe_with(
            &[ALL_MARKET_MINI_TICKERS.to_string()],
            StreamType::AllMarketMiniTickers,
            &self.handlers.all_market_mini_tickers,
            handlers,
        )
        .await
    }

    pub async fn subscribe_individual_ticker_streams(
        &self,
        streams: &[String],
        handlers: Vec<IndividualTickerStreamHandler>,
    ) -> Result<()> {
        self.subscribe_with(
            streams,
            StreamType::IndividualTicker,
            &self.handlers.individual_ticker,
            handlers,
        )
        .await
    }

    /// Subscribes to `!ticker@arr`.
    pub async fn subscribe_all_market_tickers_stream(
        &self,
        handlers: Vec<AllMarketTickersStreamHandler>,
    ) -> Result<()> {
        self.subscribe_with(
            &[ALL_MARKET_TICKERS.to_string()],
            StreamType::AllMarketTickers,
            &self.handlers.all_market_tickers,
            handlers,
        )
        .await
    }

    pub async fn subscribe_individual_book_ticker_streams(
        &self,
        streams: &[String],
        handlers: Vec<IndividualBookTickerStreamHandler>,
    ) -> Result<()> {
        self.subscribe_with(
            streams,
            StreamType::IndividualBookTicker,
            &self.handlers.individual_book_ticker,
            handlers,
        )
        .await
    }

    /// Subscribes to `!bookTicker`.
    pub async fn subscribe_all_book_tickers_stream(&self, handlers: Vec<AllBookTickersStreamHandler>) -> Result<()> {
        self.subscribe_with(
            &[ALL_BOOK_TICKERS.to_string()],
            StreamType::AllBookTickers,
            &self.handlers.all_book_tickers,
            handlers,
        )
        .await
    }

    pub async fn subscribe_partial_book_depth_streams(
        &self,
        streams: &[String],
        handlers: Vec<PartialBookDepthStreamHandler>,
    ) -> Result<()> {
        self.subscribe_with(
            streams,
            StreamType::PartialBookDepth,
            &self.handlers.partial_book_depth,
            handlers,
        )
        .await
    }

    pub async fn subscribe_diff_depth_streams(
        &self,
        streams: &[String],
        handlers: Vec<DiffDepthStreamHandler>,
    ) -> Result<()> {
        self.subscribe_with(streams, StreamType::DiffDepth, &self.handlers.diff_depth, handlers)
            .await
    }

    /// Unsubscribes and forgets `streams`. Registered handlers stay in place.
    pub async fn unsubscribe(&self, streams: &[String]) -> Result<()> {
        if streams.is_empty() {
            return Err(BinanceError::StreamRequired);
        }
        let command = self.codec.build_unsubscribe(streams);
        self.transport.write(&command.to_json()?).await?;
        self.registry.remove_all(streams);
        debug!(
            "websocket[{}] unsubscribed from {:?} (id {})",
            self.transport.id(),
            streams,
            command.id
        );
        Ok(())
    }

    /// Asks the server for its subscription list and returns the command id.
    /// The reply arrives as a control frame and is only logged.
    pub async fn list_subscriptions(&self) -> Result<u64> {
        let command = self.codec.build_list_subscriptions();
        self.transport.write(&command.to_json()?).await?;
        Ok(command.id)
    }

    /// Streams that will be replayed on the next reconnect.
    pub fn subscriptions(&self) -> HashMap<String, StreamType> {
        self.registry.snapshot()
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.transport.state()
    }

    /// Closes the connection and waits for the dispatcher to stop.
    ///
    /// Do not await this from inside a handler: handlers run on the tasks
    /// being waited for.
    pub async fn shutdown(&self) {
        info!("Stopping WebSocket client...");
        self.transport.shutdown().await;
        info!("WebSocket client stopped.");
    }
}
