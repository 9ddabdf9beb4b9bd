use anyhow::Context;
use binance_connector_rs::config::StreamConfig;
use binance_connector_rs::logging;
use binance_connector_rs::types::{DepthLevel, Interval, UpdateSpeed};
use binance_connector_rs::websocket::handler::{
    HandlerResult, KlineStreamHandler, PartialBookDepthStreamHandler, TradeStreamHandler,
};
use binance_connector_rs::websocket::models::{KlineEvent, PartialBookDepthEvent, TradeEvent};
use binance_connector_rs::websocket::{stream_name, WebsocketStreamClient};
use std::env;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();
    logging::init_logging();

    let symbol = env::var("BINANCE_SYMBOL").unwrap_or_else(|_| "BTCUSDT".to_string());
    let run_secs: u64 = env::var("BINANCE_DEMO_SECS")
        .unwrap_or_else(|_| "60".to_string())
        .parse()
        .context("BINANCE_DEMO_SECS must be a number of seconds")?;

    let config = StreamConfig::from_env().context("Invalid stream configuration")?;
    info!("Connecting to {}", config.base_url);
    let client = WebsocketStreamClient::connect(config)
        .await
        .context("Failed to connect to WebSocket")?;

    let on_trade: TradeStreamHandler = Arc::new(|stream: &str, trade: &TradeEvent| -> HandlerResult {
        let side = if trade.is_buyer_market_maker { "sell" } else { "buy" };
        info!("[{}] {} {} @ {}", stream, side, trade.quantity, trade.price);
        Ok(())
    });

    let on_kline: KlineStreamHandler = Arc::new(|stream: &str, event: &KlineEvent| -> HandlerResult {
        let k = &event.kline;
        if k.is_closed {
            info!(
                "[{}] closed {} o={} h={} l={} c={} v={}",
                stream,
                k.interval,
                k.open_price,
                k.high_price,
                k.low_price,
                k.close_price,
                k.base_asset_volume
            );
        }
        Ok(())
    });

    let on_depth: PartialBookDepthStreamHandler =
        Arc::new(|stream: &str, book: &PartialBookDepthEvent| -> HandlerResult {
            match (book.bids.first(), book.asks.first()) {
                (Some(bid), Some(ask)) => info!(
                    "[{}] best bid {} x {} | best ask {} x {}",
                    stream, bid.price, bid.quantity, ask.price, ask.quantity
                ),
                _ => warn!("[{}] empty book snapshot", stream),
            }
            Ok(())
        });

    client
        .subscribe_trade_streams(&[stream_name::trade(&symbol)?], vec![on_trade])
        .await
        .context("Failed to subscribe to trades")?;
    client
        .subscribe_kline_streams(&[stream_name::kline(&symbol, Interval::OneMinute)?], vec![on_kline])
        .await
        .context("Failed to subscribe to klines")?;
    client
        .subscribe_partial_book_depth_streams(
            &[stream_name::partial_book_depth(&symbol, DepthLevel::Five, UpdateSpeed::Standard)?],
            vec![on_depth],
        )
        .await
        .context("Failed to subscribe to depth")?;

    let id = client.list_subscriptions().await?;
    info!("Requested subscription list (id {})", id);

    tokio::select! {
        _ = sleep(Duration::from_secs(run_secs)) => info!("Demo finished after {}s", run_secs),
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
    }

    client.shutdown().await;
    Ok(())
}
