//! WebSocket client for Binance combined market data streams.
//!
//! Many logical streams share one physical connection to
//! `wss://stream.binance.com:9443/stream`. The server wraps every payload in
//! `{"stream": ..., "data": ...}`, and [`WebsocketStreamClient`] routes it to the
//! handlers registered for that stream's category.
//!
//! # Architecture
//!
//! - [`transport`]: dial, keepalive, pong deadline, reconnect with backoff
//! - [`registry`]: streams to replay after a reconnect
//! - [`command`]: `SUBSCRIBE`/`UNSUBSCRIBE`/`LIST_SUBSCRIPTIONS` frames
//! - [`dispatcher`]: read loop plus per-stream ordered workers
//! - [`handler`]: typed handler chains
//! - [`models`]: payload records and the decoder
//! - [`stream_name`]: name builders and validation
//! - `memory`: in-process connector, behind the `test-util` feature
//!
//! # Usage
//!
//! ```no_run
//! use binance_connector_rs::config::StreamConfig;
//! use binance_connector_rs::websocket::{stream_name, HandlerResult, WebsocketStreamClient};
//! use binance_connector_rs::websocket::models::TradeEvent;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> binance_connector_rs::Result<()> {
//!     let client = WebsocketStreamClient::connect(StreamConfig::default()).await?;
//!
//!     client
//!         .subscribe_trade_streams(
//!             &[stream_name::trade("BTCUSDT")?],
//!             vec![Arc::new(|stream: &str, trade: &TradeEvent| -> HandlerResult {
//!                 println!("{} {} @ {}", stream, trade.quantity, trade.price);
//!                 Ok(())
//!             })],
//!         )
//!         .await?;
//!
//!     tokio::signal::ctrl_c().await.ok();
//!     client.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! # Reconnection Behavior
//!
//! - Dial attempts back off exponentially (2s up to 30s by default, with jitter)
//!   and never give up until shutdown
//! - Every registered stream is resubscribed in a single command before reading
//!   resumes
//! - Messages published while disconnected are lost
//!
//! # Message Handling
//!
//! Handlers run on the dispatch workers, not on the read loop. Messages of one
//! stream arrive in order. A handler returning `Err` stops the remaining
//! handlers of its chain for that message only.

pub mod backoff;
pub mod client;
pub mod command;
pub mod connection;
pub mod dispatcher;
pub mod handler;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod models;
pub mod registry;
pub mod stream_name;
pub mod transport;

pub use client::WebsocketStreamClient;
pub use connection::{Connector, TungsteniteConnector};
#[cfg(any(test, feature = "test-util"))]
pub use memory::{MemoryConnector, MemoryServer, MemorySession};
pub use handler::{HandlerError, HandlerResult, StreamHandler};
pub use models::StreamEvent;
