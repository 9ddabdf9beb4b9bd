//! The seam between the transport and the physical socket.
//!
//! [`TungsteniteConnector`] dials the real endpoint. With the `test-util`
//! feature, `websocket::memory` provides an in-process connector.

use crate::error::{BinanceError, Result};
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use log::*;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async, tungstenite::protocol::Message, MaybeTlsStream, WebSocketStream,
};
use url::Url;

// Type alias for the WebSocket stream
type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Write half of one connection.
#[async_trait]
pub trait FrameWriter: Send {
    async fn send(&mut self, message: Message) -> Result<()>;
    async fn close(&mut self) -> Result<()>;
}

/// Read half of one connection. `None` means the peer closed the stream.
#[async_trait]
pub trait FrameReader: Send {
    async fn next(&mut self) -> Option<Result<Message>>;
}

pub type BoxedWriter = Box<dyn FrameWriter>;
pub type BoxedReader = Box<dyn FrameReader>;

/// Dials a new connection. One call, one physical connection.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, url: &str) -> Result<(BoxedWriter, BoxedReader)>;
}

// --- Tungstenite ---

#[derive(Debug, Default, Clone)]
pub struct TungsteniteConnector;

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, url: &str) -> Result<(BoxedWriter, BoxedReader)> {
        let url_obj = Url::parse(url)?;
        let (ws_stream, response) = connect_async(url_obj.as_str())
            .await
            .map_err(|e| BinanceError::WebsocketError(format!("WebSocket connection failed: {}", e)))?;
        debug!("WebSocket handshake response: {:?}", response.status());

        let (write, read) = ws_stream.split();
        Ok((
            Box::new(TungsteniteWriter { sink: write }),
            Box::new(TungsteniteReader { stream: read }),
        ))
    }
}

struct TungsteniteWriter {
    sink: SplitSink<WsStream, Message>,
}

#[async_trait]
impl FrameWriter for TungsteniteWriter {
    async fn send(&mut self, message: Message) -> Result<()> {
        self.sink.send(message).await.map_err(BinanceError::from)
    }

    async fn close(&mut self) -> Result<()> {
        self.sink.close().await.map_err(BinanceError::from)
    }
}

struct TungsteniteReader {
    stream: SplitStream<WsStream>,
}

#[async_trait]
impl FrameReader for TungsteniteReader {
    async fn next(&mut self) -> Option<Result<Message>> {
        self.stream
            .next()
            .await
            .map(|item| item.map_err(BinanceError::from))
    }
}
