//! In-process [`Connector`] for exercising reconnect and dispatch without a
//! network. Available with the `test-util` feature.

use crate::error::{BinanceError, Result};
use crate::websocket::connection::{BoxedReader, BoxedWriter, Connector, FrameReader, FrameWriter};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::Message;

#[derive(Default)]
struct MemoryState {
    failures_remaining: u32,
    dial_count: u32,
    preload: VecDeque<Vec<Message>>,
    sent: Vec<(u32, Message)>,
}

/// In-process [`Connector`]. Every successful dial yields a [`MemorySession`]
/// on the paired [`MemoryServer`].
#[derive(Clone)]
pub struct MemoryConnector {
    state: Arc<Mutex<MemoryState>>,
    sessions: mpsc::UnboundedSender<MemorySession>,
}

/// Receives the server side of every connection the connector hands out.
pub struct MemoryServer {
    sessions: mpsc::UnboundedReceiver<MemorySession>,
}

impl MemoryServer {
    /// Waits for the next dial to succeed.
    pub async fn accept(&mut self) -> Option<MemorySession> {
        self.sessions.recv().await
    }
}

impl MemoryConnector {
    pub fn new() -> (Self, MemoryServer) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                state: Arc::new(Mutex::new(MemoryState::default())),
                sessions: tx,
            },
            MemoryServer { sessions: rx },
        )
    }

    /// Makes the next `count` dials fail.
    pub fn fail_next(&self, count: u32) {
        self.state.lock().failures_remaining = count;
    }

    /// Frames the next successfully dialed connection will yield before
    /// anything pushed through its session.
    pub fn preload_next(&self, frames: Vec<Message>) {
        self.state.lock().preload.push_back(frames);
    }

    /// Number of dial attempts so far, failed ones included.
    pub fn dial_count(&self) -> u32 {
        self.state.lock().dial_count
    }

    /// Text frames written so far on the connection created by dial number
    /// `dial` (1-based).
    pub fn sent_texts(&self, dial: u32) -> Vec<String> {
        self.state
            .lock()
            .sent
            .iter()
            .filter_map(|(d, m)| match m {
                Message::Text(t) if *d == dial => Some(t.clone()),
                _ => None,
            })
            .collect()
    }

    /// Every text frame written on any connection, in write order.
    pub fn all_sent_texts(&self) -> Vec<String> {
        self.state
            .lock()
            .sent
            .iter()
            .filter_map(|(_, m)| match m {
                Message::Text(t) => Some(t.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, url: &str) -> Result<(BoxedWriter, BoxedReader)> {
        let (dial, preload) = {
            let mut state = self.state.lock();
            state.dial_count += 1;
            if state.failures_remaining > 0 {
                state.failures_remaining -= 1;
                return Err(BinanceError::WebsocketError(format!(
                    "connection refused: {}",
                    url
                )));
            }
            (state.dial_count, state.preload.pop_front().unwrap_or_default())
        };

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        for frame in preload {
            let _ = in_tx.send(Ok(frame));
        }

        let session = MemorySession {
            dial,
            outbound: out_rx,
            inbound: in_tx,
        };
        self.sessions
            .send(session)
            .map_err(|_| BinanceError::WebsocketError("memory server dropped".to_string()))?;

        Ok((
            Box::new(MemoryWriter {
                dial,
                state: Arc::clone(&self.state),
                outbound: out_tx,
            }),
            Box::new(MemoryReader { inbound: in_rx }),
        ))
    }
}

/// Server side of one in-memory connection. Dropping it closes the
/// connection as seen by the client.
pub struct MemorySession {
    dial: u32,
    outbound: mpsc::UnboundedReceiver<Message>,
    inbound: mpsc::UnboundedSender<Result<Message>>,
}

impl MemorySession {
    pub fn dial(&self) -> u32 {
        self.dial
    }

    pub fn push(&self, message: Message) -> bool {
        self.inbound.send(Ok(message)).is_ok()
    }

    pub fn push_text(&self, text: impl Into<String>) -> bool {
        self.push(Message::Text(text.into()))
    }

    /// Delivers a read error to the client.
    pub fn push_error(&self, reason: &str) -> bool {
        self.inbound
            .send(Err(BinanceError::WebsocketError(reason.to_string())))
            .is_ok()
    }

    /// Makes every further client write fail while reads stay open.
    pub fn reject_writes(&mut self) {
        self.outbound.close();
    }

    /// Next frame the client wrote, of any kind.
    pub async fn recv(&mut self) -> Option<Message> {
        self.outbound.recv().await
    }

    /// Next text frame the client wrote, skipping control frames.
    pub async fn recv_text(&mut self) -> Option<String> {
        while let Some(message) = self.outbound.recv().await {
            if let Message::Text(text) = message {
                return Some(text);
            }
        }
        None
    }
}

struct MemoryWriter {
    dial: u32,
    state: Arc<Mutex<MemoryState>>,
    outbound: mpsc::UnboundedSender<Message>,
}

#[async_trait]
impl FrameWriter for MemoryWriter {
    async fn send(&mut self, message: Message) -> Result<()> {
        self.outbound
            .send(message.clone())
            .map_err(|_| BinanceError::WebsocketError("connection reset by peer".to_string()))?;
        self.state.lock().sent.push((self.dial, message));
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        let _ = self.outbound.send(Message::Close(None));
        Ok(())
    }
}

struct MemoryReader {
    inbound: mpsc::UnboundedReceiver<Result<Message>>,
}

#[async_trait]
impl FrameReader for MemoryReader {
    async fn next(&mut self) -> Option<Result<Message>> {
        self.inbound.recv().await
    }
}
