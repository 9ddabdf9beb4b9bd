//! Connection lifecycle for one logical stream connection.
//!
//! The [`Transport`] owns at most one physical link at a time. Every link gets
//! a generation number and a child cancellation token; a failure observed on
//! generation `g` only triggers a reconnect while `g` is still current, so a
//! reader and a writer failing together reconnect once.

use crate::config::StreamConfig;
use crate::error::{BinanceError, Result};
use crate::types::ConnectionState;
use crate::websocket::backoff::Backoff;
use crate::websocket::connection::{BoxedReader, BoxedWriter, Connector};
use log::*;
use parking_lot::Mutex;
use rand::Rng;
use std::sync::Arc;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Called after every successful dial. The returned text frames are written
/// on the new link before it is reported as connected.
pub type OnConnectHook = Arc<dyn Fn() -> Vec<String> + Send + Sync + 'static>;

struct LinkState {
    status: ConnectionState,
    generation: u64,
    link_cancel: CancellationToken,
}

struct Inner {
    id: u16,
    config: StreamConfig,
    connector: Arc<dyn Connector>,
    state: Mutex<LinkState>,
    status_tx: watch::Sender<ConnectionState>,
    writer: AsyncMutex<Option<BoxedWriter>>,
    reader: AsyncMutex<Option<BoxedReader>>,
    connect_lock: AsyncMutex<()>,
    on_connect: Mutex<Option<OnConnectHook>>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl Inner {
    fn set_status(&self, state: &mut LinkState, status: ConnectionState) {
        state.status = status;
        self.status_tx.send_replace(status);
    }
}

enum ReadOutcome {
    Text(String),
    Cancelled,
    Failed(BinanceError),
}

#[derive(Clone)]
pub struct Transport {
    inner: Arc<Inner>,
}

impl Transport {
    pub fn new(config: StreamConfig, connector: Arc<dyn Connector>) -> Self {
        let shutdown = CancellationToken::new();
        let (status_tx, _) = watch::channel(ConnectionState::Disconnected);
        let id = rand::thread_rng().gen_range(1000..10000);
        Self {
            inner: Arc::new(Inner {
                id,
                config,
                connector,
                state: Mutex::new(LinkState {
                    status: ConnectionState::Disconnected,
                    generation: 0,
                    link_cancel: shutdown.child_token(),
                }),
                status_tx,
                writer: AsyncMutex::new(None),
                reader: AsyncMutex::new(None),
                connect_lock: AsyncMutex::new(()),
                on_connect: Mutex::new(None),
                shutdown,
                tracker: TaskTracker::new(),
            }),
        }
    }

    /// Log prefix id, `websocket[id]`.
    pub fn id(&self) -> u16 {
        self.inner.id
    }

    pub fn set_on_connect(&self, hook: OnConnectHook) {
        *self.inner.on_connect.lock() = Some(hook);
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state.lock().status
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Generation of the current (or last) link. Starts at 0, first link is 1.
    pub fn generation(&self) -> u64 {
        self.inner.state.lock().generation
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// Tasks spawned here are awaited by [`Transport::shutdown`].
    pub fn tracker(&self) -> &TaskTracker {
        &self.inner.tracker
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.inner.shutdown.clone()
    }

    /// Dials until a link is up, retrying with backoff. Returns `NotConnected`
    /// only when shutdown interrupts it.
    pub async fn connect(&self) -> Result<()> {
        let _guard = self.inner.connect_lock.lock().await;
        if self.is_shutdown() {
            return Err(BinanceError::NotConnected);
        }
        if self.is_connected() {
            return Ok(());
        }
        self.connect_locked().await
    }

    /// Waits until the link is up. Returns `false` once shutdown starts.
    pub async fn wait_connected(&self) -> bool {
        let mut status_rx = self.inner.status_tx.subscribe();
        loop {
            let status = *status_rx.borrow_and_update();
            match status {
                ConnectionState::Connected => return true,
                ConnectionState::ShuttingDown => return false,
                _ => {}
            }
            tokio::select! {
                _ = self.inner.shutdown.cancelled() => return false,
                changed = status_rx.changed() => {
                    if changed.is_err() {
                        return false;
                    }
                }
            }
        }
    }

    /// Writes one text frame. A failed write closes the link and reconnects
    /// before the error is returned; the frame itself is not retried.
    pub async fn write(&self, text: &str) -> Result<()> {
        let (generation, _) = self.current_link()?;
        trace!("websocket[{}] > {}", self.inner.id, text);
        match self.send_raw(Message::Text(text.to_string())).await {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!("websocket[{}] write failed: {}", self.inner.id, err);
                self.close_and_reconnect(generation).await;
                Err(err)
            }
        }
    }

    /// Returns the next text frame. Control frames are handled here. A read
    /// error or a lapsed pong deadline closes the link and reconnects before
    /// the error is returned.
    pub async fn read(&self) -> Result<String> {
        let (generation, link_cancel) = self.current_link()?;
        let outcome = {
            let mut slot = self.inner.reader.lock().await;
            match slot.as_mut() {
                Some(reader) => self.read_frame(reader, &link_cancel).await,
                None => ReadOutcome::Cancelled,
            }
        };
        match outcome {
            ReadOutcome::Text(text) => Ok(text),
            ReadOutcome::Cancelled => Err(BinanceError::NotConnected),
            ReadOutcome::Failed(err) => {
                warn!("websocket[{}] read failed: {}", self.inner.id, err);
                self.close_and_reconnect(generation).await;
                Err(err)
            }
        }
    }

    /// Closes the link, stops every owned task and waits for them. Safe to call
    /// more than once. Must not be awaited from a task this transport owns.
    pub async fn shutdown(&self) {
        let first = {
            let mut state = self.inner.state.lock();
            if state.status == ConnectionState::ShuttingDown {
                false
            } else {
                self.inner.set_status(&mut state, ConnectionState::ShuttingDown);
                true
            }
        };
        if first {
            info!("websocket[{}] shutting down", self.inner.id);
        }
        self.inner.shutdown.cancel();
        self.close_link().await;
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
        if first {
            info!("websocket[{}] shut down", self.inner.id);
        }
    }

    fn current_link(&self) -> Result<(u64, CancellationToken)> {
        let state = self.inner.state.lock();
        if state.status == ConnectionState::Connected {
            Ok((state.generation, state.link_cancel.clone()))
        } else {
            Err(BinanceError::NotConnected)
        }
    }

    async fn read_frame(&self, reader: &mut BoxedReader, link_cancel: &CancellationToken) -> ReadOutcome {
        let deadline = self.inner.config.pong_timeout;
        loop {
            let next = tokio::select! {
                biased;
                _ = link_cancel.cancelled() => return ReadOutcome::Cancelled,
                next = time::timeout(deadline, reader.next()) => next,
            };
            let message = match next {
                Err(_) => {
                    return ReadOutcome::Failed(BinanceError::WebsocketError(format!(
                        "no frame received within {:?}",
                        deadline
                    )))
                }
                Ok(None) => {
                    return ReadOutcome::Failed(BinanceError::WebsocketError(
                        "connection closed by peer".to_string(),
                    ))
                }
                Ok(Some(Err(err))) => return ReadOutcome::Failed(err),
                Ok(Some(Ok(message))) => message,
            };
            match message {
                Message::Text(text) => {
                    trace!("websocket[{}] < {}", self.inner.id, text);
                    return ReadOutcome::Text(text);
                }
                Message::Ping(payload) => {
                    trace!("websocket[{}] ping received, sending pong", self.inner.id);
                    if let Err(err) = self.send_raw(Message::Pong(payload)).await {
                        debug!("websocket[{}] failed to send pong: {}", self.inner.id, err);
                    }
                }
                Message::Pong(_) => trace!("websocket[{}] pong received", self.inner.id),
                Message::Binary(bin) => {
                    trace!("websocket[{}] ignoring {} byte binary frame", self.inner.id, bin.len())
                }
                Message::Close(frame) => {
                    return ReadOutcome::Failed(BinanceError::WebsocketError(format!(
                        "server closed the connection: {:?}",
                        frame
                    )))
                }
                Message::Frame(_) => {}
            }
        }
    }

    async fn send_raw(&self, message: Message) -> Result<()> {
        let mut slot = self.inner.writer.lock().await;
        match slot.as_mut() {
            Some(writer) => writer.send(message).await,
            None => Err(BinanceError::NotConnected),
        }
    }

    async fn connect_locked(&self) -> Result<()> {
        let mut backoff = Backoff::from_config(&self.inner.config);
        loop {
            {
                let mut state = self.inner.state.lock();
                if state.status == ConnectionState::ShuttingDown {
                    return Err(BinanceError::NotConnected);
                }
                self.inner.set_status(&mut state, ConnectionState::Connecting);
            }

            let err = match self.dial().await {
                Ok((writer, reader)) => match self.establish(writer, reader).await {
                    Ok(()) => return Ok(()),
                    Err(BinanceError::NotConnected) => return Err(BinanceError::NotConnected),
                    Err(err) => err,
                },
                Err(BinanceError::NotConnected) => return Err(BinanceError::NotConnected),
                Err(err) => err,
            };

            {
                let mut state = self.inner.state.lock();
                if state.status == ConnectionState::ShuttingDown {
                    return Err(BinanceError::NotConnected);
                }
                self.inner.set_status(&mut state, ConnectionState::Disconnected);
            }
            let delay = backoff.next_delay();
            warn!(
                "websocket[{}] can't connect to {}: {}, will try again in {:?}",
                self.inner.id, self.inner.config.base_url, err, delay
            );
            tokio::select! {
                _ = self.inner.shutdown.cancelled() => return Err(BinanceError::NotConnected),
                _ = time::sleep(delay) => {}
            }
        }
    }

    async fn dial(&self) -> Result<(BoxedWriter, BoxedReader)> {
        let url = self.inner.config.base_url.as_str();
        let handshake = self.inner.config.handshake_timeout;
        debug!("websocket[{}] dialing {}", self.inner.id, url);
        tokio::select! {
            _ = self.inner.shutdown.cancelled() => Err(BinanceError::NotConnected),
            dialed = time::timeout(handshake, self.inner.connector.connect(url)) => match dialed {
                Ok(link) => link,
                Err(_) => Err(BinanceError::WebsocketError(format!(
                    "handshake timed out after {:?}",
                    handshake
                ))),
            },
        }
    }

    async fn establish(&self, writer: BoxedWriter, reader: BoxedReader) -> Result<()> {
        *self.inner.writer.lock().await = Some(writer);
        *self.inner.reader.lock().await = Some(reader);

        let hook = self.inner.on_connect.lock().clone();
        let frames = hook.map(|hook| hook()).unwrap_or_default();
        for frame in frames {
            debug!("websocket[{}] replaying {}", self.inner.id, frame);
            if let Err(err) = self.send_raw(Message::Text(frame)).await {
                self.close_link().await;
                return Err(err);
            }
        }

        let committed = {
            let mut state = self.inner.state.lock();
            if state.status == ConnectionState::ShuttingDown {
                None
            } else {
                state.generation += 1;
                state.link_cancel = self.inner.shutdown.child_token();
                self.inner.set_status(&mut state, ConnectionState::Connected);
                Some((state.generation, state.link_cancel.clone()))
            }
        };
        let (generation, link_cancel) = match committed {
            Some(link) => link,
            None => {
                self.close_link().await;
                return Err(BinanceError::NotConnected);
            }
        };

        info!(
            "websocket[{}] connected to {} (generation {})",
            self.inner.id, self.inner.config.base_url, generation
        );
        self.spawn_keepalive(generation, link_cancel);
        Ok(())
    }

    fn spawn_keepalive(&self, generation: u64, link_cancel: CancellationToken) {
        let transport = self.clone();
        let period = self.inner.config.ping_interval;
        self.inner.tracker.spawn(async move {
            let id = transport.inner.id;
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = link_cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        trace!("websocket[{}] sending ping", id);
                        if let Err(err) = transport.send_raw(Message::Ping(Vec::new())).await {
                            warn!("websocket[{}] ping failed: {}", id, err);
                            transport.close_and_reconnect(generation).await;
                            break;
                        }
                    }
                }
            }
            debug!("websocket[{}] keepalive for generation {} stopped", id, generation);
        });
    }

    async fn close_and_reconnect(&self, generation: u64) {
        let _guard = self.inner.connect_lock.lock().await;
        let stale = {
            let state = self.inner.state.lock();
            state.generation != generation || state.status == ConnectionState::ShuttingDown
        };
        if stale {
            trace!(
                "websocket[{}] generation {} already replaced, skipping reconnect",
                self.inner.id,
                generation
            );
            return;
        }
        info!("websocket[{}] connection lost, reconnecting", self.inner.id);
        self.close_link().await;
        if let Err(err) = self.connect_locked().await {
            debug!("websocket[{}] reconnect abandoned: {}", self.inner.id, err);
        }
    }

    async fn close_link(&self) {
        {
            let mut state = self.inner.state.lock();
            state.link_cancel.cancel();
            if state.status != ConnectionState::ShuttingDown {
                self.inner.set_status(&mut state, ConnectionState::Disconnected);
            }
        }
        let writer = self.inner.writer.lock().await.take();
        if let Some(mut writer) = writer {
            match time::timeout(self.inner.config.handshake_timeout, writer.close()).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => debug!("websocket[{}] close failed: {}", self.inner.id, err),
                Err(_) => debug!("websocket[{}] close timed out", self.inner.id),
            }
        }
        self.inner.reader.lock().await.take();
    }
}
