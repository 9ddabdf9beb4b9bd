//! Read loop and dispatch workers.
//!
//! One loop reads frames off the transport and routes each data envelope to
//! the worker owning its stream name. A stream always maps to the same worker,
//! so its messages reach the handler chain in arrival order, while a slow
//! consumer only holds up the streams sharing its worker.

use crate::config::StreamConfig;
use crate::types::StreamType;
use crate::websocket::handler::HandlerRegistry;
use crate::websocket::models::{self, StreamEnvelope};
use crate::websocket::registry::SubscriptionRegistry;
use crate::websocket::transport::Transport;
use log::*;
use serde_json::Value;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tokio::sync::mpsc;

struct Job {
    stream: String,
    stream_type: StreamType,
    data: Value,
}

/// Index of the worker that owns `stream`.
pub fn shard_for(stream: &str, workers: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    stream.hash(&mut hasher);
    (hasher.finish() % workers.max(1) as u64) as usize
}

/// Starts the read loop and its workers on the transport's task tracker.
pub fn spawn(
    transport: &Transport,
    registry: Arc<SubscriptionRegistry>,
    handlers: Arc<HandlerRegistry>,
    config: &StreamConfig,
) {
    let workers = config.dispatch_workers.max(1);
    let capacity = config.dispatch_queue_capacity.max(1);
    let mut shards = Vec::with_capacity(workers);
    for index in 0..workers {
        let (tx, rx) = mpsc::channel(capacity);
        shards.push(tx);
        transport
            .tracker()
            .spawn(run_worker(index, transport.id(), rx, Arc::clone(&handlers)));
    }
    transport
        .tracker()
        .spawn(read_loop(transport.clone(), registry, shards));
}

async fn read_loop(transport: Transport, registry: Arc<SubscriptionRegistry>, shards: Vec<mpsc::Sender<Job>>) {
    let id = transport.id();
    let shutdown = transport.shutdown_token();
    debug!("websocket[{}] dispatcher started with {} workers", id, shards.len());

    while !shutdown.is_cancelled() {
        if !transport.is_connected() {
            if !transport.wait_connected().await {
                break;
            }
            continue;
        }

        let text = match transport.read().await {
            Ok(text) => text,
            Err(err) => {
                debug!("websocket[{}] read: {}", id, err);
                continue;
            }
        };

        let envelope = match StreamEnvelope::parse(&text) {
            Ok(envelope) => envelope,
            Err(_) => {
                trace!("websocket[{}] control reply: {}", id, text);
                continue;
            }
        };

        let stream_type = match registry.resolve(&envelope.stream) {
            Some(stream_type) => stream_type,
            None => {
                trace!("websocket[{}] dropping message for unknown stream {}", id, envelope.stream);
                continue;
            }
        };

        let shard = &shards[shard_for(&envelope.stream, shards.len())];
        let job = Job {
            stream: envelope.stream,
            stream_type,
            data: envelope.data,
        };
        // Waits for room when the worker is behind.
        tokio::select! {
            _ = shutdown.cancelled() => break,
            sent = shard.send(job) => {
                if sent.is_err() {
                    break;
                }
            }
        }
    }

    debug!("websocket[{}] dispatcher stopped", id);
}

async fn run_worker(index: usize, id: u16, mut jobs: mpsc::Receiver<Job>, handlers: Arc<HandlerRegistry>) {
    while let Some(job) = jobs.recv().await {
        let event = match models::decode(job.stream_type, job.data) {
            Ok(event) => event,
            Err(err) => {
                warn!("websocket[{}] dropping message on {}: {}", id, job.stream, err);
                continue;
            }
        };
        if let Err(err) = handlers.dispatch(&job.stream, &event) {
            debug!("websocket[{}] handler chain for {} stopped: {}", id, job.stream, err);
        }
    }
    trace!("websocket[{}] dispatch worker {} exited", id, index);
}
