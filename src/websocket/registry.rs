use crate::types::StreamType;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Client-side record of which streams should currently be subscribed.
///
/// Reflects only client-issued subscribe/unsubscribe calls; server
/// acknowledgements are not tracked. The contents survive reconnects and are
/// replayed as one subscribe command after every successful dial.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    streams: RwLock<HashMap<String, StreamType>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent upsert.
    pub fn add(&self, stream: &str, stream_type: StreamType) {
        self.streams.write().insert(stream.to_string(), stream_type);
    }

    /// Returns the names that were not registered before.
    pub fn add_all(&self, streams: &[String], stream_type: StreamType) -> Vec<String> {
        let mut guard = self.streams.write();
        let mut added = Vec::new();
        for stream in streams {
            if guard.insert(stream.clone(), stream_type).is_none() {
                added.push(stream.clone());
            }
        }
        added
    }

    pub fn remove(&self, stream: &str) -> Option<StreamType> {
        self.streams.write().remove(stream)
    }

    pub fn remove_all(&self, streams: &[String]) {
        let mut guard = self.streams.write();
        for stream in streams {
            guard.remove(stream);
        }
    }

    pub fn resolve(&self, stream: &str) -> Option<StreamType> {
        self.streams.read().get(stream).copied()
    }

    pub fn contains(&self, stream: &str) -> bool {
        self.streams.read().contains_key(stream)
    }

    /// Every registered stream name, sorted so replayed commands are
    /// deterministic.
    pub fn all_identifiers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.streams.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn snapshot(&self) -> HashMap<String, StreamType> {
        self.streams.read().clone()
    }

    pub fn len(&self) -> usize {
        self.streams.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.read().is_empty()
    }
}
