use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandMethod {
    Subscribe,
    Unsubscribe,
    ListSubscriptions,
}

/// Outbound control frame: `{"method": ..., "params": [...], "id": n}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StreamCommand {
    pub method: CommandMethod,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<String>,
    pub id: u64,
}

impl StreamCommand {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Builds control frames with one correlation id sequence shared by every
/// command kind. The sequence starts at 1 and is never reset, including across
/// reconnects.
#[derive(Debug)]
pub struct CommandCodec {
    next_id: AtomicU64,
}

impl Default for CommandCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandCodec {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
        }
    }

    fn take_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn build_subscribe(&self, streams: &[String]) -> StreamCommand {
        StreamCommand {
            method: CommandMethod::Subscribe,
            params: streams.to_vec(),
            id: self.take_id(),
        }
    }

    pub fn build_unsubscribe(&self, streams: &[String]) -> StreamCommand {
        StreamCommand {
            method: CommandMethod::Unsubscribe,
            params: streams.to_vec(),
            id: self.take_id(),
        }
    }

    pub fn build_list_subscriptions(&self) -> StreamCommand {
        StreamCommand {
            method: CommandMethod::ListSubscriptions,
            params: Vec::new(),
            id: self.take_id(),
        }
    }

    /// The id the next built command will carry.
    pub fn peek_next_id(&self) -> u64 {
        self.next_id.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_subscribe_wire_shape() {
        let codec = CommandCodec::new();
        let cmd = codec.build_subscribe(&["btcusdt@aggTrade".to_string(), "btcusdt@depth".to_string()]);
        let value: Value = serde_json::from_str(&cmd.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "method": "SUBSCRIBE",
                "params": ["btcusdt@aggTrade", "btcusdt@depth"],
                "id": 1
            })
        );
    }

    #[test]
    fn test_list_subscriptions_omits_params() {
        let codec = CommandCodec::new();
        let cmd = codec.build_list_subscriptions();
        let value: Value = serde_json::from_str(&cmd.to_json().unwrap()).unwrap();
        assert_eq!(value, json!({"method": "LIST_SUBSCRIPTIONS", "id": 1}));
    }

    #[test]
    fn test_ids_are_shared_and_monotonic() {
        let codec = CommandCodec::new();
        let streams = vec!["ethbtc@trade".to_string()];
        let a = codec.build_subscribe(&streams);
        let b = codec.build_unsubscribe(&streams);
        let c = codec.build_list_subscriptions();
        assert_eq!((a.id, b.id, c.id), (1, 2, 3));
        assert_eq!(b.method, CommandMethod::Unsubscribe);
        assert_eq!(codec.peek_next_id(), 4);
    }
}
