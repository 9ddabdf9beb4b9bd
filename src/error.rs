use crate::types::StreamType;
use thiserror::Error;
use url::ParseError;

pub type Result<T, E = BinanceError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum BinanceError {
    #[error("WebSocket Not Connected")]
    NotConnected,

    #[error("No Handler Registered: subscribe to {stream_type} requires at least one handler")]
    NoHandlerRegistered { stream_type: StreamType },

    #[error("Invalid Stream Identifier: '{stream}' does not match pattern '{pattern}'")]
    InvalidStreamIdentifier { stream: String, pattern: String },

    #[error("Stream Required Error: at least one stream name must be given")]
    StreamRequired,

    #[error("Parameter Required Error: Missing required parameter '{param}'")]
    ParameterRequiredError { param: String },

    #[error("Decode Failure: {stream_type} payload could not be decoded: {source}")]
    DecodeFailure {
        stream_type: StreamType,
        #[source]
        source: serde_json::Error,
    },

    #[error("WebSocket Error: {0}")]
    WebsocketError(String),

    #[error("Configuration Error: {0}")]
    ConfigError(String),

    #[error("JSON Serialization/Deserialization Error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("URL Parsing Error: {0}")]
    UrlParseError(#[from] ParseError),
}

impl From<tokio_tungstenite::tungstenite::Error> for BinanceError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        BinanceError::WebsocketError(e.to_string())
    }
}
