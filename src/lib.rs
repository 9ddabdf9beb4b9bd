pub mod config;
pub mod error;
pub mod logging;
pub mod types;
pub mod websocket;
pub use error::{BinanceError, Result};
