// tests/common.rs
#![allow(dead_code)]

use binance_connector_rs::config::StreamConfig;
use binance_connector_rs::websocket::{
    MemoryConnector, MemoryServer, MemorySession, WebsocketStreamClient,
};
use std::sync::{Arc, Once};
use std::time::Duration;
use tokio::time::{sleep, Instant};

static INIT: Once = Once::new();

// Loads .env and installs a test logger, once per test binary.
pub fn setup() {
    INIT.call_once(|| {
        if dotenv::from_path(".env").is_err() && dotenv::from_path("../.env").is_err() {
            println!("Warning: .env file not found in current or parent directory.");
        }
        env_logger::builder().is_test(true).try_init().ok();
    });
}

pub fn get_testnet_flag() -> bool {
    std::env::var("BINANCE_TESTNET")
        .unwrap_or_else(|_| "false".to_string())
        .parse::<bool>()
        .expect("BINANCE_TESTNET must be true or false")
}

pub fn memory_config() -> StreamConfig {
    StreamConfig {
        base_url: "ws://memory.test/stream".to_string(),
        reconnect_min: Duration::from_millis(5),
        reconnect_max: Duration::from_millis(25),
        handshake_timeout: Duration::from_millis(500),
        ..StreamConfig::default()
    }
}

pub struct Harness {
    pub client: WebsocketStreamClient,
    pub connector: MemoryConnector,
    pub server: MemoryServer,
    pub session: MemorySession,
}

pub async fn connect_memory_with(config: StreamConfig) -> Harness {
    setup();
    let (connector, mut server) = MemoryConnector::new();
    let client = WebsocketStreamClient::connect_with(config, Arc::new(connector.clone()))
        .await
        .expect("Failed to connect");
    let session = server.accept().await.expect("No session accepted");
    Harness {
        client,
        connector,
        server,
        session,
    }
}

pub async fn connect_memory() -> Harness {
    connect_memory_with(memory_config()).await
}

pub fn trade_frame(stream: &str, trade_id: u64) -> String {
    format!(
        r#"{{"stream":"{}","data":{{"e":"trade","E":1672515782136,"s":"BNBBTC","t":{},"p":"0.00100000","q":"100.00000000","T":1672515782136,"m":true,"M":true}}}}"#,
        stream, trade_id
    )
}

pub fn book_ticker_frame(stream: &str, update_id: u64) -> String {
    format!(
        r#"{{"stream":"{}","data":{{"u":{},"s":"BNBUSDT","b":"25.35190000","B":"31.21000000","a":"25.36520000","A":"40.66000000"}}}}"#,
        stream, update_id
    )
}

/// Polls `condition` until it holds, panicking after two seconds.
pub async fn wait_for<F>(what: &str, condition: F)
where
    F: Fn() -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(2);
    while !condition() {
        if Instant::now() > deadline {
            panic!("timed out waiting for {}", what);
        }
        sleep(Duration::from_millis(5)).await;
    }
}
