mod common;

use binance_connector_rs::types::{ConnectionState, StreamType};
use binance_connector_rs::websocket::command::{CommandMethod, StreamCommand};
use binance_connector_rs::websocket::handler::{
    AllBookTickersStreamHandler, HandlerResult, KlineStreamHandler, TradeStreamHandler,
};
use binance_connector_rs::websocket::models::{BookTickerEvent, KlineEvent, TradeEvent};
use binance_connector_rs::BinanceError;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::protocol::Message;

fn streams(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn command(text: &str) -> StreamCommand {
    serde_json::from_str(text).expect("not a command frame")
}

fn recording_trades(log: &Arc<Mutex<Vec<(String, u64)>>>) -> TradeStreamHandler {
    let log = Arc::clone(log);
    Arc::new(move |stream: &str, trade: &TradeEvent| -> HandlerResult {
        log.lock().push((stream.to_string(), trade.trade_id));
        Ok(())
    })
}

#[tokio::test]
async fn test_subscribe_writes_command_and_registers_stream() {
    let mut h = common::connect_memory().await;
    let log = Arc::new(Mutex::new(Vec::new()));

    h.client
        .subscribe_trade_streams(&streams(&["btcusdt@trade"]), vec![recording_trades(&log)])
        .await
        .unwrap();

    let sent = command(&h.session.recv_text().await.unwrap());
    assert_eq!(sent.method, CommandMethod::Subscribe);
    assert_eq!(sent.params, vec!["btcusdt@trade"]);
    assert_eq!(sent.id, 1);
    assert_eq!(
        h.client.subscriptions().get("btcusdt@trade"),
        Some(&StreamType::Trade)
    );

    h.session.push_text(common::trade_frame("btcusdt@trade", 42));
    common::wait_for("trade delivery", || log.lock().len() == 1).await;
    assert_eq!(log.lock()[0], ("btcusdt@trade".to_string(), 42));

    h.client.shutdown().await;
}

#[tokio::test]
async fn test_subscribe_twice_is_idempotent_and_keeps_both_handlers() {
    let mut h = common::connect_memory().await;
    let first = Arc::new(Mutex::new(Vec::new()));
    let second = Arc::new(Mutex::new(Vec::new()));

    let names = streams(&["btcusdt@trade"]);
    h.client
        .subscribe_trade_streams(&names, vec![recording_trades(&first)])
        .await
        .unwrap();
    h.client
        .subscribe_trade_streams(&names, vec![recording_trades(&second)])
        .await
        .unwrap();

    assert_eq!(h.client.subscriptions().len(), 1);
    assert_eq!(command(&h.session.recv_text().await.unwrap()).id, 1);
    assert_eq!(command(&h.session.recv_text().await.unwrap()).id, 2);

    h.session.push_text(common::trade_frame("btcusdt@trade", 7));
    common::wait_for("both handlers", || {
        first.lock().len() == 1 && second.lock().len() == 1
    })
    .await;

    h.client.shutdown().await;
}

#[tokio::test]
async fn test_resubscribes_before_buffered_frames_are_dispatched() {
    let h = common::connect_memory().await;
    let common::Harness {
        client,
        connector,
        mut server,
        session,
    } = h;

    // Subscribe commands written on the second connection, as seen by the
    // handler when the buffered frame reaches it.
    let seen: Arc<Mutex<Option<Vec<String>>>> = Arc::new(Mutex::new(None));
    let handler: TradeStreamHandler = {
        let seen = Arc::clone(&seen);
        let connector = connector.clone();
        Arc::new(move |_: &str, _: &TradeEvent| -> HandlerResult {
            let mut seen = seen.lock();
            if seen.is_none() {
                *seen = Some(connector.sent_texts(2));
            }
            Ok(())
        })
    };
    client
        .subscribe_trade_streams(&streams(&["btcusdt@trade"]), vec![handler])
        .await
        .unwrap();

    connector.preload_next(vec![Message::Text(common::trade_frame("btcusdt@trade", 1))]);
    drop(session);

    let _second = server.accept().await.unwrap();
    common::wait_for("buffered frame", || seen.lock().is_some()).await;

    let written = seen.lock().clone().unwrap();
    assert_eq!(written.len(), 1);
    let replay = command(&written[0]);
    assert_eq!(replay.method, CommandMethod::Subscribe);
    assert_eq!(replay.params, vec!["btcusdt@trade"]);
    assert_eq!(replay.id, 2);
    assert!(client.is_connected());

    client.shutdown().await;
}

#[tokio::test]
async fn test_invalid_stream_rejected_before_io() {
    let h = common::connect_memory().await;
    let handler: KlineStreamHandler = Arc::new(|_: &str, _: &KlineEvent| -> HandlerResult { Ok(()) });

    let err = h
        .client
        .subscribe_kline_streams(&streams(&["btcusdt@kline_9x"]), vec![handler])
        .await
        .unwrap_err();

    assert!(matches!(err, BinanceError::InvalidStreamIdentifier { ref stream, .. } if stream == "btcusdt@kline_9x"));
    assert!(h.connector.all_sent_texts().is_empty());
    assert!(h.client.subscriptions().is_empty());

    h.client.shutdown().await;
}

#[tokio::test]
async fn test_subscribe_without_any_handler_is_rejected() {
    let h = common::connect_memory().await;

    let err = h
        .client
        .subscribe_trade_streams(&streams(&["btcusdt@trade"]), Vec::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BinanceError::NoHandlerRegistered {
            stream_type: StreamType::Trade
        }
    ));
    assert!(h.connector.all_sent_texts().is_empty());

    // An existing chain is enough for later subscriptions of the same type.
    let log = Arc::new(Mutex::new(Vec::new()));
    h.client
        .subscribe_trade_streams(&streams(&["btcusdt@trade"]), vec![recording_trades(&log)])
        .await
        .unwrap();
    h.client
        .subscribe_trade_streams(&streams(&["ethbtc@trade"]), Vec::new())
        .await
        .unwrap();
    assert_eq!(h.client.subscriptions().len(), 2);

    h.client.shutdown().await;
}

#[tokio::test]
async fn test_empty_stream_list_is_rejected() {
    let h = common::connect_memory().await;
    let log = Arc::new(Mutex::new(Vec::new()));

    let err = h
        .client
        .subscribe_trade_streams(&[], vec![recording_trades(&log)])
        .await
        .unwrap_err();
    assert!(matches!(err, BinanceError::StreamRequired));
    assert!(h.connector.all_sent_texts().is_empty());

    h.client.shutdown().await;
}

#[tokio::test]
async fn test_unknown_streams_and_control_replies_are_dropped() {
    let h = common::connect_memory().await;
    let log = Arc::new(Mutex::new(Vec::new()));
    h.client
        .subscribe_trade_streams(&streams(&["btcusdt@trade"]), vec![recording_trades(&log)])
        .await
        .unwrap();

    h.session.push_text(r#"{"result":null,"id":1}"#);
    h.session.push_text(common::trade_frame("ethbtc@trade", 1));
    h.session.push_text("not json at all");
    h.session.push_text(common::trade_frame("btcusdt@trade", 2));

    common::wait_for("subscribed stream", || log.lock().len() == 1).await;
    sleep(Duration::from_millis(50)).await;
    assert_eq!(*log.lock(), vec![("btcusdt@trade".to_string(), 2)]);
    assert!(h.client.is_connected());
    assert_eq!(h.client.subscriptions().len(), 1);
    assert!(!h.client.subscriptions().contains_key("ethbtc@trade"));

    h.client.shutdown().await;
}

#[tokio::test]
async fn test_failed_subscribe_leaves_registry_and_handlers_unchanged() {
    let mut h = common::connect_memory().await;
    let kept = Arc::new(Mutex::new(Vec::new()));
    let rejected = Arc::new(Mutex::new(Vec::new()));
    h.client
        .subscribe_trade_streams(&streams(&["btcusdt@trade"]), vec![recording_trades(&kept)])
        .await
        .unwrap();
    let _subscribe = h.session.recv_text().await.unwrap();

    h.session.reject_writes();
    let err = h
        .client
        .subscribe_trade_streams(&streams(&["ethbtc@trade"]), vec![recording_trades(&rejected)])
        .await;
    assert!(err.is_err());
    let subscriptions = h.client.subscriptions();
    assert_eq!(subscriptions.len(), 1);
    assert_eq!(subscriptions.get("btcusdt@trade"), Some(&StreamType::Trade));

    // The failed write reconnected; the new link carries on with the old set.
    let session = h.server.accept().await.unwrap();
    assert_eq!(session.dial(), 2);
    common::wait_for("reconnect", || h.client.is_connected()).await;
    session.push_text(common::trade_frame("ethbtc@trade", 1));
    session.push_text(common::trade_frame("btcusdt@trade", 2));

    common::wait_for("kept handler", || kept.lock().len() == 1).await;
    sleep(Duration::from_millis(50)).await;
    assert_eq!(*kept.lock(), vec![("btcusdt@trade".to_string(), 2)]);
    assert!(rejected.lock().is_empty());

    h.client.shutdown().await;
}

#[tokio::test]
async fn test_decode_failure_does_not_stop_dispatch() {
    let h = common::connect_memory().await;
    let log = Arc::new(Mutex::new(Vec::new()));
    h.client
        .subscribe_trade_streams(&streams(&["btcusdt@trade"]), vec![recording_trades(&log)])
        .await
        .unwrap();

    h.session
        .push_text(r#"{"stream":"btcusdt@trade","data":{"e":"trade","t":"not a number"}}"#);
    h.session.push_text(common::trade_frame("btcusdt@trade", 3));

    common::wait_for("valid trade", || log.lock().len() == 1).await;
    assert_eq!(log.lock()[0].1, 3);

    h.client.shutdown().await;
}

#[tokio::test]
async fn test_handler_error_short_circuits_chain_for_one_message() {
    let h = common::connect_memory().await;
    let first = Arc::new(Mutex::new(Vec::new()));
    let second = Arc::new(Mutex::new(Vec::new()));

    let failing: TradeStreamHandler = {
        let first = Arc::clone(&first);
        Arc::new(move |_: &str, trade: &TradeEvent| -> HandlerResult {
            first.lock().push(trade.trade_id);
            if trade.trade_id == 1 {
                return Err("rejected".into());
            }
            Ok(())
        })
    };
    let following: TradeStreamHandler = {
        let second = Arc::clone(&second);
        Arc::new(move |_: &str, trade: &TradeEvent| -> HandlerResult {
            second.lock().push(trade.trade_id);
            Ok(())
        })
    };
    h.client
        .subscribe_trade_streams(&streams(&["btcusdt@trade"]), vec![failing, following])
        .await
        .unwrap();

    h.session.push_text(common::trade_frame("btcusdt@trade", 1));
    h.session.push_text(common::trade_frame("btcusdt@trade", 2));

    common::wait_for("second message", || second.lock().len() == 1).await;
    assert_eq!(*first.lock(), vec![1, 2]);
    assert_eq!(*second.lock(), vec![2]);

    h.client.shutdown().await;
}

#[tokio::test]
async fn test_messages_of_one_stream_keep_arrival_order() {
    let h = common::connect_memory().await;
    let log = Arc::new(Mutex::new(Vec::new()));
    h.client
        .subscribe_trade_streams(
            &streams(&["btcusdt@trade", "ethbtc@trade"]),
            vec![recording_trades(&log)],
        )
        .await
        .unwrap();

    for id in 0..200 {
        h.session.push_text(common::trade_frame("btcusdt@trade", id));
        h.session.push_text(common::trade_frame("ethbtc@trade", id));
    }

    common::wait_for("all trades", || log.lock().len() == 400).await;
    let log = log.lock();
    for stream in ["btcusdt@trade", "ethbtc@trade"] {
        let ids: Vec<u64> = log
            .iter()
            .filter(|(s, _)| s == stream)
            .map(|(_, id)| *id)
            .collect();
        assert_eq!(ids, (0..200).collect::<Vec<u64>>(), "{} out of order", stream);
    }
    drop(log);

    h.client.shutdown().await;
}

#[tokio::test]
async fn test_unsubscribe_removes_stream() {
    let mut h = common::connect_memory().await;
    let log = Arc::new(Mutex::new(Vec::new()));
    let names = streams(&["btcusdt@trade"]);
    h.client
        .subscribe_trade_streams(&names, vec![recording_trades(&log)])
        .await
        .unwrap();
    h.client.unsubscribe(&names).await.unwrap();

    let _subscribe = h.session.recv_text().await.unwrap();
    let sent = command(&h.session.recv_text().await.unwrap());
    assert_eq!(sent.method, CommandMethod::Unsubscribe);
    assert_eq!(sent.params, names);
    assert!(h.client.subscriptions().is_empty());

    // Unsubscribing something never subscribed still writes the command.
    h.client.unsubscribe(&streams(&["ethbtc@trade"])).await.unwrap();

    h.session.push_text(common::trade_frame("btcusdt@trade", 5));
    sleep(Duration::from_millis(50)).await;
    assert!(log.lock().is_empty());

    h.client.shutdown().await;
}

#[tokio::test]
async fn test_list_subscriptions_writes_command() {
    let mut h = common::connect_memory().await;

    let id = h.client.list_subscriptions().await.unwrap();
    assert_eq!(id, 1);
    let text = h.session.recv_text().await.unwrap();
    assert_eq!(text, r#"{"method":"LIST_SUBSCRIPTIONS","id":1}"#);

    // The reply is a control frame; it must not disturb the connection.
    h.session.push_text(r#"{"result":["btcusdt@trade"],"id":1}"#);
    sleep(Duration::from_millis(20)).await;
    assert!(h.client.is_connected());

    h.client.shutdown().await;
}

#[tokio::test]
async fn test_all_book_tickers_uses_fixed_name() {
    let mut h = common::connect_memory().await;
    let log = Arc::new(Mutex::new(Vec::new()));
    let handler: AllBookTickersStreamHandler = {
        let log = Arc::clone(&log);
        Arc::new(move |stream: &str, ticker: &BookTickerEvent| -> HandlerResult {
            log.lock().push((stream.to_string(), ticker.order_book_update_id));
            Ok(())
        })
    };
    h.client
        .subscribe_all_book_tickers_stream(vec![handler])
        .await
        .unwrap();

    let sent = command(&h.session.recv_text().await.unwrap());
    assert_eq!(sent.params, vec!["!bookTicker"]);

    h.session.push_text(common::book_ticker_frame("!bookTicker", 400900217));
    common::wait_for("book ticker", || log.lock().len() == 1).await;
    assert_eq!(log.lock()[0], ("!bookTicker".to_string(), 400900217));

    h.client.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_is_idempotent_and_final() {
    let h = common::connect_memory().await;
    let log = Arc::new(Mutex::new(Vec::new()));

    h.client.shutdown().await;
    h.client.shutdown().await;

    assert_eq!(h.client.connection_state(), ConnectionState::ShuttingDown);
    assert!(!h.client.is_connected());
    let err = h
        .client
        .subscribe_trade_streams(&streams(&["btcusdt@trade"]), vec![recording_trades(&log)])
        .await
        .unwrap_err();
    assert!(matches!(err, BinanceError::NotConnected));
    assert!(matches!(
        h.client.list_subscriptions().await,
        Err(BinanceError::NotConnected)
    ));
    assert!(h.client.subscriptions().is_empty());
}

#[tokio::test]
async fn test_initial_connect_retries_failed_dials() {
    common::setup();
    let (connector, mut server) = binance_connector_rs::websocket::MemoryConnector::new();
    connector.fail_next(2);

    let client = binance_connector_rs::websocket::WebsocketStreamClient::connect_with(
        common::memory_config(),
        Arc::new(connector.clone()),
    )
    .await
    .unwrap();

    assert!(client.is_connected());
    assert_eq!(connector.dial_count(), 3);
    assert!(server.accept().await.is_some());

    client.shutdown().await;
}
