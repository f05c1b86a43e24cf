//! `WebSocket` push stream tests over a real socket.
//!
//! Each test spawns the relay on an ephemeral port and talks to `/ws`
//! with a `tokio-tungstenite` client, so the socket loop itself runs:
//! replay on connect, fan-out, Ping/Pong, and both clean and abrupt
//! disconnects.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use relay_observer::state::AppState;
use relay_observer::{ingest, spawn_relay, RunningRelay, ServerConfig};
use relay_types::{Payload, Submission};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

async fn start() -> (Arc<AppState>, RunningRelay) {
    let state = Arc::new(AppState::new());
    let config = ServerConfig {
        host: String::from("127.0.0.1"),
        port: 0,
    };
    let relay = spawn_relay(&config, Arc::clone(&state)).await.unwrap();
    (state, relay)
}

async fn connect(relay: &RunningRelay) -> Client {
    let (client, _) = connect_async(format!("ws://{}/ws", relay.addr)).await.unwrap();
    client
}

async fn submit_run_number(state: &AppState, value: i64, rep: i64) {
    let submission = Submission {
        payload: Payload::RunNumber { value },
        rep,
    };
    ingest::submit(&state.store, &state.hub, submission).await;
}

/// Wait until the hub reports exactly `count` live observers.
async fn wait_for_live(state: &AppState, count: usize) {
    timeout(WAIT, async {
        while state.hub.len().await != count {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

/// Next text frame, parsed as JSON.
async fn next_event(client: &mut Client) -> Value {
    loop {
        let msg = timeout(WAIT, client.next()).await.unwrap().unwrap().unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

#[tokio::test]
async fn connect_replays_populated_channel_over_the_wire() {
    let (state, relay) = start().await;
    submit_run_number(&state, 3, 1).await;

    let mut client = connect(&relay).await;
    let replay = next_event(&mut client).await;
    assert_eq!(replay["type"], "run-number");
    assert_eq!(replay["value"], 3);
    assert_eq!(replay["rep"], 1);
    assert!(replay["timestamp"].is_string());

    drop(client);
    wait_for_live(&state, 0).await;
    relay.shutdown().await;
}

#[tokio::test]
async fn dropped_client_is_evicted_and_others_keep_receiving() {
    let (state, relay) = start().await;
    let gone = connect(&relay).await;
    let mut alive = connect(&relay).await;
    wait_for_live(&state, 2).await;

    drop(gone);
    wait_for_live(&state, 1).await;

    submit_run_number(&state, 9, 5).await;
    let event = next_event(&mut alive).await;
    assert_eq!(event["type"], "run-number");
    assert_eq!(event["rep"], 5);

    drop(alive);
    wait_for_live(&state, 0).await;
    relay.shutdown().await;
}

#[tokio::test]
async fn ping_is_answered_with_pong() {
    let (state, relay) = start().await;
    let mut client = connect(&relay).await;
    wait_for_live(&state, 1).await;

    client.send(Message::Ping(vec![1_u8, 2].into())).await.unwrap();
    let pong = timeout(WAIT, async {
        loop {
            if let Message::Pong(data) = client.next().await.unwrap().unwrap() {
                return data;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(pong.to_vec(), vec![1_u8, 2]);

    drop(client);
    wait_for_live(&state, 0).await;
    relay.shutdown().await;
}

#[tokio::test]
async fn client_close_leaves_live_set() {
    let (state, relay) = start().await;
    let mut client = connect(&relay).await;
    wait_for_live(&state, 1).await;

    client.close(None).await.unwrap();
    wait_for_live(&state, 0).await;

    // The relay keeps accepting writes with nobody listening.
    submit_run_number(&state, 1, 1).await;
    assert!(state.store.get(relay_types::Channel::RunNumber).await.is_some());

    relay.shutdown().await;
}
