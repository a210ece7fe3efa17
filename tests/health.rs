mod support;

use futures_util::SinkExt;
use serde_json::Value;
use std::time::Duration;
use tokio_tungstenite::{connect_async, tungstenite::Message};

#[tokio::test]
async fn health_reports_ok_with_counters() {
    let base_url = support::ensure_server();
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{base_url}/health"))
        .send()
        .await
        .expect("request should succeed");
    assert_eq!(res.status(), reqwest::StatusCode::OK);

    let body: Value = res.json().await.expect("json body");
    assert_eq!(body["status"], "ok");
    assert!(body["players"].as_u64().is_some());
    assert!(body["connections"].as_u64().is_some());
    assert!(body["uptime_seconds"].as_u64().is_some());
}

#[tokio::test]
async fn health_counts_joined_players() {
    let base_url = support::ensure_server();
    let ws_url = format!("{}/ws", base_url.replacen("http://", "ws://", 1));
    let (mut socket, _) = connect_async(&ws_url).await.expect("ws connect");

    let name = format!("healthcheck-{}", uuid::Uuid::new_v4());
    let join = serde_json::json!({
        "type": "player:join",
        "data": {"name": name, "shipType": "sloop"}
    });
    socket
        .send(Message::Text(join.to_string()))
        .await
        .expect("send join");

    // The player count is pushed from the world task; poll until it lands.
    let client = reqwest::Client::new();
    let mut players = 0;
    for _ in 0..100 {
        let body: Value = client
            .get(format!("{base_url}/health"))
            .send()
            .await
            .expect("request should succeed")
            .json()
            .await
            .expect("json body");
        players = body["players"].as_u64().unwrap_or(0);
        if players >= 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(players >= 1, "joined player never showed up in /health");
}
