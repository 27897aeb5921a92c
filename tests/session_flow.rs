//! Integration tests for the two-party session flow.
//!
//! Drives real WebSocket endpoints against a spawned duetd.

mod common;

use common::TestServer;
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn test_full_session_lifecycle() {
    let server = TestServer::spawn().await.expect("Failed to spawn test server");

    // First joiner creates the session and takes the first seat.
    let mut alice = server.join("g1", 1, "alice").await.expect("alice connect");
    let init = alice.recv().await.unwrap();
    assert_eq!(init["type"], "init");
    assert_eq!(init["color"], "white");
    assert_eq!(init["user"]["id"], 1);
    assert_eq!(init["game"]["id"], "g1");
    assert_eq!(init["game"]["white_player_id"], 1);
    let status = alice.recv().await.unwrap();
    assert_eq!(status["type"], "room_status");
    assert_eq!(status["players_count"], 1);

    // Second joiner takes the other seat; both hear the room is ready.
    let mut bob = server.join("g1", 2, "bob").await.expect("bob connect");
    let init = bob.recv().await.unwrap();
    assert_eq!(init["color"], "black");
    assert_eq!(init["game"]["black_player_id"], 2);

    for client in [&mut alice, &mut bob] {
        let ready = loop {
            let status = client.recv_kind("room_status").await.unwrap();
            if status["message"] == "Both players have joined the game!" {
                break status;
            }
        };
        assert_eq!(ready["players_count"], 2);
        assert_eq!(ready["ready_to_play"], true);
        let hello = client.recv_kind("chat").await.unwrap();
        assert_eq!(hello["message"], "Hello");
        assert_eq!(hello["sender"], "2");
    }

    // A move reaches only the opponent, byte for byte.
    let mv = r#"{"type":"move","from":"e2","to":"e4","sender":"1","piece":"p","move_number":1}"#;
    alice.send_raw(mv).await.unwrap();
    assert_eq!(bob.recv_text().await.unwrap(), mv);
    alice.expect_silence(Duration::from_millis(200)).await.unwrap();
    let token = server.token(1, "alice").unwrap();
    server
        .wait_for_http("/games/g1/moves", Some(token.as_str()), |status, body| {
            status == 200
                && serde_json::from_str::<serde_json::Value>(body)
                    .ok()
                    .and_then(|v| v.as_array().map(Vec::len))
                    == Some(1)
        })
        .await
        .expect("one move row stored");

    // Game lookups need a valid token.
    for path in ["/games/g1", "/games/g1/moves"] {
        let (status, body) = server.http_get(path, None).await.unwrap();
        assert_eq!(status, 401, "{path}");
        assert!(body.contains("Unauthorized"));
        let (status, _) = server.http_get(path, Some("not-a-token")).await.unwrap();
        assert_eq!(status, 401, "{path}");
    }
    let (status, body) = server.http_get("/games/g1", Some(token.as_str())).await.unwrap();
    assert_eq!(status, 200);
    assert!(body.contains(r#""white_player_id":1"#));

    // bob leaves; alice is told.
    bob.disconnect().await.unwrap();
    let left = alice.recv_kind("room_status").await.unwrap();
    assert_eq!(left["players_count"], 1);
    assert_eq!(left["message"], "2 has left the game");
    assert_eq!(left["ready_to_play"], false);

    // The room keeps serving the remaining member.
    alice.send(json!({ "type": "ping", "sender": "1" })).await.unwrap();
    let pong = alice.recv_kind("pong").await.unwrap();
    assert_eq!(pong["players_count"], 1);

    // Last one out deletes the record.
    alice.disconnect().await.unwrap();
    server
        .wait_for_http("/games/g1", Some(token.as_str()), |status, _| status == 404)
        .await
        .expect("record deleted");
    server
        .wait_for_http("/health", None, |status, body| {
            status == 200 && body.contains(r#""rooms":0"#)
        })
        .await
        .expect("room removed");
}

#[tokio::test]
async fn test_missing_room_is_refused() {
    let server = TestServer::spawn().await.expect("Failed to spawn test server");
    let token = server.token(1, "alice").unwrap();

    let mut client = common::TestClient::connect(&server.url(&format!("?token={token}")))
        .await
        .expect("upgrade should succeed");
    let error = client.recv().await.unwrap();
    assert_eq!(error, json!({ "type": "error", "message": "Missing room ID" }));
    client.expect_closed().await.unwrap();
}

#[tokio::test]
async fn test_bad_token_is_refused() {
    let server = TestServer::spawn().await.expect("Failed to spawn test server");

    for query in ["?room=g1", "?room=g1&token=forged.00"] {
        let mut client = common::TestClient::connect(&server.url(query))
            .await
            .expect("upgrade should succeed");
        let error = client.recv().await.unwrap();
        assert_eq!(error, json!({ "type": "error", "message": "Unauthorized" }));
        client.expect_closed().await.unwrap();
    }
}

#[tokio::test]
async fn test_third_participant_is_refused() {
    let server = TestServer::spawn().await.expect("Failed to spawn test server");

    let mut alice = server.join("g2", 1, "alice").await.unwrap();
    alice.recv_kind("init").await.unwrap();
    let mut bob = server.join("g2", 2, "bob").await.unwrap();
    bob.recv_kind("init").await.unwrap();

    let mut carol = server.join("g2", 3, "carol").await.unwrap();
    let error = carol.recv().await.unwrap();
    assert_eq!(error, json!({ "type": "error", "message": "Room is full" }));
    carol.expect_closed().await.unwrap();
}

#[tokio::test]
async fn test_unknown_path_is_not_upgraded() {
    let server = TestServer::spawn().await.expect("Failed to spawn test server");
    let url = server.url("").replace("/ws", "/nope");
    assert!(common::TestClient::connect(&url).await.is_err());
}
