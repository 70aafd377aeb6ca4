//! End-to-end tests over HTTP and WebSocket
//!
//! Each test spawns its own server with an isolated in-memory store, so
//! tests run in parallel without shared state.
//!
//! Run with: cargo test -p integration-tests --test realtime_tests

use integration_tests::{
    assert_no_event, next_event, send_event, wait_for_event, TestServer,
};
use campus_core::Snowflake;
use reqwest::StatusCode;
use serde_json::{json, Value};

const ALICE: Snowflake = Snowflake::new(101);
const BOB: Snowflake = Snowflake::new(202);
const CARA: Snowflake = Snowflake::new(303);

async fn create_direct_room(server: &TestServer, token: &str, peer: Snowflake) -> Value {
    let response = server
        .post("/conversations/direct", token, &json!({ "userId": peer }))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    response.json().await.unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let server = TestServer::start().await.unwrap();
    let response = server.get("/health", "").await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_rest_requires_auth() {
    let server = TestServer::start().await.unwrap();
    let response = server.get("/conversations", "garbage-token").await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_ws_handshake_requires_valid_token() {
    let server = TestServer::start().await.unwrap();

    // No token: refused before any upgrade
    assert!(server.ws_connect_raw("").await.is_err());
    // Bad token: refused
    assert!(server.ws_connect_raw("?token=not-a-jwt").await.is_err());
    // Good token: accepted
    let token = server.token(ALICE);
    assert!(server.ws_connect(&token).await.is_ok());
}

/// Direct-room scenario: send over REST, receive over socket, read receipt
/// flows back to the sender only, history shows the flipped flag.
#[tokio::test]
async fn test_direct_message_end_to_end() {
    let server = TestServer::start().await.unwrap();
    let token_a = server.token(ALICE);
    let token_b = server.token(BOB);

    let room = create_direct_room(&server, &token_a, BOB).await;
    let room_id = room["id"].as_str().unwrap().to_string();

    let mut ws_a = server.ws_connect(&token_a).await.unwrap();
    let mut ws_b = server.ws_connect(&token_b).await.unwrap();
    send_event(&mut ws_a, "join_room", json!({ "roomId": room_id })).await.unwrap();
    send_event(&mut ws_b, "join_room", json!({ "roomId": room_id })).await.unwrap();
    // join_room has no acknowledgement; give the frames a moment to land
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    // A sends over REST (socket-less path)
    let response = server
        .post(
            &format!("/conversations/{room_id}/messages"),
            &token_a,
            &json!({ "content": "hi" }),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    // B's connected client receives the broadcast, unread
    let received = wait_for_event(&mut ws_b, "message_received").await.unwrap();
    assert_eq!(received["content"], json!("hi"));
    assert_eq!(received["isRead"], json!(false));
    let message_id = received["id"].as_str().unwrap().to_string();

    // The sender's own broadcast copy is also unread
    let echo = wait_for_event(&mut ws_a, "message_received").await.unwrap();
    assert_eq!(echo["isRead"], json!(false));

    // B acknowledges over the socket
    send_event(
        &mut ws_b,
        "mark_read",
        json!({ "roomId": room_id, "messageIds": [message_id] }),
    )
    .await
    .unwrap();

    // The receipt is targeted at A, and carries the acknowledged ids
    let receipt = wait_for_event(&mut ws_a, "messages_read").await.unwrap();
    assert_eq!(receipt["readBy"], json!(BOB));
    assert_eq!(receipt["messageIds"][0].as_str(), Some(message_id.as_str()));

    // Re-fetched history shows the message read from A's view
    let response = server
        .get(&format!("/conversations/{room_id}/messages"), &token_a)
        .await
        .unwrap();
    let history: Vec<Value> = response.json().await.unwrap();
    assert_eq!(history[0]["id"].as_str(), Some(message_id.as_str()));
    assert_eq!(history[0]["isRead"], json!(true));
}

/// Non-participants get an explicit rejection and nothing is broadcast.
#[tokio::test]
async fn test_send_rejected_for_non_participant() {
    let server = TestServer::start().await.unwrap();
    let token_a = server.token(ALICE);
    let token_b = server.token(BOB);
    let token_c = server.token(CARA);

    let room = create_direct_room(&server, &token_a, BOB).await;
    let room_id = room["id"].as_str().unwrap().to_string();

    // REST path: 403 with a distinguishable code
    let response = server
        .post(
            &format!("/conversations/{room_id}/messages"),
            &token_c,
            &json!({ "content": "let me in" }),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], json!("NOT_PARTICIPANT"));

    // Socket path: message_error to the sender only, no room broadcast
    let mut ws_b = server.ws_connect(&token_b).await.unwrap();
    send_event(&mut ws_b, "join_room", json!({ "roomId": room_id })).await.unwrap();

    let mut ws_c = server.ws_connect(&token_c).await.unwrap();
    send_event(
        &mut ws_c,
        "send_message",
        json!({ "roomId": room_id, "content": "still trying" }),
    )
    .await
    .unwrap();

    let error = wait_for_event(&mut ws_c, "message_error").await.unwrap();
    assert_eq!(error["code"], json!("NOT_PARTICIPANT"));
    assert_no_event(&mut ws_b, "message_received").await.unwrap();

    // Nothing was persisted
    let response = server
        .get(&format!("/conversations/{room_id}/messages"), &token_a)
        .await
        .unwrap();
    let history: Vec<Value> = response.json().await.unwrap();
    assert!(history.is_empty());
}

/// Group read receipts are room-broadcast, excluding the reader.
#[tokio::test]
async fn test_group_read_receipt_broadcast() {
    let server = TestServer::start().await.unwrap();
    let token_a = server.token(ALICE);
    let token_b = server.token(BOB);
    let token_c = server.token(CARA);

    let response = server
        .post(
            "/conversations/group",
            &token_a,
            &json!({ "name": "algorithms study", "memberIds": [BOB, CARA] }),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let room: Value = response.json().await.unwrap();
    let room_id = room["id"].as_str().unwrap().to_string();

    let mut ws_a = server.ws_connect(&token_a).await.unwrap();
    let mut ws_c = server.ws_connect(&token_c).await.unwrap();
    send_event(&mut ws_a, "join_room", json!({ "roomId": room_id })).await.unwrap();
    send_event(&mut ws_c, "join_room", json!({ "roomId": room_id })).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let response = server
        .post(
            &format!("/conversations/{room_id}/messages"),
            &token_a,
            &json!({ "content": "quiz friday" }),
        )
        .await
        .unwrap();
    let message: Value = response.json().await.unwrap();
    let message_id = message["id"].as_str().unwrap().to_string();

    // B (socket-less) acknowledges over REST
    let response = server
        .post(
            &format!("/conversations/{room_id}/read"),
            &token_b,
            &json!({ "messageIds": [message_id] }),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Both connected members see the receipt
    let receipt = wait_for_event(&mut ws_a, "messages_read").await.unwrap();
    assert_eq!(receipt["readBy"], json!(BOB));
    let receipt = wait_for_event(&mut ws_c, "messages_read").await.unwrap();
    assert_eq!(receipt["readBy"], json!(BOB));

    // B's receipt must not flip C's own view of the message
    let response = server
        .get(&format!("/conversations/{room_id}/messages"), &token_c)
        .await
        .unwrap();
    let history: Vec<Value> = response.json().await.unwrap();
    let entry = history
        .iter()
        .find(|m| m["id"].as_str() == Some(message_id.as_str()))
        .unwrap();
    assert_eq!(entry["isRead"], json!(false));
}

/// Chat-page presence: bilateral sync on enter, push on leave, snapshot
/// endpoint agrees with the push model.
#[tokio::test]
async fn test_presence_flow() {
    let server = TestServer::start().await.unwrap();
    server.store.set_friends(ALICE, vec![BOB]);
    let token_a = server.token(ALICE);
    let token_b = server.token(BOB);

    let mut ws_a = server.ws_connect(&token_a).await.unwrap();
    let mut ws_b = server.ws_connect(&token_b).await.unwrap();

    send_event(&mut ws_a, "chat_page_enter", Value::Null).await.unwrap();
    send_event(&mut ws_b, "chat_page_enter", Value::Null).await.unwrap();

    // A learns about B; B was told about A on its own enter
    let seen = wait_for_event(&mut ws_a, "user_on_chat_page").await.unwrap();
    assert_eq!(seen["userId"], json!(BOB));
    let seen = wait_for_event(&mut ws_b, "user_on_chat_page").await.unwrap();
    assert_eq!(seen["userId"], json!(ALICE));

    // Snapshot endpoint agrees
    let response = server.get("/online-users", &token_a).await.unwrap();
    let snapshot: Vec<Value> = response.json().await.unwrap();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0]["userId"], json!(BOB));
    assert_eq!(snapshot[0]["online"], json!(true));
    assert_eq!(snapshot[0]["onChatPage"], json!(true));

    // Dropping B's socket is an implicit leave plus offline announcement
    drop(ws_b);
    let left = wait_for_event(&mut ws_a, "user_left_chat_page").await.unwrap();
    assert_eq!(left["userId"], json!(BOB));
    let offline = wait_for_event(&mut ws_a, "user_offline").await.unwrap();
    assert_eq!(offline["userId"], json!(BOB));

    let response = server.get("/online-users", &token_a).await.unwrap();
    let snapshot: Vec<Value> = response.json().await.unwrap();
    assert_eq!(snapshot[0]["online"], json!(false));
    assert_eq!(snapshot[0]["onChatPage"], json!(false));
    assert!(snapshot[0]["lastSeen"].is_string());
}

/// Group membership management over REST, with the system-message contract.
#[tokio::test]
async fn test_group_membership_management() {
    let server = TestServer::start().await.unwrap();
    server.store.set_display_name(BOB, "Bob");
    let token_a = server.token(ALICE);
    let token_b = server.token(BOB);

    let response = server
        .post(
            "/conversations/group",
            &token_a,
            &json!({ "name": "lab group" }),
        )
        .await
        .unwrap();
    let room: Value = response.json().await.unwrap();
    let room_id = room["id"].as_str().unwrap().to_string();
    let invite = room["inviteCode"].as_str().unwrap().to_string();

    // B joins by invite link
    let response = server
        .post(&format!("/conversations/join/{invite}"), &token_b, &json!({}))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // The join synthesized a senderless system message
    let response = server
        .get(&format!("/conversations/{room_id}/messages"), &token_b)
        .await
        .unwrap();
    let history: Vec<Value> = response.json().await.unwrap();
    let joined = history
        .iter()
        .find(|m| m["messageType"] == json!("system") && m["content"] == json!("Bob joined the group"))
        .expect("system join message missing");
    assert!(joined["sender"].is_null());
    assert_eq!(joined["isRead"], json!(true));

    // Promote, then remove: B must vanish from both lists
    let response = server
        .post(
            &format!("/conversations/{room_id}/admins"),
            &token_a,
            &json!({ "userId": BOB }),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = server
        .delete(&format!("/conversations/{room_id}/members/{BOB}"), &token_a)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = server.get("/conversations", &token_a).await.unwrap();
    let rooms: Vec<Value> = response.json().await.unwrap();
    let room = rooms
        .iter()
        .find(|r| r["id"].as_str() == Some(room_id.as_str()))
        .unwrap();
    assert!(!room["participants"].as_array().unwrap().iter().any(|p| *p == json!(BOB)));
    assert!(!room["admins"].as_array().unwrap().iter().any(|p| *p == json!(BOB)));

    // The removed member can no longer post
    let response = server
        .post(
            &format!("/conversations/{room_id}/messages"),
            &token_b,
            &json!({ "content": "hello?" }),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Only the creator may delete the room
    let response = server
        .delete(&format!("/conversations/{room_id}"), &token_b)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let response = server
        .delete(&format!("/conversations/{room_id}"), &token_a)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

/// Typing indicators reach the peer but never echo back to the typist.
#[tokio::test]
async fn test_typing_indicators() {
    let server = TestServer::start().await.unwrap();
    let token_a = server.token(ALICE);
    let token_b = server.token(BOB);

    let room = create_direct_room(&server, &token_a, BOB).await;
    let room_id = room["id"].as_str().unwrap().to_string();

    let mut ws_a = server.ws_connect(&token_a).await.unwrap();
    let mut ws_b = server.ws_connect(&token_b).await.unwrap();
    send_event(&mut ws_a, "join_room", json!({ "roomId": room_id })).await.unwrap();
    send_event(&mut ws_b, "join_room", json!({ "roomId": room_id })).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    send_event(&mut ws_a, "typing_start", json!({ "roomId": room_id })).await.unwrap();
    let typing = wait_for_event(&mut ws_b, "user_typing").await.unwrap();
    assert_eq!(typing["userId"], json!(ALICE));
    assert_no_event(&mut ws_a, "user_typing").await.unwrap();

    send_event(&mut ws_a, "typing_stop", json!({ "roomId": room_id })).await.unwrap();
    let stopped = wait_for_event(&mut ws_b, "user_stopped_typing").await.unwrap();
    assert_eq!(stopped["userId"], json!(ALICE));
}

/// The REST send and socket send share one persistence path: a message sent
/// over the socket shows up in REST history immediately.
#[tokio::test]
async fn test_socket_send_visible_to_rest_reader() {
    let server = TestServer::start().await.unwrap();
    let token_a = server.token(ALICE);
    let token_b = server.token(BOB);

    let room = create_direct_room(&server, &token_a, BOB).await;
    let room_id = room["id"].as_str().unwrap().to_string();

    let mut ws_a = server.ws_connect(&token_a).await.unwrap();
    send_event(
        &mut ws_a,
        "send_message",
        json!({ "roomId": room_id, "content": "over the wire" }),
    )
    .await
    .unwrap();

    // The sender gets a dedicated acknowledgement with the new id
    let ack = wait_for_event(&mut ws_a, "message_sent").await.unwrap();
    let message_id = ack["messageId"].as_str().unwrap().to_string();

    // Read-your-writes across the socket/REST split
    let response = server
        .get(&format!("/conversations/{room_id}/messages"), &token_b)
        .await
        .unwrap();
    let history: Vec<Value> = response.json().await.unwrap();
    assert_eq!(history[0]["id"].as_str(), Some(message_id.as_str()));
    assert_eq!(history[0]["content"], json!("over the wire"));
}

/// Unknown events and malformed payloads are ignored without killing the
/// connection.
#[tokio::test]
async fn test_bad_frames_do_not_kill_connection() {
    let server = TestServer::start().await.unwrap();
    let token_a = server.token(ALICE);
    let token_b = server.token(BOB);

    let room = create_direct_room(&server, &token_a, BOB).await;
    let room_id = room["id"].as_str().unwrap().to_string();

    let mut ws_a = server.ws_connect(&token_a).await.unwrap();
    send_event(&mut ws_a, "join_room", json!({ "roomId": room_id })).await.unwrap();
    send_event(&mut ws_a, "no_such_event", json!({ "x": 1 })).await.unwrap();
    send_event(&mut ws_a, "join_room", json!({ "roomId": "not-an-id" })).await.unwrap();

    // The connection still works afterwards
    send_event(
        &mut ws_a,
        "send_message",
        json!({ "roomId": room_id, "content": "still alive" }),
    )
    .await
    .unwrap();
    let (event, _) = next_event(&mut ws_a).await.unwrap();
    assert!(event == "message_sent" || event == "message_received");
}
