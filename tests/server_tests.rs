#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Server-loop integration tests over scripted mock connections.
//!
//! These exercise the full path: wire frame in → coordinator → wire frames
//! out, including ack delivery, malformed input handling, and the
//! disconnect notification on connection teardown.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{
    create_room_frame, event_names, game_action_frame, join_room_frame, payload_of,
    MockConnection, Script,
};
use roomcast::{RoomServer, RoomcastError};
use serde_json::json;

const SETTLE: Duration = Duration::from_millis(200);

#[tokio::test]
async fn create_room_acks_and_notifies_over_the_wire() {
    let server = Arc::new(RoomServer::new());
    let (conn, sent) = MockConnection::new(vec![Script::Recv(create_room_frame(
        "alpha", "x", 2,
    ))]);

    let task = tokio::spawn(Arc::clone(&server).handle_connection(conn));
    tokio::time::sleep(SETTLE).await;

    let names = event_names(&sent);
    assert_eq!(names, vec!["ack", "room-created", "player-joined"]);

    // The ack carries the generated room code as a bare string, and the
    // room-created event repeats it.
    let ack = payload_of(&sent, "ack").unwrap();
    let code = ack.as_str().expect("create ack is a bare string");
    let created = payload_of(&sent, "room-created").unwrap();
    assert_eq!(created["roomCode"], code);

    let joined = payload_of(&sent, "player-joined").unwrap();
    assert_eq!(joined["occupancy"], 1);
    assert_eq!(joined["capacity"], 2);

    task.abort();
}

#[tokio::test]
async fn malformed_frame_gets_an_error_reply() {
    let server = Arc::new(RoomServer::new());
    let (conn, sent) = MockConnection::new(vec![Script::Recv("{not json".into())]);

    let task = tokio::spawn(Arc::clone(&server).handle_connection(conn));
    tokio::time::sleep(SETTLE).await;

    assert_eq!(event_names(&sent), vec!["error"]);
    let payload = payload_of(&sent, "error").unwrap();
    assert_eq!(payload["message"], "malformed event");

    task.abort();
}

#[tokio::test]
async fn full_session_with_join_game_start_and_disconnect() {
    let server = Arc::new(RoomServer::new());

    // Creator connects first and stays online.
    let (creator, creator_sent) = MockConnection::new(vec![Script::Recv(create_room_frame(
        "alpha", "x", 2,
    ))]);
    let creator_task = tokio::spawn(Arc::clone(&server).handle_connection(creator));

    // Joiner arrives later, fills the room, sends an action, then leaves.
    let (joiner, joiner_sent) = MockConnection::new(vec![
        Script::Wait(Duration::from_millis(100)),
        Script::Recv(join_room_frame("alpha", "x")),
        Script::Wait(Duration::from_millis(100)),
        Script::Recv(game_action_frame(json!({"move": "e4"}))),
        Script::Wait(Duration::from_millis(100)),
        Script::Close,
    ]);
    let joiner_task = tokio::spawn(Arc::clone(&server).handle_connection(joiner));

    tokio::time::sleep(Duration::from_millis(600)).await;

    // The creator saw the whole session unfold.
    assert_eq!(
        event_names(&creator_sent),
        vec![
            "ack",
            "room-created",
            "player-joined", // itself
            "player-joined", // the joiner
            "game-start",
            "game-action",
            "player-disconnected",
        ]
    );
    let action = payload_of(&creator_sent, "game-action").unwrap();
    assert_eq!(action, json!({"move": "e4"}));

    // The joiner got its ack-side events but never its own action back.
    assert_eq!(
        event_names(&joiner_sent),
        vec!["room-joined", "player-joined", "game-start"]
    );
    let joined = payload_of(&joiner_sent, "room-joined").unwrap();
    assert_eq!(joined["occupancy"], 2);
    assert_eq!(joined["capacity"], 2);
    assert_eq!(joined["gameState"], json!({"board": []}));

    let disconnected = payload_of(&creator_sent, "player-disconnected").unwrap();
    assert_eq!(disconnected["playerId"], joined["playerId"]);

    joiner_task.await.unwrap();
    creator_task.abort();
}

#[tokio::test]
async fn join_error_goes_only_to_the_joiner() {
    let server = Arc::new(RoomServer::new());

    let (creator, creator_sent) = MockConnection::new(vec![Script::Recv(create_room_frame(
        "alpha", "x", 2,
    ))]);
    let creator_task = tokio::spawn(Arc::clone(&server).handle_connection(creator));

    let (joiner, joiner_sent) = MockConnection::new(vec![
        Script::Wait(Duration::from_millis(100)),
        Script::Recv(join_room_frame("alpha", "wrong-pass")),
    ]);
    let joiner_task = tokio::spawn(Arc::clone(&server).handle_connection(joiner));

    tokio::time::sleep(Duration::from_millis(400)).await;

    assert_eq!(event_names(&joiner_sent), vec!["room-error"]);
    let payload = payload_of(&joiner_sent, "room-error").unwrap();
    assert_eq!(payload["message"], "room not found or wrong passphrase");

    // The creator heard nothing about the failed attempt.
    assert_eq!(
        event_names(&creator_sent),
        vec!["ack", "room-created", "player-joined"]
    );

    creator_task.abort();
    joiner_task.abort();
}

#[tokio::test]
async fn receive_error_tears_the_connection_down() {
    let server = Arc::new(RoomServer::new());

    let (conn, _sent) = MockConnection::new(vec![
        Script::Recv(create_room_frame("alpha", "x", 2)),
        Script::Wait(Duration::from_millis(100)),
        Script::Fail(RoomcastError::TransportReceive("boom".into())),
    ]);

    // The task must exit on its own — no abort needed.
    let task = tokio::spawn(Arc::clone(&server).handle_connection(conn));
    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("connection task should exit after a receive error")
        .unwrap();
}
