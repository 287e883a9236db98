#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Shared test utilities for roomcast integration tests.
//!
//! Provides a scripted [`MockConnection`] and helpers for building client
//! event frames and inspecting recorded server frames.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use roomcast::{Connection, RoomcastError};
use serde_json::Value;

// ── MockConnection ──────────────────────────────────────────────────

/// One scripted step of a [`MockConnection`].
pub enum Script {
    /// `recv` yields this frame.
    Recv(String),
    /// `recv` yields this transport error.
    Fail(RoomcastError),
    /// `recv` sleeps before handling the next step, leaving time for
    /// outbound frames to drain.
    Wait(Duration),
    /// `recv` reports a clean close.
    Close,
}

/// A scripted mock connection for driving the server loop without sockets.
///
/// Scripted steps are consumed in order by `recv()`; once exhausted, `recv`
/// hangs so the connection task stays alive until the test aborts it. All
/// frames the server sends are recorded in `sent`.
pub struct MockConnection {
    script: VecDeque<Script>,
    pub sent: Arc<StdMutex<Vec<String>>>,
}

impl MockConnection {
    pub fn new(script: Vec<Script>) -> (Self, Arc<StdMutex<Vec<String>>>) {
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let conn = Self {
            script: VecDeque::from(script),
            sent: Arc::clone(&sent),
        };
        (conn, sent)
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn send(&mut self, message: String) -> Result<(), RoomcastError> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, RoomcastError>> {
        loop {
            match self.script.pop_front() {
                Some(Script::Recv(frame)) => return Some(Ok(frame)),
                Some(Script::Fail(e)) => return Some(Err(e)),
                Some(Script::Wait(duration)) => tokio::time::sleep(duration).await,
                Some(Script::Close) => return None,
                // Script exhausted — hang so the task stays alive.
                None => std::future::pending().await,
            }
        }
    }

    async fn close(&mut self) -> Result<(), RoomcastError> {
        Ok(())
    }
}

// ── Frame helpers ───────────────────────────────────────────────────

/// Client frame for `create-room`.
pub fn create_room_frame(name: &str, pass: &str, capacity: usize) -> String {
    serde_json::json!({
        "event": "create-room",
        "data": {
            "roomName": name,
            "roomPass": pass,
            "noOfPlayers": capacity,
            "initialGameState": {"board": []},
        }
    })
    .to_string()
}

/// Client frame for `join-room`.
pub fn join_room_frame(name: &str, pass: &str) -> String {
    serde_json::json!({
        "event": "join-room",
        "data": {"roomName": name, "roomPass": pass}
    })
    .to_string()
}

/// Client frame for `game-action`.
pub fn game_action_frame(action: Value) -> String {
    serde_json::json!({"event": "game-action", "data": action}).to_string()
}

/// Parse every recorded frame and return the event names, in send order.
/// Ack frames parse as `"ack"`.
pub fn event_names(sent: &Arc<StdMutex<Vec<String>>>) -> Vec<String> {
    sent.lock()
        .unwrap()
        .iter()
        .map(|frame| {
            let value: Value = serde_json::from_str(frame).expect("recorded frame is JSON");
            value["event"]
                .as_str()
                .expect("frame has an event name")
                .to_owned()
        })
        .collect()
}

/// Find the first recorded frame with the given event name and return its
/// `data` payload.
pub fn payload_of(sent: &Arc<StdMutex<Vec<String>>>, event: &str) -> Option<Value> {
    sent.lock().unwrap().iter().find_map(|frame| {
        let value: Value = serde_json::from_str(frame).ok()?;
        (value["event"] == event).then(|| value["data"].clone())
    })
}
