//! Wire event surface for the roomcast session protocol.
//!
//! Every inbound and outbound event serializes as an envelope of the form
//! `{"event": "<kebab-case name>", "data": <payload>}` with camelCase payload
//! fields, matching the event names legacy clients already speak
//! (`create-room`, `join-room`, `game-action`, …).
//!
//! Game state and action payloads are opaque [`serde_json::Value`]s — the
//! server stores and relays them but never interprets their contents.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Type aliases ────────────────────────────────────────────────────

/// Transport-level connection identity, assigned by the server at accept
/// time. Changes every time a client reconnects.
pub type ConnectionId = Uuid;

/// Stable player identity inside a room. Survives reconnections; defaults to
/// the textual connection id at join time unless the caller supplies one.
pub type PlayerId = String;

/// Server-generated short room identifier, the registry's primary key.
pub type RoomCode = String;

// ── Inbound events ──────────────────────────────────────────────────

/// Events sent from a client to the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Create a room and join it as its first player.
    /// Acked with the generated room code.
    #[serde(rename_all = "camelCase")]
    CreateRoom {
        room_name: String,
        room_pass: String,
        no_of_players: usize,
        initial_game_state: serde_json::Value,
    },
    /// Join an existing room by display name and passphrase.
    #[serde(rename_all = "camelCase")]
    JoinRoom { room_name: String, room_pass: String },
    /// Relay an opaque action payload to the other room occupants.
    GameAction(serde_json::Value),
    /// Replace the room's shared game state wholesale (last writer wins).
    #[serde(rename_all = "camelCase")]
    UpdateGameState {
        room_code: RoomCode,
        new_game_state: serde_json::Value,
    },
    /// Push the current game state to the other room occupants.
    #[serde(rename_all = "camelCase")]
    EndTurn { room_code: RoomCode },
    /// Reattach a disconnected player under a new connection.
    /// Acked with `{success, roomData?}`.
    #[serde(rename_all = "camelCase")]
    RejoinRoom {
        player_id: PlayerId,
        room_code: RoomCode,
    },
}

// ── Outbound events ─────────────────────────────────────────────────

/// Events sent from the server to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// A room was created; sent to its creator.
    #[serde(rename_all = "camelCase")]
    RoomCreated { room_code: RoomCode },
    /// Join succeeded; sent to the joiner (boxed to reduce enum size).
    RoomJoined(Box<RoomJoinedPayload>),
    /// Join failed. The message never reveals whether the room exists.
    RoomError { message: String },
    /// Room occupancy changed; sent to every connected member.
    PlayerJoined {
        occupancy: usize,
        capacity: usize,
        players: Vec<PlayerId>,
    },
    /// The room reached capacity; sent to every connected member exactly once.
    GameStart,
    /// An action relayed from another occupant.
    GameAction(serde_json::Value),
    /// The current shared game state, pushed at end of turn.
    #[serde(rename_all = "camelCase")]
    SyncGameState { game_state: serde_json::Value },
    /// A previously disconnected occupant reattached.
    #[serde(rename_all = "camelCase")]
    PlayerReconnected { player_id: PlayerId },
    /// An occupant's connection went away. Its slot is kept for rejoin.
    #[serde(rename_all = "camelCase")]
    PlayerDisconnected { player_id: PlayerId },
    /// A recoverable error addressed only to the originating connection.
    Error { message: String },
    /// Acknowledgment envelope used by transports without native per-call
    /// acks (see [`AckPayload`]).
    Ack(AckPayload),
}

/// Payload for the `room-joined` server event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomJoinedPayload {
    pub room_code: RoomCode,
    /// Identity assigned to the joiner, needed later for `rejoin-room`.
    pub player_id: PlayerId,
    pub occupancy: usize,
    pub capacity: usize,
    pub game_state: serde_json::Value,
}

// ── Acknowledgments ─────────────────────────────────────────────────

/// Single-shot acknowledgment payloads.
///
/// Transports with native ack callbacks deliver these directly; the bundled
/// WebSocket transport wraps them in an [`ServerEvent::Ack`] frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AckPayload {
    /// Ack for `create-room`: the generated room code, as a bare string.
    RoomCode(RoomCode),
    /// Ack for `rejoin-room`.
    Rejoin(RejoinAck),
}

/// Outcome of a `rejoin-room` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejoinAck {
    pub success: bool,
    /// Failure reason, present when `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Room snapshot, present when `success` is true.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_data: Option<RoomData>,
}

/// Snapshot of a room handed to a successfully rejoined player.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomData {
    pub room_code: RoomCode,
    pub occupancy: usize,
    pub capacity: usize,
    pub game_state: serde_json::Value,
    pub players: Vec<PlayerStatus>,
}

/// Membership entry inside a [`RoomData`] snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStatus {
    pub player_id: PlayerId,
    pub disconnected: bool,
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_room_deserializes_from_wire_fixture() {
        let raw = r#"{
            "event": "create-room",
            "data": {
                "roomName": "alpha",
                "roomPass": "x",
                "noOfPlayers": 2,
                "initialGameState": {"board": []}
            }
        }"#;
        let event: ClientEvent = serde_json::from_str(raw).unwrap();
        match event {
            ClientEvent::CreateRoom {
                room_name,
                room_pass,
                no_of_players,
                initial_game_state,
            } => {
                assert_eq!(room_name, "alpha");
                assert_eq!(room_pass, "x");
                assert_eq!(no_of_players, 2);
                assert_eq!(initial_game_state, json!({"board": []}));
            }
            other => panic!("expected CreateRoom, got {other:?}"),
        }
    }

    #[test]
    fn game_action_data_is_the_raw_action_value() {
        let raw = r#"{"event": "game-action", "data": {"move": "e4"}}"#;
        let event: ClientEvent = serde_json::from_str(raw).unwrap();
        match event {
            ClientEvent::GameAction(action) => assert_eq!(action, json!({"move": "e4"})),
            other => panic!("expected GameAction, got {other:?}"),
        }
    }

    #[test]
    fn server_events_use_kebab_case_names() {
        let event = ServerEvent::SyncGameState {
            game_state: json!(null),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "sync-game-state");

        let event = ServerEvent::PlayerDisconnected {
            player_id: "p1".into(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "player-disconnected");
        assert_eq!(value["data"]["playerId"], "p1");
    }

    #[test]
    fn game_start_serializes_without_data() {
        let json = serde_json::to_string(&ServerEvent::GameStart).unwrap();
        assert_eq!(json, r#"{"event":"game-start"}"#);
        // And parses back.
        let event: ServerEvent = serde_json::from_str(&json).unwrap();
        assert!(matches!(event, ServerEvent::GameStart));
    }

    #[test]
    fn room_joined_payload_uses_camel_case_fields() {
        let payload = RoomJoinedPayload {
            room_code: "AB12CD".into(),
            player_id: "p1".into(),
            occupancy: 2,
            capacity: 4,
            game_state: json!({"turn": 0}),
        };
        let value = serde_json::to_value(ServerEvent::RoomJoined(Box::new(payload))).unwrap();
        assert_eq!(value["event"], "room-joined");
        assert_eq!(value["data"]["roomCode"], "AB12CD");
        assert_eq!(value["data"]["playerId"], "p1");
        assert_eq!(value["data"]["gameState"]["turn"], 0);
    }

    #[test]
    fn create_ack_is_a_bare_room_code_string() {
        let value = serde_json::to_value(AckPayload::RoomCode("AB12CD".into())).unwrap();
        assert_eq!(value, json!("AB12CD"));
    }

    #[test]
    fn rejoin_ack_failure_omits_room_data() {
        let ack = AckPayload::Rejoin(RejoinAck {
            success: false,
            reason: Some("room not found".into()),
            room_data: None,
        });
        let value = serde_json::to_value(&ack).unwrap();
        assert_eq!(value, json!({"success": false, "reason": "room not found"}));
    }

    #[test]
    fn rejoin_ack_success_round_trips() {
        let ack = AckPayload::Rejoin(RejoinAck {
            success: true,
            reason: None,
            room_data: Some(RoomData {
                room_code: "FF00AA".into(),
                occupancy: 2,
                capacity: 2,
                game_state: json!({"turn": 3}),
                players: vec![
                    PlayerStatus {
                        player_id: "p1".into(),
                        disconnected: false,
                    },
                    PlayerStatus {
                        player_id: "p2".into(),
                        disconnected: true,
                    },
                ],
            }),
        });
        let json = serde_json::to_string(&ack).unwrap();
        let back: AckPayload = serde_json::from_str(&json).unwrap();
        match back {
            AckPayload::Rejoin(rejoin) => {
                assert!(rejoin.success);
                let data = rejoin.room_data.unwrap();
                assert_eq!(data.room_code, "FF00AA");
                assert_eq!(data.players.len(), 2);
                assert!(data.players[1].disconnected);
            }
            other => panic!("expected Rejoin ack, got {other:?}"),
        }
    }

    #[test]
    fn unknown_event_name_is_rejected() {
        let raw = r#"{"event": "launch-missiles", "data": {}}"#;
        assert!(serde_json::from_str::<ClientEvent>(raw).is_err());
    }
}
