//! Session coordinator: the per-connection event protocol.
//!
//! [`SessionCoordinator`] translates each inbound [`ClientEvent`] (plus the
//! transport's disconnect notification) into exactly one registry call and a
//! deterministic list of [`Outbound`] messages. It holds no state of its own
//! beyond the registry handle, so transports stay thin and the whole
//! protocol is testable without sockets.
//!
//! The registry sits behind one `std::sync::Mutex`. Every handler locks it,
//! performs the registry step and resolves broadcast recipients, and
//! releases the lock before returning — no handler awaits while holding it,
//! so each event is a single indivisible step with respect to concurrent
//! connections, and a recipient list always reflects a committed mutation.

use std::sync::{Mutex, PoisonError};

use tracing::debug;

use crate::protocol::{
    AckPayload, ClientEvent, ConnectionId, RejoinAck, RoomJoinedPayload, ServerEvent,
};
use crate::registry::{DisconnectOutcome, RegistryError, RoomRegistry};

// ── Outbound messages ───────────────────────────────────────────────

/// One message the transport layer must deliver after an event was handled.
///
/// Recipients are resolved connection ids, captured while the registry lock
/// was held, so delivery order can never get ahead of registry state.
#[derive(Debug, Clone)]
pub enum Outbound {
    /// Single-shot acknowledgment to the originating connection. Transports
    /// with native ack callbacks should use those; others wrap the payload
    /// in an [`ServerEvent::Ack`] frame.
    Ack(AckPayload),
    /// Event addressed to the originating connection.
    Reply(ServerEvent),
    /// Event addressed to an explicit set of connections.
    Broadcast {
        to: Vec<ConnectionId>,
        event: ServerEvent,
    },
}

// ── Coordinator ─────────────────────────────────────────────────────

/// Translates transport events into registry operations and outbound
/// messages.
#[derive(Debug, Default)]
pub struct SessionCoordinator {
    registry: Mutex<RoomRegistry>,
}

impl SessionCoordinator {
    /// Create a coordinator over a fresh, empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a coordinator over an existing registry, e.g. one pre-seeded
    /// by tests.
    pub fn with_registry(registry: RoomRegistry) -> Self {
        Self {
            registry: Mutex::new(registry),
        }
    }

    /// Handle one inbound event from `connection_id`.
    ///
    /// Returns the messages to deliver; an empty vector means the event was
    /// absorbed silently (e.g. `update-game-state` on a vanished room).
    pub fn handle_event(&self, connection_id: ConnectionId, event: ClientEvent) -> Vec<Outbound> {
        match event {
            ClientEvent::CreateRoom {
                room_name,
                room_pass,
                no_of_players,
                initial_game_state,
            } => self.create_room(
                connection_id,
                &room_name,
                &room_pass,
                no_of_players,
                initial_game_state,
            ),
            ClientEvent::JoinRoom {
                room_name,
                room_pass,
            } => self.join_room(connection_id, &room_name, &room_pass),
            ClientEvent::GameAction(action) => self.game_action(connection_id, action),
            ClientEvent::UpdateGameState {
                room_code,
                new_game_state,
            } => self.update_game_state(&room_code, new_game_state),
            ClientEvent::EndTurn { room_code } => self.end_turn(connection_id, &room_code),
            ClientEvent::RejoinRoom {
                player_id,
                room_code,
            } => self.rejoin_room(connection_id, &player_id, &room_code),
        }
    }

    /// Handle the transport's disconnect notification for `connection_id`.
    ///
    /// Never produces anything addressed to the departed connection itself.
    pub fn handle_disconnect(&self, connection_id: ConnectionId) -> Vec<Outbound> {
        let mut registry = self.lock();
        match registry.disconnect(connection_id) {
            DisconnectOutcome::NotInRoom => Vec::new(),
            DisconnectOutcome::Marked {
                room_deleted: true, ..
            } => Vec::new(),
            DisconnectOutcome::Marked {
                room_code,
                player_id,
                room_deleted: false,
            } => {
                let remaining = registry
                    .room(&room_code)
                    .map(|r| r.connected_members())
                    .unwrap_or_default();
                vec![Outbound::Broadcast {
                    to: remaining,
                    event: ServerEvent::PlayerDisconnected { player_id },
                }]
            }
        }
    }

    // ── Event handlers ──────────────────────────────────────────────

    fn create_room(
        &self,
        connection_id: ConnectionId,
        name: &str,
        passphrase: &str,
        capacity: usize,
        initial_game_state: serde_json::Value,
    ) -> Vec<Outbound> {
        let mut registry = self.lock();
        let created =
            match registry.create_room(name, passphrase, capacity, initial_game_state, connection_id)
            {
                Ok(created) => created,
                Err(e) => return vec![error_reply(&e)],
            };

        let (capacity, members, recipients) = match registry.room(&created.code) {
            Some(room) => (room.capacity, room.member_ids(), room.connected_members()),
            None => return Vec::new(),
        };

        vec![
            Outbound::Ack(AckPayload::RoomCode(created.code.clone())),
            Outbound::Reply(ServerEvent::RoomCreated {
                room_code: created.code,
            }),
            Outbound::Broadcast {
                to: recipients,
                event: ServerEvent::PlayerJoined {
                    occupancy: 1,
                    capacity,
                    players: members,
                },
            },
        ]
    }

    fn join_room(
        &self,
        connection_id: ConnectionId,
        name: &str,
        passphrase: &str,
    ) -> Vec<Outbound> {
        let mut registry = self.lock();
        let joined = match registry.join_room(name, passphrase, connection_id, None) {
            Ok(joined) => joined,
            Err(e) => {
                return vec![Outbound::Reply(ServerEvent::RoomError {
                    message: e.client_message().to_owned(),
                })]
            }
        };

        let (members, recipients) = match registry.room(&joined.code) {
            Some(room) => (room.member_ids(), room.connected_members()),
            None => return Vec::new(),
        };

        let mut out = vec![
            Outbound::Reply(ServerEvent::RoomJoined(Box::new(RoomJoinedPayload {
                room_code: joined.code,
                player_id: joined.player_id,
                occupancy: joined.occupancy,
                capacity: joined.capacity,
                game_state: joined.game_state,
            }))),
            Outbound::Broadcast {
                to: recipients.clone(),
                event: ServerEvent::PlayerJoined {
                    occupancy: joined.occupancy,
                    capacity: joined.capacity,
                    players: members,
                },
            },
        ];

        // The join that fills the last slot starts the game, exactly once.
        if joined.occupancy == joined.capacity {
            out.push(Outbound::Broadcast {
                to: recipients,
                event: ServerEvent::GameStart,
            });
        }

        out
    }

    fn game_action(&self, connection_id: ConnectionId, action: serde_json::Value) -> Vec<Outbound> {
        let mut registry = self.lock();
        let code = match registry.record_action(connection_id) {
            Ok(code) => code,
            Err(e) => return vec![error_reply(&e)],
        };

        let others = others_in(&registry, &code, connection_id);
        debug!(%code, recipients = others.len(), "relaying game action");
        vec![Outbound::Broadcast {
            to: others,
            event: ServerEvent::GameAction(action),
        }]
    }

    fn update_game_state(&self, room_code: &str, new_state: serde_json::Value) -> Vec<Outbound> {
        let mut registry = self.lock();
        // Idempotent no-op when the room has meanwhile been deleted.
        if registry.set_game_state(room_code, new_state).is_err() {
            debug!(code = %room_code, "update-game-state for absent room ignored");
        }
        Vec::new()
    }

    fn end_turn(&self, connection_id: ConnectionId, room_code: &str) -> Vec<Outbound> {
        let registry = self.lock();
        let Some(room) = registry.room(room_code) else {
            debug!(code = %room_code, "end-turn for absent room ignored");
            return Vec::new();
        };

        let game_state = room.game_state.clone();
        let others = room
            .connected_members()
            .into_iter()
            .filter(|c| *c != connection_id)
            .collect();
        vec![Outbound::Broadcast {
            to: others,
            event: ServerEvent::SyncGameState { game_state },
        }]
    }

    fn rejoin_room(
        &self,
        connection_id: ConnectionId,
        player_id: &str,
        room_code: &str,
    ) -> Vec<Outbound> {
        let mut registry = self.lock();
        if let Err(e) = registry.rejoin(player_id, room_code, connection_id) {
            return vec![Outbound::Ack(AckPayload::Rejoin(RejoinAck {
                success: false,
                reason: Some(e.client_message().to_owned()),
                room_data: None,
            }))];
        }

        // Rejoin just succeeded, so the room exists.
        let Some(room) = registry.room(room_code) else {
            return Vec::new();
        };
        let snapshot = room.snapshot();
        let others = room
            .connected_members()
            .into_iter()
            .filter(|c| *c != connection_id)
            .collect();

        vec![
            Outbound::Ack(AckPayload::Rejoin(RejoinAck {
                success: true,
                reason: None,
                room_data: Some(snapshot),
            })),
            Outbound::Broadcast {
                to: others,
                event: ServerEvent::PlayerReconnected {
                    player_id: player_id.to_owned(),
                },
            },
        ]
    }

    // ── Internal helpers ────────────────────────────────────────────

    /// Lock the registry, recovering from a poisoned mutex: the registry
    /// holds plain data, so a panicking writer cannot leave it in a state
    /// worse than any other interleaving.
    fn lock(&self) -> std::sync::MutexGuard<'_, RoomRegistry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Connected members of `code` excluding `sender`.
fn others_in(
    registry: &RoomRegistry,
    code: &str,
    sender: ConnectionId,
) -> Vec<ConnectionId> {
    registry
        .room(code)
        .map(|r| {
            r.connected_members()
                .into_iter()
                .filter(|c| *c != sender)
                .collect()
        })
        .unwrap_or_default()
}

/// Generic error reply addressed to the originating connection only.
fn error_reply(e: &RegistryError) -> Outbound {
    Outbound::Reply(ServerEvent::Error {
        message: e.client_message().to_owned(),
    })
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
    use uuid::Uuid;

    fn conn(n: u128) -> ConnectionId {
        Uuid::from_u128(n)
    }

    fn create_event(name: &str, capacity: usize) -> ClientEvent {
        ClientEvent::CreateRoom {
            room_name: name.into(),
            room_pass: "x".into(),
            no_of_players: capacity,
            initial_game_state: json!({"board": []}),
        }
    }

    fn join_event(name: &str, pass: &str) -> ClientEvent {
        ClientEvent::JoinRoom {
            room_name: name.into(),
            room_pass: pass.into(),
        }
    }

    /// Extract the acked room code from a create-room outcome.
    fn acked_code(out: &[Outbound]) -> String {
        out.iter()
            .find_map(|o| match o {
                Outbound::Ack(AckPayload::RoomCode(code)) => Some(code.clone()),
                _ => None,
            })
            .expect("create-room should ack a room code")
    }

    fn broadcasts<'a>(out: &'a [Outbound]) -> Vec<(&'a Vec<ConnectionId>, &'a ServerEvent)> {
        out.iter()
            .filter_map(|o| match o {
                Outbound::Broadcast { to, event } => Some((to, event)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn create_room_acks_replies_and_notifies() {
        let coordinator = SessionCoordinator::new();
        let out = coordinator.handle_event(conn(1), create_event("alpha", 2));

        assert_eq!(out.len(), 3);
        let code = acked_code(&out);
        assert!(matches!(
            &out[1],
            Outbound::Reply(ServerEvent::RoomCreated { room_code }) if *room_code == code
        ));
        match &out[2] {
            Outbound::Broadcast { to, event } => {
                assert_eq!(to, &vec![conn(1)]);
                match event {
                    ServerEvent::PlayerJoined {
                        occupancy,
                        capacity,
                        players,
                    } => {
                        assert_eq!(*occupancy, 1);
                        assert_eq!(*capacity, 2);
                        assert_eq!(players.len(), 1);
                    }
                    other => panic!("expected PlayerJoined, got {other:?}"),
                }
            }
            other => panic!("expected Broadcast, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_room_name_errors_to_creator_only() {
        let coordinator = SessionCoordinator::new();
        coordinator.handle_event(conn(1), create_event("alpha", 2));

        let out = coordinator.handle_event(conn(2), create_event("alpha", 2));
        assert_eq!(out.len(), 1);
        assert!(matches!(
            &out[0],
            Outbound::Reply(ServerEvent::Error { message }) if message.contains("already exists")
        ));
    }

    #[test]
    fn final_join_triggers_game_start_exactly_once() {
        let coordinator = SessionCoordinator::new();
        coordinator.handle_event(conn(1), create_event("alpha", 2));

        let out = coordinator.handle_event(conn(2), join_event("alpha", "x"));

        // room-joined reply, player-joined broadcast, game-start broadcast.
        assert!(matches!(
            &out[0],
            Outbound::Reply(ServerEvent::RoomJoined(payload))
                if payload.occupancy == 2 && payload.capacity == 2
        ));
        let casts = broadcasts(&out);
        assert_eq!(casts.len(), 2);
        assert!(matches!(casts[0].1, ServerEvent::PlayerJoined { occupancy: 2, .. }));
        assert!(matches!(casts[1].1, ServerEvent::GameStart));
        // Both go to the whole room, creator included.
        assert_eq!(casts[1].0.len(), 2);
        assert!(casts[1].0.contains(&conn(1)));
        assert!(casts[1].0.contains(&conn(2)));
    }

    #[test]
    fn join_past_capacity_reports_room_full() {
        let coordinator = SessionCoordinator::new();
        coordinator.handle_event(conn(1), create_event("alpha", 2));
        coordinator.handle_event(conn(2), join_event("alpha", "x"));

        let out = coordinator.handle_event(conn(3), join_event("alpha", "x"));
        assert_eq!(out.len(), 1);
        assert!(matches!(
            &out[0],
            Outbound::Reply(ServerEvent::RoomError { message }) if message == "room is full"
        ));
    }

    #[test]
    fn unknown_room_and_bad_passphrase_are_indistinguishable() {
        let coordinator = SessionCoordinator::new();
        coordinator.handle_event(conn(1), create_event("alpha", 4));

        let missing = coordinator.handle_event(conn(2), join_event("beta", "x"));
        let bad_pass = coordinator.handle_event(conn(2), join_event("alpha", "wrong"));

        let msg = |out: &[Outbound]| match out {
            [Outbound::Reply(ServerEvent::RoomError { message })] => message.clone(),
            other => panic!("expected a single RoomError reply, got {other:?}"),
        };
        assert_eq!(msg(&missing), msg(&bad_pass));
    }

    #[test]
    fn game_action_relays_to_everyone_but_the_sender() {
        let coordinator = SessionCoordinator::new();
        coordinator.handle_event(conn(1), create_event("alpha", 3));
        coordinator.handle_event(conn(2), join_event("alpha", "x"));
        coordinator.handle_event(conn(3), join_event("alpha", "x"));

        let action = json!({"move": "e4"});
        let out = coordinator.handle_event(conn(2), ClientEvent::GameAction(action.clone()));

        assert_eq!(out.len(), 1);
        match &out[0] {
            Outbound::Broadcast { to, event } => {
                assert_eq!(to.len(), 2);
                assert!(!to.contains(&conn(2)));
                assert!(matches!(event, ServerEvent::GameAction(a) if *a == action));
            }
            other => panic!("expected Broadcast, got {other:?}"),
        }
    }

    #[test]
    fn game_action_without_membership_errors_and_broadcasts_nothing() {
        let coordinator = SessionCoordinator::new();
        coordinator.handle_event(conn(1), create_event("alpha", 2));

        let out = coordinator.handle_event(conn(9), ClientEvent::GameAction(json!({})));
        assert_eq!(out.len(), 1);
        assert!(matches!(&out[0], Outbound::Reply(ServerEvent::Error { .. })));
    }

    #[test]
    fn update_game_state_is_silent_even_for_absent_rooms() {
        let coordinator = SessionCoordinator::new();
        let out = coordinator.handle_event(
            conn(1),
            ClientEvent::UpdateGameState {
                room_code: "ZZZZZZ".into(),
                new_game_state: json!({}),
            },
        );
        assert!(out.is_empty());
    }

    #[test]
    fn end_turn_syncs_state_to_other_members() {
        let coordinator = SessionCoordinator::new();
        let out = coordinator.handle_event(conn(1), create_event("alpha", 2));
        let code = acked_code(&out);
        coordinator.handle_event(conn(2), join_event("alpha", "x"));
        coordinator.handle_event(
            conn(1),
            ClientEvent::UpdateGameState {
                room_code: code.clone(),
                new_game_state: json!({"turn": 1}),
            },
        );

        let out = coordinator.handle_event(conn(1), ClientEvent::EndTurn { room_code: code });
        assert_eq!(out.len(), 1);
        match &out[0] {
            Outbound::Broadcast { to, event } => {
                assert_eq!(to, &vec![conn(2)]);
                assert!(matches!(
                    event,
                    ServerEvent::SyncGameState { game_state } if *game_state == json!({"turn": 1})
                ));
            }
            other => panic!("expected Broadcast, got {other:?}"),
        }
    }

    #[test]
    fn end_turn_for_absent_room_is_silent() {
        let coordinator = SessionCoordinator::new();
        let out = coordinator.handle_event(
            conn(1),
            ClientEvent::EndTurn {
                room_code: "ZZZZZZ".into(),
            },
        );
        assert!(out.is_empty());
    }

    #[test]
    fn disconnect_notifies_remaining_members() {
        let coordinator = SessionCoordinator::new();
        coordinator.handle_event(conn(1), create_event("alpha", 2));
        coordinator.handle_event(conn(2), join_event("alpha", "x"));

        let out = coordinator.handle_disconnect(conn(2));
        assert_eq!(out.len(), 1);
        match &out[0] {
            Outbound::Broadcast { to, event } => {
                assert_eq!(to, &vec![conn(1)]);
                assert!(matches!(event, ServerEvent::PlayerDisconnected { .. }));
            }
            other => panic!("expected Broadcast, got {other:?}"),
        }
    }

    #[test]
    fn disconnect_of_last_player_deletes_room_silently() {
        let coordinator = SessionCoordinator::new();
        let out = coordinator.handle_event(conn(1), create_event("alpha", 2));
        let code = acked_code(&out);

        let out = coordinator.handle_disconnect(conn(1));
        assert!(out.is_empty());

        // The code is gone — a rejoin attempt fails.
        let out = coordinator.handle_event(
            conn(2),
            ClientEvent::RejoinRoom {
                player_id: conn(1).to_string(),
                room_code: code,
            },
        );
        match &out[0] {
            Outbound::Ack(AckPayload::Rejoin(ack)) => {
                assert!(!ack.success);
                assert!(ack.reason.is_some());
                assert!(ack.room_data.is_none());
            }
            other => panic!("expected Rejoin ack, got {other:?}"),
        }
    }

    #[test]
    fn rejoin_acks_snapshot_and_notifies_others() {
        let coordinator = SessionCoordinator::new();
        let out = coordinator.handle_event(conn(1), create_event("alpha", 2));
        let code = acked_code(&out);
        coordinator.handle_event(conn(2), join_event("alpha", "x"));
        let player_id = conn(2).to_string();
        coordinator.handle_disconnect(conn(2));

        let out = coordinator.handle_event(
            conn(7),
            ClientEvent::RejoinRoom {
                player_id: player_id.clone(),
                room_code: code.clone(),
            },
        );

        assert_eq!(out.len(), 2);
        match &out[0] {
            Outbound::Ack(AckPayload::Rejoin(ack)) => {
                assert!(ack.success);
                let data = ack.room_data.as_ref().unwrap();
                assert_eq!(data.room_code, code);
                assert_eq!(data.occupancy, 2);
            }
            other => panic!("expected Rejoin ack, got {other:?}"),
        }
        match &out[1] {
            Outbound::Broadcast { to, event } => {
                assert_eq!(to, &vec![conn(1)]);
                assert!(matches!(
                    event,
                    ServerEvent::PlayerReconnected { player_id: p } if *p == player_id
                ));
            }
            other => panic!("expected Broadcast, got {other:?}"),
        }
    }

    #[test]
    fn disconnect_without_membership_produces_nothing() {
        let coordinator = SessionCoordinator::new();
        assert!(coordinator.handle_disconnect(conn(42)).is_empty());
    }
}
