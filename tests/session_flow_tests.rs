#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Session flow tests driving the coordinator directly.
//!
//! The coordinator is synchronous and deterministic, so multi-party flows
//! (which would be timing-dependent over real connections) are asserted
//! here step by step.

use roomcast::coordinator::Outbound;
use roomcast::protocol::{AckPayload, ClientEvent, ConnectionId, ServerEvent};
use roomcast::SessionCoordinator;
use serde_json::json;
use uuid::Uuid;

fn conn(n: u128) -> ConnectionId {
    Uuid::from_u128(n)
}

fn create(name: &str, pass: &str, capacity: usize) -> ClientEvent {
    ClientEvent::CreateRoom {
        room_name: name.into(),
        room_pass: pass.into(),
        no_of_players: capacity,
        initial_game_state: json!(null),
    }
}

fn join(name: &str, pass: &str) -> ClientEvent {
    ClientEvent::JoinRoom {
        room_name: name.into(),
        room_pass: pass.into(),
    }
}

fn acked_code(out: &[Outbound]) -> String {
    out.iter()
        .find_map(|o| match o {
            Outbound::Ack(AckPayload::RoomCode(code)) => Some(code.clone()),
            _ => None,
        })
        .expect("create-room should ack a room code")
}

fn count_game_starts(out: &[Outbound]) -> usize {
    out.iter()
        .filter(|o| matches!(o, Outbound::Broadcast { event: ServerEvent::GameStart, .. }))
        .count()
}

/// Create "alpha"/"x" with capacity 2, fill it, then overflow it.
#[test]
fn room_fills_starts_and_then_overflows() {
    let coordinator = SessionCoordinator::new();

    let out = coordinator.handle_event(conn(1), create("alpha", "x", 2));
    let code = acked_code(&out);
    assert!(!code.is_empty());

    let out = coordinator.handle_event(conn(2), join("alpha", "x"));
    match &out[0] {
        Outbound::Reply(ServerEvent::RoomJoined(payload)) => {
            assert_eq!(payload.room_code, code);
            assert_eq!(payload.occupancy, 2);
        }
        other => panic!("expected RoomJoined, got {other:?}"),
    }
    assert_eq!(count_game_starts(&out), 1);

    let out = coordinator.handle_event(conn(3), join("alpha", "x"));
    assert!(matches!(
        &out[0],
        Outbound::Reply(ServerEvent::RoomError { message }) if message == "room is full"
    ));
    assert_eq!(count_game_starts(&out), 0);
}

/// game-start fires exactly once across the room's whole lifetime, even
/// when a slot frees up logically via disconnect + rejoin.
#[test]
fn game_start_never_repeats_after_rejoin() {
    let coordinator = SessionCoordinator::new();
    let out = coordinator.handle_event(conn(1), create("alpha", "x", 2));
    let code = acked_code(&out);

    let out = coordinator.handle_event(conn(2), join("alpha", "x"));
    assert_eq!(count_game_starts(&out), 1);

    let player_id = conn(2).to_string();
    coordinator.handle_disconnect(conn(2));

    // The slot is retained, so rejoin reattaches rather than re-joining.
    let out = coordinator.handle_event(
        conn(4),
        ClientEvent::RejoinRoom {
            player_id,
            room_code: code,
        },
    );
    assert_eq!(count_game_starts(&out), 0);
    match &out[0] {
        Outbound::Ack(AckPayload::Rejoin(ack)) => assert!(ack.success),
        other => panic!("expected Rejoin ack, got {other:?}"),
    }
}

/// A full reconnection cycle: disconnect, rejoin under a new connection,
/// then act again.
#[test]
fn reconnection_cycle_restores_the_player() {
    let coordinator = SessionCoordinator::new();
    let out = coordinator.handle_event(conn(1), create("alpha", "x", 3));
    let code = acked_code(&out);
    coordinator.handle_event(conn(2), join("alpha", "x"));

    let player_id = conn(2).to_string();
    let out = coordinator.handle_disconnect(conn(2));
    assert!(matches!(
        &out[0],
        Outbound::Broadcast { event: ServerEvent::PlayerDisconnected { player_id: p }, .. }
            if *p == player_id
    ));

    // The stale connection can no longer act.
    let out = coordinator.handle_event(conn(2), ClientEvent::GameAction(json!({"x": 1})));
    assert!(matches!(&out[0], Outbound::Reply(ServerEvent::Error { .. })));

    // Rejoin under a fresh connection, then the action relays again.
    coordinator.handle_event(
        conn(9),
        ClientEvent::RejoinRoom {
            player_id,
            room_code: code,
        },
    );
    let out = coordinator.handle_event(conn(9), ClientEvent::GameAction(json!({"x": 2})));
    match &out[0] {
        Outbound::Broadcast { to, event } => {
            assert_eq!(to, &vec![conn(1)]);
            assert!(matches!(event, ServerEvent::GameAction(_)));
        }
        other => panic!("expected Broadcast, got {other:?}"),
    }
}

/// update-game-state then end-turn pushes the latest state to the other
/// members only.
#[test]
fn end_turn_reads_back_the_latest_state() {
    let coordinator = SessionCoordinator::new();
    let out = coordinator.handle_event(conn(1), create("alpha", "x", 2));
    let code = acked_code(&out);
    coordinator.handle_event(conn(2), join("alpha", "x"));

    coordinator.handle_event(
        conn(1),
        ClientEvent::UpdateGameState {
            room_code: code.clone(),
            new_game_state: json!({"scores": [3, 1]}),
        },
    );
    let out = coordinator.handle_event(conn(1), ClientEvent::EndTurn { room_code: code });

    match &out[0] {
        Outbound::Broadcast { to, event } => {
            assert_eq!(to, &vec![conn(2)]);
            assert!(matches!(
                event,
                ServerEvent::SyncGameState { game_state } if *game_state == json!({"scores": [3, 1]})
            ));
        }
        other => panic!("expected Broadcast, got {other:?}"),
    }
}

/// A connection that joins a second room is detached from the first: the
/// first room stops broadcasting to it, and once everyone else leaves the
/// first room is deleted and its name freed.
#[test]
fn joining_a_second_room_leaves_the_first() {
    let coordinator = SessionCoordinator::new();
    coordinator.handle_event(conn(1), create("alpha", "x", 3));
    coordinator.handle_event(conn(2), join("alpha", "x"));
    coordinator.handle_event(conn(3), create("beta", "x", 2));
    coordinator.handle_event(conn(2), join("beta", "x"));

    // Actions in alpha no longer reach the moved connection.
    let out = coordinator.handle_event(conn(1), ClientEvent::GameAction(json!({"move": "e4"})));
    match &out[0] {
        Outbound::Broadcast { to, .. } => assert!(!to.contains(&conn(2))),
        other => panic!("expected Broadcast, got {other:?}"),
    }

    // With conn 2 detached, conn 1 is alpha's last connected member;
    // its disconnect deletes the room and frees the name.
    coordinator.handle_disconnect(conn(1));
    let out = coordinator.handle_event(conn(4), create("alpha", "y", 2));
    assert!(!acked_code(&out).is_empty());
}

/// Room deletion frees the name for reuse; the old code stays dead.
#[test]
fn deleted_room_frees_its_name_but_not_its_code() {
    let coordinator = SessionCoordinator::new();
    let out = coordinator.handle_event(conn(1), create("alpha", "x", 1));
    let old_code = acked_code(&out);
    coordinator.handle_disconnect(conn(1));

    let out = coordinator.handle_event(conn(2), create("alpha", "y", 1));
    let new_code = acked_code(&out);
    assert_ne!(old_code, new_code);

    // Rejoin against the dead code still fails.
    let out = coordinator.handle_event(
        conn(3),
        ClientEvent::RejoinRoom {
            player_id: conn(1).to_string(),
            room_code: old_code,
        },
    );
    match &out[0] {
        Outbound::Ack(AckPayload::Rejoin(ack)) => assert!(!ack.success),
        other => panic!("expected Rejoin ack, got {other:?}"),
    }
}
