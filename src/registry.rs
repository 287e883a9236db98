//! Authoritative in-memory room registry.
//!
//! [`RoomRegistry`] owns every [`Room`] and [`Player`] record plus two
//! indices: the primary `code → Room` map and a reverse
//! `connectionId → roomCode` map used to resolve disconnects and actions
//! without scanning all rooms. It enforces the creation, capacity, and
//! identity invariants — including that a connection belongs to at most one
//! room at a time — and knows nothing about transports; the
//! [coordinator](crate::coordinator) translates its results into outbound
//! messages.
//!
//! Every operation is a synchronous `&mut self` step, so a caller holding
//! the registry behind a lock gets each operation as a single indivisible
//! unit with respect to any other registry operation.

use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::protocol::{ConnectionId, PlayerId, PlayerStatus, RoomCode, RoomData};

/// Length of generated room codes.
const ROOM_CODE_LEN: usize = 6;

// ── Errors ──────────────────────────────────────────────────────────

/// Recoverable domain failures surfaced to the originating connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// An active room already uses the requested display name.
    #[error("a room with that name already exists")]
    NameTaken,

    /// No room matches the given name or code.
    #[error("room not found")]
    RoomNotFound,

    /// The passphrase did not match.
    #[error("wrong passphrase")]
    BadCredentials,

    /// Every player slot is taken.
    #[error("room is full")]
    RoomFull,

    /// The connection or player id has no room membership.
    #[error("no room membership found")]
    PlayerNotFound,
}

impl RegistryError {
    /// Client-facing message for this failure.
    ///
    /// `RoomNotFound` and `BadCredentials` collapse into one string so a
    /// failed join never reveals whether a room with that name exists.
    pub fn client_message(&self) -> &'static str {
        match self {
            Self::RoomNotFound | Self::BadCredentials => "room not found or wrong passphrase",
            Self::NameTaken => "a room with that name already exists",
            Self::RoomFull => "room is full",
            Self::PlayerNotFound => "no room membership found",
        }
    }
}

// ── Records ─────────────────────────────────────────────────────────

/// One occupant's membership in a room.
///
/// `player_id` is the stable identity that survives reconnections;
/// `connection_id` is the transient transport identity and is `None` while
/// the player is disconnected. A player record is only ever removed as a
/// side effect of whole-room deletion.
#[derive(Debug, Clone)]
pub struct Player {
    pub player_id: PlayerId,
    pub connection_id: Option<ConnectionId>,
    pub disconnected: bool,
}

/// One active game session.
#[derive(Debug, Clone)]
pub struct Room {
    pub code: RoomCode,
    pub name: String,
    passphrase: String,
    pub capacity: usize,
    /// Members in join order. Disconnected players keep their slot.
    pub players: Vec<Player>,
    /// Opaque shared state; replaced wholesale, never interpreted.
    pub game_state: serde_json::Value,
}

impl Room {
    /// Number of player slots currently taken (connected or not).
    pub fn occupancy(&self) -> usize {
        self.players.len()
    }

    /// Stable ids of every member, in join order.
    pub fn member_ids(&self) -> Vec<PlayerId> {
        self.players.iter().map(|p| p.player_id.clone()).collect()
    }

    /// Connection ids of every currently connected member.
    pub fn connected_members(&self) -> Vec<ConnectionId> {
        self.players.iter().filter_map(|p| p.connection_id).collect()
    }

    /// Snapshot handed to rejoining players.
    pub fn snapshot(&self) -> RoomData {
        RoomData {
            room_code: self.code.clone(),
            occupancy: self.occupancy(),
            capacity: self.capacity,
            game_state: self.game_state.clone(),
            players: self
                .players
                .iter()
                .map(|p| PlayerStatus {
                    player_id: p.player_id.clone(),
                    disconnected: p.disconnected,
                })
                .collect(),
        }
    }
}

// ── Operation results ───────────────────────────────────────────────

/// Successful result of [`RoomRegistry::create_room`].
#[derive(Debug, Clone)]
pub struct CreatedRoom {
    pub code: RoomCode,
    /// Stable identity assigned to the creator.
    pub player_id: PlayerId,
}

/// Successful result of [`RoomRegistry::join_room`].
#[derive(Debug, Clone)]
pub struct JoinedRoom {
    pub code: RoomCode,
    /// Stable identity assigned to the joiner.
    pub player_id: PlayerId,
    pub occupancy: usize,
    pub capacity: usize,
    pub game_state: serde_json::Value,
}

/// Result of [`RoomRegistry::disconnect`].
#[derive(Debug, Clone)]
pub enum DisconnectOutcome {
    /// The connection had no room membership; nothing changed.
    NotInRoom,
    /// The matching player was marked disconnected.
    Marked {
        room_code: RoomCode,
        player_id: PlayerId,
        /// True when this was the last connected player and the room was
        /// garbage-collected.
        room_deleted: bool,
    },
}

// ── Registry ────────────────────────────────────────────────────────

/// The single-process, in-memory room store.
///
/// Create one instance at process start and pass it by handle into the
/// coordinator; it is deliberately not a global.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<RoomCode, Room>,
    /// Reverse index: which room does a live connection belong to.
    connections: HashMap<ConnectionId, RoomCode>,
}

impl RoomRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a room and join the creator as its first player.
    ///
    /// The display name must be unique among currently active rooms
    /// (case-sensitive). A capacity below 1 is clamped to 1 since the
    /// creator occupies a slot immediately. A creator that still holds
    /// membership elsewhere is first detached from that room as if it had
    /// disconnected.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NameTaken`] if an active room already uses
    /// the name.
    pub fn create_room(
        &mut self,
        name: &str,
        passphrase: &str,
        capacity: usize,
        initial_game_state: serde_json::Value,
        creator: ConnectionId,
    ) -> Result<CreatedRoom, RegistryError> {
        if self.rooms.values().any(|r| r.name == name) {
            debug!(name, "room name already taken");
            return Err(RegistryError::NameTaken);
        }

        let code = self.generate_code();
        self.detach_from_other_room(creator, &code);
        let player_id: PlayerId = creator.to_string();
        let room = Room {
            code: code.clone(),
            name: name.to_owned(),
            passphrase: passphrase.to_owned(),
            capacity: capacity.max(1),
            players: vec![Player {
                player_id: player_id.clone(),
                connection_id: Some(creator),
                disconnected: false,
            }],
            game_state: initial_game_state,
        };

        self.rooms.insert(code.clone(), room);
        self.connections.insert(creator, code.clone());
        info!(%code, name, capacity, "room created");

        Ok(CreatedRoom { code, player_id })
    }

    /// Join an active room by display name and passphrase.
    ///
    /// The new player's stable id is `player_id` if supplied, otherwise the
    /// textual connection id. A joiner that still holds membership in a
    /// different room is first detached from it as if it had disconnected;
    /// the detach only happens once the join is known to succeed.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::RoomNotFound`] if no active room has that
    /// name, [`RegistryError::BadCredentials`] on a passphrase mismatch, or
    /// [`RegistryError::RoomFull`] when every slot is taken. The first two
    /// share one client-facing message (see
    /// [`RegistryError::client_message`]).
    pub fn join_room(
        &mut self,
        name: &str,
        passphrase: &str,
        connection_id: ConnectionId,
        player_id: Option<PlayerId>,
    ) -> Result<JoinedRoom, RegistryError> {
        let code = {
            let room = self
                .rooms
                .values()
                .find(|r| r.name == name)
                .ok_or(RegistryError::RoomNotFound)?;

            if room.passphrase != passphrase {
                debug!(code = %room.code, "join rejected: bad passphrase");
                return Err(RegistryError::BadCredentials);
            }
            if room.players.len() == room.capacity {
                debug!(code = %room.code, "join rejected: room full");
                return Err(RegistryError::RoomFull);
            }
            room.code.clone()
        };

        self.detach_from_other_room(connection_id, &code);

        // The lookup above just produced this key, and the detach cannot
        // delete a room other than the one it detaches from.
        let room = self.rooms.get_mut(&code).ok_or(RegistryError::RoomNotFound)?;
        let player_id = player_id.unwrap_or_else(|| connection_id.to_string());
        room.players.push(Player {
            player_id: player_id.clone(),
            connection_id: Some(connection_id),
            disconnected: false,
        });
        let joined = JoinedRoom {
            code: code.clone(),
            player_id,
            occupancy: room.players.len(),
            capacity: room.capacity,
            game_state: room.game_state.clone(),
        };

        self.connections.insert(connection_id, code.clone());
        info!(%code, occupancy = joined.occupancy, capacity = joined.capacity, "player joined");

        Ok(joined)
    }

    /// Reattach a player to a room under a new connection id.
    ///
    /// Intentionally permissive: the player does not have to be in the
    /// disconnected state, which makes duplicate rejoin attempts idempotent.
    /// All other players and the game state are left untouched. If the new
    /// connection still holds membership in a different room, it is first
    /// detached from it as if it had disconnected.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::RoomNotFound`] if the code matches no active
    /// room, or [`RegistryError::PlayerNotFound`] if no member has that id.
    pub fn rejoin(
        &mut self,
        player_id: &str,
        room_code: &str,
        new_connection: ConnectionId,
    ) -> Result<(), RegistryError> {
        {
            let room = self
                .rooms
                .get(room_code)
                .ok_or(RegistryError::RoomNotFound)?;
            if !room.players.iter().any(|p| p.player_id == player_id) {
                return Err(RegistryError::PlayerNotFound);
            }
        }

        self.detach_from_other_room(new_connection, room_code);

        let room = self
            .rooms
            .get_mut(room_code)
            .ok_or(RegistryError::RoomNotFound)?;
        let player = room
            .players
            .iter_mut()
            .find(|p| p.player_id == player_id)
            .ok_or(RegistryError::PlayerNotFound)?;

        // A rejoin without a prior disconnect leaves a stale reverse-index
        // entry under the old connection id; drop it.
        let previous = player.connection_id.take();
        player.connection_id = Some(new_connection);
        player.disconnected = false;
        if let Some(old) = previous {
            if old != new_connection {
                self.connections.remove(&old);
            }
        }

        self.connections.insert(new_connection, room_code.to_owned());
        info!(code = %room_code, player_id, "player rejoined");

        Ok(())
    }

    /// Resolve the room an acting connection belongs to.
    ///
    /// The action payload itself is not stored; game-state changes travel
    /// through [`set_game_state`](Self::set_game_state) instead.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::PlayerNotFound`] if the connection has no
    /// membership, or [`RegistryError::RoomNotFound`] if the indexed room
    /// has meanwhile been deleted (the stale entry is dropped).
    pub fn record_action(
        &mut self,
        connection_id: ConnectionId,
    ) -> Result<RoomCode, RegistryError> {
        let code = self
            .connections
            .get(&connection_id)
            .cloned()
            .ok_or(RegistryError::PlayerNotFound)?;

        if !self.rooms.contains_key(&code) {
            // The room may have been legitimately garbage-collected between
            // operations; fall back to not-found rather than treating the
            // index as trustworthy.
            warn!(%code, %connection_id, "reverse index pointed at a deleted room");
            self.connections.remove(&connection_id);
            return Err(RegistryError::RoomNotFound);
        }

        Ok(code)
    }

    /// Replace a room's game state wholesale. Last writer wins; there is no
    /// merge or versioning.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::RoomNotFound`] if the code matches no active
    /// room.
    pub fn set_game_state(
        &mut self,
        room_code: &str,
        new_state: serde_json::Value,
    ) -> Result<(), RegistryError> {
        let room = self
            .rooms
            .get_mut(room_code)
            .ok_or(RegistryError::RoomNotFound)?;
        room.game_state = new_state;
        debug!(code = %room_code, "game state replaced");
        Ok(())
    }

    /// Handle a connection teardown.
    ///
    /// Marks the matching player disconnected but keeps its record so it can
    /// rejoin. When the last connected player leaves, the room is deleted
    /// and its name becomes available again. The reverse-index entry is
    /// removed in every case.
    pub fn disconnect(&mut self, connection_id: ConnectionId) -> DisconnectOutcome {
        let Some(code) = self.connections.remove(&connection_id) else {
            return DisconnectOutcome::NotInRoom;
        };
        let Some(room) = self.rooms.get_mut(&code) else {
            warn!(%code, %connection_id, "reverse index pointed at a deleted room");
            return DisconnectOutcome::NotInRoom;
        };
        let Some(player) = room
            .players
            .iter_mut()
            .find(|p| p.connection_id == Some(connection_id))
        else {
            warn!(%code, %connection_id, "indexed room has no matching player");
            return DisconnectOutcome::NotInRoom;
        };

        player.disconnected = true;
        player.connection_id = None;
        let player_id = player.player_id.clone();
        debug!(%code, player_id, "player disconnected");

        let room_deleted = room.players.iter().all(|p| p.disconnected);
        if room_deleted {
            self.rooms.remove(&code);
            info!(%code, "room deleted: all players disconnected");
        }

        DisconnectOutcome::Marked {
            room_code: code,
            player_id,
            room_deleted,
        }
    }

    /// Look up an active room by code.
    pub fn room(&self, code: &str) -> Option<&Room> {
        self.rooms.get(code)
    }

    /// Number of active rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Detach a connection from any room other than `new_code` before it
    /// takes on a new membership.
    ///
    /// The reverse index maps each connection to at most one room, so a
    /// connection that creates, joins, or rejoins elsewhere while its old
    /// membership is still live goes through the full disconnect path first:
    /// its old player slot is marked disconnected and the all-disconnected
    /// room GC runs. Without this, the old room would keep broadcasting to a
    /// connection that no longer belongs to it and could never be deleted.
    fn detach_from_other_room(&mut self, connection_id: ConnectionId, new_code: &str) {
        if self
            .connections
            .get(&connection_id)
            .is_some_and(|code| code.as_str() != new_code)
        {
            warn!(%connection_id, "connection switching rooms, detaching old membership");
            self.disconnect(connection_id);
        }
    }

    /// Allocate a room code no active room is using.
    ///
    /// Codes are six uppercase hex characters drawn from a v4 UUID; on the
    /// vanishingly rare collision we simply draw again.
    fn generate_code(&self) -> RoomCode {
        loop {
            let candidate: RoomCode = Uuid::new_v4()
                .simple()
                .to_string()
                .chars()
                .take(ROOM_CODE_LEN)
                .collect::<String>()
                .to_ascii_uppercase();
            if !self.rooms.contains_key(&candidate) {
                return candidate;
            }
        }
    }
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

    fn conn(n: u128) -> ConnectionId {
        Uuid::from_u128(n)
    }

    fn create(reg: &mut RoomRegistry, name: &str, capacity: usize, creator: u128) -> CreatedRoom {
        reg.create_room(name, "pass", capacity, json!(null), conn(creator))
            .unwrap()
    }

    #[test]
    fn create_room_joins_the_creator() {
        let mut reg = RoomRegistry::new();
        let created = create(&mut reg, "alpha", 2, 1);

        let room = reg.room(&created.code).unwrap();
        assert_eq!(room.occupancy(), 1);
        assert_eq!(room.capacity, 2);
        assert_eq!(room.players[0].player_id, created.player_id);
        assert_eq!(room.players[0].connection_id, Some(conn(1)));
        assert!(!room.players[0].disconnected);
    }

    #[test]
    fn room_codes_are_unique_and_six_chars() {
        let mut reg = RoomRegistry::new();
        let mut codes = std::collections::HashSet::new();
        for i in 0..50 {
            let created = create(&mut reg, &format!("room-{i}"), 4, i as u128);
            assert_eq!(created.code.len(), ROOM_CODE_LEN);
            assert!(codes.insert(created.code));
        }
    }

    #[test]
    fn duplicate_name_fails_while_room_is_active() {
        let mut reg = RoomRegistry::new();
        create(&mut reg, "alpha", 2, 1);

        let err = reg
            .create_room("alpha", "other", 4, json!(null), conn(2))
            .unwrap_err();
        assert_eq!(err, RegistryError::NameTaken);
    }

    #[test]
    fn name_becomes_available_after_room_deletion() {
        let mut reg = RoomRegistry::new();
        create(&mut reg, "alpha", 2, 1);

        // Sole player disconnects — room is garbage-collected.
        match reg.disconnect(conn(1)) {
            DisconnectOutcome::Marked { room_deleted, .. } => assert!(room_deleted),
            other => panic!("expected Marked, got {other:?}"),
        }
        assert_eq!(reg.room_count(), 0);

        assert!(reg
            .create_room("alpha", "pass", 2, json!(null), conn(2))
            .is_ok());
    }

    #[test]
    fn join_succeeds_with_matching_credentials() {
        let mut reg = RoomRegistry::new();
        let created = create(&mut reg, "alpha", 3, 1);

        let joined = reg.join_room("alpha", "pass", conn(2), None).unwrap();
        assert_eq!(joined.code, created.code);
        assert_eq!(joined.occupancy, 2);
        assert_eq!(joined.capacity, 3);
        assert_eq!(joined.player_id, conn(2).to_string());
    }

    #[test]
    fn join_honors_an_external_player_id() {
        let mut reg = RoomRegistry::new();
        create(&mut reg, "alpha", 3, 1);

        let joined = reg
            .join_room("alpha", "pass", conn(2), Some("steam:123".into()))
            .unwrap();
        assert_eq!(joined.player_id, "steam:123");
    }

    #[test]
    fn join_fails_for_unknown_name_and_wrong_passphrase() {
        let mut reg = RoomRegistry::new();
        create(&mut reg, "alpha", 2, 1);

        let not_found = reg.join_room("beta", "pass", conn(2), None).unwrap_err();
        assert_eq!(not_found, RegistryError::RoomNotFound);

        let bad_pass = reg.join_room("alpha", "nope", conn(2), None).unwrap_err();
        assert_eq!(bad_pass, RegistryError::BadCredentials);

        // Both collapse to the same client-facing message.
        assert_eq!(not_found.client_message(), bad_pass.client_message());
    }

    #[test]
    fn join_fails_once_capacity_is_reached() {
        let mut reg = RoomRegistry::new();
        create(&mut reg, "alpha", 2, 1);
        reg.join_room("alpha", "pass", conn(2), None).unwrap();

        let err = reg.join_room("alpha", "pass", conn(3), None).unwrap_err();
        assert_eq!(err, RegistryError::RoomFull);

        // The invariant held throughout.
        let room = reg.rooms.values().next().unwrap();
        assert!(room.occupancy() <= room.capacity);
    }

    #[test]
    fn disconnected_players_still_occupy_their_slot() {
        let mut reg = RoomRegistry::new();
        create(&mut reg, "alpha", 2, 1);
        reg.join_room("alpha", "pass", conn(2), None).unwrap();
        reg.disconnect(conn(2));

        // The slot is retained for rejoin, so the room is still full.
        let err = reg.join_room("alpha", "pass", conn(3), None).unwrap_err();
        assert_eq!(err, RegistryError::RoomFull);
    }

    #[test]
    fn capacity_below_one_is_clamped() {
        let mut reg = RoomRegistry::new();
        let created = reg
            .create_room("solo", "pass", 0, json!(null), conn(1))
            .unwrap();
        assert_eq!(reg.room(&created.code).unwrap().capacity, 1);
    }

    #[test]
    fn disconnect_of_one_of_two_players_keeps_the_room() {
        let mut reg = RoomRegistry::new();
        let created = create(&mut reg, "alpha", 2, 1);
        reg.join_room("alpha", "pass", conn(2), None).unwrap();

        match reg.disconnect(conn(2)) {
            DisconnectOutcome::Marked {
                room_code,
                room_deleted,
                ..
            } => {
                assert_eq!(room_code, created.code);
                assert!(!room_deleted);
            }
            other => panic!("expected Marked, got {other:?}"),
        }

        let room = reg.room(&created.code).unwrap();
        assert_eq!(room.occupancy(), 2);
        assert!(room.players[1].disconnected);
        assert!(room.players[1].connection_id.is_none());
    }

    #[test]
    fn disconnect_without_membership_is_a_noop() {
        let mut reg = RoomRegistry::new();
        create(&mut reg, "alpha", 2, 1);

        assert!(matches!(
            reg.disconnect(conn(99)),
            DisconnectOutcome::NotInRoom
        ));
        assert_eq!(reg.room_count(), 1);
    }

    #[test]
    fn rejoin_restores_connection_and_clears_disconnected() {
        let mut reg = RoomRegistry::new();
        let created = create(&mut reg, "alpha", 2, 1);
        let joined = reg.join_room("alpha", "pass", conn(2), None).unwrap();
        reg.disconnect(conn(2));

        reg.rejoin(&joined.player_id, &created.code, conn(7)).unwrap();

        let room = reg.room(&created.code).unwrap();
        let player = room
            .players
            .iter()
            .find(|p| p.player_id == joined.player_id)
            .unwrap();
        assert!(!player.disconnected);
        assert_eq!(player.connection_id, Some(conn(7)));

        // The new connection resolves back to the room.
        assert_eq!(reg.record_action(conn(7)).unwrap(), created.code);
    }

    #[test]
    fn rejoin_after_room_deletion_fails() {
        let mut reg = RoomRegistry::new();
        let created = create(&mut reg, "alpha", 1, 1);
        let player_id = created.player_id.clone();
        reg.disconnect(conn(1));

        let err = reg.rejoin(&player_id, &created.code, conn(2)).unwrap_err();
        assert_eq!(err, RegistryError::RoomNotFound);
    }

    #[test]
    fn rejoin_with_unknown_player_fails() {
        let mut reg = RoomRegistry::new();
        let created = create(&mut reg, "alpha", 2, 1);

        let err = reg.rejoin("ghost", &created.code, conn(2)).unwrap_err();
        assert_eq!(err, RegistryError::PlayerNotFound);
    }

    #[test]
    fn rejoin_without_prior_disconnect_is_permitted() {
        let mut reg = RoomRegistry::new();
        let created = create(&mut reg, "alpha", 2, 1);

        // The creator never disconnected but reattaches under a new
        // connection anyway.
        reg.rejoin(&created.player_id, &created.code, conn(5)).unwrap();

        // The old connection's index entry is gone, the new one resolves.
        assert_eq!(
            reg.record_action(conn(1)).unwrap_err(),
            RegistryError::PlayerNotFound
        );
        assert_eq!(reg.record_action(conn(5)).unwrap(), created.code);
    }

    #[test]
    fn joining_another_room_detaches_the_old_membership() {
        let mut reg = RoomRegistry::new();
        let first = create(&mut reg, "alpha", 3, 1);
        reg.join_room("alpha", "pass", conn(2), None).unwrap();
        create(&mut reg, "beta", 2, 3);

        let joined = reg.join_room("beta", "pass", conn(2), None).unwrap();

        // The old slot is kept but marked disconnected, so alpha's
        // broadcasts no longer target the moved connection.
        let old_room = reg.room(&first.code).unwrap();
        let moved = old_room
            .players
            .iter()
            .find(|p| p.player_id == conn(2).to_string())
            .unwrap();
        assert!(moved.disconnected);
        assert!(moved.connection_id.is_none());
        assert!(!old_room.connected_members().contains(&conn(2)));

        // The reverse index points at the new room only.
        assert_eq!(reg.record_action(conn(2)).unwrap(), joined.code);
    }

    #[test]
    fn switching_rooms_garbage_collects_an_emptied_room() {
        let mut reg = RoomRegistry::new();
        create(&mut reg, "alpha", 1, 1);
        create(&mut reg, "beta", 2, 2);

        // The sole alpha member creates elsewhere; alpha must be deleted
        // and its name freed, not left with a phantom connected player.
        reg.join_room("beta", "pass", conn(1), None).unwrap();
        assert_eq!(reg.room_count(), 1);
        assert!(reg
            .create_room("alpha", "pass", 2, json!(null), conn(3))
            .is_ok());
    }

    #[test]
    fn rejoining_into_another_room_detaches_the_old_membership() {
        let mut reg = RoomRegistry::new();
        let first = create(&mut reg, "alpha", 2, 1);
        reg.join_room("alpha", "pass", conn(2), None).unwrap();
        let second = create(&mut reg, "beta", 2, 3);
        reg.join_room("beta", "pass", conn(4), None).unwrap();
        reg.disconnect(conn(3));

        // conn 2 reattaches to beta's creator slot while still live in
        // alpha.
        reg.rejoin(&second.player_id, &second.code, conn(2)).unwrap();

        let old_room = reg.room(&first.code).unwrap();
        assert!(!old_room.connected_members().contains(&conn(2)));
        assert_eq!(reg.record_action(conn(2)).unwrap(), second.code);
    }

    #[test]
    fn failed_join_leaves_the_old_membership_alone() {
        let mut reg = RoomRegistry::new();
        let first = create(&mut reg, "alpha", 2, 1);
        reg.join_room("alpha", "pass", conn(2), None).unwrap();
        create(&mut reg, "beta", 1, 3);

        // beta is full, so the join fails and conn 2 stays in alpha.
        let err = reg.join_room("beta", "pass", conn(2), None).unwrap_err();
        assert_eq!(err, RegistryError::RoomFull);
        assert!(reg
            .room(&first.code)
            .unwrap()
            .connected_members()
            .contains(&conn(2)));
        assert_eq!(reg.record_action(conn(2)).unwrap(), first.code);
    }

    #[test]
    fn record_action_without_membership_fails() {
        let mut reg = RoomRegistry::new();
        let err = reg.record_action(conn(1)).unwrap_err();
        assert_eq!(err, RegistryError::PlayerNotFound);
    }

    #[test]
    fn set_game_state_replaces_wholesale() {
        let mut reg = RoomRegistry::new();
        let created = reg
            .create_room("alpha", "pass", 2, json!({"a": 1}), conn(1))
            .unwrap();

        reg.set_game_state(&created.code, json!({"b": 2})).unwrap();
        assert_eq!(reg.room(&created.code).unwrap().game_state, json!({"b": 2}));

        let err = reg.set_game_state("ZZZZZZ", json!(null)).unwrap_err();
        assert_eq!(err, RegistryError::RoomNotFound);
    }

    #[test]
    fn snapshot_reflects_membership_and_state() {
        let mut reg = RoomRegistry::new();
        let created = reg
            .create_room("alpha", "pass", 2, json!({"turn": 1}), conn(1))
            .unwrap();
        reg.join_room("alpha", "pass", conn(2), None).unwrap();
        reg.disconnect(conn(2));

        let snapshot = reg.room(&created.code).unwrap().snapshot();
        assert_eq!(snapshot.room_code, created.code);
        assert_eq!(snapshot.occupancy, 2);
        assert_eq!(snapshot.capacity, 2);
        assert_eq!(snapshot.game_state, json!({"turn": 1}));
        assert!(!snapshot.players[0].disconnected);
        assert!(snapshot.players[1].disconnected);
    }
}
