//! Helpers translating coordinator outcomes into outbound server messages.
//!
//! Each helper picks the delivery scope the event belongs to: unicast back to
//! the originating connection, the room topic (with or without the
//! originator), or every connection on the server.

use uuid::Uuid;

use crate::{
    dto::{
        room::{AttemptView, MemberView, ResultPayload, RoomSnapshot, RoomSummary},
        ws::ServerMessage,
    },
    state::{ConnectionId, SharedState, room::RoomSession},
};

/// Send the initial room list to a freshly attached connection.
pub fn unicast_room_list(state: &SharedState, connection: ConnectionId, rooms: Vec<RoomSummary>) {
    state
        .hub()
        .unicast(connection, &ServerMessage::RoomList { rooms });
}

/// Announce a new room to every connection, and confirm it to the creator.
pub fn announce_room_created(state: &SharedState, creator: ConnectionId, room: RoomSummary) {
    state.hub().broadcast_global(&ServerMessage::RoomCreated {
        room: room.clone(),
    });
    state
        .hub()
        .unicast(creator, &ServerMessage::RoomCreated { room });
}

/// Announce a room deletion to every connection.
pub fn announce_room_deleted(state: &SharedState, id: Uuid) {
    state
        .hub()
        .broadcast_global(&ServerMessage::RoomDeleted { id });
}

/// Confirm a join with the full room snapshot.
pub fn unicast_joined(state: &SharedState, connection: ConnectionId, room: &RoomSession) {
    state.hub().unicast(
        connection,
        &ServerMessage::Joined { room: room.into() },
    );
}

/// Answer a fetch request with a room snapshot.
pub fn unicast_room_snapshot(state: &SharedState, connection: ConnectionId, room: RoomSnapshot) {
    state
        .hub()
        .unicast(connection, &ServerMessage::RoomUpdate { room });
}

/// Tell existing members that someone joined; the joiner gets the snapshot
/// instead.
pub fn broadcast_user_joined(
    state: &SharedState,
    room_id: Uuid,
    joiner: ConnectionId,
    user: MemberView,
) {
    state
        .hub()
        .broadcast_room(room_id, &ServerMessage::UserJoined { user }, Some(joiner));
}

/// Tell remaining members that someone left.
pub fn broadcast_user_left(state: &SharedState, room_id: Uuid, user_id: Uuid) {
    state
        .hub()
        .broadcast_room(room_id, &ServerMessage::UserLeft { user_id }, None);
}

/// Tell every member, the new admin included, that the role moved.
pub fn broadcast_admin_changed(state: &SharedState, room_id: Uuid, user_id: Uuid) {
    state
        .hub()
        .broadcast_room(room_id, &ServerMessage::AdminChanged { user_id }, None);
}

/// Push a submitted result to every member of the room.
pub fn broadcast_new_result(
    state: &SharedState,
    room_id: Uuid,
    attempt: u32,
    user_id: Uuid,
    result: ResultPayload,
) {
    state.hub().broadcast_room(
        room_id,
        &ServerMessage::NewResult {
            attempt,
            user_id,
            result,
        },
        None,
    );
}

/// Push a freshly generated attempt to every member of the room.
pub fn broadcast_new_attempt(state: &SharedState, room_id: Uuid, attempt: AttemptView) {
    state
        .hub()
        .broadcast_room(room_id, &ServerMessage::NewAttempt { attempt }, None);
}

/// Report a terminal failure to the originating connection only.
pub fn unicast_error(
    state: &SharedState,
    connection: ConnectionId,
    status_code: u16,
    event: Option<&str>,
    message: String,
) {
    state.hub().unicast(
        connection,
        &ServerMessage::Error {
            status_code,
            event: event.map(str::to_owned),
            message,
        },
    );
}
