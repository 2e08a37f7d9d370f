//! Room Registry operations: list, create, fetch and delete rooms.

use rand::{Rng, rng};
use tracing::info;
use uuid::Uuid;
use validator::ValidationError;

use crate::{
    dao::models::UserEntity,
    dto::{
        room::{RoomSnapshot, RoomSummary},
        validation::{validate_room_name, validate_room_password},
    },
    error::ServiceError,
    services::{gateway, ws_events},
    state::{ConnectionId, SharedState, room::RoomSession},
};

const ACCESS_CODE_LENGTH: usize = 8;
const ACCESS_CODE_ALPHABET: &[u8] = b"abcdefghjkmnpqrstuvwxyz23456789";

/// Snapshot of all active rooms, used to populate a new connection's view.
pub async fn list_rooms(state: &SharedState) -> Vec<RoomSummary> {
    let mut summaries = Vec::new();
    for handle in state.directory().handles() {
        let room = handle.lock().await;
        summaries.push(RoomSummary::from(&*room));
    }
    summaries
}

/// Create a room on behalf of `user`, announce it globally and confirm it to
/// the creating connection.
pub async fn create_room(
    state: &SharedState,
    creator: ConnectionId,
    user: &UserEntity,
    name: String,
    event: String,
    password: Option<String>,
) -> Result<RoomSummary, ServiceError> {
    validate_room_name(&name).map_err(invalid_input)?;
    if let Some(password) = password.as_deref() {
        validate_room_password(password).map_err(invalid_input)?;
    }
    if !state.config().supports_event(&event) {
        return Err(ServiceError::InvalidInput(format!(
            "unknown puzzle event `{event}`"
        )));
    }

    let store = state.require_room_store().await?;

    let password_hash = password.as_deref().map(gateway::hash_password).transpose()?;
    let access_code = generate_access_code(state);
    let session = RoomSession::new(name, event, access_code, password_hash);

    store.save_room(session.to_entity()).await?;

    let summary = RoomSummary::from(&session);
    state.directory().insert(session);

    info!(
        room_id = %summary.id,
        user_id = %user.id,
        private = summary.private,
        "room created"
    );
    ws_events::announce_room_created(state, creator, summary.clone());

    Ok(summary)
}

/// Unicast snapshot of a room by id.
pub async fn fetch_room(state: &SharedState, id: Uuid) -> Result<RoomSnapshot, ServiceError> {
    let handle = state
        .directory()
        .by_id(id)
        .ok_or_else(|| ServiceError::NotFound(format!("could not find room with id `{id}`")))?;
    let room = handle.lock().await;
    Ok(RoomSnapshot::from(&*room))
}

/// Delete a room. Only the room's current admin may do this, and only for the
/// room they are currently in.
pub async fn delete_room(
    state: &SharedState,
    user: &UserEntity,
    current_room: Option<Uuid>,
    id: Uuid,
) -> Result<(), ServiceError> {
    if current_room != Some(id) {
        return Err(ServiceError::Unauthorized(
            "must be admin of your own room".into(),
        ));
    }

    let handle = state
        .directory()
        .by_id(id)
        .ok_or_else(|| ServiceError::NotFound(format!("could not find room with id `{id}`")))?;

    let room = handle.lock().await;
    if !room.is_admin(user.id) {
        return Err(ServiceError::Unauthorized("must be admin of room".into()));
    }

    let store = state.require_room_store().await?;
    store.delete_room(id).await?;

    state.directory().remove(id, &room.access_code);
    state.hub().drop_topic(id);
    info!(room_id = %id, user_id = %user.id, "room deleted");
    ws_events::announce_room_deleted(state, id);

    Ok(())
}

/// Surface a field validation failure with its human readable message.
fn invalid_input(err: ValidationError) -> ServiceError {
    let message = err
        .message
        .as_ref()
        .map(|message| message.to_string())
        .unwrap_or_else(|| err.code.to_string());
    ServiceError::InvalidInput(message)
}

/// Produce an access code that no active room is using.
fn generate_access_code(state: &SharedState) -> String {
    loop {
        let mut rng = rng();
        let code: String = (0..ACCESS_CODE_LENGTH)
            .map(|_| {
                let index = rng.random_range(0..ACCESS_CODE_ALPHABET.len());
                ACCESS_CODE_ALPHABET[index] as char
            })
            .collect();
        if !state.directory().contains_code(&code) {
            return code;
        }
    }
}
