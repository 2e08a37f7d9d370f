//! Room session coordinator: join, leave, result submission and the attempt
//! lifecycle.
//!
//! Every mutation of a room happens under that room's lock, which stays held
//! through the store save, any attempt generation, and the construction and
//! enqueueing of the broadcast payloads. Events for one room therefore reach
//! subscribers in mutation commit order, while unrelated rooms proceed
//! concurrently.

use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dao::models::UserEntity,
    dto::room::ResultPayload,
    error::ServiceError,
    services::{gateway, scramble, ws_events},
    state::{
        ConnectionId, SharedState,
        room::{RoomSession, RoomStateError},
    },
};

/// Per-connection state owned by the connection's socket task.
#[derive(Debug)]
pub struct ConnectionContext {
    /// Identifier of the underlying connection.
    pub id: ConnectionId,
    /// Identity attached by the gateway; `None` means anonymous.
    pub user: Option<UserEntity>,
    /// Room the connection is currently in, if any.
    pub room_id: Option<Uuid>,
}

impl ConnectionContext {
    /// Context for a freshly attached connection, not yet in any room.
    pub fn new(id: ConnectionId, user: Option<UserEntity>) -> Self {
        Self {
            id,
            user,
            room_id: None,
        }
    }
}

/// Join a room by access code.
///
/// Authenticated joiners become members (and admin, when the room has none);
/// anonymous joiners are subscribed as observers and only receive the
/// snapshot. Joining a private room requires the correct password.
pub async fn join_room(
    state: &SharedState,
    ctx: &mut ConnectionContext,
    access_code: &str,
    password: Option<&str>,
) -> Result<(), ServiceError> {
    let handle = state.directory().by_access_code(access_code).ok_or_else(|| {
        ServiceError::NotFound(format!("could not find room with access code `{access_code}`"))
    })?;

    // A connection can only be in one room; switching rooms leaves the old one.
    if let Some(previous) = ctx.room_id {
        let mut room = handle.lock().await;
        if previous == room.id {
            ws_events::unicast_joined(state, ctx.id, &room);
            return Ok(());
        }
        drop(room);
        leave_room(state, ctx).await?;
    }

    let mut room = handle.lock().await;

    if room.private {
        let stored = room.password_hash.as_deref().unwrap_or_default();
        let supplied = password.unwrap_or_default();
        if !gateway::verify_password(supplied, stored) {
            return Err(ServiceError::Unauthorized(format!(
                "wrong password for room `{}`",
                room.name
            )));
        }
    }

    state.hub().subscribe(room.id, ctx.id);
    ctx.room_id = Some(room.id);

    let Some(user) = ctx.user.clone() else {
        // Observers still get the data, they just never appear in membership.
        ws_events::unicast_joined(state, ctx.id, &room);
        return Ok(());
    };

    let everyone_was_done = room.all_done();
    let outcome = room.join(user.clone());
    room.touch();
    save_room(state, &room).await?;

    if let Some(member) = room.members().get(&user.id) {
        ws_events::broadcast_user_joined(state, room.id, ctx.id, member.into());
    }
    ws_events::unicast_joined(state, ctx.id, &room);
    if outcome.became_admin {
        ws_events::broadcast_admin_changed(state, room.id, user.id);
    }
    info!(room_id = %room.id, user_id = %user.id, "user joined room");

    // A fresh room needs its first attempt; otherwise the joiner is not asked
    // to catch up on an attempt everyone else already finished.
    if room.needs_initial_attempt() || everyone_was_done {
        generate_attempt(state, &mut room).await?;
    }

    Ok(())
}

/// Leave the current room, explicitly or on disconnect.
pub async fn leave_room(
    state: &SharedState,
    ctx: &mut ConnectionContext,
) -> Result<(), ServiceError> {
    let Some(room_id) = ctx.room_id.take() else {
        return Err(ServiceError::Unauthorized("must be in a room".into()));
    };

    state.hub().unsubscribe(room_id, ctx.id);

    let Some(handle) = state.directory().by_id(room_id) else {
        // Room was deleted while we were in it; nothing left to clean up.
        return Ok(());
    };
    let mut room = handle.lock().await;

    let Some(user) = ctx.user.as_ref() else {
        return Ok(());
    };
    let Some(outcome) = room.leave(user.id) else {
        return Ok(());
    };

    room.touch();
    save_room(state, &room).await?;

    ws_events::broadcast_user_left(state, room.id, user.id);
    if let Some(new_admin) = outcome.new_admin {
        ws_events::broadcast_admin_changed(state, room.id, new_admin);
    }
    info!(room_id = %room.id, user_id = %user.id, "user left room");

    // Removing a member who had not submitted can complete the attempt for
    // everyone remaining.
    if room.all_done() {
        generate_attempt(state, &mut room).await?;
    }

    Ok(())
}

/// Upsert a member's result for one attempt and fan it out to the room.
pub async fn submit_result(
    state: &SharedState,
    ctx: &ConnectionContext,
    attempt_id: u32,
    payload: ResultPayload,
) -> Result<(), ServiceError> {
    let user = ctx
        .user
        .as_ref()
        .ok_or_else(|| ServiceError::Unauthorized("must be logged in".into()))?;
    let room_id = ctx
        .room_id
        .ok_or_else(|| ServiceError::Unauthorized("must be in a room".into()))?;

    let handle = state
        .directory()
        .by_id(room_id)
        .ok_or_else(|| ServiceError::NotFound(format!("could not find room with id `{room_id}`")))?;
    let mut room = handle.lock().await;

    room.record_result(attempt_id, user.id, payload.clone().into())
        .map_err(|err| match err {
            RoomStateError::UnknownAttempt { .. } => ServiceError::InvalidInput(err.to_string()),
            RoomStateError::NotMember { .. } => ServiceError::Unauthorized(err.to_string()),
        })?;

    room.touch();
    save_room(state, &room).await?;

    ws_events::broadcast_new_result(state, room.id, attempt_id, user.id, payload);

    if room.all_done() {
        generate_attempt(state, &mut room).await?;
    }

    Ok(())
}

/// Admin override: force a fresh attempt without waiting for everyone.
pub async fn request_new_attempt(
    state: &SharedState,
    ctx: &ConnectionContext,
) -> Result<(), ServiceError> {
    let user = ctx
        .user
        .as_ref()
        .ok_or_else(|| ServiceError::Unauthorized("must be logged in".into()))?;
    let room_id = ctx
        .room_id
        .ok_or_else(|| ServiceError::Unauthorized("must be in a room".into()))?;

    let handle = state
        .directory()
        .by_id(room_id)
        .ok_or_else(|| ServiceError::NotFound(format!("could not find room with id `{room_id}`")))?;
    let mut room = handle.lock().await;

    if !room.is_admin(user.id) {
        return Err(ServiceError::Unauthorized("must be admin of room".into()));
    }

    // An untouched attempt is already the freshest possible state; a second
    // trigger racing the automatic one must not stack another scramble.
    if room
        .current_attempt()
        .is_some_and(|attempt| attempt.results.is_empty())
    {
        debug!(room_id = %room.id, "current attempt untouched; skipping generation");
        return Ok(());
    }

    generate_attempt(state, &mut room).await
}

/// Append a freshly scrambled attempt, persist it, and announce it to the
/// room. Callers must hold the room's lock.
async fn generate_attempt(
    state: &SharedState,
    room: &mut RoomSession,
) -> Result<(), ServiceError> {
    let scramble = scramble::generate(state.config(), &room.event)
        .map_err(|err| ServiceError::InvalidInput(err.to_string()))?;

    let attempt_view = {
        let room_id = room.id;
        let attempt = room.push_attempt(scramble);
        debug!(room_id = %room_id, attempt_id = attempt.id, "generated new attempt");
        attempt.into()
    };
    room.touch();
    save_room(state, room).await?;

    ws_events::broadcast_new_attempt(state, room.id, attempt_view);
    Ok(())
}

/// Persist the room before anything about the new state is broadcast, so a
/// concurrent snapshot fetch never observes announced-but-unsaved state.
async fn save_room(state: &SharedState, room: &RoomSession) -> Result<(), ServiceError> {
    let store = state.require_room_store().await?;
    store.save_room(room.to_entity()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, sync::Arc, sync::Mutex};

    use futures::future::BoxFuture;
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            models::RoomEntity,
            room_store::RoomStore,
            storage::StorageResult,
        },
        services::room_service,
        state::{AppState, room::RoomPhase},
    };
    use axum::extract::ws::Message;

    #[derive(Default)]
    struct MemoryRoomStore {
        rooms: Mutex<HashMap<Uuid, RoomEntity>>,
        users: Mutex<HashMap<Uuid, UserEntity>>,
    }

    impl RoomStore for MemoryRoomStore {
        fn save_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>> {
            self.rooms.lock().unwrap().insert(room.id, room);
            Box::pin(async { Ok(()) })
        }

        fn find_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
            let found = self.rooms.lock().unwrap().get(&id).cloned();
            Box::pin(async move { Ok(found) })
        }

        fn delete_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
            let removed = self.rooms.lock().unwrap().remove(&id).is_some();
            Box::pin(async move { Ok(removed) })
        }

        fn list_rooms(&self) -> BoxFuture<'static, StorageResult<Vec<RoomEntity>>> {
            let rooms = self.rooms.lock().unwrap().values().cloned().collect();
            Box::pin(async move { Ok(rooms) })
        }

        fn find_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
            let found = self.users.lock().unwrap().get(&id).cloned();
            Box::pin(async move { Ok(found) })
        }

        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            Box::pin(async { Ok(()) })
        }

        fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
            Box::pin(async { Ok(()) })
        }
    }

    async fn test_state() -> SharedState {
        let state = AppState::new(AppConfig::default());
        state
            .set_room_store(Arc::new(MemoryRoomStore::default()))
            .await;
        state
    }

    fn test_user(name: &str) -> UserEntity {
        UserEntity {
            id: Uuid::new_v4(),
            name: name.to_owned(),
            avatar_url: None,
        }
    }

    /// Register a connection on the hub and build its context.
    fn connect(
        state: &SharedState,
        user: Option<UserEntity>,
    ) -> (ConnectionContext, UnboundedReceiver<Message>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        state.hub().register(id, tx);
        (ConnectionContext::new(id, user), rx)
    }

    fn received_types(rx: &mut UnboundedReceiver<Message>) -> Vec<String> {
        let mut types = Vec::new();
        while let Ok(message) = rx.try_recv() {
            if let Message::Text(text) = message {
                let value: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
                types.push(value["type"].as_str().unwrap_or_default().to_owned());
            }
        }
        types
    }

    async fn create_and_join(
        state: &SharedState,
        ctx: &mut ConnectionContext,
        password: Option<&str>,
    ) -> String {
        let user = ctx.user.clone().unwrap();
        let summary = room_service::create_room(
            state,
            ctx.id,
            &user,
            "test room".into(),
            "333".into(),
            password.map(str::to_owned),
        )
        .await
        .unwrap();
        join_room(state, ctx, &summary.access_code, password)
            .await
            .unwrap();
        summary.access_code
    }

    async fn attempt_count(state: &SharedState, access_code: &str) -> usize {
        let handle = state.directory().by_access_code(access_code).unwrap();
        let room = handle.lock().await;
        room.attempts().len()
    }

    #[tokio::test]
    async fn room_without_password_is_public() {
        let state = test_state().await;
        let (ctx, _rx) = connect(&state, Some(test_user("alice")));

        let summary = room_service::create_room(
            &state,
            ctx.id,
            ctx.user.as_ref().unwrap(),
            "open room".into(),
            "333".into(),
            None,
        )
        .await
        .unwrap();

        assert!(!summary.private);
        let handle = state.directory().by_id(summary.id).unwrap();
        assert!(handle.lock().await.password_hash.is_none());
    }

    #[tokio::test]
    async fn empty_room_name_is_rejected() {
        let state = test_state().await;
        let (ctx, _rx) = connect(&state, Some(test_user("alice")));

        let err = room_service::create_room(
            &state,
            ctx.id,
            ctx.user.as_ref().unwrap(),
            "   ".into(),
            "333".into(),
            None,
        )
        .await
        .unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn first_joiner_becomes_admin_and_gets_initial_attempt() {
        let state = test_state().await;
        let (mut ctx, mut rx) = connect(&state, Some(test_user("alice")));

        let code = create_and_join(&state, &mut ctx, None).await;

        let handle = state.directory().by_access_code(&code).unwrap();
        let room = handle.lock().await;
        assert_eq!(room.admin_id, Some(ctx.user.as_ref().unwrap().id));
        assert_eq!(room.attempts().len(), 1);
        assert_eq!(room.current_attempt().unwrap().id, 0);
        drop(room);

        let types = received_types(&mut rx);
        assert!(types.contains(&"joined".to_owned()));
        assert!(types.contains(&"admin_changed".to_owned()));
        assert!(types.contains(&"new_attempt".to_owned()));
    }

    #[tokio::test]
    async fn unknown_access_code_is_not_found() {
        let state = test_state().await;
        let (mut ctx, _rx) = connect(&state, Some(test_user("alice")));

        let err = join_room(&state, &mut ctx, "nope", None).await.unwrap_err();
        assert_eq!(err.status_code(), 404);
        assert!(ctx.room_id.is_none());
    }

    #[tokio::test]
    async fn wrong_password_is_rejected_and_correct_one_joins() {
        let state = test_state().await;
        let (mut alice, _alice_rx) = connect(&state, Some(test_user("alice")));
        let code = create_and_join(&state, &mut alice, Some("abc")).await;

        let (mut bob, _bob_rx) = connect(&state, Some(test_user("bob")));
        let err = join_room(&state, &mut bob, &code, Some("xyz"))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 403);
        assert!(bob.room_id.is_none());

        let err = join_room(&state, &mut bob, &code, None).await.unwrap_err();
        assert_eq!(err.status_code(), 403);

        join_room(&state, &mut bob, &code, Some("abc")).await.unwrap();
        assert!(bob.room_id.is_some());
    }

    #[tokio::test]
    async fn anonymous_joiner_observes_without_membership() {
        let state = test_state().await;
        let (mut alice, _alice_rx) = connect(&state, Some(test_user("alice")));
        let code = create_and_join(&state, &mut alice, None).await;

        let (mut ghost, mut ghost_rx) = connect(&state, None);
        join_room(&state, &mut ghost, &code, None).await.unwrap();

        let handle = state.directory().by_access_code(&code).unwrap();
        let room = handle.lock().await;
        assert_eq!(room.members().len(), 1);
        drop(room);

        let types = received_types(&mut ghost_rx);
        assert_eq!(types, vec!["joined".to_owned()]);

        // Observers still see room traffic.
        submit_result(
            &state,
            &alice,
            0,
            ResultPayload {
                time_ms: 9_000,
                plus_two: false,
                dnf: false,
            },
        )
        .await
        .unwrap();
        let types = received_types(&mut ghost_rx);
        assert!(types.contains(&"new_result".to_owned()));
    }

    #[tokio::test]
    async fn all_members_done_generates_exactly_one_new_attempt() {
        let state = test_state().await;
        let (mut alice, _alice_rx) = connect(&state, Some(test_user("alice")));
        let code = create_and_join(&state, &mut alice, None).await;
        let (mut bob, mut bob_rx) = connect(&state, Some(test_user("bob")));
        join_room(&state, &mut bob, &code, None).await.unwrap();

        assert_eq!(attempt_count(&state, &code).await, 1);

        let payload = ResultPayload {
            time_ms: 14_000,
            plus_two: false,
            dnf: false,
        };
        submit_result(&state, &alice, 0, payload.clone()).await.unwrap();
        assert_eq!(attempt_count(&state, &code).await, 1);

        submit_result(&state, &bob, 0, payload).await.unwrap();
        assert_eq!(attempt_count(&state, &code).await, 2);

        // Bob connected after attempt 0 already existed, so the only
        // new_attempt he sees is the single follow-up.
        let types = received_types(&mut bob_rx);
        assert_eq!(types.iter().filter(|t| *t == "new_attempt").count(), 1);
    }

    #[tokio::test]
    async fn manual_request_racing_auto_generation_is_a_no_op() {
        let state = test_state().await;
        let (mut alice, _alice_rx) = connect(&state, Some(test_user("alice")));
        let code = create_and_join(&state, &mut alice, None).await;
        let (mut bob, _bob_rx) = connect(&state, Some(test_user("bob")));
        join_room(&state, &mut bob, &code, None).await.unwrap();

        let payload = ResultPayload {
            time_ms: 10_000,
            plus_two: false,
            dnf: false,
        };
        submit_result(&state, &alice, 0, payload.clone()).await.unwrap();
        submit_result(&state, &bob, 0, payload.clone()).await.unwrap();
        // Bob's submission completed the attempt and auto-generated attempt 1.
        assert_eq!(attempt_count(&state, &code).await, 2);

        // The admin's manual request arrives right after; attempt 1 is still
        // untouched, so nothing new is generated.
        request_new_attempt(&state, &alice).await.unwrap();
        assert_eq!(attempt_count(&state, &code).await, 2);

        // Once a result lands on the current attempt, the override works.
        submit_result(&state, &alice, 1, payload).await.unwrap();
        request_new_attempt(&state, &alice).await.unwrap();
        assert_eq!(attempt_count(&state, &code).await, 3);
    }

    #[tokio::test]
    async fn joiner_after_everyone_finished_triggers_fresh_attempt() {
        let state = test_state().await;
        let (mut alice, _alice_rx) = connect(&state, Some(test_user("alice")));
        let code = create_and_join(&state, &mut alice, None).await;
        let alice_id = alice.user.as_ref().unwrap().id;

        // Complete the attempt behind the service's back, mimicking an
        // auto-generation that was missed (e.g. during a storage outage).
        {
            let handle = state.directory().by_access_code(&code).unwrap();
            let mut room = handle.lock().await;
            room.record_result(
                0,
                alice_id,
                ResultPayload {
                    time_ms: 8_000,
                    plus_two: false,
                    dnf: false,
                }
                .into(),
            )
            .unwrap();
            assert!(room.all_done());
        }
        assert_eq!(attempt_count(&state, &code).await, 1);

        let (mut bob, _bob_rx) = connect(&state, Some(test_user("bob")));
        join_room(&state, &mut bob, &code, None).await.unwrap();

        // Bob is not asked to catch up on the finished attempt; the join
        // re-evaluated the predicate over the existing members and moved on.
        assert_eq!(attempt_count(&state, &code).await, 2);
    }

    #[tokio::test]
    async fn sole_member_leaving_empties_but_keeps_the_room() {
        let state = test_state().await;
        let (mut alice, _alice_rx) = connect(&state, Some(test_user("alice")));
        let code = create_and_join(&state, &mut alice, None).await;

        leave_room(&state, &mut alice).await.unwrap();

        let handle = state.directory().by_access_code(&code).unwrap();
        let room = handle.lock().await;
        assert_eq!(room.phase(), RoomPhase::Empty);
        assert!(room.admin_id.is_none());
        assert!(alice.room_id.is_none());
    }

    #[tokio::test]
    async fn admin_leave_reassigns_to_oldest_and_notifies() {
        let state = test_state().await;
        let (mut alice, _alice_rx) = connect(&state, Some(test_user("alice")));
        let code = create_and_join(&state, &mut alice, None).await;
        let (mut bob, mut bob_rx) = connect(&state, Some(test_user("bob")));
        join_room(&state, &mut bob, &code, None).await.unwrap();
        let (mut carol, _carol_rx) = connect(&state, Some(test_user("carol")));
        join_room(&state, &mut carol, &code, None).await.unwrap();

        received_types(&mut bob_rx);
        leave_room(&state, &mut alice).await.unwrap();

        let handle = state.directory().by_access_code(&code).unwrap();
        let room = handle.lock().await;
        assert_eq!(room.admin_id, Some(bob.user.as_ref().unwrap().id));
        drop(room);

        let types = received_types(&mut bob_rx);
        assert!(types.contains(&"user_left".to_owned()));
        assert!(types.contains(&"admin_changed".to_owned()));
    }

    #[tokio::test]
    async fn submit_from_outside_a_room_is_unauthorized() {
        let state = test_state().await;
        let (ctx, _rx) = connect(&state, Some(test_user("alice")));

        let err = submit_result(
            &state,
            &ctx,
            0,
            ResultPayload {
                time_ms: 5_000,
                plus_two: false,
                dnf: false,
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.status_code(), 403);
    }

    #[tokio::test]
    async fn submit_for_unknown_attempt_is_invalid() {
        let state = test_state().await;
        let (mut alice, _alice_rx) = connect(&state, Some(test_user("alice")));
        create_and_join(&state, &mut alice, None).await;

        let err = submit_result(
            &state,
            &alice,
            42,
            ResultPayload {
                time_ms: 5_000,
                plus_two: false,
                dnf: false,
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn non_admin_cannot_delete_or_rescramble() {
        let state = test_state().await;
        let (mut alice, _alice_rx) = connect(&state, Some(test_user("alice")));
        let code = create_and_join(&state, &mut alice, None).await;
        let (mut bob, _bob_rx) = connect(&state, Some(test_user("bob")));
        join_room(&state, &mut bob, &code, None).await.unwrap();

        let room_id = bob.room_id.unwrap();
        let err = room_service::delete_room(
            &state,
            bob.user.as_ref().unwrap(),
            bob.room_id,
            room_id,
        )
        .await
        .unwrap_err();
        assert_eq!(err.status_code(), 403);
        assert!(state.directory().by_id(room_id).is_some(), "room survives");

        let err = request_new_attempt(&state, &bob).await.unwrap_err();
        assert_eq!(err.status_code(), 403);
    }

    #[tokio::test]
    async fn admin_delete_removes_room_and_notifies_everyone() {
        let state = test_state().await;
        let (mut alice, _alice_rx) = connect(&state, Some(test_user("alice")));
        let code = create_and_join(&state, &mut alice, None).await;
        let (_other, mut other_rx) = connect(&state, Some(test_user("watcher")));

        let room_id = alice.room_id.unwrap();
        room_service::delete_room(&state, alice.user.as_ref().unwrap(), alice.room_id, room_id)
            .await
            .unwrap();

        assert!(state.directory().by_id(room_id).is_none());
        assert!(state.directory().by_access_code(&code).is_none());
        let types = received_types(&mut other_rx);
        assert!(types.contains(&"room_deleted".to_owned()));
    }
}
