//! WebSocket connection lifecycle: identity attachment, message dispatch, and
//! disconnect cleanup.

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::ws::ClientMessage,
    error::ServiceError,
    services::{gateway, room_service, session_service, ws_events},
    state::SharedState,
};

use session_service::ConnectionContext;

/// Handle the full lifecycle of one client WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket, credential: Option<String>) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let user = gateway::resolve_user(&state, credential.as_deref()).await;
    let connection_id = Uuid::new_v4();
    state.hub().register(connection_id, outbound_tx.clone());
    let mut ctx = ConnectionContext::new(connection_id, user);

    info!(
        connection_id = %ctx.id,
        user = ctx.user.as_ref().map(|user| user.name.as_str()).unwrap_or("anonymous"),
        "connection attached"
    );

    // Give them the list of rooms.
    let rooms = room_service::list_rooms(&state).await;
    ws_events::unicast_room_list(&state, ctx.id, rooms);

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                dispatch(&state, &mut ctx, text.as_str()).await;
            }
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(connection_id = %ctx.id, error = %err, "websocket error");
                break;
            }
        }
    }

    // A dropped connection is treated identically to an explicit leave.
    let last_room = ctx.room_id;
    if ctx.room_id.is_some() {
        if let Err(err) = session_service::leave_room(&state, &mut ctx).await {
            debug!(connection_id = %ctx.id, error = %err, "leave on disconnect failed");
        }
    }
    state.hub().unregister(ctx.id);

    info!(
        connection_id = %ctx.id,
        last_room = %last_room.map(|id| id.to_string()).unwrap_or_else(|| "none".into()),
        "connection closed"
    );

    finalize(writer_task, outbound_tx).await;
}

/// Parse one inbound frame and route it to the owning service.
///
/// Terminal errors are answered with a structured error event to this
/// connection only; infrastructure failures are logged and the event dropped.
async fn dispatch(state: &SharedState, ctx: &mut ConnectionContext, raw: &str) {
    let message = match ClientMessage::from_json_str(raw) {
        Ok(message) => message,
        Err(err) => {
            warn!(connection_id = %ctx.id, error = %err, "failed to parse client message");
            ws_events::unicast_error(state, ctx.id, 400, None, "malformed message".into());
            return;
        }
    };

    let event = message.event_name();
    let outcome = route(state, ctx, message).await;

    if let Err(err) = outcome {
        if err.is_infrastructure() {
            warn!(
                connection_id = %ctx.id,
                event = event.unwrap_or("unknown"),
                error = %err,
                "dropping event due to infrastructure failure"
            );
            return;
        }
        ws_events::unicast_error(state, ctx.id, err.status_code(), event, err.to_string());
    }
}

async fn route(
    state: &SharedState,
    ctx: &mut ConnectionContext,
    message: ClientMessage,
) -> Result<(), ServiceError> {
    match message {
        ClientMessage::JoinRoom {
            access_code,
            password,
        } => session_service::join_room(state, ctx, &access_code, password.as_deref()).await,
        ClientMessage::CreateRoom {
            name,
            event,
            password,
        } => {
            let user = ctx
                .user
                .clone()
                .ok_or_else(|| ServiceError::Unauthorized("must be logged in".into()))?;
            room_service::create_room(state, ctx.id, &user, name, event, password)
                .await
                .map(|_| ())
        }
        ClientMessage::FetchRoom { id } => {
            let snapshot = room_service::fetch_room(state, id).await?;
            ws_events::unicast_room_snapshot(state, ctx.id, snapshot);
            Ok(())
        }
        ClientMessage::SubmitResult { attempt, result } => {
            session_service::submit_result(state, ctx, attempt, result).await
        }
        ClientMessage::DeleteRoom { id } => {
            let user = ctx
                .user
                .clone()
                .ok_or_else(|| ServiceError::Unauthorized("must be logged in".into()))?;
            room_service::delete_room(state, &user, ctx.room_id, id).await?;
            ctx.room_id = None;
            Ok(())
        }
        ClientMessage::RequestNewScramble => {
            session_service::request_new_attempt(state, ctx).await
        }
        ClientMessage::LeaveRoom => session_service::leave_room(state, ctx).await,
        ClientMessage::Unknown => Err(ServiceError::InvalidInput(
            "unsupported message type".into(),
        )),
    }
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
