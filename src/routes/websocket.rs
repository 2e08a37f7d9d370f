use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;

use crate::{services::websocket_service, state::SharedState};

/// Query parameters accepted on the WebSocket upgrade.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Opaque session credential; omitted or invalid means anonymous.
    pub session: Option<String>,
}

#[utoipa::path(
    get,
    path = "/ws",
    params(("session" = Option<String>, Query, description = "Opaque session credential")),
    responses((status = 101, description = "Switching protocols to WebSocket"))
)]
/// Upgrade the HTTP connection into a room client WebSocket session.
pub async fn ws_handler(
    State(state): State<SharedState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let shared_state = state.clone();
    ws.on_upgrade(move |socket| {
        websocket_service::handle_socket(shared_state, socket, query.session)
    })
}

/// Configure the WebSocket endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/ws", get(ws_handler))
}
