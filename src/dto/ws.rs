use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dto::room::{AttemptView, MemberView, ResultPayload, RoomSnapshot, RoomSummary};

#[derive(Debug, Deserialize, Serialize, ToSchema)]
/// Messages accepted from WebSocket clients.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Request membership in a room by access code.
    JoinRoom {
        access_code: String,
        #[serde(default)]
        password: Option<String>,
    },
    /// Create a new room; requires an attached identity.
    CreateRoom {
        name: String,
        event: String,
        #[serde(default)]
        password: Option<String>,
    },
    /// Request a unicast snapshot of a room by id.
    FetchRoom { id: Uuid },
    /// Submit a result for one attempt of the current room.
    SubmitResult { attempt: u32, result: ResultPayload },
    /// Delete a room; admin only.
    DeleteRoom { id: Uuid },
    /// Force a fresh attempt; admin only.
    RequestNewScramble,
    /// Leave the current room.
    LeaveRoom,
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    /// Parse a raw text frame into a client message.
    pub fn from_json_str(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    /// Wire name of this message, echoed back in error payloads.
    pub fn event_name(&self) -> Option<&'static str> {
        match self {
            ClientMessage::JoinRoom { .. } => Some("join_room"),
            ClientMessage::CreateRoom { .. } => Some("create_room"),
            ClientMessage::FetchRoom { .. } => Some("fetch_room"),
            ClientMessage::SubmitResult { .. } => Some("submit_result"),
            ClientMessage::DeleteRoom { .. } => Some("delete_room"),
            ClientMessage::RequestNewScramble => Some("request_new_scramble"),
            ClientMessage::LeaveRoom => Some("leave_room"),
            ClientMessage::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
/// Messages pushed to WebSocket clients.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Snapshot of all active rooms, sent once after connecting.
    RoomList { rooms: Vec<RoomSummary> },
    /// A room was created somewhere on the server.
    RoomCreated { room: RoomSummary },
    /// A room was deleted somewhere on the server.
    RoomDeleted { id: Uuid },
    /// Join confirmation carrying the full room snapshot.
    Joined { room: RoomSnapshot },
    /// Unicast answer to a fetch request.
    RoomUpdate { room: RoomSnapshot },
    /// Another member joined the room.
    UserJoined { user: MemberView },
    /// A member left the room.
    UserLeft { user_id: Uuid },
    /// The admin role moved to another member.
    AdminChanged { user_id: Uuid },
    /// A member submitted a result for an attempt.
    NewResult {
        attempt: u32,
        user_id: Uuid,
        result: ResultPayload,
    },
    /// A fresh attempt was generated for the room.
    NewAttempt { attempt: AttemptView },
    /// Terminal failure for the triggering event, sent to the originating
    /// connection only.
    Error {
        /// HTTP-style status code classifying the failure.
        #[serde(rename = "statusCode")]
        status_code: u16,
        /// Client event that triggered the failure, when known.
        #[serde(skip_serializing_if = "Option::is_none")]
        event: Option<String>,
        /// Human readable description.
        message: String,
    },
}
