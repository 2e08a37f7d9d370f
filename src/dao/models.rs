use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

/// Account record owned by the identity subsystem.
///
/// The coordinator only ever reads these; display fields are carried along
/// into membership records so room snapshots can be built without extra
/// lookups.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserEntity {
    /// Primary key of the user.
    pub id: Uuid,
    /// Display name shown to other room members.
    pub name: String,
    /// Optional avatar reference.
    pub avatar_url: Option<String>,
}

/// One member's submitted outcome for a single attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttemptResultEntity {
    /// User the result belongs to.
    pub user_id: Uuid,
    /// Solve time in milliseconds.
    pub time_ms: u64,
    /// Whether a +2 penalty applies.
    pub plus_two: bool,
    /// Whether the solve is a DNF.
    pub dnf: bool,
}

/// One trial within a room: an immutable scramble plus collected results.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttemptEntity {
    /// Sequence position within the room, starting at zero.
    pub id: u32,
    /// Generated scramble payload; never mutated after creation.
    pub scramble: String,
    /// Results keyed by user, one per user at most.
    pub results: Vec<AttemptResultEntity>,
}

/// Membership record embedded in the room document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemberEntity {
    /// The joined user.
    pub user: UserEntity,
    /// When the user joined; drives admin reassignment order.
    pub joined_at: SystemTime,
}

/// Aggregate room entity persisted by the storage layer.
///
/// Attempts and results are embedded rather than stored in separate
/// collections, so a single document holds the whole active session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomEntity {
    /// Primary key of the room.
    pub id: Uuid,
    /// Human readable room name.
    pub name: String,
    /// Whether joining requires a password.
    pub private: bool,
    /// Opaque join token, unique among active rooms.
    pub access_code: String,
    /// Salted password hash for private rooms.
    pub password_hash: Option<String>,
    /// Puzzle discipline practiced in this room (e.g. `333`).
    pub event: String,
    /// Current admin, if the room has members.
    pub admin_id: Option<Uuid>,
    /// Members in join order.
    pub members: Vec<MemberEntity>,
    /// Ordered attempt history; only appended to.
    pub attempts: Vec<AttemptEntity>,
    /// Creation timestamp for auditing/debugging.
    pub created_at: SystemTime,
    /// Last time the room document was updated.
    pub updated_at: SystemTime,
}
