use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dto::format_system_time;
use crate::state::room::{Attempt, Member, RoomSession, SolveResult};

/// Compact room representation used in the server-wide room list.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoomSummary {
    /// Stable identifier for the room.
    pub id: Uuid,
    /// Human readable room name.
    pub name: String,
    /// Puzzle discipline practiced in this room.
    pub event: String,
    /// Whether joining requires a password.
    pub private: bool,
    /// Join token for this room.
    pub access_code: String,
    /// Number of current members.
    pub member_count: usize,
}

/// One member as seen by clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MemberView {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    /// Join timestamp, RFC 3339.
    pub joined_at: String,
}

/// A submitted result as carried on the wire, both directions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct ResultPayload {
    /// Solve time in milliseconds.
    pub time_ms: u64,
    /// Whether a +2 penalty applies.
    #[serde(default)]
    pub plus_two: bool,
    /// Whether the solve is a DNF.
    #[serde(default)]
    pub dnf: bool,
}

/// One member's result inside an attempt view.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AttemptResultView {
    pub user_id: Uuid,
    pub result: ResultPayload,
}

/// One attempt as seen by clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AttemptView {
    pub id: u32,
    pub scramble: String,
    pub results: Vec<AttemptResultView>,
}

/// Full room snapshot returned to a joining or fetching client.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoomSnapshot {
    pub id: Uuid,
    pub name: String,
    pub event: String,
    pub private: bool,
    pub access_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_id: Option<Uuid>,
    pub members: Vec<MemberView>,
    pub attempts: Vec<AttemptView>,
    /// Creation timestamp, RFC 3339.
    pub created_at: String,
}

impl From<&Member> for MemberView {
    fn from(member: &Member) -> Self {
        Self {
            id: member.user.id,
            name: member.user.name.clone(),
            avatar_url: member.user.avatar_url.clone(),
            joined_at: format_system_time(member.joined_at),
        }
    }
}

impl From<&SolveResult> for ResultPayload {
    fn from(result: &SolveResult) -> Self {
        Self {
            time_ms: result.time_ms,
            plus_two: result.plus_two,
            dnf: result.dnf,
        }
    }
}

impl From<ResultPayload> for SolveResult {
    fn from(payload: ResultPayload) -> Self {
        Self {
            time_ms: payload.time_ms,
            plus_two: payload.plus_two,
            dnf: payload.dnf,
        }
    }
}

impl From<&Attempt> for AttemptView {
    fn from(attempt: &Attempt) -> Self {
        Self {
            id: attempt.id,
            scramble: attempt.scramble.clone(),
            results: attempt
                .results
                .iter()
                .map(|(&user_id, result)| AttemptResultView {
                    user_id,
                    result: result.into(),
                })
                .collect(),
        }
    }
}

impl From<&RoomSession> for RoomSummary {
    fn from(session: &RoomSession) -> Self {
        Self {
            id: session.id,
            name: session.name.clone(),
            event: session.event.clone(),
            private: session.private,
            access_code: session.access_code.clone(),
            member_count: session.members().len(),
        }
    }
}

impl From<&RoomSession> for RoomSnapshot {
    fn from(session: &RoomSession) -> Self {
        Self {
            id: session.id,
            name: session.name.clone(),
            event: session.event.clone(),
            private: session.private,
            access_code: session.access_code.clone(),
            admin_id: session.admin_id,
            members: session.members().values().map(Into::into).collect(),
            attempts: session.attempts().iter().map(Into::into).collect(),
            created_at: format_system_time(session.created_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::UserEntity;

    #[test]
    fn snapshot_never_exposes_the_password_hash() {
        let mut session = RoomSession::new(
            "secret room".into(),
            "333".into(),
            "code".into(),
            Some("$argon2id$fake".into()),
        );
        session.join(UserEntity {
            id: Uuid::new_v4(),
            name: "alice".into(),
            avatar_url: None,
        });

        let snapshot = RoomSnapshot::from(&session);
        let encoded = serde_json::to_string(&snapshot).unwrap();
        assert!(snapshot.private);
        assert!(!encoded.contains("argon2"));
        assert!(!encoded.contains("password"));
    }

    #[test]
    fn summary_counts_members() {
        let mut session = RoomSession::new("room".into(), "222".into(), "code".into(), None);
        session.join(UserEntity {
            id: Uuid::new_v4(),
            name: "alice".into(),
            avatar_url: None,
        });
        let summary = RoomSummary::from(&session);
        assert_eq!(summary.member_count, 1);
        assert!(!summary.private);
    }
}
