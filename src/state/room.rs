use std::time::SystemTime;

use indexmap::IndexMap;
use thiserror::Error;
use uuid::Uuid;

use crate::dao::models::{
    AttemptEntity, AttemptResultEntity, MemberEntity, RoomEntity, UserEntity,
};

/// Mutation rejected by the room state machine.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoomStateError {
    #[error("invalid id `{id}` for attempt submission")]
    UnknownAttempt { id: u32 },
    #[error("user `{user_id}` is not a member of the room")]
    NotMember { user_id: Uuid },
}

/// Coarse room lifecycle state, derived from membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    /// No members; the room is retained but has no admin.
    Empty,
    /// At least one member; exactly one of them is admin.
    Active,
}

/// One participant's outcome for one attempt. Later submissions for the same
/// `(attempt, user)` pair overwrite the earlier one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolveResult {
    pub time_ms: u64,
    pub plus_two: bool,
    pub dnf: bool,
}

/// Membership record tracked while a user is in the room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    /// Read-only identity reference; never mutated by the coordinator.
    pub user: UserEntity,
    /// Join timestamp; drives deterministic admin reassignment.
    pub joined_at: SystemTime,
}

/// One trial within a room.
///
/// The scramble payload is immutable once the attempt is created; only the
/// result map changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub id: u32,
    pub scramble: String,
    pub results: IndexMap<Uuid, SolveResult>,
}

/// Outcome of a successful join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinOutcome {
    /// Whether the joiner was elected admin (first member of an empty room).
    pub became_admin: bool,
}

/// Outcome of removing a member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveOutcome {
    /// The removed membership record.
    pub removed: Member,
    /// New admin when the leaving member held the role and members remain.
    pub new_admin: Option<Uuid>,
    /// Whether the admin role was cleared because the room became empty.
    pub admin_cleared: bool,
}

/// Per-room state: membership, admin role, attempt history and results.
///
/// All mutation goes through the methods below; the surrounding service layer
/// serializes callers with a per-room lock so a session never sees
/// interleaved mutations.
#[derive(Debug, Clone)]
pub struct RoomSession {
    pub id: Uuid,
    pub name: String,
    pub private: bool,
    pub access_code: String,
    pub password_hash: Option<String>,
    pub event: String,
    pub admin_id: Option<Uuid>,
    members: IndexMap<Uuid, Member>,
    attempts: Vec<Attempt>,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
}

impl RoomSession {
    /// Build a fresh room with no members, no admin, and no attempts.
    pub fn new(
        name: String,
        event: String,
        access_code: String,
        password_hash: Option<String>,
    ) -> Self {
        let timestamp = SystemTime::now();
        Self {
            id: Uuid::new_v4(),
            name,
            private: password_hash.is_some(),
            access_code,
            password_hash,
            event,
            admin_id: None,
            members: IndexMap::new(),
            attempts: Vec::new(),
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Derived lifecycle state.
    pub fn phase(&self) -> RoomPhase {
        if self.members.is_empty() {
            RoomPhase::Empty
        } else {
            RoomPhase::Active
        }
    }

    /// Members in join order.
    pub fn members(&self) -> &IndexMap<Uuid, Member> {
        &self.members
    }

    /// Whether `user_id` is currently a member.
    pub fn is_member(&self, user_id: Uuid) -> bool {
        self.members.contains_key(&user_id)
    }

    /// The current admin's membership record, if any.
    pub fn admin(&self) -> Option<&Member> {
        self.admin_id.and_then(|id| self.members.get(&id))
    }

    /// Whether `user_id` currently holds the admin role.
    pub fn is_admin(&self, user_id: Uuid) -> bool {
        self.admin_id == Some(user_id)
    }

    /// Attempt history in sequence order.
    pub fn attempts(&self) -> &[Attempt] {
        &self.attempts
    }

    /// The room's latest attempt, if one has been generated.
    pub fn current_attempt(&self) -> Option<&Attempt> {
        self.attempts.last()
    }

    /// Add `user` to the membership map, electing them admin when the room
    /// has none. Re-joining refreshes the stored display fields but keeps the
    /// original join position.
    pub fn join(&mut self, user: UserEntity) -> JoinOutcome {
        let user_id = user.id;
        match self.members.get_mut(&user_id) {
            Some(member) => member.user = user,
            None => {
                self.members.insert(
                    user_id,
                    Member {
                        user,
                        joined_at: SystemTime::now(),
                    },
                );
            }
        }

        let became_admin = self.admin_id.is_none();
        if became_admin {
            self.admin_id = Some(user_id);
        }
        JoinOutcome { became_admin }
    }

    /// Remove `user_id` from the membership map.
    ///
    /// When the removed member held the admin role, the role passes to the
    /// oldest remaining member by join order, or is cleared if the room is
    /// now empty. Returns `None` when the user was not a member.
    pub fn leave(&mut self, user_id: Uuid) -> Option<LeaveOutcome> {
        let removed = self.members.shift_remove(&user_id)?;

        let mut new_admin = None;
        let mut admin_cleared = false;
        if self.admin_id == Some(user_id) {
            match self.members.first() {
                Some((&next_id, _)) => {
                    self.admin_id = Some(next_id);
                    new_admin = Some(next_id);
                }
                None => {
                    self.admin_id = None;
                    admin_cleared = true;
                }
            }
        }

        Some(LeaveOutcome {
            removed,
            new_admin,
            admin_cleared,
        })
    }

    /// Upsert `result` for `(attempt_id, user_id)` with overwrite semantics.
    pub fn record_result(
        &mut self,
        attempt_id: u32,
        user_id: Uuid,
        result: SolveResult,
    ) -> Result<(), RoomStateError> {
        if !self.members.contains_key(&user_id) {
            return Err(RoomStateError::NotMember { user_id });
        }

        let attempt = self
            .attempts
            .iter_mut()
            .find(|attempt| attempt.id == attempt_id)
            .ok_or(RoomStateError::UnknownAttempt { id: attempt_id })?;

        attempt.results.insert(user_id, result);
        Ok(())
    }

    /// True iff every current member has a result for the latest attempt.
    ///
    /// An empty room is never "done"; a room without attempts is not "done"
    /// either (see [`RoomSession::needs_initial_attempt`]).
    pub fn all_done(&self) -> bool {
        if self.members.is_empty() {
            return false;
        }
        let Some(attempt) = self.attempts.last() else {
            return false;
        };
        self.members
            .keys()
            .all(|user_id| attempt.results.contains_key(user_id))
    }

    /// True for an occupied room that has never had an attempt generated.
    pub fn needs_initial_attempt(&self) -> bool {
        !self.members.is_empty() && self.attempts.is_empty()
    }

    /// Append a new attempt with a fresh sequence id and the generated
    /// scramble, returning a reference to it.
    pub fn push_attempt(&mut self, scramble: String) -> &Attempt {
        let id = self
            .attempts
            .last()
            .map(|attempt| attempt.id + 1)
            .unwrap_or(0);
        self.attempts.push(Attempt {
            id,
            scramble,
            results: IndexMap::new(),
        });
        // Just pushed, so the vec is non-empty.
        &self.attempts[self.attempts.len() - 1]
    }

    /// Bump the modification timestamp; call before persisting.
    pub fn touch(&mut self) {
        self.updated_at = SystemTime::now();
    }

    /// Persistence shape of this session.
    pub fn to_entity(&self) -> RoomEntity {
        RoomEntity {
            id: self.id,
            name: self.name.clone(),
            private: self.private,
            access_code: self.access_code.clone(),
            password_hash: self.password_hash.clone(),
            event: self.event.clone(),
            admin_id: self.admin_id,
            members: self
                .members
                .values()
                .map(|member| MemberEntity {
                    user: member.user.clone(),
                    joined_at: member.joined_at,
                })
                .collect(),
            attempts: self
                .attempts
                .iter()
                .map(|attempt| AttemptEntity {
                    id: attempt.id,
                    scramble: attempt.scramble.clone(),
                    results: attempt
                        .results
                        .iter()
                        .map(|(&user_id, result)| AttemptResultEntity {
                            user_id,
                            time_ms: result.time_ms,
                            plus_two: result.plus_two,
                            dnf: result.dnf,
                        })
                        .collect(),
                })
                .collect(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl From<RoomEntity> for RoomSession {
    fn from(entity: RoomEntity) -> Self {
        let members: IndexMap<Uuid, Member> = entity
            .members
            .into_iter()
            .map(|member| {
                (
                    member.user.id,
                    Member {
                        user: member.user,
                        joined_at: member.joined_at,
                    },
                )
            })
            .collect();

        // A stored document may predate the admin invariant; repair it on load.
        let admin_id = entity
            .admin_id
            .filter(|id| members.contains_key(id))
            .or_else(|| members.first().map(|(&id, _)| id));

        Self {
            id: entity.id,
            name: entity.name,
            private: entity.private,
            access_code: entity.access_code,
            password_hash: entity.password_hash,
            event: entity.event,
            admin_id,
            members,
            attempts: entity
                .attempts
                .into_iter()
                .map(|attempt| Attempt {
                    id: attempt.id,
                    scramble: attempt.scramble,
                    results: attempt
                        .results
                        .into_iter()
                        .map(|result| {
                            (
                                result.user_id,
                                SolveResult {
                                    time_ms: result.time_ms,
                                    plus_two: result.plus_two,
                                    dnf: result.dnf,
                                },
                            )
                        })
                        .collect(),
                })
                .collect(),
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}
