//! Connection gateway: resolves session credentials to identities and owns
//! the opaque password hash/verify capability.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{dao::models::UserEntity, error::ServiceError, state::SharedState};

/// Resolve the optional session credential carried on a new connection.
///
/// Absence of identity is a valid, continuing state: a missing, malformed or
/// unknown credential degrades the connection to anonymous instead of
/// rejecting it. Failures are logged, never surfaced.
pub async fn resolve_user(state: &SharedState, credential: Option<&str>) -> Option<UserEntity> {
    let raw = credential?;

    let user_id = match Uuid::parse_str(raw) {
        Ok(id) => id,
        Err(err) => {
            warn!(error = %err, "malformed session credential; continuing as anonymous");
            return None;
        }
    };

    let Some(store) = state.room_store().await else {
        warn!("storage unavailable during identity lookup; continuing as anonymous");
        return None;
    };

    match store.find_user(user_id).await {
        Ok(Some(user)) => Some(user),
        Ok(None) => {
            debug!(%user_id, "session credential does not match a known user");
            None
        }
        Err(err) => {
            warn!(%user_id, error = %err, "identity lookup failed; continuing as anonymous");
            None
        }
    }
}

/// Hash a room password with a fresh salt.
pub fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| {
            warn!(error = %err, "password hashing failed");
            ServiceError::InvalidInput("password could not be processed".into())
        })
}

/// Verify a supplied password against a stored hash. A corrupt stored hash
/// counts as a mismatch.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        warn!("stored password hash failed to parse");
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify_round_trip() {
        let hash = hash_password("abc").unwrap();
        assert!(verify_password("abc", &hash));
        assert!(!verify_password("xyz", &hash));
    }

    #[test]
    fn distinct_salts_for_identical_passwords() {
        let first = hash_password("abc").unwrap();
        let second = hash_password("abc").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn corrupt_stored_hash_is_a_mismatch() {
        assert!(!verify_password("abc", "not-a-phc-string"));
    }
}
