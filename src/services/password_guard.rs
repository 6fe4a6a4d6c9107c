/// Password reuse guard backed by the append-only history table.
use crate::db::password_history_repo;
use crate::error::{AppError, Result};
use crate::models::PasswordHistoryEntry;
use crate::security::password::{hash_password, verify_password};
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

/// How many most-recent entries a candidate is compared against.
pub const PASSWORD_HISTORY_LIMIT: i64 = 10;

fn matches_recent<'a>(
    candidate: &str,
    entries: impl IntoIterator<Item = &'a PasswordHistoryEntry>,
) -> bool {
    entries
        .into_iter()
        .any(|entry| verify_password(candidate, &entry.old_password).unwrap_or(false))
}

/// Reject a candidate password that matches any of the user's last
/// `history_limit` hashes; otherwise return a fresh Argon2id hash for it.
///
/// A history lookup failure is treated as "no history": the password change
/// proceeds rather than being blocked on a degraded read path. That
/// fail-open trade-off is deliberate and should not be tightened without a
/// product decision.
pub async fn check_and_hash(
    pool: &PgPool,
    user_id: Uuid,
    candidate: &str,
    history_limit: i64,
) -> Result<String> {
    let entries = match password_history_repo::recent_for_user(pool, user_id, history_limit).await
    {
        Ok(entries) => entries,
        Err(err) => {
            warn!(
                user_id = %user_id,
                error = %err,
                "password history lookup failed; treating as empty"
            );
            Vec::new()
        }
    };

    if matches_recent(candidate, &entries) {
        return Err(AppError::ReuseRejected);
    }

    hash_password(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entry(hash: String) -> PasswordHistoryEntry {
        PasswordHistoryEntry {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            old_password: hash,
            reason_status: 1,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn rejects_candidate_present_in_history() {
        let reused = "Old&Busted#Pass1";
        let entries = vec![
            entry(hash_password("Some0ther!Pass").unwrap()),
            entry(hash_password(reused).unwrap()),
        ];

        assert!(matches_recent(reused, &entries));
        // Hashing the same plaintext twice must reject both times.
        assert!(matches_recent(reused, &entries));
    }

    #[test]
    fn accepts_candidate_absent_from_history() {
        let entries = vec![entry(hash_password("Some0ther!Pass").unwrap())];
        assert!(!matches_recent("Brand&New#Pass9", &entries));
    }

    #[test]
    fn empty_history_never_matches() {
        assert!(!matches_recent("Anything1!", &[]));
    }
}
