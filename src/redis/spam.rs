/// Redis-backed abuse counters with escalating lockouts.
///
/// Every guarded endpoint increments a per-(class, subject) counter. While a
/// caller stays under the class threshold the counter lives in a short
/// sliding window; crossing the threshold sets a block TTL that escalates on
/// repeat offenses. The counters are advisory: losing Redis weakens rate
/// limiting but never breaks authentication itself, and a Redis failure here
/// propagates as a retryable server error, never as an implicit allow or
/// deny.
use crate::error::Result;
use crate::redis::keys::SpamKey;
use redis::aio::ConnectionManager;

/// First block after crossing the threshold (5 minutes)
const INITIAL_BLOCK_SECS: i64 = 300;

/// Block applied to repeat offenses while already blocked (30 minutes)
const EXTENDED_BLOCK_SECS: i64 = 1800;

/// Sliding window for counters still under the threshold (30 seconds)
const EXPIRE_WINDOW_SECS: i64 = 30;

/// Abuse classes tracked independently per subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpamClass {
    Register,
    Login,
    LinkResend,
    Forget,
}

impl SpamClass {
    pub fn as_str(self) -> &'static str {
        match self {
            SpamClass::Register => "register",
            SpamClass::Login => "login",
            SpamClass::LinkResend => "link_resend",
            SpamClass::Forget => "forget",
        }
    }

    /// Requests allowed inside the sliding window before blocking starts.
    pub fn threshold(self) -> i64 {
        match self {
            SpamClass::Register | SpamClass::Login => 5,
            SpamClass::LinkResend => 3,
            SpamClass::Forget => 2,
        }
    }
}

/// Outcome of a spam check.
#[derive(Debug, Clone, Copy)]
pub struct SpamVerdict {
    pub is_blocked: bool,
    pub retry_after_secs: i64,
}

/// What to do with the key's TTL after an increment.
#[derive(Debug, PartialEq, Eq)]
enum TtlAction {
    EnterBlock,
    ExtendBlock,
    ReadCurrent,
}

/// Three-way escalation branch.
///
/// The gap at `count == threshold + 2` is intentional: the second offense
/// while blocked neither re-enters the initial block nor extends it, it
/// keeps whatever TTL the key already has.
fn escalation(count: i64, threshold: i64) -> TtlAction {
    if count == threshold + 1 {
        TtlAction::EnterBlock
    } else if count > threshold + 2 {
        TtlAction::ExtendBlock
    } else {
        TtlAction::ReadCurrent
    }
}

#[derive(Clone)]
pub struct SpamGuard {
    redis: ConnectionManager,
}

impl SpamGuard {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }

    /// Atomically count one request and report whether the subject is
    /// currently blocked, with the remaining block duration in seconds.
    pub async fn check(&self, class: SpamClass, subject: &str) -> Result<SpamVerdict> {
        let key = SpamKey::counter(class, subject);
        let threshold = class.threshold();
        let mut conn = self.redis.clone();

        let count: i64 = redis::cmd("INCR").arg(&key).query_async(&mut conn).await?;

        let ttl_secs = match escalation(count, threshold) {
            TtlAction::EnterBlock => {
                redis::cmd("EXPIRE")
                    .arg(&key)
                    .arg(INITIAL_BLOCK_SECS)
                    .query_async::<_, i64>(&mut conn)
                    .await?;
                INITIAL_BLOCK_SECS
            }
            TtlAction::ExtendBlock => {
                redis::cmd("EXPIRE")
                    .arg(&key)
                    .arg(EXTENDED_BLOCK_SECS)
                    .query_async::<_, i64>(&mut conn)
                    .await?;
                EXTENDED_BLOCK_SECS
            }
            TtlAction::ReadCurrent => {
                let ttl: i64 = redis::cmd("TTL").arg(&key).query_async(&mut conn).await?;
                // -1 (no expiry) and -2 (missing) both read as "no block left"
                ttl.max(0)
            }
        };

        if count > threshold {
            tracing::warn!(
                class = class.as_str(),
                subject,
                count,
                retry_after_secs = ttl_secs,
                "request blocked by spam guard"
            );
            return Ok(SpamVerdict {
                is_blocked: true,
                retry_after_secs: ttl_secs,
            });
        }

        // Still under the threshold: keep the counter on the short sliding
        // window so quiet subjects reset quickly.
        redis::cmd("EXPIRE")
            .arg(&key)
            .arg(EXPIRE_WINDOW_SECS)
            .query_async::<_, i64>(&mut conn)
            .await?;

        Ok(SpamVerdict {
            is_blocked: false,
            retry_after_secs: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLD: i64 = 5;

    #[test]
    fn under_threshold_reads_current_ttl() {
        for count in 1..=THRESHOLD {
            assert_eq!(escalation(count, THRESHOLD), TtlAction::ReadCurrent);
        }
    }

    #[test]
    fn first_offense_enters_initial_block() {
        assert_eq!(escalation(THRESHOLD + 1, THRESHOLD), TtlAction::EnterBlock);
    }

    #[test]
    fn second_offense_keeps_stale_ttl() {
        // The gap case: threshold + 2 neither re-blocks nor extends.
        assert_eq!(escalation(THRESHOLD + 2, THRESHOLD), TtlAction::ReadCurrent);
    }

    #[test]
    fn later_offenses_extend_the_block() {
        assert_eq!(escalation(THRESHOLD + 3, THRESHOLD), TtlAction::ExtendBlock);
        assert_eq!(escalation(THRESHOLD + 50, THRESHOLD), TtlAction::ExtendBlock);
    }

    #[test]
    fn class_thresholds_match_policy() {
        assert_eq!(SpamClass::Register.threshold(), 5);
        assert_eq!(SpamClass::Login.threshold(), 5);
        assert_eq!(SpamClass::LinkResend.threshold(), 3);
        assert_eq!(SpamClass::Forget.threshold(), 2);
    }
}
