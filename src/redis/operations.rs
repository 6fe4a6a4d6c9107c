/// Small shared Redis operations used by the cache-backed read paths
use crate::error::Result;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

/// Set a key with expiration.
pub async fn redis_set_ex(
    redis: &ConnectionManager,
    key: &str,
    value: &str,
    ttl_seconds: u64,
) -> Result<()> {
    let mut conn = redis.clone();
    let _: () = conn.set_ex(key, value, ttl_seconds).await?;
    Ok(())
}

/// Get a value; `None` when the key does not exist.
pub async fn redis_get(redis: &ConnectionManager, key: &str) -> Result<Option<String>> {
    let mut conn = redis.clone();
    let value: Option<String> = conn.get(key).await?;
    Ok(value)
}

/// Delete a key.
pub async fn redis_delete(redis: &ConnectionManager, key: &str) -> Result<()> {
    let mut conn = redis.clone();
    let _: () = conn.del(key).await?;
    Ok(())
}
