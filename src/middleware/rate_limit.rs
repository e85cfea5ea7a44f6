use axum::{http::StatusCode, Json};
use serde_json::json;

/// Fixed-window limiter stored in Redis (INCR, then EXPIRE on the first hit).
/// Returns 429 once `key` has been hit more than `max_attempts` times within
/// `window_secs`. Redis errors count as zero hits.
pub async fn check_rate_limit(
    redis: &mut redis::aio::MultiplexedConnection,
    key: &str,
    max_attempts: u64,
    window_secs: u64,
) -> Result<(), (StatusCode, Json<serde_json::Value>)> {
    let count: u64 = redis::cmd("INCR")
        .arg(key)
        .query_async(redis)
        .await
        .unwrap_or(0);

    if count == 1 {
        let _: Result<(), _> = redis::cmd("EXPIRE")
            .arg(key)
            .arg(window_secs)
            .query_async(redis)
            .await;
    }

    if count > max_attempts {
        return Err((
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "error": "Too many requests, try again in a few minutes" })),
        ));
    }

    Ok(())
}

pub fn rate_key(action: &str, tenant: &str, subject: &str) -> String {
    format!("rate:{action}:{tenant}:{subject}")
}
