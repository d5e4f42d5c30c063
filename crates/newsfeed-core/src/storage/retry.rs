//! Retry for transient SQLite failures
//!
//! The cache database lives in the user's data directory, which may be shared
//! with other processes or sit on a synced folder. Busy/locked and I/O errors
//! there are usually momentary, so cache reads and writes go through
//! [`with_retry`] before they are reported as failures.

use std::future::Future;
use std::time::Duration;

/// Maximum number of retries after the first attempt
pub const MAX_RETRIES: u32 = 3;

/// Base delay before the first retry
const BASE_DELAY_MS: u64 = 100;

/// Check if a SQLite error is transient and worth retrying
///
/// Covers SQLITE_BUSY (5), SQLITE_LOCKED (6), SQLITE_IOERR (10) and its
/// extended read/short-read/write/fsync/lock codes, plus SQLITE_BUSY_SNAPSHOT.
pub fn is_transient_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            let code = db_err.code().map(|c| c.to_string());
            matches!(
                code.as_deref(),
                Some("5" | "6" | "10" | "266" | "522" | "1032" | "2314" | "3338" | "5386")
            )
        }
        sqlx::Error::PoolTimedOut => true,
        _ => false,
    }
}

/// Delay before retry number `attempt` (1-based): 100ms, 200ms, 400ms
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(BASE_DELAY_MS << attempt.saturating_sub(1).min(16))
}

/// Run `operation`, retrying transient errors with exponential backoff
pub async fn with_retry<F, Fut, T>(what: &str, operation: F) -> std::result::Result<T, sqlx::Error>
where
    F: Fn() -> Fut,
    Fut: Future<Output = std::result::Result<T, sqlx::Error>>,
{
    let mut attempts = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if is_transient_error(&e) && attempts < MAX_RETRIES => {
                attempts += 1;
                let delay = backoff_delay(attempts);
                tracing::debug!(
                    error = %e,
                    operation = what,
                    attempt = attempts,
                    delay_ms = delay.as_millis(),
                    "Transient cache database error, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
