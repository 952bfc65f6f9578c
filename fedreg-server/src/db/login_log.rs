//! Login audit trail

use fedreg_common::db::LoginLog;
use fedreg_common::{time, Result};
use sqlx::SqlitePool;

/// One login attempt to record
#[derive(Debug, Clone)]
pub struct LoginAttempt<'a> {
    pub user_id: Option<i64>,
    pub username: &'a str,
    pub ip: Option<&'a str>,
    pub user_agent: Option<&'a str>,
    /// `None` for a successful login
    pub failure_reason: Option<&'a str>,
}

pub async fn record(db: &SqlitePool, attempt: &LoginAttempt<'_>) -> Result<()> {
    let status = if attempt.failure_reason.is_none() {
        "success"
    } else {
        "failed"
    };

    sqlx::query(
        r#"
        INSERT INTO login_log
            (user_id, username, login_ip, user_agent, status, failure_reason, login_time)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(attempt.user_id)
    .bind(attempt.username)
    .bind(attempt.ip)
    .bind(attempt.user_agent)
    .bind(status)
    .bind(attempt.failure_reason)
    .bind(time::now())
    .execute(db)
    .await?;

    Ok(())
}

/// Most recent attempts first
pub async fn recent(db: &SqlitePool, limit: i64) -> Result<Vec<LoginLog>> {
    let logs = sqlx::query_as::<_, LoginLog>(
        "SELECT log_id, user_id, username, login_ip, user_agent, status, failure_reason, \
         login_time \
         FROM login_log ORDER BY log_id DESC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(db)
    .await?;
    Ok(logs)
}
