//! User account database operations

use fedreg_common::api::auth::{generate_salt, hash_password};
use fedreg_common::db::{User, ROLE_ADMIN};
use fedreg_common::{time, Error, Result};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::info;

use crate::pagination::Pagination;

const USER_COLUMNS: &str = "user_id, username, email, full_name, role, department, phone, \
     avatar_url, password_hash, password_salt, is_active, last_login, created_time, updated_time";

/// Fields of a new account
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub role: String,
    pub department: Option<String>,
    pub phone: Option<String>,
    pub password: String,
}

/// Profile changes; `None` leaves a field unchanged
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub department: Option<String>,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    pub password: Option<String>,
}

/// Admin listing filter
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub role: Option<String>,
    /// Substring of username, full name or email
    pub search: Option<String>,
}

pub async fn find_by_id(db: &SqlitePool, user_id: i64) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE user_id = ?",
        USER_COLUMNS
    ))
    .bind(user_id)
    .fetch_optional(db)
    .await?;
    Ok(user)
}

pub async fn find_by_username(db: &SqlitePool, username: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE username = ?",
        USER_COLUMNS
    ))
    .bind(username)
    .fetch_optional(db)
    .await?;
    Ok(user)
}

pub async fn username_taken(db: &SqlitePool, username: &str) -> Result<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE username = ?")
        .bind(username)
        .fetch_one(db)
        .await?;
    Ok(count > 0)
}

/// Whether `email` belongs to an account other than `except_user_id`
pub async fn email_taken(
    db: &SqlitePool,
    email: &str,
    except_user_id: Option<i64>,
) -> Result<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ? AND user_id != ?")
            .bind(email)
            .bind(except_user_id.unwrap_or(-1))
            .fetch_one(db)
            .await?;
    Ok(count > 0)
}

pub async fn create(db: &SqlitePool, new_user: &NewUser) -> Result<User> {
    let salt = generate_salt();
    let hash = hash_password(&new_user.password, &salt);
    let now = time::now();

    let user_id = sqlx::query(
        r#"
        INSERT INTO users (
            username, email, full_name, role, department, phone,
            password_hash, password_salt, is_active, created_time, updated_time
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?)
        "#,
    )
    .bind(&new_user.username)
    .bind(&new_user.email)
    .bind(&new_user.full_name)
    .bind(&new_user.role)
    .bind(&new_user.department)
    .bind(&new_user.phone)
    .bind(&hash)
    .bind(&salt)
    .bind(now)
    .bind(now)
    .execute(db)
    .await?
    .last_insert_rowid();

    find_by_id(db, user_id)
        .await?
        .ok_or_else(|| Error::Internal(format!("User {} vanished after insert", user_id)))
}

pub async fn touch_last_login(db: &SqlitePool, user_id: i64) -> Result<()> {
    sqlx::query("UPDATE users SET last_login = ? WHERE user_id = ?")
        .bind(time::now())
        .bind(user_id)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn update_profile(db: &SqlitePool, user_id: i64, update: &ProfileUpdate) -> Result<User> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE users SET updated_time = ");
    qb.push_bind(time::now());

    if let Some(v) = &update.full_name {
        qb.push(", full_name = ").push_bind(v.clone());
    }
    if let Some(v) = &update.email {
        qb.push(", email = ").push_bind(v.clone());
    }
    if let Some(v) = &update.department {
        qb.push(", department = ").push_bind(v.clone());
    }
    if let Some(v) = &update.phone {
        qb.push(", phone = ").push_bind(v.clone());
    }
    if let Some(v) = &update.avatar_url {
        qb.push(", avatar_url = ").push_bind(v.clone());
    }
    if let Some(password) = &update.password {
        let salt = generate_salt();
        qb.push(", password_hash = ").push_bind(hash_password(password, &salt));
        qb.push(", password_salt = ").push_bind(salt);
    }
    qb.push(" WHERE user_id = ").push_bind(user_id);
    qb.build().execute(db).await?;

    find_by_id(db, user_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("User {}", user_id)))
}

fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &UserFilter) {
    qb.push(" WHERE 1 = 1");
    if let Some(role) = &filter.role {
        qb.push(" AND role = ").push_bind(role.clone());
    }
    if let Some(search) = &filter.search {
        let pattern = format!("%{}%", search);
        qb.push(" AND (username LIKE ")
            .push_bind(pattern.clone())
            .push(" OR full_name LIKE ")
            .push_bind(pattern.clone())
            .push(" OR email LIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

/// Newest accounts first; returns the page and the filtered total
pub async fn list(
    db: &SqlitePool,
    filter: &UserFilter,
    window: Pagination,
) -> Result<(Vec<User>, i64)> {
    let mut count_qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*) FROM users");
    push_filter(&mut count_qb, filter);
    let total: i64 = count_qb.build_query_scalar().fetch_one(db).await?;

    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!("SELECT {} FROM users", USER_COLUMNS));
    push_filter(&mut qb, filter);
    qb.push(" ORDER BY created_time DESC, user_id DESC LIMIT ")
        .push_bind(window.page_size)
        .push(" OFFSET ")
        .push_bind(window.offset);
    let users = qb.build_query_as::<User>().fetch_all(db).await?;

    Ok((users, total))
}

/// Create the configured admin account when no accounts exist
///
/// Returns whether an account was created.
pub async fn ensure_bootstrap_admin(
    db: &SqlitePool,
    username: &str,
    password: &str,
) -> Result<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(db)
        .await?;
    if count > 0 {
        return Ok(false);
    }

    create(
        db,
        &NewUser {
            username: username.to_string(),
            email: format!("{}@localhost", username),
            full_name: "Administrator".to_string(),
            role: ROLE_ADMIN.to_string(),
            department: None,
            phone: None,
            password: password.to_string(),
        },
    )
    .await?;
    info!(username, "Created bootstrap admin account");
    Ok(true)
}
