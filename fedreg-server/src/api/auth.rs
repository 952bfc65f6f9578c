//! Account endpoints under `/api/auth`

use axum::{
    extract::{ConnectInfo, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use fedreg_common::api::{issue_token, verify_password, ApiEnvelope};
use fedreg_common::db::{User, ROLES, ROLE_ADMIN, ROLE_DOCTOR};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tracing::{info, warn};

use super::extract::{AdminUser, ApiJson, ApiQuery, AuthUser, INSUFFICIENT_PERMISSIONS};
use crate::db::login_log::{self, LoginAttempt};
use crate::db::users::{self, NewUser, ProfileUpdate, UserFilter};
use crate::error::{ApiError, ApiResult};
use crate::pagination::{calculate_pagination, total_pages};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
    pub user: User,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub role: Option<String>,
    pub department: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProfileRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub department: Option<String>,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    pub password: Option<String>,
}

/// `{message, user}` payload of account mutations
#[derive(Debug, Serialize)]
pub struct UserResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct UserListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub role: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserListPagination {
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub pages: i64,
}

#[derive(Debug, Serialize)]
pub struct UserList {
    pub items: Vec<User>,
    pub pagination: UserListPagination,
}

/// Client address: first `X-Forwarded-For` hop, then `X-Real-IP`, then the peer
fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    if let Some(forwarded) = header("x-forwarded-for") {
        if let Some(first) = forwarded.split(',').next().map(str::trim).filter(|s| !s.is_empty()) {
            return Some(first.to_string());
        }
    }
    header("x-real-ip")
        .filter(|s| !s.trim().is_empty())
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
}

fn required(value: Option<String>, field: &str) -> ApiResult<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("Field {} is required", field)))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<Json<ApiEnvelope<LoginResponse>>> {
    let (username, password) = match (req.username, req.password) {
        (Some(u), Some(p)) if !u.trim().is_empty() => (u.trim().to_string(), p),
        _ => {
            return Err(ApiError::BadRequest(
                "Username and password are required".to_string(),
            ))
        }
    };

    let ip = client_ip(&headers, connect_info.map(|ConnectInfo(addr)| addr));
    let user_agent = headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok());
    let user = users::find_by_username(&state.db, &username).await?;

    let (failure, client_message) = match &user {
        None => (Some("User not found"), "Invalid username or password"),
        Some(u) if !u.is_active => (Some("User inactive"), "Account is disabled"),
        Some(u) if !verify_password(&password, &u.password_salt, &u.password_hash) => {
            (Some("Invalid password"), "Invalid username or password")
        }
        Some(_) => (None, ""),
    };

    login_log::record(
        &state.db,
        &LoginAttempt {
            user_id: user.as_ref().map(|u| u.user_id),
            username: &username,
            ip: ip.as_deref(),
            user_agent,
            failure_reason: failure,
        },
    )
    .await?;

    let user = match (user, failure) {
        (Some(user), None) => user,
        (_, reason) => {
            warn!(
                username = %username,
                reason = reason.unwrap_or_default(),
                ip = ?ip,
                "Login failed"
            );
            return Err(ApiError::Unauthorized(client_message.to_string()));
        }
    };

    users::touch_last_login(&state.db, user.user_id).await?;
    let token = issue_token(
        user.user_id,
        &user.username,
        &user.role,
        &state.config.auth.jwt_secret,
        state.config.auth.token_ttl_hours,
    )?;
    let user = users::find_by_id(&state.db, user.user_id).await?.unwrap_or(user);

    info!(user_id = user.user_id, username = %user.username, "Login succeeded");
    Ok(Json(ApiEnvelope::success(LoginResponse {
        message: "Login successful".to_string(),
        token,
        user,
    })))
}

/// POST /api/auth/register
///
/// Open registration for non-admin roles; creating an admin needs an admin token.
pub async fn register(
    State(state): State<AppState>,
    caller: Option<AuthUser>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ApiResult<Json<ApiEnvelope<UserResponse>>> {
    let username = required(req.username, "username")?;
    let password = required(req.password, "password")?;
    let email = required(req.email, "email")?;
    let full_name = required(req.full_name, "full_name")?;

    let role = req
        .role
        .map(|r| r.trim().to_ascii_lowercase())
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| ROLE_DOCTOR.to_string());
    if !ROLES.contains(&role.as_str()) {
        return Err(ApiError::BadRequest(format!(
            "Invalid role; allowed: {}",
            ROLES.join(", ")
        )));
    }
    if role == ROLE_ADMIN && !caller.as_ref().is_some_and(|AuthUser(u)| u.is_admin()) {
        return Err(ApiError::Forbidden(INSUFFICIENT_PERMISSIONS.to_string()));
    }

    if users::username_taken(&state.db, &username).await? {
        return Err(ApiError::BadRequest("Username already exists".to_string()));
    }
    if users::email_taken(&state.db, &email, None).await? {
        return Err(ApiError::BadRequest("Email already exists".to_string()));
    }

    let user = users::create(
        &state.db,
        &NewUser {
            username,
            email,
            full_name,
            role,
            department: req.department,
            phone: req.phone,
            password,
        },
    )
    .await?;

    info!(user_id = user.user_id, username = %user.username, role = %user.role, "Registered user");
    Ok(Json(ApiEnvelope::success(UserResponse {
        message: Some("User registered successfully".to_string()),
        user,
    })))
}

/// GET /api/auth/profile
pub async fn get_profile(AuthUser(user): AuthUser) -> Json<ApiEnvelope<UserResponse>> {
    Json(ApiEnvelope::success(UserResponse { message: None, user }))
}

/// PUT /api/auth/profile
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(req): ApiJson<ProfileRequest>,
) -> ApiResult<Json<ApiEnvelope<UserResponse>>> {
    if let Some(email) = &req.email {
        if email.trim().is_empty() {
            return Err(ApiError::BadRequest("Email must not be empty".to_string()));
        }
        if users::email_taken(&state.db, email, Some(user.user_id)).await? {
            return Err(ApiError::BadRequest("Email already exists".to_string()));
        }
    }

    let update = ProfileUpdate {
        full_name: req.full_name,
        email: req.email,
        department: req.department,
        phone: req.phone,
        avatar_url: req.avatar_url,
        password: req.password.filter(|p| !p.is_empty()),
    };
    let user = users::update_profile(&state.db, user.user_id, &update).await?;

    info!(user_id = user.user_id, "Profile updated");
    Ok(Json(ApiEnvelope::success(UserResponse {
        message: Some("Profile updated successfully".to_string()),
        user,
    })))
}

/// POST /api/auth/logout
///
/// Tokens are stateless; the client discards its copy.
pub async fn logout(AuthUser(user): AuthUser) -> Json<ApiEnvelope<MessageResponse>> {
    info!(user_id = user.user_id, "Logout");
    Json(ApiEnvelope::success(MessageResponse {
        message: "Logout successful".to_string(),
    }))
}

/// GET /api/auth/users
pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiQuery(query): ApiQuery<UserListQuery>,
) -> ApiResult<Json<ApiEnvelope<UserList>>> {
    let window = calculate_pagination(
        query.page,
        query.per_page,
        state.config.pagination.default_page_size,
        state.config.pagination.max_page_size,
    );
    let filter = UserFilter {
        role: query.role.filter(|r| !r.is_empty()),
        search: query.search.filter(|s| !s.is_empty()),
    };
    let (items, total) = users::list(&state.db, &filter, window).await?;

    Ok(Json(ApiEnvelope::success(UserList {
        items,
        pagination: UserListPagination {
            total,
            page: window.page,
            per_page: window.page_size,
            pages: total_pages(total, window.page_size),
        },
    })))
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/register", post(register))
        .route("/api/auth/profile", get(get_profile).put(update_profile))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/users", get(list_users))
}
