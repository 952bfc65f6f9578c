//! Request extractors
//!
//! `AuthUser` resolves the bearer token to a live account; `AdminUser`
//! additionally requires the admin role. Handlers that take neither are public.
//! `ApiJson` and `ApiQuery` reject malformed input with the JSON envelope
//! instead of axum's plain-text rejections.

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::{header::AUTHORIZATION, request::Parts},
    Json,
};
use fedreg_common::api::{bearer_token, decode_token, ApiAuthError};
use fedreg_common::db::User;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::db::users;
use crate::error::ApiError;
use crate::AppState;

pub const USER_UNAVAILABLE: &str = "User not found or inactive";
pub const INSUFFICIENT_PERMISSIONS: &str = "Insufficient permissions";

/// Any authenticated, active account
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

/// Authenticated account with the admin role
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = match parts.headers.get(AUTHORIZATION) {
            Some(value) => Some(value.to_str().map_err(|_| ApiAuthError::InvalidFormat)?),
            None => None,
        };
        let token = bearer_token(header)?;
        let claims = decode_token(token, &state.config.auth.jwt_secret)?;

        let user = users::find_by_id(&state.db, claims.sub)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(|| ApiError::Unauthorized(USER_UNAVAILABLE.to_string()))?;

        debug!(user_id = user.user_id, role = %user.role, "Authenticated request");
        Ok(AuthUser(user))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(ApiError::Forbidden(INSUFFICIENT_PERMISSIONS.to_string()));
        }
        Ok(AdminUser(user))
    }
}

/// JSON body whose rejection renders as a 400 envelope
#[derive(Debug, Clone)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
        Ok(ApiJson(value))
    }
}

/// Query string whose rejection renders as a 400 envelope
#[derive(Debug, Clone)]
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
        Ok(ApiQuery(value))
    }
}
