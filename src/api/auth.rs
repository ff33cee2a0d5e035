use axum::Extension;
use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;

use super::types::{
    LOGIN_SUCCESS, LOGOUT_SUCCESS, LoginRequest, LoginResponse, MessageResponse, SIGNUP_SUCCESS,
    SignupRequest, SignupResponse,
};
use crate::AppState;
use crate::auth::AuthUser;
use crate::config::ProfileInsertPolicy;
use crate::error::AppError;

/// An unreadable body counts as one with every field missing.
fn body_or_default<T: Default>(body: Result<Json<T>, JsonRejection>) -> T {
    match body {
        Ok(Json(body)) => body,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Unreadable request body");
            T::default()
        }
    }
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, AppError> {
    let body = body_or_default(body);
    let outcome = state.gateway.login(&body.email, &body.password).await?;
    Ok(Json(LoginResponse {
        message: LOGIN_SUCCESS.to_string(),
        token: outcome.token,
        user: outcome.user,
    }))
}

/// POST /api/auth/signup
///
/// Creates the account but does not log the caller in.
pub async fn signup(
    State(state): State<AppState>,
    body: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SignupResponse>), AppError> {
    let body = body_or_default(body);
    let outcome = state
        .gateway
        .signup(&body.email, &body.password, &body.name)
        .await?;

    let warning = match state.gateway.insert_policy() {
        ProfileInsertPolicy::Degraded => outcome.profile_error,
        ProfileInsertPolicy::Log | ProfileInsertPolicy::Fail => None,
    };

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            message: SIGNUP_SUCCESS.to_string(),
            user: outcome.identity,
            warning,
        }),
    ))
}

/// POST /api/auth/logout (auth required)
pub async fn logout(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<MessageResponse>, AppError> {
    state.gateway.logout(&user.token).await?;
    tracing::info!(user_id = %user.user_id, "Logged out");
    Ok(Json(MessageResponse {
        message: LOGOUT_SUCCESS.to_string(),
    }))
}
