//! Login, logout and step-up token issuance.

use axum::{extract::State, http::StatusCode, Json};
use axum_extra::extract::cookie::CookieJar;
use service_core::error::AppError;

use crate::dtos::auth::{LoginRequest, LoginResponse, StepUpTokenRequest, StepUpTokenResponse};
use crate::middleware::{cookies, ClientDevice, CurrentSession};
use crate::utils::{Password, ValidatedJson};
use crate::AppState;

/// Authenticates by email and password and sets the session cookie. The
/// route's CSRF gate hands out the first CSRF pair on success.
pub async fn login(
    State(state): State<AppState>,
    ClientDevice(device): ClientDevice,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), AppError> {
    let session = state
        .auth
        .login(&req.email, &Password::new(req.password), device)
        .await?;

    let jar = jar.add(cookies::session_cookie(&state.settings, &session));

    Ok((
        jar,
        Json(LoginResponse {
            account_id: session.account_id,
            expires_at: session.expires_at,
        }),
    ))
}

/// Ends the caller's session and clears its cookie.
pub async fn logout(
    State(state): State<AppState>,
    CurrentSession(bound): CurrentSession,
    jar: CookieJar,
) -> Result<(CookieJar, StatusCode), AppError> {
    state.auth.logout(&bound.session_id).await?;

    Ok((
        jar.add(cookies::cleared_session_cookie(&state.settings)),
        StatusCode::NO_CONTENT,
    ))
}

/// Re-verifies the password and returns a short-lived step-up token.
pub async fn issue_token(
    State(state): State<AppState>,
    CurrentSession(bound): CurrentSession,
    ValidatedJson(req): ValidatedJson<StepUpTokenRequest>,
) -> Result<Json<StepUpTokenResponse>, AppError> {
    let token = state
        .auth
        .issue_step_up_token(&bound.account_id, &Password::new(req.password))
        .await?;

    Ok(Json(StepUpTokenResponse {
        token,
        token_type: "Bearer".to_string(),
        expires_in: state.auth.tokens().ttl().num_seconds(),
    }))
}
