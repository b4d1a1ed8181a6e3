//! Session listing and revocation.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;

use crate::dtos::session::TerminateAllResponse;
use crate::middleware::CurrentSession;
use crate::models::SessionInfo;
use crate::AppState;

pub async fn list_sessions(
    State(state): State<AppState>,
    CurrentSession(bound): CurrentSession,
) -> Result<Json<Vec<SessionInfo>>, AppError> {
    let sessions = state.sessions.list(&bound.account_id).await?;

    Ok(Json(
        sessions
            .into_iter()
            .map(|s| SessionInfo::from_session(s, &bound.session_id))
            .collect(),
    ))
}

/// Revokes one other session of the caller's account. The current session
/// cannot be revoked here; use logout instead.
pub async fn terminate_session(
    State(state): State<AppState>,
    CurrentSession(bound): CurrentSession,
    Path(session_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state
        .sessions
        .terminate(&bound.account_id, &bound.session_id, &session_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn terminate_other_sessions(
    State(state): State<AppState>,
    CurrentSession(bound): CurrentSession,
) -> Result<Json<TerminateAllResponse>, AppError> {
    let terminated = state
        .sessions
        .terminate_all(&bound.account_id, &bound.session_id)
        .await?;
    Ok(Json(TerminateAllResponse { terminated }))
}
