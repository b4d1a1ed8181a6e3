use axum::{extract::State, http::StatusCode, Json};
use service_core::error::AppError;

use crate::dtos::account::RegisterAccountRequest;
use crate::middleware::CurrentSession;
use crate::models::AccountProfile;
use crate::services::NewAccount;
use crate::utils::{Password, ValidatedJson};
use crate::AppState;

pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RegisterAccountRequest>,
) -> Result<(StatusCode, Json<AccountProfile>), AppError> {
    let account = state
        .accounts
        .register(NewAccount {
            email: req.email,
            username: req.username,
            password: Password::new(req.password),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(account.profile())))
}

pub async fn me(
    State(state): State<AppState>,
    CurrentSession(bound): CurrentSession,
) -> Result<Json<AccountProfile>, AppError> {
    Ok(Json(state.accounts.profile(&bound.account_id).await?))
}
