use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use referral_shared::clients::email_verifier::Deliverability;
use referral_shared::errors::{AppError, AppResult, ErrorCode};
use referral_shared::middleware::ValidatedJson;
use referral_shared::types::ApiResponse;

use crate::models::Account;
use crate::services::{account_service, referral_service};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "invalid email format"))]
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub id: Uuid,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            email: account.email,
            created_at: account.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReferredRegistrationResponse {
    pub account: AccountResponse,
    pub referrer_id: Uuid,
}

/// Rejects addresses the configured verifier reports as undeliverable. A
/// verifier outage lets the registration through.
async fn ensure_deliverable(state: &AppState, email: &str) -> AppResult<()> {
    let Some(verifier) = &state.email_verifier else {
        return Ok(());
    };

    match verifier.check(email).await {
        Ok(Deliverability::Undeliverable) => Err(AppError::new(
            ErrorCode::ValidationError,
            "email address is not deliverable",
        )),
        Ok(_) => Ok(()),
        Err(e) => {
            tracing::warn!(error = %e, email = %email, "email verifier unavailable, skipping check");
            Ok(())
        }
    }
}

// --- POST /register ---

pub async fn register(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<AccountResponse>>)> {
    ensure_deliverable(&state, &req.email).await?;

    let account = account_service::register(state.store.as_ref(), &req.email, &req.password)?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(account.into()))))
}

// --- POST /register-by-code/:code ---

pub async fn register_by_code(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<ReferredRegistrationResponse>>)> {
    // Resolve before calling out to the verifier; a bad code must fail fast.
    referral_service::resolve_for_registration(state.store.as_ref(), &state.policy, &code, Utc::now())?;

    ensure_deliverable(&state, &req.email).await?;

    let (account, referral) = referral_service::register_with_code(
        state.store.as_ref(),
        &state.policy,
        &code,
        &req.email,
        &req.password,
        Utc::now(),
    )?;

    let body = ReferredRegistrationResponse {
        account: account.into(),
        referrer_id: referral.referrer_id,
    };
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(body))))
}
