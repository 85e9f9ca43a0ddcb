use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use referral_shared::errors::{AppError, AppResult, ErrorCode};
use referral_shared::middleware::ValidatedJson;
use referral_shared::types::auth::AuthUser;
use referral_shared::types::{ApiResponse, Empty};

use crate::models::ReferralCode;
use crate::services::referral_service;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCodeRequest {
    /// Generated when omitted.
    pub code: Option<String>,
    /// RFC 3339 timestamp or `YYYY-MM-DD`; the configured default when omitted.
    pub expiry: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CodeLookupQuery {
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CodeResponse {
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

impl From<ReferralCode> for CodeResponse {
    fn from(code: ReferralCode) -> Self {
        Self {
            code: code.code,
            expires_at: code.expires_at,
        }
    }
}

// --- POST /referral-code ---

pub async fn create_code(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<CreateCodeRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<CodeResponse>>)> {
    let expiry = req
        .expiry
        .as_deref()
        .map(referral_service::parse_expiry)
        .transpose()?;

    let issued = referral_service::issue_code(
        state.store.as_ref(),
        &state.policy,
        user.id,
        req.code,
        expiry,
        Utc::now(),
    )?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(issued.into()))))
}

// --- DELETE /referral-code ---

pub async fn delete_code(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Empty>>> {
    referral_service::delete_code(state.store.as_ref(), user.id)?;
    Ok(Json(ApiResponse::ok_with_message(Empty {}, "referral code deleted")))
}

// --- GET /referral-code?email= ---

pub async fn code_by_email(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CodeLookupQuery>,
) -> AppResult<Json<ApiResponse<CodeResponse>>> {
    let email = query
        .email
        .filter(|e| !e.is_empty())
        .ok_or_else(|| AppError::new(ErrorCode::ValidationError, "email query parameter is required"))?;

    let code = referral_service::code_for_email(state.store.as_ref(), &state.policy, &email, Utc::now())?;
    Ok(Json(ApiResponse::ok(code.into())))
}
