use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use referral_shared::errors::AppResult;
use referral_shared::middleware::ValidatedJson;
use referral_shared::types::auth::AccessToken;
use referral_shared::types::ApiResponse;

use crate::services::account_service;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> AppResult<Json<ApiResponse<AccessToken>>> {
    let token = account_service::authenticate(state.store.as_ref(), &state.tokens, &req.email, &req.password)?;
    Ok(Json(ApiResponse::ok(token)))
}
