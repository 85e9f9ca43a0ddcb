use axum::extract::{Path, Query, State};
use axum::Json;
use std::sync::Arc;
use uuid::Uuid;

use referral_shared::errors::AppResult;
use referral_shared::types::auth::AuthUser;
use referral_shared::types::pagination::{Paginated, PaginationParams};
use referral_shared::types::ApiResponse;

use crate::models::ReferredAccount;
use crate::services::referral_service;
use crate::AppState;

// --- GET /referrals/:account_id ---

pub async fn list_referrals(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<Uuid>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<ApiResponse<Paginated<ReferredAccount>>>> {
    let page = referral_service::list_referrals(state.store.as_ref(), account_id, user.id, &params)?;
    Ok(Json(ApiResponse::ok(page)))
}
