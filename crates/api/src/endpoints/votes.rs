//! Vote history endpoints.

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{get, post},
};
use pollen_common::AppResult;
use pollen_core::VoteView;
use serde::Deserialize;
use validator::Validate;

use crate::{
    extractors::{AuthUser, Cursor},
    middleware::AppState,
    response::ApiResponse,
};

/// The caller's votes, newest first.
async fn mine(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(cursor): Query<Cursor>,
) -> AppResult<ApiResponse<Vec<VoteView>>> {
    let votes = state
        .vote_service
        .get_by_user_id(&user.id, cursor.before.as_deref(), cursor.limit)
        .await?;
    Ok(ApiResponse::ok(votes))
}

/// Lookup request.
#[derive(Debug, Deserialize, Validate)]
pub struct LookupRequest {
    #[validate(length(max = 100))]
    pub poll_ids: Vec<String>,
}

/// The caller's votes on the given polls.
async fn lookup(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<LookupRequest>,
) -> AppResult<ApiResponse<Vec<VoteView>>> {
    req.validate()?;

    let votes = state
        .vote_service
        .get_by_user_id_and_poll_ids(&user.id, &req.poll_ids)
        .await?;
    Ok(ApiResponse::ok(votes))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/mine", get(mine))
        .route("/lookup", post(lookup))
}
