//! Poll endpoints.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use pollen_common::{AppError, AppResult};
use pollen_core::{CommentInput, PollSummary, PollView, PublishPollInput};
use pollen_db::entities::{poll, poll_comment, vote};
use serde::Deserialize;

use crate::{
    extractors::{AuthUser, Pagination, split_ids},
    middleware::AppState,
    response::ApiResponse,
};

/// Publish a new poll.
async fn publish(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<PublishPollInput>,
) -> AppResult<ApiResponse<poll::Model>> {
    let poll = state.poll_service.publish(&user.id, req).await?;
    Ok(ApiResponse::ok(poll))
}

/// Feed query.
#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    pub before: Option<String>,
    /// Comma-separated poll ids the client already shows.
    pub exclude: Option<String>,
}

/// Recent polls the caller has not voted on.
async fn feed(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> AppResult<ApiResponse<Vec<PollSummary>>> {
    let exclude = split_ids(query.exclude.as_deref());
    let polls = state
        .poll_service
        .get_recent_unvoted(&user.id, query.before.as_deref(), &exclude)
        .await?;
    Ok(ApiResponse::ok(polls))
}

/// Show query.
#[derive(Debug, Deserialize)]
pub struct ShowQuery {
    /// Voter and subscriber sets are only included with `trimmed=false`.
    #[serde(default = "default_trimmed")]
    pub trimmed: bool,
}

const fn default_trimmed() -> bool {
    true
}

/// Get a poll by id.
async fn show(
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
    Query(query): Query<ShowQuery>,
) -> AppResult<ApiResponse<PollView>> {
    let poll = state
        .poll_service
        .get_by_id(&poll_id, query.trimmed)
        .await?
        .ok_or(AppError::PollNotFound(poll_id))?;
    Ok(ApiResponse::ok(poll))
}

/// List comments, oldest first.
async fn comments(
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
    Query(page): Query<Pagination>,
) -> AppResult<ApiResponse<Vec<poll_comment::Model>>> {
    let comments = state
        .poll_service
        .get_comments(&poll_id, page.skip, page.limit)
        .await?;
    Ok(ApiResponse::ok(comments))
}

/// Comment on a poll and subscribe to its comments.
async fn comment(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
    Json(req): Json<CommentInput>,
) -> AppResult<ApiResponse<poll::Model>> {
    let poll = state
        .poll_service
        .comment(&poll_id, &user.id, req)
        .await?
        .ok_or(AppError::PollNotFound(poll_id))?;
    Ok(ApiResponse::ok(poll))
}

/// Vote request.
#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub answer: i16,
}

/// Vote on a poll. A second vote by the same user is rejected with
/// `ALREADY_VOTED` and changes nothing.
async fn cast_vote(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
    Json(req): Json<VoteRequest>,
) -> AppResult<Response> {
    if let Some(vote) = state
        .vote_service
        .create_new(&user.id, &poll_id, req.answer)
        .await?
    {
        return Ok(ApiResponse::<vote::Model>::ok(vote).into_response());
    }

    // Nothing changed: tell a missing poll apart from a repeated vote.
    if state.poll_service.get_by_id(&poll_id, true).await?.is_none() {
        return Err(AppError::PollNotFound(poll_id));
    }
    Ok(ApiResponse::<()>::err("ALREADY_VOTED", "You already voted on this poll").into_response())
}

/// Users who chose one answer, newest vote first.
async fn voters(
    State(state): State<AppState>,
    Path((poll_id, answer)): Path<(String, i16)>,
    Query(page): Query<Pagination>,
) -> AppResult<ApiResponse<Vec<pollen_core::UserSummary>>> {
    let voters = state
        .vote_service
        .get_voters_for(&poll_id, answer, page.skip, page.limit)
        .await?;
    Ok(ApiResponse::ok(voters))
}

/// Polls by creator query.
#[derive(Debug, Deserialize)]
pub struct UserPollsQuery {
    pub before: Option<String>,
    #[serde(default = "crate::extractors::default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub trimmed: bool,
}

/// A user's polls, newest first.
async fn by_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<UserPollsQuery>,
) -> AppResult<ApiResponse<Vec<PollView>>> {
    let polls = state
        .poll_service
        .get_by_user_id(&user_id, query.before.as_deref(), query.limit, query.trimmed)
        .await?;
    Ok(ApiResponse::ok(polls))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(publish))
        .route("/feed", get(feed))
        .route("/user/{user_id}", get(by_user))
        .route("/{id}", get(show))
        .route("/{id}/comments", get(comments).post(comment))
        .route("/{id}/votes", post(cast_vote))
        .route("/{id}/voters/{answer}", get(voters))
}
