//! User, follow and device endpoints.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
};
use pollen_common::AppResult;
use pollen_core::{FollowingInfo, RegisterDeviceInput, UpdateProfileInput, UserSummary};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    extractors::{AuthUser, MaybeAuthUser, Pagination},
    middleware::AppState,
    response::{ApiResponse, ok},
};

/// Public profile.
#[derive(Serialize)]
pub struct UserProfileResponse {
    #[serde(flatten)]
    pub user: UserSummary,
    pub followers_count: u64,
    pub following_count: u64,
    /// Whether the caller follows this user; absent for anonymous callers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_following: Option<bool>,
}

/// Get a user profile.
async fn show(
    MaybeAuthUser(viewer): MaybeAuthUser,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<ApiResponse<UserProfileResponse>> {
    let user = state.user_service.get(&user_id).await?;
    let (followers_count, following_count) = state.following_service.counts(&user.id).await?;

    let is_following = match viewer {
        Some(viewer) if viewer.id != user.id => {
            let info = state
                .following_service
                .get_following_info(&viewer.id, std::slice::from_ref(&user.id))
                .await?;
            Some(info.first().is_some_and(|i| i.is_following))
        }
        _ => None,
    };

    Ok(ApiResponse::ok(UserProfileResponse {
        user: UserSummary::from(&user),
        followers_count,
        following_count,
        is_following,
    }))
}

/// Update the caller's profile.
async fn update_me(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<UpdateProfileInput>,
) -> AppResult<ApiResponse<UserSummary>> {
    let updated = state.user_service.update_profile(&user.id, req).await?;
    Ok(ApiResponse::ok(UserSummary::from(&updated)))
}

/// Follow response.
#[derive(Serialize)]
pub struct FollowResponse {
    /// False when the caller already followed this user.
    pub created: bool,
}

/// Follow a user.
async fn follow(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<ApiResponse<FollowResponse>> {
    let row = state.following_service.follow(&user.id, &user_id).await?;
    Ok(ApiResponse::ok(FollowResponse {
        created: row.is_some(),
    }))
}

/// Unfollow a user.
async fn unfollow(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    state.following_service.unfollow(&user.id, &user_id).await?;
    Ok(ok())
}

/// Users following a user.
async fn followers(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(page): Query<Pagination>,
) -> AppResult<ApiResponse<Vec<UserSummary>>> {
    let users = state
        .following_service
        .get_followers(&user_id, page.skip, page.limit)
        .await?;
    Ok(ApiResponse::ok(users))
}

/// Users a user follows.
async fn following(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(page): Query<Pagination>,
) -> AppResult<ApiResponse<Vec<UserSummary>>> {
    let users = state
        .following_service
        .get_following(&user_id, page.skip, page.limit)
        .await?;
    Ok(ApiResponse::ok(users))
}

/// Following info request.
#[derive(Debug, Deserialize, Validate)]
pub struct FollowingInfoRequest {
    #[validate(length(max = 100))]
    pub user_ids: Vec<String>,
}

/// Whether the caller follows each of the given users.
async fn following_info(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<FollowingInfoRequest>,
) -> AppResult<ApiResponse<Vec<FollowingInfo>>> {
    req.validate()?;

    let info = state
        .following_service
        .get_following_info(&user.id, &req.user_ids)
        .await?;
    Ok(ApiResponse::ok(info))
}

/// Register a push token for the caller's device.
async fn register_device(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<RegisterDeviceInput>,
) -> AppResult<impl IntoResponse> {
    state
        .device_service
        .register_device_token(&user.id, req)
        .await?;
    Ok(ok())
}

/// Unregister request.
#[derive(Debug, Deserialize)]
pub struct UnregisterDeviceRequest {
    pub token: String,
}

/// Remove a push token from the caller's devices.
async fn unregister_device(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<UnregisterDeviceRequest>,
) -> AppResult<impl IntoResponse> {
    state
        .device_service
        .unregister_device_token(&user.id, &req.token)
        .await?;
    Ok(ok())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me", post(update_me))
        .route("/following-info", post(following_info))
        .route("/devices", post(register_device).delete(unregister_device))
        .route("/{id}", get(show))
        .route("/{id}/follow", post(follow).delete(unfollow))
        .route("/{id}/followers", get(followers))
        .route("/{id}/following", get(following))
}
