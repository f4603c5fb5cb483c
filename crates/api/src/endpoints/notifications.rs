//! Notification endpoints.

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{get, post},
};
use pollen_common::AppResult;
use pollen_core::NotificationView;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// List query.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub until_id: Option<String>,
    #[serde(default = "crate::extractors::default_limit")]
    pub limit: u64,
}

/// The caller's notifications, newest first.
async fn list(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<ApiResponse<Vec<NotificationView>>> {
    let notifications = state
        .notification_service
        .get_notifications(&user.id, query.until_id.as_deref(), query.limit)
        .await?;
    Ok(ApiResponse::ok(notifications))
}

/// Mark-as-read request.
#[derive(Debug, Deserialize, Validate)]
pub struct MarkReadRequest {
    #[validate(length(min = 1, max = 100))]
    pub ids: Vec<String>,
}

/// Count of rows changed.
#[derive(Serialize)]
pub struct UpdatedResponse {
    pub updated: u64,
}

/// Mark some notifications as read.
async fn mark_read(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<MarkReadRequest>,
) -> AppResult<ApiResponse<UpdatedResponse>> {
    req.validate()?;

    let updated = state
        .notification_service
        .mark_as_read(&user.id, &req.ids)
        .await?;
    Ok(ApiResponse::ok(UpdatedResponse { updated }))
}

/// Mark every notification as read.
async fn mark_all_read(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<UpdatedResponse>> {
    let updated = state.notification_service.mark_all_as_read(&user.id).await?;
    Ok(ApiResponse::ok(UpdatedResponse { updated }))
}

/// Unread count response.
#[derive(Serialize)]
pub struct UnreadCountResponse {
    pub count: u64,
}

/// Number of unread notifications.
async fn unread_count(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<UnreadCountResponse>> {
    let count = state.notification_service.count_unread(&user.id).await?;
    Ok(ApiResponse::ok(UnreadCountResponse { count }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/read", post(mark_read))
        .route("/read-all", post(mark_all_read))
        .route("/unread-count", get(unread_count))
}
