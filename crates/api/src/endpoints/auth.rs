//! Authentication endpoints.

use axum::{Json, Router, extract::State, routing::post};
use pollen_common::AppResult;
use pollen_core::{CreateUserInput, ExternalIdentityInput};
use pollen_db::entities::user;
use serde::{Deserialize, Serialize};

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// Session response: the user and the bearer token to send back.
#[derive(Serialize)]
pub struct SessionResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub picture_url: Option<String>,
    pub token: String,
}

impl From<user::Model> for SessionResponse {
    fn from(user: user::Model) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            picture_url: user.picture_url,
            token: user.token,
        }
    }
}

/// Create a new account.
async fn signup(
    State(state): State<AppState>,
    Json(req): Json<CreateUserInput>,
) -> AppResult<ApiResponse<SessionResponse>> {
    let user = state.user_service.create(req).await?;
    Ok(ApiResponse::ok(user.into()))
}

/// Signin request.
#[derive(Debug, Deserialize)]
pub struct SigninRequest {
    pub email: String,
    pub password: String,
}

/// Sign in with email and password.
async fn signin(
    State(state): State<AppState>,
    Json(req): Json<SigninRequest>,
) -> AppResult<ApiResponse<SessionResponse>> {
    let user = state
        .user_service
        .authenticate(&req.email, &req.password)
        .await?;
    Ok(ApiResponse::ok(user.into()))
}

/// Sign out by rotating the token; the old one stops working.
async fn signout(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<()>> {
    state.user_service.regenerate_token(&user.id).await?;
    Ok(ApiResponse::ok(()))
}

/// Sign in with an identity already verified by an external provider.
async fn external(
    State(state): State<AppState>,
    Json(req): Json<ExternalIdentityInput>,
) -> AppResult<ApiResponse<SessionResponse>> {
    let user = state.user_service.link_external_identity(req).await?;
    Ok(ApiResponse::ok(user.into()))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/signin", post(signin))
        .route("/signout", post(signout))
        .route("/external", post(external))
}
