//! API endpoints.

mod auth;
mod notifications;
mod polls;
mod users;
mod votes;

use axum::Router;

use crate::middleware::AppState;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/polls", polls::router())
        .nest("/votes", votes::router())
        .nest("/users", users::router())
        .nest("/notifications", notifications::router())
}
