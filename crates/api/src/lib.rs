//! HTTP API layer for pollen.
//!
//! This crate provides the REST API:
//!
//! - **Endpoints**: auth, polls, votes, users and notifications
//! - **Extractors**: Authentication and pagination
//! - **Middleware**: Bearer token resolution
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;

pub use endpoints::router;
