//! Core business logic for pollen.
//!
//! Services sit between the HTTP handlers and the repositories. Writes that
//! other users should hear about publish a [`DomainEvent`]; the
//! [`NotificationDispatcher`] consumes those off the request path and turns
//! them into stored notifications and device pushes.

pub mod services;

pub use services::*;

#[cfg(test)]
mod fixtures;
