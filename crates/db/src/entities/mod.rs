//! Database entities.

#![allow(missing_docs)]

pub mod device_token;
pub mod follower;
pub mod notification;
pub mod poll;
pub mod poll_comment;
pub mod user;
pub mod vote;

pub use device_token::Entity as DeviceToken;
pub use follower::Entity as Follower;
pub use notification::Entity as Notification;
pub use poll::Entity as Poll;
pub use poll_comment::Entity as PollComment;
pub use user::Entity as User;
pub use vote::Entity as Vote;
