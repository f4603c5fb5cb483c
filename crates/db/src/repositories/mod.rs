//! Repositories: all store access goes through these types.

mod device_token;
mod follower;
mod notification;
mod poll;
mod user;
mod vote;

pub use device_token::DeviceTokenRepository;
pub use follower::FollowerRepository;
pub use notification::NotificationRepository;
pub use poll::{FEED_PAGE, FEED_WINDOW, PollRepository};
pub use user::UserRepository;
pub use vote::VoteRepository;
