//! Business logic services.

#![allow(missing_docs)]

pub mod device;
pub mod dispatcher;
pub mod events;
pub mod following;
pub mod notification;
pub mod poll;
pub mod push;
pub mod user;
pub mod vote;

pub use device::{DeviceService, RegisterDeviceInput};
pub use dispatcher::NotificationDispatcher;
pub use events::{DomainEvent, EventBus, EventHandler, EventSender, MAX_WORKERS};
pub use following::{FollowingInfo, FollowingService};
pub use notification::{NewNotification, NotificationService, NotificationView};
pub use poll::{
    AnswerSummary, CommentInput, MAX_PAGE_SIZE, PollService, PollSummary, PollView,
    PublishPollInput,
};
pub use push::{ApnsProvider, FcmProvider, PushMessage, PushProvider, PushService};
pub use user::{
    CreateUserInput, ExternalIdentityInput, UpdateProfileInput, UserService, UserSummary,
};
pub use vote::{VoteService, VoteView};
