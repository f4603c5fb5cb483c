//! Model builders shared by the service tests.

use chrono::Utc;
use pollen_db::entities::{
    device_token::{self, Platform},
    follower,
    notification::{self, SubjectType, Verb},
    poll::{self, UserIds},
    poll_comment, user, vote,
};

pub fn test_user(id: &str) -> user::Model {
    user::Model {
        id: id.to_string(),
        email: format!("{id}@example.com"),
        name: "Test User".to_string(),
        picture_url: None,
        password_hash: None,
        token: format!("token-{id}"),
        external_provider: None,
        external_id: None,
        created_at: Utc::now().into(),
        updated_at: None,
    }
}

/// A fresh poll: no votes, the creator as only subscriber.
pub fn test_poll(id: &str, creator_id: &str) -> poll::Model {
    poll::Model {
        id: id.to_string(),
        creator_id: creator_id.to_string(),
        creator_name: "Test User".to_string(),
        creator_picture: None,
        question: "Cats or dogs?".to_string(),
        answer1_text: "Cats".to_string(),
        answer1_picture: None,
        answer1_num_votes: 0,
        answer1_voters: UserIds::default(),
        answer2_text: "Dogs".to_string(),
        answer2_picture: None,
        answer2_num_votes: 0,
        answer2_voters: UserIds::default(),
        subscribers: UserIds::single(creator_id),
        num_comments: 0,
        created_at: Utc::now().into(),
    }
}

pub fn test_comment(id: &str, poll_id: &str, author_id: &str) -> poll_comment::Model {
    poll_comment::Model {
        id: id.to_string(),
        poll_id: poll_id.to_string(),
        author_id: author_id.to_string(),
        author_name: "Test User".to_string(),
        author_picture: None,
        text: "Dogs, obviously".to_string(),
        created_at: Utc::now().into(),
    }
}

pub fn test_vote(id: &str, voter_id: &str, poll_id: &str, answer: i16) -> vote::Model {
    vote::Model {
        id: id.to_string(),
        voter_id: voter_id.to_string(),
        poll_id: poll_id.to_string(),
        answer,
        created_at: Utc::now().into(),
    }
}

pub fn test_follower(id: &str, user_id: &str, follower_id: &str) -> follower::Model {
    follower::Model {
        id: id.to_string(),
        user_id: user_id.to_string(),
        follower_id: follower_id.to_string(),
        follower_name: "Test User".to_string(),
        follower_picture: None,
        created_at: Utc::now().into(),
    }
}

pub fn test_device(id: &str, user_id: &str, token: &str, platform: Platform) -> device_token::Model {
    device_token::Model {
        id: id.to_string(),
        user_id: user_id.to_string(),
        token: token.to_string(),
        platform,
        created_at: Utc::now().into(),
    }
}

/// An unread notification from "bob" about poll "p1".
pub fn test_notification(id: &str, recipient_id: &str, verb: Verb) -> notification::Model {
    notification::Model {
        id: id.to_string(),
        recipient_id: recipient_id.to_string(),
        actor_id: "bob".to_string(),
        verb,
        subject_type: SubjectType::Poll,
        subject_id: "p1".to_string(),
        detail: None,
        collapse_key: None,
        is_read: false,
        updated_at: Utc::now().into(),
    }
}
