//! Database integration tests.
//!
//! These tests require a running `PostgreSQL` instance.
//! Run with: `cargo test --test db_integration -- --ignored`
//!
//! Environment variables:
//!   `TEST_DB_HOST` (default: localhost)
//!   `TEST_DB_PORT` (default: 5433)
//!   `TEST_DB_USER` (default: `pollen_test`)
//!   `TEST_DB_PASSWORD` (default: `pollen_test`)
//!   `TEST_DB_NAME` (default: `pollen_test`)

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use chrono::Utc;
use pollen_common::IdGenerator;
use pollen_db::{
    entities::{
        device_token::Platform,
        follower,
        poll::{self, Answer, UserIds},
        user,
    },
    repositories::{
        DeviceTokenRepository, FollowerRepository, PollRepository, UserRepository, VoteRepository,
    },
    test_utils::{TestDatabase, TestDbConfig},
};
use sea_orm::{DatabaseConnection, Set};

async fn create_user(db: &Arc<DatabaseConnection>, name: &str) -> user::Model {
    let id_gen = IdGenerator::new();
    let id = id_gen.generate();
    UserRepository::new(db.clone())
        .create(user::ActiveModel {
            id: Set(id.clone()),
            email: Set(format!("{id}@example.com")),
            name: Set(name.to_string()),
            picture_url: Set(None),
            password_hash: Set(None),
            token: Set(id_gen.generate_token()),
            external_provider: Set(None),
            external_id: Set(None),
            created_at: Set(Utc::now().into()),
            updated_at: Set(None),
        })
        .await
        .unwrap()
}

async fn create_poll(db: &Arc<DatabaseConnection>, creator: &user::Model) -> poll::Model {
    PollRepository::new(db.clone())
        .create(poll::ActiveModel {
            id: Set(IdGenerator::new().generate()),
            creator_id: Set(creator.id.clone()),
            creator_name: Set(creator.name.clone()),
            creator_picture: Set(None),
            question: Set("Tea or coffee?".to_string()),
            answer1_text: Set("Tea".to_string()),
            answer1_picture: Set(None),
            answer1_num_votes: Set(0),
            answer1_voters: Set(UserIds::default()),
            answer2_text: Set("Coffee".to_string()),
            answer2_picture: Set(None),
            answer2_num_votes: Set(0),
            answer2_voters: Set(UserIds::default()),
            subscribers: Set(UserIds::single(creator.id.clone())),
            num_comments: Set(0),
            created_at: Set(Utc::now().into()),
        })
        .await
        .unwrap()
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_database_connection() {
    let config = TestDbConfig::default();
    let result = TestDatabase::with_config(config).await;
    assert!(result.is_ok(), "Failed to connect: {:?}", result.err());
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_second_vote_is_rejected() {
    let test_db = TestDatabase::new().await.expect("Failed to connect");
    let db = Arc::new(test_db.conn);

    let alice = create_user(&db, "Alice").await;
    let bob = create_user(&db, "Bob").await;
    let poll = create_poll(&db, &alice).await;
    let polls = PollRepository::new(db.clone());

    let first = polls.vote_answer(&poll.id, &bob.id, Answer::First).await.unwrap();
    let second = polls.vote_answer(&poll.id, &bob.id, Answer::Second).await.unwrap();

    assert!(first.is_some());
    assert!(second.is_none());

    let stored = polls.find_by_id(&poll.id).await.unwrap().unwrap();
    assert_eq!(stored.answer1_num_votes, 1);
    assert_eq!(stored.answer2_num_votes, 0);
    assert_eq!(stored.answer1_voters, UserIds::single(bob.id.clone()));
    assert!(!stored.answer2_voters.contains(&bob.id));

    let feed = polls.find_recent_unvoted(&bob.id, None, &[]).await.unwrap();
    assert!(feed.iter().all(|p| !p.has_voted(&bob.id)));
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_vote_ledger_unique_per_poll() {
    use pollen_db::entities::vote;

    let test_db = TestDatabase::new().await.expect("Failed to connect");
    let db = Arc::new(test_db.conn);

    let alice = create_user(&db, "Alice").await;
    let poll = create_poll(&db, &alice).await;
    let votes = VoteRepository::new(db.clone());
    let row = |id: String| vote::ActiveModel {
        id: Set(id),
        voter_id: Set(alice.id.clone()),
        poll_id: Set(poll.id.clone()),
        answer: Set(1),
        created_at: Set(Utc::now().into()),
    };

    let id_gen = IdGenerator::new();
    votes.create(row(id_gen.generate())).await.unwrap();
    let duplicate = votes.create(row(id_gen.generate())).await;

    assert!(matches!(
        duplicate,
        Err(pollen_common::AppError::Conflict(_))
    ));
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_follow_twice_is_once() {
    let test_db = TestDatabase::new().await.expect("Failed to connect");
    let db = Arc::new(test_db.conn);

    let alice = create_user(&db, "Alice").await;
    let bob = create_user(&db, "Bob").await;
    let followers = FollowerRepository::new(db.clone());
    let row = || follower::ActiveModel {
        id: Set(IdGenerator::new().generate()),
        user_id: Set(bob.id.clone()),
        follower_id: Set(alice.id.clone()),
        follower_name: Set(alice.name.clone()),
        follower_picture: Set(None),
        created_at: Set(Utc::now().into()),
    };

    assert!(followers.insert_if_absent(row()).await.unwrap());
    assert!(!followers.insert_if_absent(row()).await.unwrap());
    assert_eq!(followers.count_followers(&bob.id).await.unwrap(), 1);
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_device_token_moves_between_users() {
    let test_db = TestDatabase::new().await.expect("Failed to connect");
    let db = Arc::new(test_db.conn);

    let u1 = create_user(&db, "One").await;
    let u2 = create_user(&db, "Two").await;
    let tokens = DeviceTokenRepository::new(db.clone());
    let id_gen = IdGenerator::new();
    let token = format!("device-{}", id_gen.generate());

    tokens
        .register(id_gen.generate(), &u1.id, &token, Platform::Ios)
        .await
        .unwrap();
    tokens
        .register(id_gen.generate(), &u2.id, &token, Platform::Ios)
        .await
        .unwrap();
    tokens
        .register(id_gen.generate(), &u2.id, &token, Platform::Ios)
        .await
        .unwrap();

    assert!(tokens.find_by_user(&u1.id).await.unwrap().is_empty());
    assert_eq!(tokens.find_by_user(&u2.id).await.unwrap().len(), 1);
}

#[test]
fn test_config_from_env() {
    let config = TestDbConfig::default();
    assert!(!config.host.is_empty());
    assert!(config.port > 0);
    assert!(!config.username.is_empty());
    assert!(!config.database.is_empty());
}

#[test]
fn test_database_url_points_at_configured_database() {
    let config = TestDbConfig::default();
    let url = config.database_url();
    assert!(url.starts_with("postgres://"));
    assert!(url.ends_with(&format!("/{}", config.database)));
}
