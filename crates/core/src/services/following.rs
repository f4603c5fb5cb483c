//! Following service.

use std::collections::HashSet;

use chrono::Utc;
use pollen_common::{AppError, AppResult, IdGenerator};
use pollen_db::{
    entities::follower,
    repositories::{FollowerRepository, UserRepository},
};
use sea_orm::Set;
use serde::Serialize;

use crate::services::{
    events::{DomainEvent, EventSender},
    poll::MAX_PAGE_SIZE,
    user::UserSummary,
};

/// Following service for business logic.
#[derive(Clone)]
pub struct FollowingService {
    follower_repo: FollowerRepository,
    user_repo: UserRepository,
    events: EventSender,
    id_gen: IdGenerator,
}

/// Whether the caller follows one target user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FollowingInfo {
    pub user_id: String,
    pub is_following: bool,
}

impl FollowingService {
    /// Create a new following service.
    #[must_use]
    pub const fn new(
        follower_repo: FollowerRepository,
        user_repo: UserRepository,
        events: EventSender,
    ) -> Self {
        Self {
            follower_repo,
            user_repo,
            events,
            id_gen: IdGenerator::new(),
        }
    }

    /// Follow a user.
    ///
    /// Returns the new follower row, or `None` if `from` already follows `to`.
    pub async fn follow(&self, from: &str, to: &str) -> AppResult<Option<follower::Model>> {
        // Can't follow yourself
        if from == to {
            return Err(AppError::BadRequest("Cannot follow yourself".to_string()));
        }

        let follower = self.user_repo.get_by_id(from).await?;
        let followee = self.user_repo.get_by_id(to).await?;

        let row = follower::Model {
            id: self.id_gen.generate(),
            user_id: followee.id.clone(),
            follower_id: follower.id.clone(),
            follower_name: follower.name.clone(),
            follower_picture: follower.picture_url.clone(),
            created_at: Utc::now().into(),
        };
        let model = follower::ActiveModel {
            id: Set(row.id.clone()),
            user_id: Set(row.user_id.clone()),
            follower_id: Set(row.follower_id.clone()),
            follower_name: Set(row.follower_name.clone()),
            follower_picture: Set(row.follower_picture.clone()),
            created_at: Set(row.created_at),
        };

        if !self.follower_repo.insert_if_absent(model).await? {
            tracing::debug!(from = %from, to = %to, "Already following");
            return Ok(None);
        }

        tracing::info!(from = %from, to = %to, "User followed");
        self.events.publish(DomainEvent::UserFollowed {
            follower,
            followee_id: followee.id,
        });

        Ok(Some(row))
    }

    /// Stop following a user. Not following is not an error.
    pub async fn unfollow(&self, from: &str, to: &str) -> AppResult<()> {
        let removed = self.follower_repo.delete_pair(to, from).await?;
        if removed > 0 {
            tracing::info!(from = %from, to = %to, "User unfollowed");
        }
        Ok(())
    }

    /// Followers of a user.
    pub async fn get_followers(
        &self,
        user_id: &str,
        skip: u64,
        limit: u64,
    ) -> AppResult<Vec<UserSummary>> {
        let rows = self
            .follower_repo
            .find_followers(user_id, skip, limit.min(MAX_PAGE_SIZE))
            .await?;

        Ok(rows
            .into_iter()
            .map(|r| UserSummary {
                id: r.follower_id,
                name: r.follower_name,
                picture_url: r.follower_picture,
            })
            .collect())
    }

    /// Users a user follows.
    pub async fn get_following(
        &self,
        user_id: &str,
        skip: u64,
        limit: u64,
    ) -> AppResult<Vec<UserSummary>> {
        let rows = self
            .follower_repo
            .find_following(user_id, skip, limit.min(MAX_PAGE_SIZE))
            .await?;

        let ids: Vec<String> = rows.into_iter().map(|r| r.user_id).collect();
        let mut users = self.user_repo.find_by_ids(&ids).await?;
        users.sort_by_key(|u| ids.iter().position(|id| *id == u.id));

        Ok(users.iter().map(UserSummary::from).collect())
    }

    /// For each target, whether `user_id` follows it.
    pub async fn get_following_info(
        &self,
        user_id: &str,
        target_ids: &[String],
    ) -> AppResult<Vec<FollowingInfo>> {
        let followed: HashSet<String> = self
            .follower_repo
            .followed_among(user_id, target_ids)
            .await?
            .into_iter()
            .collect();

        Ok(target_ids
            .iter()
            .map(|id| FollowingInfo {
                user_id: id.clone(),
                is_following: followed.contains(id),
            })
            .collect())
    }

    /// Follower and following counts.
    pub async fn counts(&self, user_id: &str) -> AppResult<(u64, u64)> {
        let followers = self.follower_repo.count_followers(user_id).await?;
        let following = self.follower_repo.count_following(user_id).await?;
        Ok((followers, following))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fixtures::test_user;
    use crate::services::events::{
        EventBus,
        testing::{RecordingHandler, drain},
    };
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Value};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn service(follower_db: MockDatabase, user_db: MockDatabase, bus: &EventBus) -> FollowingService {
        FollowingService::new(
            FollowerRepository::new(Arc::new(follower_db.into_connection())),
            UserRepository::new(Arc::new(user_db.into_connection())),
            bus.sender(),
        )
    }

    fn empty() -> MockDatabase {
        MockDatabase::new(DatabaseBackend::Postgres)
    }

    fn rows(n: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected: n,
        }
    }

    #[tokio::test]
    async fn test_follow_yourself_returns_error() {
        let bus = EventBus::new();
        let service = service(empty(), empty(), &bus);

        let result = service.follow("alice", "alice").await;

        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_follow_twice_is_once() {
        let handler = Arc::new(RecordingHandler::default());
        let bus = EventBus::new();
        let service = service(
            empty().append_exec_results([rows(1), rows(0)]),
            empty()
                .append_query_results([[test_user("alice")], [test_user("bob")]])
                .append_query_results([[test_user("alice")], [test_user("bob")]]),
            &bus,
        );
        let consumer = bus.start(handler.clone());

        let first = service.follow("alice", "bob").await.unwrap();
        let second = service.follow("alice", "bob").await.unwrap();
        drop(service);
        drain(consumer).await;

        let row = first.unwrap();
        assert_eq!(row.user_id, "bob");
        assert_eq!(row.follower_id, "alice");
        assert!(second.is_none());

        assert_eq!(handler.names(), vec!["user_followed"]);
        let events = handler.events.lock().unwrap();
        assert!(matches!(
            &events[0],
            DomainEvent::UserFollowed { follower, followee_id } if follower.id == "alice" && followee_id == "bob"
        ));
    }

    #[tokio::test]
    async fn test_follow_unknown_user() {
        let bus = EventBus::new();
        let service = service(
            empty(),
            empty()
                .append_query_results([[test_user("alice")]])
                .append_query_results([Vec::<pollen_db::entities::user::Model>::new()]),
            &bus,
        );

        let result = service.follow("alice", "ghost").await;

        assert!(matches!(result, Err(AppError::UserNotFound(_))));
    }

    #[tokio::test]
    async fn test_unfollow_not_following_is_ok() {
        let bus = EventBus::new();
        let service = service(empty().append_exec_results([rows(0)]), empty(), &bus);

        assert!(service.unfollow("alice", "bob").await.is_ok());
    }

    #[tokio::test]
    async fn test_get_following_info() {
        let bus = EventBus::new();
        let service = service(
            empty().append_query_results([[BTreeMap::from([("user_id", Value::from("bob"))])]]),
            empty(),
            &bus,
        );

        let info = service
            .get_following_info("alice", &["bob".to_string(), "carol".to_string()])
            .await
            .unwrap();

        assert_eq!(
            info,
            vec![
                FollowingInfo {
                    user_id: "bob".to_string(),
                    is_following: true,
                },
                FollowingInfo {
                    user_id: "carol".to_string(),
                    is_following: false,
                },
            ]
        );
    }
}
