//! Follower repository.

use std::sync::Arc;

use crate::{
    entities::{Follower, follower},
    map_db_err,
};
use pollen_common::{AppError, AppResult};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, sea_query::OnConflict,
};

/// Follower repository for database operations.
#[derive(Clone)]
pub struct FollowerRepository {
    db: Arc<DatabaseConnection>,
}

impl FollowerRepository {
    /// Create a new follower repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Insert a follower row unless the pair already exists.
    ///
    /// Returns `true` when a row was written. Concurrent calls for the same
    /// pair race on the `(user_id, follower_id)` unique index, so exactly one
    /// of them sees `true`.
    pub async fn insert_if_absent(&self, model: follower::ActiveModel) -> AppResult<bool> {
        let rows = Follower::insert(model)
            .on_conflict(
                OnConflict::columns([follower::Column::UserId, follower::Column::FollowerId])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(self.db.as_ref())
            .await
            .map_err(map_db_err)?;

        Ok(rows == 1)
    }

    /// Delete the follower row for a pair. Missing rows are not an error.
    pub async fn delete_pair(&self, user_id: &str, follower_id: &str) -> AppResult<u64> {
        let result = Follower::delete_many()
            .filter(follower::Column::UserId.eq(user_id))
            .filter(follower::Column::FollowerId.eq(follower_id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    /// Followers of a user, newest first.
    pub async fn find_followers(
        &self,
        user_id: &str,
        skip: u64,
        limit: u64,
    ) -> AppResult<Vec<follower::Model>> {
        Follower::find()
            .filter(follower::Column::UserId.eq(user_id))
            .order_by_desc(follower::Column::Id)
            .offset(skip)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Rows where the user is the follower, newest first.
    pub async fn find_following(
        &self,
        follower_id: &str,
        skip: u64,
        limit: u64,
    ) -> AppResult<Vec<follower::Model>> {
        Follower::find()
            .filter(follower::Column::FollowerId.eq(follower_id))
            .order_by_desc(follower::Column::Id)
            .offset(skip)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Keyset page of follower rows in ascending row order, for fan-out.
    ///
    /// Pass the last row id as `after` to fetch the next page.
    pub async fn follower_page(
        &self,
        user_id: &str,
        after: Option<&str>,
        limit: u64,
    ) -> AppResult<Vec<follower::Model>> {
        let mut query = Follower::find()
            .filter(follower::Column::UserId.eq(user_id))
            .order_by_asc(follower::Column::Id);

        if let Some(id) = after {
            query = query.filter(follower::Column::Id.gt(id));
        }

        query
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Of `target_ids`, the ones `follower_id` follows. One query.
    pub async fn followed_among(
        &self,
        follower_id: &str,
        target_ids: &[String],
    ) -> AppResult<Vec<String>> {
        if target_ids.is_empty() {
            return Ok(vec![]);
        }

        Follower::find()
            .select_only()
            .column(follower::Column::UserId)
            .filter(follower::Column::FollowerId.eq(follower_id))
            .filter(follower::Column::UserId.is_in(target_ids.iter().map(String::as_str)))
            .into_tuple()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count followers of a user.
    pub async fn count_followers(&self, user_id: &str) -> AppResult<u64> {
        Follower::find()
            .filter(follower::Column::UserId.eq(user_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count users a user follows.
    pub async fn count_following(&self, follower_id: &str) -> AppResult<u64> {
        Follower::find()
            .filter(follower::Column::FollowerId.eq(follower_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Set, Value};
    use std::collections::BTreeMap;

    fn create_test_follower(id: &str, user_id: &str, follower_id: &str) -> follower::Model {
        follower::Model {
            id: id.to_string(),
            user_id: user_id.to_string(),
            follower_id: follower_id.to_string(),
            follower_name: "Follower".to_string(),
            follower_picture: None,
            created_at: Utc::now().into(),
        }
    }

    fn active(model: &follower::Model) -> follower::ActiveModel {
        follower::ActiveModel {
            id: Set(model.id.clone()),
            user_id: Set(model.user_id.clone()),
            follower_id: Set(model.follower_id.clone()),
            follower_name: Set(model.follower_name.clone()),
            follower_picture: Set(model.follower_picture.clone()),
            created_at: Set(model.created_at),
        }
    }

    #[tokio::test]
    async fn test_insert_if_absent_reports_new_row() {
        let row = create_test_follower("f1", "bob", "alice");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );

        let repo = FollowerRepository::new(db);
        assert!(repo.insert_if_absent(active(&row)).await.unwrap());
    }

    #[tokio::test]
    async fn test_insert_if_absent_existing_pair_is_noop() {
        let row = create_test_follower("f2", "bob", "alice");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                }])
                .into_connection(),
        );

        let repo = FollowerRepository::new(db.clone());
        assert!(!repo.insert_if_absent(active(&row)).await.unwrap());
        drop(repo);

        let log = format!(
            "{:?}",
            Arc::try_unwrap(db).ok().unwrap().into_transaction_log()
        );
        assert!(log.contains("ON CONFLICT"));
        assert!(log.contains("DO NOTHING"));
    }

    #[tokio::test]
    async fn test_delete_pair_missing_is_ok() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                }])
                .into_connection(),
        );

        let repo = FollowerRepository::new(db);
        assert_eq!(repo.delete_pair("bob", "alice").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_find_followers() {
        let rows = vec![
            create_test_follower("f2", "bob", "carol"),
            create_test_follower("f1", "bob", "alice"),
        ];

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([rows])
                .into_connection(),
        );

        let repo = FollowerRepository::new(db);
        let result = repo.find_followers("bob", 0, 10).await.unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].follower_id, "carol");
    }

    #[tokio::test]
    async fn test_followed_among() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[BTreeMap::from([(
                    "user_id",
                    Value::from("bob"),
                )])]])
                .into_connection(),
        );

        let repo = FollowerRepository::new(db);
        let result = repo
            .followed_among("alice", &["bob".to_string(), "carol".to_string()])
            .await
            .unwrap();

        assert_eq!(result, vec!["bob".to_string()]);
    }
}
