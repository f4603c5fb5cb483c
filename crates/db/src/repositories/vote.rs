//! Vote ledger repository.

use std::sync::Arc;

use crate::{
    entities::{Vote, vote},
    map_db_err,
};
use pollen_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect,
};

/// Vote repository for database operations.
#[derive(Clone)]
pub struct VoteRepository {
    db: Arc<DatabaseConnection>,
}

impl VoteRepository {
    /// Create a new vote repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Append a vote to the ledger. A second row for the same
    /// `(voter_id, poll_id)` is rejected by the unique index as `Conflict`.
    pub async fn create(&self, model: vote::ActiveModel) -> AppResult<vote::Model> {
        model.insert(self.db.as_ref()).await.map_err(map_db_err)
    }

    /// Votes for one answer of a poll, newest first.
    pub async fn find_by_poll_answer(
        &self,
        poll_id: &str,
        answer: i16,
        skip: u64,
        limit: u64,
    ) -> AppResult<Vec<vote::Model>> {
        Vote::find()
            .filter(vote::Column::PollId.eq(poll_id))
            .filter(vote::Column::Answer.eq(answer))
            .order_by_desc(vote::Column::Id)
            .offset(skip)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// A user's votes, newest first.
    pub async fn find_by_voter(
        &self,
        voter_id: &str,
        before_id: Option<&str>,
        limit: u64,
    ) -> AppResult<Vec<vote::Model>> {
        let mut query = Vote::find()
            .filter(vote::Column::VoterId.eq(voter_id))
            .order_by_desc(vote::Column::Id);

        if let Some(id) = before_id {
            query = query.filter(vote::Column::Id.lt(id));
        }

        query
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// A user's votes restricted to the given polls.
    pub async fn find_by_voter_and_polls(
        &self,
        voter_id: &str,
        poll_ids: &[String],
    ) -> AppResult<Vec<vote::Model>> {
        if poll_ids.is_empty() {
            return Ok(vec![]);
        }

        Vote::find()
            .filter(vote::Column::VoterId.eq(voter_id))
            .filter(vote::Column::PollId.is_in(poll_ids.iter().map(String::as_str)))
            .order_by_desc(vote::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, DbErr, MockDatabase, RuntimeErr};

    fn create_test_vote(id: &str, voter_id: &str, poll_id: &str, answer: i16) -> vote::Model {
        vote::Model {
            id: id.to_string(),
            voter_id: voter_id.to_string(),
            poll_id: poll_id.to_string(),
            answer,
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_find_by_poll_answer() {
        let votes = vec![
            create_test_vote("v2", "carol", "p1", 1),
            create_test_vote("v1", "bob", "p1", 1),
        ];

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([votes])
                .into_connection(),
        );

        let repo = VoteRepository::new(db);
        let result = repo.find_by_poll_answer("p1", 1, 0, 20).await.unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].voter_id, "carol");
    }

    #[tokio::test]
    async fn test_find_by_voter_and_polls_empty() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let repo = VoteRepository::new(db);
        let result = repo.find_by_voter_and_polls("bob", &[]).await.unwrap();

        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_create_database_error() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_errors([DbErr::Query(RuntimeErr::Internal(
                    "connection reset".to_string(),
                ))])
                .into_connection(),
        );

        let repo = VoteRepository::new(db);
        let model: vote::ActiveModel = create_test_vote("v1", "bob", "p1", 2).into();
        let result = repo.create(model).await;

        assert!(matches!(result, Err(AppError::Database(_))));
    }
}
