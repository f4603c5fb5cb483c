//! Poll repository.
//!
//! Votes and comments are applied with conditional `UPDATE ... RETURNING`
//! statements, so concurrent writers never double-count and never need a
//! read-modify-write cycle.

use std::sync::Arc;

use crate::{
    entities::{Poll, PollComment, poll, poll::Answer, poll_comment},
    map_db_err,
};
use pollen_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, TransactionTrait,
    sea_query::{Expr, SimpleExpr},
};

/// Number of most recent polls the unvoted feed looks at.
pub const FEED_WINDOW: u64 = 1000;

/// Number of polls the unvoted feed returns.
pub const FEED_PAGE: u64 = 20;

/// Poll repository for database operations.
#[derive(Clone)]
pub struct PollRepository {
    db: Arc<DatabaseConnection>,
}

/// `NOT (<voters> @> ["<user_id>"])`
fn not_in_voters(answer: Answer, user_id: &str) -> SimpleExpr {
    Expr::cust_with_values(
        format!(
            "NOT ({} @> jsonb_build_array(?::text))",
            answer.voters_column_name()
        ),
        [user_id],
    )
}

impl PollRepository {
    /// Create a new poll repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a poll by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<poll::Model>> {
        Poll::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find multiple polls by IDs.
    pub async fn find_by_ids(&self, ids: &[String]) -> AppResult<Vec<poll::Model>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        Poll::find()
            .filter(poll::Column::Id.is_in(ids.iter().map(String::as_str)))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert a new poll.
    pub async fn create(&self, model: poll::ActiveModel) -> AppResult<poll::Model> {
        model.insert(self.db.as_ref()).await.map_err(map_db_err)
    }

    /// Record a vote on the poll itself.
    ///
    /// Increments the chosen answer's counter and appends the voter to that
    /// answer's voter set, only if the voter is in neither set. Returns the
    /// updated poll, or `None` when the poll does not exist or the user has
    /// already voted.
    pub async fn vote_answer(
        &self,
        poll_id: &str,
        voter_id: &str,
        answer: Answer,
    ) -> AppResult<Option<poll::Model>> {
        let count = answer.num_votes_column();
        let voters = answer.voters_column();

        let updated = Poll::update_many()
            .col_expr(count, Expr::col(count).add(1))
            .col_expr(
                voters,
                Expr::cust_with_values(
                    format!(
                        "{} || jsonb_build_array(?::text)",
                        answer.voters_column_name()
                    ),
                    [voter_id],
                ),
            )
            .filter(poll::Column::Id.eq(poll_id))
            .filter(not_in_voters(Answer::First, voter_id))
            .filter(not_in_voters(Answer::Second, voter_id))
            .exec_with_returning(self.db.as_ref())
            .await
            .map_err(map_db_err)?;

        Ok(updated.into_iter().next())
    }

    /// Add a comment and subscribe its author to the poll.
    ///
    /// The subscriber update, the comment counter and the comment row are
    /// written in one transaction. Returns `None` when the poll does not
    /// exist, in which case nothing is written.
    pub async fn comment(
        &self,
        poll_id: &str,
        comment: poll_comment::ActiveModel,
    ) -> AppResult<Option<(poll::Model, poll_comment::Model)>> {
        let author_id = comment.author_id.clone().take().unwrap_or_default();

        let txn = self.db.begin().await.map_err(map_db_err)?;

        let updated = Poll::update_many()
            .col_expr(
                poll::Column::Subscribers,
                Expr::cust_with_values(
                    "CASE WHEN subscribers @> jsonb_build_array(?::text) \
                     THEN subscribers \
                     ELSE subscribers || jsonb_build_array(?::text) END",
                    [author_id.as_str(), author_id.as_str()],
                ),
            )
            .col_expr(
                poll::Column::NumComments,
                Expr::col(poll::Column::NumComments).add(1),
            )
            .filter(poll::Column::Id.eq(poll_id))
            .exec_with_returning(&txn)
            .await
            .map_err(map_db_err)?;

        let Some(poll) = updated.into_iter().next() else {
            txn.rollback().await.map_err(map_db_err)?;
            return Ok(None);
        };

        let comment = comment.insert(&txn).await.map_err(map_db_err)?;
        txn.commit().await.map_err(map_db_err)?;

        Ok(Some((poll, comment)))
    }

    /// Polls created by a user, newest first.
    pub async fn find_by_creator(
        &self,
        creator_id: &str,
        before_id: Option<&str>,
        limit: u64,
    ) -> AppResult<Vec<poll::Model>> {
        let mut query = Poll::find()
            .filter(poll::Column::CreatorId.eq(creator_id))
            .order_by_desc(poll::Column::Id);

        if let Some(id) = before_id {
            query = query.filter(poll::Column::Id.lt(id));
        }

        query
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Comments on a poll in posting order.
    pub async fn find_comments(
        &self,
        poll_id: &str,
        skip: u64,
        limit: u64,
    ) -> AppResult<Vec<poll_comment::Model>> {
        PollComment::find()
            .filter(poll_comment::Column::PollId.eq(poll_id))
            .order_by_asc(poll_comment::Column::Id)
            .offset(skip)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Recent polls the user has not voted on.
    ///
    /// Looks at the [`FEED_WINDOW`] most recent polls (older than `before_id`
    /// when given), drops those the user voted on or listed in `exclude_ids`,
    /// and returns the first [`FEED_PAGE`] newest first.
    pub async fn find_recent_unvoted(
        &self,
        user_id: &str,
        before_id: Option<&str>,
        exclude_ids: &[String],
    ) -> AppResult<Vec<poll::Model>> {
        // Oldest id inside the window; absent when fewer polls exist.
        let mut floor_query = Poll::find()
            .select_only()
            .column(poll::Column::Id)
            .order_by_desc(poll::Column::Id)
            .offset(FEED_WINDOW - 1)
            .limit(1);
        if let Some(id) = before_id {
            floor_query = floor_query.filter(poll::Column::Id.lt(id));
        }
        let floor: Option<String> = floor_query
            .into_tuple()
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let mut query = Poll::find()
            .filter(not_in_voters(Answer::First, user_id))
            .filter(not_in_voters(Answer::Second, user_id))
            .order_by_desc(poll::Column::Id);

        if let Some(id) = before_id {
            query = query.filter(poll::Column::Id.lt(id));
        }
        if let Some(id) = floor {
            query = query.filter(poll::Column::Id.gte(id));
        }
        if !exclude_ids.is_empty() {
            query = query.filter(poll::Column::Id.is_not_in(exclude_ids.iter().map(String::as_str)));
        }

        query
            .limit(FEED_PAGE)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::entities::poll::UserIds;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, Set, Value};
    use std::collections::BTreeMap;

    fn create_test_poll(id: &str, creator_id: &str) -> poll::Model {
        poll::Model {
            id: id.to_string(),
            creator_id: creator_id.to_string(),
            creator_name: "Creator".to_string(),
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

    fn into_log(db: Arc<DatabaseConnection>) -> String {
        format!(
            "{:?}",
            Arc::try_unwrap(db).ok().unwrap().into_transaction_log()
        )
    }

    #[tokio::test]
    async fn test_vote_answer_returns_updated_poll() {
        let mut voted = create_test_poll("p1", "alice");
        voted.answer2_num_votes = 1;
        voted.answer2_voters = UserIds::single("bob");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[voted.clone()]])
                .into_connection(),
        );

        let repo = PollRepository::new(db.clone());
        let result = repo.vote_answer("p1", "bob", Answer::Second).await.unwrap();
        drop(repo);

        let poll = result.unwrap();
        assert_eq!(poll.answer2_num_votes, 1);
        assert!(poll.has_voted("bob"));

        let log = into_log(db);
        assert!(log.contains("answer2_num_votes"));
        assert!(log.contains("NOT (answer1_voters @>"));
        assert!(log.contains("NOT (answer2_voters @>"));
        assert!(log.contains("RETURNING"));
    }

    #[tokio::test]
    async fn test_vote_answer_already_voted_returns_none() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<poll::Model>::new()])
                .into_connection(),
        );

        let repo = PollRepository::new(db);
        let result = repo.vote_answer("p1", "bob", Answer::First).await.unwrap();

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_comment_missing_poll_writes_nothing() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<poll::Model>::new()])
                .into_connection(),
        );

        let repo = PollRepository::new(db.clone());
        let comment = poll_comment::ActiveModel {
            id: Set("c1".to_string()),
            poll_id: Set("missing".to_string()),
            author_id: Set("bob".to_string()),
            author_name: Set("Bob".to_string()),
            author_picture: Set(None),
            text: Set("hi".to_string()),
            created_at: Set(Utc::now().into()),
        };
        let result = repo.comment("missing", comment).await.unwrap();
        drop(repo);

        assert!(result.is_none());
        assert!(!into_log(db).contains("INSERT"));
    }

    #[tokio::test]
    async fn test_comment_subscribes_author() {
        let mut updated = create_test_poll("p1", "alice");
        updated.subscribers = UserIds(vec!["alice".to_string(), "bob".to_string()]);
        updated.num_comments = 1;
        let comment = poll_comment::Model {
            id: "c1".to_string(),
            poll_id: "p1".to_string(),
            author_id: "bob".to_string(),
            author_name: "Bob".to_string(),
            author_picture: None,
            text: "nice".to_string(),
            created_at: Utc::now().into(),
        };

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[updated.clone()]])
                .append_query_results([[comment.clone()]])
                .into_connection(),
        );

        let repo = PollRepository::new(db.clone());
        let (poll, stored) = repo
            .comment("p1", comment.clone().into())
            .await
            .unwrap()
            .unwrap();
        drop(repo);

        assert!(poll.subscribers.contains("bob"));
        assert_eq!(poll.num_comments, 1);
        assert_eq!(stored.text, "nice");

        let log = into_log(db);
        assert!(log.contains("CASE WHEN subscribers @>"));
        assert!(log.contains("INSERT INTO"));
    }

    #[tokio::test]
    async fn test_find_recent_unvoted_bounds_window() {
        let polls = vec![create_test_poll("p3", "alice"), create_test_poll("p2", "carol")];

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[BTreeMap::from([("id", Value::from("p0"))])]])
                .append_query_results([polls])
                .into_connection(),
        );

        let repo = PollRepository::new(db.clone());
        let result = repo
            .find_recent_unvoted("bob", None, &["p1".to_string()])
            .await
            .unwrap();
        drop(repo);

        assert_eq!(result.len(), 2);

        let log = into_log(db);
        assert!(log.contains("OFFSET"));
        assert!(log.contains("NOT IN"));
        assert!(log.contains("NOT (answer1_voters @>"));
    }
}
