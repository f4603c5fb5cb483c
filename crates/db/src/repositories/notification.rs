//! Notification repository.

use std::sync::Arc;

use crate::{
    entities::{Notification, notification},
    map_db_err,
};
use pollen_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DeleteResult, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, UpdateResult, prelude::DateTimeWithTimeZone,
    sea_query::OnConflict,
};

/// Notification repository for database operations.
#[derive(Clone)]
pub struct NotificationRepository {
    db: Arc<DatabaseConnection>,
}

impl NotificationRepository {
    /// Create a new notification repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Insert a notification, or refresh the one sharing its collapse key.
    ///
    /// On a `(recipient_id, collapse_key)` hit the existing row takes the new
    /// id, actor, detail and timestamp and becomes unread again. The id is
    /// replaced too so the row sorts as the newest. Rows without a collapse
    /// key never conflict and are always inserted.
    pub async fn upsert(&self, model: notification::ActiveModel) -> AppResult<notification::Model> {
        if model.collapse_key.as_ref().is_none() {
            return model.insert(self.db.as_ref()).await.map_err(map_db_err);
        }

        Notification::insert(model)
            .on_conflict(
                OnConflict::columns([
                    notification::Column::RecipientId,
                    notification::Column::CollapseKey,
                ])
                .update_columns([
                    notification::Column::Id,
                    notification::Column::ActorId,
                    notification::Column::Detail,
                    notification::Column::IsRead,
                    notification::Column::UpdatedAt,
                ])
                .to_owned(),
            )
            .exec_with_returning(self.db.as_ref())
            .await
            .map_err(map_db_err)
    }

    /// Get notifications for a user, newest first.
    pub async fn find_by_recipient(
        &self,
        recipient_id: &str,
        until_id: Option<&str>,
        limit: u64,
    ) -> AppResult<Vec<notification::Model>> {
        let mut query = Notification::find()
            .filter(notification::Column::RecipientId.eq(recipient_id))
            .order_by_desc(notification::Column::Id);

        if let Some(id) = until_id {
            query = query.filter(notification::Column::Id.lt(id));
        }

        query
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Mark some of a user's notifications as read.
    pub async fn mark_as_read(&self, recipient_id: &str, ids: &[String]) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result: UpdateResult = Notification::update_many()
            .filter(notification::Column::RecipientId.eq(recipient_id))
            .filter(notification::Column::Id.is_in(ids.iter().map(String::as_str)))
            .col_expr(notification::Column::IsRead, true.into())
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    /// Mark all notifications as read for a user.
    pub async fn mark_all_as_read(&self, recipient_id: &str) -> AppResult<u64> {
        let result: UpdateResult = Notification::update_many()
            .filter(notification::Column::RecipientId.eq(recipient_id))
            .filter(notification::Column::IsRead.eq(false))
            .col_expr(notification::Column::IsRead, true.into())
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    /// Count unread notifications for a user.
    pub async fn count_unread(&self, recipient_id: &str) -> AppResult<u64> {
        Notification::find()
            .filter(notification::Column::RecipientId.eq(recipient_id))
            .filter(notification::Column::IsRead.eq(false))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete notifications not refreshed since `cutoff`.
    pub async fn delete_updated_before(&self, cutoff: DateTimeWithTimeZone) -> AppResult<u64> {
        let result: DeleteResult = Notification::delete_many()
            .filter(notification::Column::UpdatedAt.lt(cutoff))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::entities::notification::{SubjectType, Verb};
    use chrono::{Duration, Utc};
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn create_test_notification(
        id: &str,
        recipient_id: &str,
        verb: Verb,
        collapse_key: Option<&str>,
    ) -> notification::Model {
        notification::Model {
            id: id.to_string(),
            recipient_id: recipient_id.to_string(),
            actor_id: "actor".to_string(),
            verb,
            subject_type: SubjectType::Poll,
            subject_id: "p1".to_string(),
            detail: None,
            collapse_key: collapse_key.map(str::to_string),
            is_read: false,
            updated_at: Utc::now().into(),
        }
    }

    fn into_log(db: Arc<DatabaseConnection>) -> String {
        format!(
            "{:?}",
            Arc::try_unwrap(db).ok().unwrap().into_transaction_log()
        )
    }

    #[tokio::test]
    async fn test_upsert_with_collapse_key_uses_on_conflict() {
        let row = create_test_notification("n1", "alice", Verb::Vote, Some("vote:p1"));

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[row.clone()]])
                .into_connection(),
        );

        let repo = NotificationRepository::new(db.clone());
        let stored = repo.upsert(row.clone().into()).await.unwrap();
        drop(repo);

        assert_eq!(stored.verb, Verb::Vote);
        let log = into_log(db);
        assert!(log.contains("ON CONFLICT"));
        assert!(log.contains("DO UPDATE"));
    }

    #[tokio::test]
    async fn test_upsert_without_collapse_key_inserts() {
        let row = create_test_notification("n2", "alice", Verb::Comment, None);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[row.clone()]])
                .into_connection(),
        );

        let repo = NotificationRepository::new(db.clone());
        repo.upsert(row.clone().into()).await.unwrap();
        drop(repo);

        assert!(!into_log(db).contains("ON CONFLICT"));
    }

    #[tokio::test]
    async fn test_mark_as_read_empty_ids_skips_query() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let repo = NotificationRepository::new(db);
        assert_eq!(repo.mark_as_read("alice", &[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_updated_before() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 3,
                }])
                .into_connection(),
        );

        let repo = NotificationRepository::new(db);
        let cutoff = Utc::now() - Duration::days(30);
        assert_eq!(repo.delete_updated_before(cutoff.into()).await.unwrap(), 3);
    }
}
