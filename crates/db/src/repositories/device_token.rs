//! Device token repository.

use std::sync::Arc;

use crate::{
    entities::{DeviceToken, device_token, device_token::Platform},
    map_db_err,
};
use chrono::Utc;
use pollen_common::{AppError, AppResult};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
    sea_query::OnConflict,
};

/// Device token repository for database operations.
#[derive(Clone)]
pub struct DeviceTokenRepository {
    db: Arc<DatabaseConnection>,
}

impl DeviceTokenRepository {
    /// Create a new device token repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Give a device token to `user_id`.
    ///
    /// The token is first taken away from every other user, then inserted for
    /// this user unless they already hold it. Both steps share a transaction,
    /// so the token is never observed unowned. Returns `true` when a new row
    /// was written.
    pub async fn register(
        &self,
        id: String,
        user_id: &str,
        token: &str,
        platform: Platform,
    ) -> AppResult<bool> {
        let model = device_token::ActiveModel {
            id: Set(id),
            user_id: Set(user_id.to_string()),
            token: Set(token.to_string()),
            platform: Set(platform),
            created_at: Set(Utc::now().into()),
        };

        let txn = self.db.begin().await.map_err(map_db_err)?;

        let removed = DeviceToken::delete_many()
            .filter(device_token::Column::Token.eq(token))
            .filter(device_token::Column::UserId.ne(user_id))
            .exec(&txn)
            .await
            .map_err(map_db_err)?;

        let inserted = DeviceToken::insert(model)
            .on_conflict(
                OnConflict::column(device_token::Column::Token)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&txn)
            .await
            .map_err(map_db_err)?;

        txn.commit().await.map_err(map_db_err)?;

        if removed.rows_affected > 0 {
            tracing::debug!(user_id = %user_id, "Device token moved from another user");
        }

        Ok(inserted == 1)
    }

    /// Remove a device token held by a user.
    pub async fn remove(&self, user_id: &str, token: &str) -> AppResult<u64> {
        let result = DeviceToken::delete_many()
            .filter(device_token::Column::UserId.eq(user_id))
            .filter(device_token::Column::Token.eq(token))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    /// All device tokens of a user.
    pub async fn find_by_user(&self, user_id: &str) -> AppResult<Vec<device_token::Model>> {
        DeviceToken::find()
            .filter(device_token::Column::UserId.eq(user_id))
            .order_by_asc(device_token::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
