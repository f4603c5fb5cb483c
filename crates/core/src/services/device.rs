//! Device token registration.

use pollen_common::{AppError, AppResult, IdGenerator};
use pollen_db::{entities::device_token::Platform, repositories::DeviceTokenRepository};
use serde::Deserialize;
use validator::Validate;

/// Device service for business logic.
#[derive(Clone)]
pub struct DeviceService {
    device_repo: DeviceTokenRepository,
    id_gen: IdGenerator,
}

/// Input for registering a device.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterDeviceInput {
    #[validate(length(min = 1, max = 512))]
    pub token: String,

    pub platform: Platform,
}

impl DeviceService {
    /// Create a new device service.
    #[must_use]
    pub const fn new(device_repo: DeviceTokenRepository) -> Self {
        Self {
            device_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Attach a device token to a user, detaching it from anyone else.
    pub async fn register_device_token(
        &self,
        user_id: &str,
        input: RegisterDeviceInput,
    ) -> AppResult<()> {
        input.validate()?;

        let inserted = self
            .device_repo
            .register(self.id_gen.generate(), user_id, &input.token, input.platform)
            .await?;

        tracing::debug!(user_id = %user_id, inserted, "Device token registered");
        Ok(())
    }

    /// Detach a device token from a user.
    pub async fn unregister_device_token(&self, user_id: &str, token: &str) -> AppResult<()> {
        if token.is_empty() {
            return Err(AppError::Validation("token must not be empty".to_string()));
        }

        self.device_repo.remove(user_id, token).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_register_empty_token_rejected() {
        let service = DeviceService::new(DeviceTokenRepository::new(Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres).into_connection(),
        )));

        let result = service
            .register_device_token(
                "alice",
                RegisterDeviceInput {
                    token: String::new(),
                    platform: Platform::Ios,
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_register_runs_both_phases() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([
                    MockExecResult {
                        last_insert_id: 0,
                        rows_affected: 1,
                    },
                    MockExecResult {
                        last_insert_id: 0,
                        rows_affected: 1,
                    },
                ])
                .into_connection(),
        );
        let service = DeviceService::new(DeviceTokenRepository::new(db));

        service
            .register_device_token(
                "bob",
                RegisterDeviceInput {
                    token: "tok".to_string(),
                    platform: Platform::Android,
                },
            )
            .await
            .unwrap();
    }
}
