//! User service: accounts and profiles.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use pollen_common::{AppError, AppResult, IdGenerator};
use pollen_db::{entities::user, repositories::UserRepository};
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// User service for business logic.
#[derive(Clone)]
pub struct UserService {
    user_repo: UserRepository,
    id_gen: IdGenerator,
}

/// Public shape of a user embedded in other views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    pub picture_url: Option<String>,
}

impl From<&user::Model> for UserSummary {
    fn from(user: &user::Model) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            picture_url: user.picture_url.clone(),
        }
    }
}

/// Input for creating a new user.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserInput {
    #[validate(email, length(max = 320))]
    pub email: String,

    #[validate(length(min = 1, max = 256))]
    pub name: String,

    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

/// Identity asserted by an external provider (e.g. a social login).
#[derive(Debug, Deserialize, Validate)]
pub struct ExternalIdentityInput {
    #[validate(length(min = 1, max = 32))]
    pub provider: String,

    #[validate(length(min = 1, max = 256))]
    pub external_id: String,

    #[validate(email, length(max = 320))]
    pub email: String,

    #[validate(length(min = 1, max = 256))]
    pub name: String,

    #[validate(url, length(max = 1024))]
    pub picture_url: Option<String>,
}

/// Input for updating a profile.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateProfileInput {
    #[validate(length(min = 1, max = 256))]
    pub name: Option<String>,

    #[validate(url, length(max = 1024))]
    pub picture_url: Option<String>,
}

impl UserService {
    /// Create a new user service.
    #[must_use]
    pub const fn new(user_repo: UserRepository) -> Self {
        Self {
            user_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Get a user by ID.
    pub async fn get(&self, user_id: &str) -> AppResult<user::Model> {
        self.user_repo.get_by_id(user_id).await
    }

    /// Create a new password account. A taken email is a `Conflict`.
    pub async fn create(&self, input: CreateUserInput) -> AppResult<user::Model> {
        input.validate()?;

        let password_hash = hash_password(&input.password)?;

        let model = user::ActiveModel {
            id: Set(self.id_gen.generate()),
            email: Set(input.email.to_lowercase()),
            name: Set(input.name),
            picture_url: Set(None),
            password_hash: Set(Some(password_hash)),
            token: Set(self.id_gen.generate_token()),
            external_provider: Set(None),
            external_id: Set(None),
            created_at: Set(Utc::now().into()),
            updated_at: Set(None),
        };

        let user = self.user_repo.create(model).await?;
        tracing::info!(user_id = %user.id, "User created");
        Ok(user)
    }

    /// Check an email and password pair.
    pub async fn authenticate(&self, email: &str, password: &str) -> AppResult<user::Model> {
        let user = self
            .user_repo
            .find_by_email(&email.to_lowercase())
            .await?
            .ok_or(AppError::Unauthorized)?;

        let Some(hash) = user.password_hash.as_deref() else {
            return Err(AppError::Unauthorized);
        };
        if !verify_password(password, hash)? {
            return Err(AppError::Unauthorized);
        }

        Ok(user)
    }

    /// Resolve a bearer token.
    pub async fn authenticate_by_token(&self, token: &str) -> AppResult<user::Model> {
        self.user_repo
            .find_by_token(token)
            .await?
            .ok_or(AppError::Unauthorized)
    }

    /// Replace a user's bearer token, signing out every session.
    pub async fn regenerate_token(&self, user_id: &str) -> AppResult<user::Model> {
        let user = self.user_repo.get_by_id(user_id).await?;

        let mut active: user::ActiveModel = user.into();
        active.token = Set(self.id_gen.generate_token());
        active.updated_at = Set(Some(Utc::now().into()));

        self.user_repo.update(active).await
    }

    /// Find or create the account for an external identity.
    ///
    /// Looks up the identity first, then an account with the same email (which
    /// gets the identity linked to it), and creates a password-less account
    /// when neither exists.
    pub async fn link_external_identity(
        &self,
        input: ExternalIdentityInput,
    ) -> AppResult<user::Model> {
        input.validate()?;

        if let Some(user) = self
            .user_repo
            .find_by_external_identity(&input.provider, &input.external_id)
            .await?
        {
            return Ok(user);
        }

        let email = input.email.to_lowercase();
        if let Some(user) = self.user_repo.find_by_email(&email).await? {
            let mut active: user::ActiveModel = user.into();
            active.external_provider = Set(Some(input.provider));
            active.external_id = Set(Some(input.external_id));
            active.updated_at = Set(Some(Utc::now().into()));
            return self.user_repo.update(active).await;
        }

        let model = user::ActiveModel {
            id: Set(self.id_gen.generate()),
            email: Set(email),
            name: Set(input.name),
            picture_url: Set(input.picture_url),
            password_hash: Set(None),
            token: Set(self.id_gen.generate_token()),
            external_provider: Set(Some(input.provider)),
            external_id: Set(Some(input.external_id)),
            created_at: Set(Utc::now().into()),
            updated_at: Set(None),
        };

        let user = self.user_repo.create(model).await?;
        tracing::info!(user_id = %user.id, "User created from external identity");
        Ok(user)
    }

    /// Update name and/or picture.
    pub async fn update_profile(
        &self,
        user_id: &str,
        input: UpdateProfileInput,
    ) -> AppResult<user::Model> {
        input.validate()?;

        let user = self.user_repo.get_by_id(user_id).await?;
        let mut active: user::ActiveModel = user.into();

        if let Some(name) = input.name {
            active.name = Set(name);
        }
        if let Some(picture_url) = input.picture_url {
            active.picture_url = Set(Some(picture_url));
        }
        active.updated_at = Set(Some(Utc::now().into()));

        self.user_repo.update(active).await
    }
}

/// Hash a password using Argon2.
fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {e}")))
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| AppError::Internal(format!("Invalid hash: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fixtures::test_user;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

    fn service(db: MockDatabase) -> UserService {
        UserService::new(UserRepository::new(Arc::new(db.into_connection())))
    }

    #[test]
    fn test_hash_password() {
        let hash = hash_password("test_password_123").unwrap();

        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("test_password_123", &hash).unwrap());
        assert!(!verify_password("wrong_password", &hash).unwrap());
    }

    #[test]
    fn test_create_input_validation() {
        let input = CreateUserInput {
            email: "not-an-email".to_string(),
            name: "Alice".to_string(),
            password: "long enough".to_string(),
        };
        assert!(input.validate().is_err());

        let input = CreateUserInput {
            email: "alice@example.com".to_string(),
            name: "Alice".to_string(),
            password: "short".to_string(),
        };
        assert!(input.validate().is_err());
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_input_before_store() {
        let service = service(MockDatabase::new(DatabaseBackend::Postgres));

        let result = service
            .create(CreateUserInput {
                email: "alice@example.com".to_string(),
                name: String::new(),
                password: "password123".to_string(),
            })
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_authenticate_wrong_password() {
        let mut user = test_user("alice");
        user.password_hash = Some(hash_password("correct horse").unwrap());

        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[user]]),
        );

        let result = service.authenticate("Alice@Example.com", "battery staple").await;
        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_authenticate_without_password_hash() {
        let user = test_user("alice");

        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[user]]),
        );

        let result = service.authenticate("alice@example.com", "anything").await;
        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_authenticate_by_unknown_token() {
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<user::Model>::new()]),
        );

        let result = service.authenticate_by_token("nope").await;
        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_link_external_identity_existing() {
        let mut user = test_user("alice");
        user.external_provider = Some("facebook".to_string());
        user.external_id = Some("fb-1".to_string());

        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[user]]),
        );

        let linked = service
            .link_external_identity(ExternalIdentityInput {
                provider: "facebook".to_string(),
                external_id: "fb-1".to_string(),
                email: "alice@example.com".to_string(),
                name: "Alice".to_string(),
                picture_url: None,
            })
            .await
            .unwrap();

        assert_eq!(linked.id, "alice");
    }

    #[test]
    fn test_summary_hides_credentials() {
        let user = test_user("alice");
        let summary = serde_json::to_value(UserSummary::from(&user)).unwrap();

        assert_eq!(summary["id"], "alice");
        assert!(summary.get("token").is_none());
        assert!(summary.get("email").is_none());
    }
}
