//! Authentication service
//!
//! Session-based admin authentication: verify credentials, issue a
//! session token, resolve tokens back to users on every admin request.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::db::repositories::UserRepository;
use crate::models::{Session, User, UserRole};
use crate::services::password::{hash_password, verify_password};

/// Session lifetime in days
const SESSION_VALID_DAYS: i64 = 7;

/// Error types for authentication operations
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Wrong username or password
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Missing, unknown or expired session token
    #[error("Invalid or expired session")]
    InvalidSession,

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Authentication service
pub struct AuthService {
    users: Arc<dyn UserRepository>,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }

    /// Create a user with a hashed password.
    pub async fn create_user(
        &self,
        username: &str,
        password: &str,
        role: UserRole,
    ) -> Result<User> {
        let hash = hash_password(password)?;
        self.users
            .create_user(&User::new(username.to_string(), hash, role))
            .await
            .context("Failed to create user")
    }

    /// Seed an account unless the username is already taken. Returns
    /// whether a user was created.
    pub async fn ensure_user(
        &self,
        username: &str,
        password: &str,
        role: UserRole,
    ) -> Result<bool> {
        if self.users.get_by_username(username).await?.is_some() {
            return Ok(false);
        }
        self.create_user(username, password, role).await?;
        Ok(true)
    }

    /// Verify credentials and open a session.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(Session, User), AuthError> {
        let user = self
            .users
            .get_by_username(username)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(password, &user.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }

        let session = Session::new(user.id, SESSION_VALID_DAYS);
        self.users.create_session(&session).await?;
        tracing::info!(username = %username, "User logged in");
        Ok((session, user))
    }

    /// Resolve a session token to its user. Expired sessions are removed
    /// on sight.
    pub async fn validate(&self, token: &str) -> Result<User, AuthError> {
        let session = self
            .users
            .get_session(token)
            .await?
            .ok_or(AuthError::InvalidSession)?;

        if session.is_expired() {
            self.users.delete_session(token).await?;
            return Err(AuthError::InvalidSession);
        }

        self.users
            .get_by_id(session.user_id)
            .await?
            .ok_or(AuthError::InvalidSession)
    }

    /// Close a session. Unknown tokens are a no-op.
    pub async fn logout(&self, token: &str) -> Result<()> {
        self.users.delete_session(token).await
    }

    /// Remove expired sessions. Returns the number removed.
    pub async fn purge_expired_sessions(&self) -> Result<u64> {
        self.users.delete_expired_sessions().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxUserRepository;
    use crate::db::{create_test_pool, migrations};

    async fn service() -> AuthService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        AuthService::new(SqlxUserRepository::boxed(pool))
    }

    #[tokio::test]
    async fn test_login_and_validate() {
        let service = service().await;
        service
            .create_user("boss", "secret", UserRole::Admin)
            .await
            .unwrap();

        let (session, user) = service.login("boss", "secret").await.unwrap();
        assert_eq!(user.username, "boss");
        let user = service.validate(&session.id).await.unwrap();
        assert!(user.is_admin());
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let service = service().await;
        service
            .create_user("boss", "secret", UserRole::Admin)
            .await
            .unwrap();

        let result = service.login("boss", "wrong").await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));

        let result = service.login("nobody", "secret").await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_logout_invalidates_session() {
        let service = service().await;
        service
            .create_user("desk", "secret", UserRole::Editor)
            .await
            .unwrap();

        let (session, _) = service.login("desk", "secret").await.unwrap();
        service.logout(&session.id).await.unwrap();

        let result = service.validate(&session.id).await;
        assert!(matches!(result, Err(AuthError::InvalidSession)));
    }

    #[tokio::test]
    async fn test_ensure_user_seeds_once() {
        let service = service().await;

        assert!(service
            .ensure_user("admin", "first", UserRole::Admin)
            .await
            .unwrap());
        // Existing account keeps its password
        assert!(!service
            .ensure_user("admin", "second", UserRole::Admin)
            .await
            .unwrap());

        assert!(service.login("admin", "first").await.is_ok());
        assert!(matches!(
            service.login("admin", "second").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_validate_unknown_token() {
        let service = service().await;
        let result = service.validate("bogus").await;
        assert!(matches!(result, Err(AuthError::InvalidSession)));
    }
}
