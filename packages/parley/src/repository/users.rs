//! User accounts: argon2-hashed passwords and an avatar URL.

use anyhow::{Context, Result};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chat_hub::UserSummary;

use super::ChatRepository;
use crate::models::{LoginOutcome, User};

/// Hash a password with Argon2id and a random salt.
fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("failed to hash password: {e}"))?;
    Ok(hash.to_string())
}

/// Verify a password against a stored Argon2id hash.
fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed =
        PasswordHash::new(hash).map_err(|e| anyhow::anyhow!("invalid password hash: {e}"))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

impl ChatRepository {
    /// Create an account. Returns `false` if the username is taken.
    pub async fn create_user(&self, username: &str, password: &str) -> Result<bool> {
        let password_hash = hash_password(password)?;
        let result = sqlx::query(
            "INSERT OR IGNORE INTO users (username, password_hash, created_at)
             VALUES (?, ?, unixepoch())",
        )
        .bind(username)
        .bind(&password_hash)
        .execute(&self.pool)
        .await
        .context("Failed to insert user")?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT username, password_hash, avatar_url, created_at
             FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn verify_user_password(&self, username: &str, password: &str) -> Result<LoginOutcome> {
        let user = match self.get_user_by_username(username).await? {
            Some(u) => u,
            None => return Ok(LoginOutcome::UnknownUser),
        };
        if verify_password(password, &user.password_hash)? {
            Ok(LoginOutcome::Success(user))
        } else {
            Ok(LoginOutcome::WrongPassword)
        }
    }

    /// Returns `false` if no such user.
    pub async fn update_avatar(&self, username: &str, avatar_url: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET avatar_url = ? WHERE username = ?")
            .bind(avatar_url)
            .bind(username)
            .execute(&self.pool)
            .await
            .context("Failed to update avatar")?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_user_summaries(&self) -> Result<Vec<UserSummary>> {
        let users = sqlx::query_as::<_, User>(
            "SELECT username, password_hash, avatar_url, created_at
             FROM users ORDER BY username",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(users.iter().map(User::summary).collect())
    }
}

#[cfg(test)]
mod tests {
    use crate::models::LoginOutcome;
    use crate::repository::test_helpers;

    #[tokio::test]
    async fn create_and_login() {
        let repo = test_helpers::test_repository().await;
        assert!(repo.create_user("alice", "secret").await.unwrap());

        let stored = repo.get_user_by_username("alice").await.unwrap().unwrap();
        assert_ne!(stored.password_hash, "secret");
        assert!(stored.password_hash.starts_with("$argon2"));
        assert_eq!(stored.avatar_url, "");

        match repo.verify_user_password("alice", "secret").await.unwrap() {
            LoginOutcome::Success(user) => assert_eq!(user.username, "alice"),
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn duplicate_username_is_refused() {
        let repo = test_helpers::test_repository().await;
        assert!(repo.create_user("alice", "one").await.unwrap());
        assert!(!repo.create_user("alice", "two").await.unwrap());

        // The original password still works.
        assert!(matches!(
            repo.verify_user_password("alice", "one").await.unwrap(),
            LoginOutcome::Success(_)
        ));
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_user() {
        let repo = test_helpers::test_repository().await;
        repo.create_user("alice", "secret").await.unwrap();

        assert!(matches!(
            repo.verify_user_password("alice", "nope").await.unwrap(),
            LoginOutcome::WrongPassword
        ));
        assert!(matches!(
            repo.verify_user_password("bob", "secret").await.unwrap(),
            LoginOutcome::UnknownUser
        ));
    }

    #[tokio::test]
    async fn avatar_update_and_listing() {
        let repo = test_helpers::test_repository().await;
        repo.create_user("carol", "pw").await.unwrap();
        repo.create_user("alice", "pw").await.unwrap();

        assert!(repo.update_avatar("carol", "https://example.com/c.png").await.unwrap());
        assert!(!repo.update_avatar("nobody", "x").await.unwrap());

        let users = repo.list_user_summaries().await.unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].username, "alice");
        assert_eq!(users[0].avatar, "");
        assert_eq!(users[1].username, "carol");
        assert_eq!(users[1].avatar, "https://example.com/c.png");
    }
}
