//! # Profile Repository
//!
//! Buyer and seller accounts. Sign-up itself lives with the hosted auth
//! provider; this table only mirrors what the marketplace needs: the id and
//! the public username that doubles as the store slug.

use sqlx::SqlitePool;
use tracing::debug;
use treido_core::Profile;

use crate::error::DbResult;

/// Repository for profile database operations.
#[derive(Debug, Clone)]
pub struct ProfileRepository {
    pool: SqlitePool,
}

impl ProfileRepository {
    /// Creates a new ProfileRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProfileRepository { pool }
    }

    /// Gets a profile by id.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>(
            "SELECT id, username, display_name FROM profiles WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }

    /// Gets a profile by its public username.
    pub async fn get_by_username(&self, username: &str) -> DbResult<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>(
            "SELECT id, username, display_name FROM profiles WHERE username = ?1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }

    /// Inserts a profile.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - id or username already taken
    pub async fn insert(&self, profile: &Profile) -> DbResult<()> {
        debug!(id = %profile.id, "Inserting profile");

        sqlx::query("INSERT INTO profiles (id, username, display_name) VALUES (?1, ?2, ?3)")
            .bind(&profile.id)
            .bind(&profile.username)
            .bind(&profile.display_name)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
