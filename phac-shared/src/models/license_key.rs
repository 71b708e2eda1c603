/// License key model and database operations
///
/// A license key is an opaque identifier (`phac_` followed by 32 alphanumeric
/// characters) that protected scripts are bound to. Keys can be revoked or
/// deleted; deleting a key leaves its script records in place with
/// `license_key_id = NULL`.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE license_keys (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     key_name VARCHAR(100) NOT NULL,
///     public_key VARCHAR(64) NOT NULL UNIQUE,
///     status VARCHAR(16) NOT NULL DEFAULT 'active',
///     linked_scripts UUID[] NOT NULL DEFAULT '{}',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use phac_shared::models::license_key::{CreateLicenseKey, LicenseKey};
/// use phac_shared::db::pool::{create_pool, DatabaseConfig};
/// use uuid::Uuid;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let key = LicenseKey::create(&pool, CreateLicenseKey {
///     user_id: Uuid::new_v4(),
///     key_name: "Main server".to_string(),
/// }).await?;
/// assert!(key.public_key.starts_with("phac_"));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use super::UnknownVariant;

/// Public key prefix
pub const KEY_PREFIX: &str = "phac_";

/// Number of random characters after the prefix
pub const KEY_RANDOM_LENGTH: usize = 32;

const KEY_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// License key status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStatus {
    Active,
    Revoked,
}

impl KeyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyStatus::Active => "active",
            KeyStatus::Revoked => "revoked",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(KeyStatus::Active),
            "revoked" => Some(KeyStatus::Revoked),
            _ => None,
        }
    }
}

impl TryFrom<String> for KeyStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_str(&value).ok_or_else(|| UnknownVariant::new("key status", value))
    }
}

/// License key row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LicenseKey {
    pub id: Uuid,

    /// Owner
    pub user_id: Uuid,

    /// User-chosen label
    pub key_name: String,

    /// The key shown to the user and embedded in loaders
    pub public_key: String,

    #[sqlx(try_from = "String")]
    pub status: KeyStatus,

    /// IDs of script records protected under this key
    pub linked_scripts: Vec<Uuid>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Input for creating a license key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLicenseKey {
    pub user_id: Uuid,
    pub key_name: String,
}

const COLUMNS: &str =
    "id, user_id, key_name, public_key, status, linked_scripts, created_at, updated_at";

impl LicenseKey {
    /// Generates a new public key
    ///
    /// ```
    /// use phac_shared::models::license_key::LicenseKey;
    ///
    /// let key = LicenseKey::generate_public_key();
    /// assert!(key.starts_with("phac_"));
    /// assert_eq!(key.len(), 37);
    /// ```
    pub fn generate_public_key() -> String {
        let mut rng = rand::thread_rng();

        let random: String = (0..KEY_RANDOM_LENGTH)
            .map(|_| KEY_CHARSET[rng.gen_range(0..KEY_CHARSET.len())] as char)
            .collect();

        format!("{}{}", KEY_PREFIX, random)
    }

    pub fn is_active(&self) -> bool {
        self.status == KeyStatus::Active
    }

    /// Creates an active key with a freshly generated public key
    pub async fn create(pool: &PgPool, data: CreateLicenseKey) -> Result<Self, sqlx::Error> {
        let key = sqlx::query_as::<_, LicenseKey>(&format!(
            r#"
            INSERT INTO license_keys (user_id, key_name, public_key)
            VALUES ($1, $2, $3)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(data.user_id)
        .bind(data.key_name)
        .bind(Self::generate_public_key())
        .fetch_one(pool)
        .await?;

        Ok(key)
    }

    /// Lists a user's keys, newest first
    pub async fn list_by_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let keys = sqlx::query_as::<_, LicenseKey>(&format!(
            "SELECT {COLUMNS} FROM license_keys WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(keys)
    }

    /// Finds a key by ID, scoped to its owner
    pub async fn find_for_user(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let key = sqlx::query_as::<_, LicenseKey>(&format!(
            "SELECT {COLUMNS} FROM license_keys WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(key)
    }

    /// Counts the user's active keys
    pub async fn count_active(pool: &PgPool, user_id: Uuid) -> Result<i64, sqlx::Error> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM license_keys WHERE user_id = $1 AND status = 'active'",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        Ok(count.0)
    }

    /// Marks the key revoked
    ///
    /// Returns `None` when the key doesn't exist for this user.
    pub async fn revoke(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let key = sqlx::query_as::<_, LicenseKey>(&format!(
            r#"
            UPDATE license_keys
            SET status = 'revoked', updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(key)
    }

    /// Deletes the key
    pub async fn delete(pool: &PgPool, id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM license_keys WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Appends script record IDs to `linked_scripts`
    pub async fn append_linked_scripts<'e, E>(
        executor: E,
        id: Uuid,
        script_ids: &[Uuid],
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            UPDATE license_keys
            SET linked_scripts = linked_scripts || $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(script_ids)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
