/// Protected script records
///
/// One row per file submitted to the protection workflow, whether it
/// succeeded or not. The protected content itself is not stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use super::UnknownVariant;

/// Outcome of protecting a script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptStatus {
    Protected,
    Failed,
}

impl ScriptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScriptStatus::Protected => "protected",
            ScriptStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "protected" => Some(ScriptStatus::Protected),
            "failed" => Some(ScriptStatus::Failed),
            _ => None,
        }
    }
}

impl TryFrom<String> for ScriptStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_str(&value).ok_or_else(|| UnknownVariant::new("script status", value))
    }
}

/// Encryption step status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncryptionStatus {
    Success,
    Failed,
    Pending,
}

impl EncryptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EncryptionStatus::Success => "success",
            EncryptionStatus::Failed => "failed",
            EncryptionStatus::Pending => "pending",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "success" => Some(EncryptionStatus::Success),
            "failed" => Some(EncryptionStatus::Failed),
            "pending" => Some(EncryptionStatus::Pending),
            _ => None,
        }
    }
}

impl TryFrom<String> for EncryptionStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_str(&value).ok_or_else(|| UnknownVariant::new("encryption status", value))
    }
}

/// Protected script record
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ScriptRecord {
    pub id: Uuid,

    pub user_id: Uuid,

    /// Key the script was protected under (None once the key is deleted)
    pub license_key_id: Option<Uuid>,

    pub script_name: String,

    /// Size of the submitted content in bytes
    pub original_size: i64,

    /// Size of the protected content in bytes (None on failure)
    pub encrypted_size: Option<i64>,

    pub protection_level: Option<String>,

    #[sqlx(try_from = "String")]
    pub status: ScriptStatus,

    #[sqlx(try_from = "String")]
    pub status_encryption: EncryptionStatus,

    pub created_at: DateTime<Utc>,
}

/// Input for recording a script
#[derive(Debug, Clone)]
pub struct CreateScriptRecord {
    pub user_id: Uuid,
    pub license_key_id: Option<Uuid>,
    pub script_name: String,
    pub original_size: i64,
    pub encrypted_size: Option<i64>,
    pub protection_level: Option<String>,
    pub status: ScriptStatus,
    pub status_encryption: EncryptionStatus,
}

/// Short form shown next to a license key
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LinkedScript {
    pub id: Uuid,
    pub script_name: String,
    pub created_at: DateTime<Utc>,
}

const COLUMNS: &str = "id, user_id, license_key_id, script_name, original_size, encrypted_size, \
                       protection_level, status, status_encryption, created_at";

impl ScriptRecord {
    pub async fn create<'e, E>(executor: E, data: CreateScriptRecord) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let record = sqlx::query_as::<_, ScriptRecord>(&format!(
            r#"
            INSERT INTO scripts_protected (
                user_id, license_key_id, script_name, original_size, encrypted_size,
                protection_level, status, status_encryption
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(data.user_id)
        .bind(data.license_key_id)
        .bind(data.script_name)
        .bind(data.original_size)
        .bind(data.encrypted_size)
        .bind(data.protection_level)
        .bind(data.status.as_str())
        .bind(data.status_encryption.as_str())
        .fetch_one(executor)
        .await?;

        Ok(record)
    }

    /// Lists a user's records, newest first
    pub async fn list_by_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let records = sqlx::query_as::<_, ScriptRecord>(&format!(
            "SELECT {COLUMNS} FROM scripts_protected WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(records)
    }

    pub async fn count_by_user(pool: &PgPool, user_id: Uuid) -> Result<i64, sqlx::Error> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM scripts_protected WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(pool)
                .await?;

        Ok(count.0)
    }

    /// Fetches the short form of the given records, scoped to their owner
    pub async fn list_linked(
        pool: &PgPool,
        user_id: Uuid,
        ids: &[Uuid],
    ) -> Result<Vec<LinkedScript>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let scripts = sqlx::query_as::<_, LinkedScript>(
            r#"
            SELECT id, script_name, created_at
            FROM scripts_protected
            WHERE user_id = $1 AND id = ANY($2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .bind(ids)
        .fetch_all(pool)
        .await?;

        Ok(scripts)
    }
}
