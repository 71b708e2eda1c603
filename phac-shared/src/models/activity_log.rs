/// Activity history
///
/// Append-only list of user-visible events shown on the dashboard and the
/// history page.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use super::UnknownVariant;

/// Largest page returned by [`ActivityLog::list_by_user`]
pub const MAX_LIST_LIMIT: i64 = 100;

/// Kind of activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    AccountCreated,
    Encryption,
    Analysis,
    KeyCreated,
    KeyRevoked,
    KeyDeleted,
    ProfileUpdated,
    PasswordChanged,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::AccountCreated => "account_created",
            EventType::Encryption => "encryption",
            EventType::Analysis => "analysis",
            EventType::KeyCreated => "key_created",
            EventType::KeyRevoked => "key_revoked",
            EventType::KeyDeleted => "key_deleted",
            EventType::ProfileUpdated => "profile_updated",
            EventType::PasswordChanged => "password_changed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "account_created" => Some(EventType::AccountCreated),
            "encryption" => Some(EventType::Encryption),
            "analysis" => Some(EventType::Analysis),
            "key_created" => Some(EventType::KeyCreated),
            "key_revoked" => Some(EventType::KeyRevoked),
            "key_deleted" => Some(EventType::KeyDeleted),
            "profile_updated" => Some(EventType::ProfileUpdated),
            "password_changed" => Some(EventType::PasswordChanged),
            _ => None,
        }
    }
}

impl TryFrom<String> for EventType {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_str(&value).ok_or_else(|| UnknownVariant::new("event type", value))
    }
}

/// Activity log entry
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ActivityLog {
    pub id: Uuid,
    pub user_id: Uuid,
    #[sqlx(try_from = "String")]
    pub event_type: EventType,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl ActivityLog {
    /// Appends an entry
    pub async fn record<'e, E>(
        executor: E,
        user_id: Uuid,
        event_type: EventType,
        description: impl Into<String>,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let entry = sqlx::query_as::<_, ActivityLog>(
            r#"
            INSERT INTO activity_logs (user_id, event_type, description)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, event_type, description, created_at
            "#,
        )
        .bind(user_id)
        .bind(event_type.as_str())
        .bind(description.into())
        .fetch_one(executor)
        .await?;

        Ok(entry)
    }

    /// Lists a user's entries, newest first
    ///
    /// `limit` is clamped to `1..=MAX_LIST_LIMIT`.
    pub async fn list_by_user(
        pool: &PgPool,
        user_id: Uuid,
        event_type: Option<EventType>,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let entries = sqlx::query_as::<_, ActivityLog>(
            r#"
            SELECT id, user_id, event_type, description, created_at
            FROM activity_logs
            WHERE user_id = $1 AND ($2::VARCHAR IS NULL OR event_type = $2)
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(event_type.map(|e| e.as_str()))
        .bind(limit.clamp(1, MAX_LIST_LIMIT))
        .fetch_all(pool)
        .await?;

        Ok(entries)
    }
}
