/// Profile model and database operations
///
/// One profile per user. Holds the display data captured at sign-up, the plan
/// and the credit balance. The balance is only ever changed through
/// [`CreditLedger`](crate::credits::CreditLedger) so that every change has a
/// matching ledger row.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE profiles (
///     user_id UUID PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
///     name VARCHAR(100) NOT NULL,
///     company_name VARCHAR(100) NOT NULL,
///     age INTEGER NOT NULL CHECK (age BETWEEN 18 AND 120),
///     plan_status VARCHAR(16) NOT NULL DEFAULT 'trial',
///     credits_balance INTEGER NOT NULL DEFAULT 10 CHECK (credits_balance >= 0),
///     name_change_used BOOLEAN NOT NULL DEFAULT FALSE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use super::UnknownVariant;

/// Subscription plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    /// Free plan: starting credits and a single active license key
    Trial,

    /// Paid plan: no key limit
    Pro,
}

impl PlanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStatus::Trial => "trial",
            PlanStatus::Pro => "pro",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "trial" => Some(PlanStatus::Trial),
            "pro" => Some(PlanStatus::Pro),
            _ => None,
        }
    }
}

impl TryFrom<String> for PlanStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_str(&value).ok_or_else(|| UnknownVariant::new("plan_status", value))
    }
}

/// User profile
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Profile {
    pub user_id: Uuid,

    /// Display name
    pub name: String,

    pub company_name: String,

    pub age: i32,

    #[sqlx(try_from = "String")]
    pub plan_status: PlanStatus,

    /// Remaining credits, never negative
    pub credits_balance: i32,

    /// Set once the one allowed name change has been spent
    pub name_change_used: bool,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Input for creating a profile at sign-up
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProfile {
    pub user_id: Uuid,
    pub name: String,
    pub company_name: String,
    pub age: i32,
    pub credits_balance: i32,
}

const COLUMNS: &str = "user_id, name, company_name, age, plan_status, credits_balance, \
                       name_change_used, created_at, updated_at";

impl Profile {
    /// Inserts the profile for a freshly created user
    pub async fn create<'e, E>(executor: E, data: CreateProfile) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let profile = sqlx::query_as::<_, Profile>(&format!(
            r#"
            INSERT INTO profiles (user_id, name, company_name, age, credits_balance)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(data.user_id)
        .bind(data.name)
        .bind(data.company_name)
        .bind(data.age)
        .bind(data.credits_balance)
        .fetch_one(executor)
        .await?;

        Ok(profile)
    }

    /// Finds the profile of `user_id`
    pub async fn find_by_user<'e, E>(executor: E, user_id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let profile = sqlx::query_as::<_, Profile>(&format!(
            "SELECT {COLUMNS} FROM profiles WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(executor)
        .await?;

        Ok(profile)
    }

    /// Applies the one-time name change
    ///
    /// Returns `None` when the profile doesn't exist or the change was already
    /// used. Fields left as `None` keep their current value.
    pub async fn update_names_once(
        pool: &PgPool,
        user_id: Uuid,
        name: Option<&str>,
        company_name: Option<&str>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let profile = sqlx::query_as::<_, Profile>(&format!(
            r#"
            UPDATE profiles
            SET name = COALESCE($2, name),
                company_name = COALESCE($3, company_name),
                name_change_used = TRUE,
                updated_at = NOW()
            WHERE user_id = $1 AND name_change_used = FALSE
            RETURNING {COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(name)
        .bind(company_name)
        .fetch_optional(pool)
        .await?;

        Ok(profile)
    }

    /// Moves the user to another plan
    pub async fn set_plan(
        pool: &PgPool,
        user_id: Uuid,
        plan: PlanStatus,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE profiles SET plan_status = $2, updated_at = NOW() WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(plan.as_str())
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
