/// Credit ledger rows
///
/// Every balance change writes one row here with the signed amount and the
/// balance after the change. Rows are never updated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use super::UnknownVariant;

/// Direction of a ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Credits added (sign-up bonus, purchase)
    Grant,

    /// Credits spent
    Debit,

    /// Credits returned after a failed run
    Refund,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Grant => "grant",
            TransactionKind::Debit => "debit",
            TransactionKind::Refund => "refund",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "grant" => Some(TransactionKind::Grant),
            "debit" => Some(TransactionKind::Debit),
            "refund" => Some(TransactionKind::Refund),
            _ => None,
        }
    }
}

impl TryFrom<String> for TransactionKind {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_str(&value).ok_or_else(|| UnknownVariant::new("transaction kind", value))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CreditTransaction {
    pub id: Uuid,
    pub user_id: Uuid,

    /// Signed amount: negative for debits
    pub amount: i32,

    #[sqlx(try_from = "String")]
    pub kind: TransactionKind,

    pub description: String,

    pub balance_after: i32,

    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateCreditTransaction {
    pub user_id: Uuid,
    pub amount: i32,
    pub kind: TransactionKind,
    pub description: String,
    pub balance_after: i32,
}

impl CreditTransaction {
    pub async fn create<'e, E>(
        executor: E,
        data: CreateCreditTransaction,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let row = sqlx::query_as::<_, CreditTransaction>(
            r#"
            INSERT INTO credit_transactions (user_id, amount, kind, description, balance_after)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, amount, kind, description, balance_after, created_at
            "#,
        )
        .bind(data.user_id)
        .bind(data.amount)
        .bind(data.kind.as_str())
        .bind(data.description)
        .bind(data.balance_after)
        .fetch_one(executor)
        .await?;

        Ok(row)
    }

    /// Latest entries for a user, newest first
    pub async fn list_by_user(
        pool: &PgPool,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let rows = sqlx::query_as::<_, CreditTransaction>(
            r#"
            SELECT id, user_id, amount, kind, description, balance_after, created_at
            FROM credit_transactions
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_kind_conversion() {
        assert_eq!(TransactionKind::Debit.as_str(), "debit");
        assert_eq!(TransactionKind::from_str("refund"), Some(TransactionKind::Refund));
        assert!(TransactionKind::try_from("bonus".to_string()).is_err());
    }
}
