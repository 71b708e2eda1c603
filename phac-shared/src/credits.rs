/// Plan policy and the credit ledger
///
/// Credits are a prepaid balance spent on protection runs and Lua analysis.
///
/// # Plan Limits
///
/// **Trial Plan:**
/// - Starting credits: 10
/// - Active license keys: 1
///
/// **Pro Plan:**
/// - Active license keys: unlimited
///
/// # Costs
///
/// - Protection: files × level cost (standard 1, advanced 3, premium 5)
/// - Analysis: 2 credits per file
///
/// Debits use a single conditional `UPDATE ... WHERE credits_balance >= $n`,
/// so concurrent requests can't overdraw a balance.
///
/// # Example
///
/// ```no_run
/// use phac_shared::credits::{protection_cost, CreditLedger};
/// use phac_shared::protection::ProtectionLevel;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, user_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let ledger = CreditLedger::new(pool);
///
/// let cost = protection_cost(3, ProtectionLevel::Advanced);
/// let remaining = ledger.charge(user_id, cost, "Protection of 3 file(s)").await?;
/// # Ok(())
/// # }
/// ```

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::credit_transaction::{
    CreateCreditTransaction, CreditTransaction, TransactionKind,
};
use crate::models::profile::PlanStatus;
use crate::protection::ProtectionLevel;

/// Credits granted when an account is created
pub const SIGNUP_CREDITS: i32 = 10;

/// Cost of one Lua analysis
pub const ANALYSIS_COST: i32 = 2;

/// Credit ledger error
#[derive(Debug, thiserror::Error)]
pub enum CreditError {
    /// Balance is lower than the requested charge
    #[error("Insufficient credits: {required} required, {available} available")]
    Insufficient { required: i32, available: i32 },

    /// No profile exists for the user
    #[error("Profile not found for user {0}")]
    ProfileNotFound(Uuid),

    /// Amount was zero or negative
    #[error("Invalid credit amount: {0}")]
    InvalidAmount(i32),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Limits attached to a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanLimits {
    /// Maximum simultaneously active license keys (None = unlimited)
    pub max_active_keys: Option<u32>,
}

impl PlanLimits {
    pub fn for_plan(plan: PlanStatus) -> Self {
        match plan {
            PlanStatus::Trial => Self {
                max_active_keys: Some(1),
            },
            PlanStatus::Pro => Self {
                max_active_keys: None,
            },
        }
    }

    /// Whether one more active key fits under the limit
    pub fn allows_another_key(&self, active_keys: i64) -> bool {
        match self.max_active_keys {
            Some(max) => active_keys < i64::from(max),
            None => true,
        }
    }
}

/// Credits needed to protect `file_count` files at `level`
pub fn protection_cost(file_count: usize, level: ProtectionLevel) -> i32 {
    let files = i32::try_from(file_count).unwrap_or(i32::MAX);
    files.saturating_mul(level.credit_cost())
}

/// Debits and credits user balances, writing a ledger row for each change
#[derive(Clone)]
pub struct CreditLedger {
    db: PgPool,
}

impl CreditLedger {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Debits `amount` credits and returns the new balance
    ///
    /// # Errors
    ///
    /// - `CreditError::Insufficient` if the balance is lower than `amount`
    /// - `CreditError::ProfileNotFound` if the user has no profile
    pub async fn charge(
        &self,
        user_id: Uuid,
        amount: i32,
        description: &str,
    ) -> Result<i32, CreditError> {
        if amount <= 0 {
            return Err(CreditError::InvalidAmount(amount));
        }

        let mut tx = self.db.begin().await?;

        let updated: Option<(i32,)> = sqlx::query_as(
            r#"
            UPDATE profiles
            SET credits_balance = credits_balance - $2, updated_at = NOW()
            WHERE user_id = $1 AND credits_balance >= $2
            RETURNING credits_balance
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((balance_after,)) = updated else {
            let available: Option<(i32,)> =
                sqlx::query_as("SELECT credits_balance FROM profiles WHERE user_id = $1")
                    .bind(user_id)
                    .fetch_optional(&mut *tx)
                    .await?;

            return match available {
                Some((available,)) => Err(CreditError::Insufficient {
                    required: amount,
                    available,
                }),
                None => Err(CreditError::ProfileNotFound(user_id)),
            };
        };

        CreditTransaction::create(
            &mut *tx,
            CreateCreditTransaction {
                user_id,
                amount: -amount,
                kind: TransactionKind::Debit,
                description: description.to_string(),
                balance_after,
            },
        )
        .await?;

        tx.commit().await?;

        tracing::debug!(%user_id, amount, balance_after, "Credits charged");
        Ok(balance_after)
    }

    /// Returns credits taken by a run that failed
    pub async fn refund(
        &self,
        user_id: Uuid,
        amount: i32,
        description: &str,
    ) -> Result<i32, CreditError> {
        self.credit(user_id, amount, TransactionKind::Refund, description)
            .await
    }

    async fn credit(
        &self,
        user_id: Uuid,
        amount: i32,
        kind: TransactionKind,
        description: &str,
    ) -> Result<i32, CreditError> {
        if amount <= 0 {
            return Err(CreditError::InvalidAmount(amount));
        }

        let mut tx = self.db.begin().await?;

        let (balance_after,): (i32,) = sqlx::query_as(
            r#"
            UPDATE profiles
            SET credits_balance = credits_balance + $2, updated_at = NOW()
            WHERE user_id = $1
            RETURNING credits_balance
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(CreditError::ProfileNotFound(user_id))?;

        CreditTransaction::create(
            &mut *tx,
            CreateCreditTransaction {
                user_id,
                amount,
                kind,
                description: description.to_string(),
                balance_after,
            },
        )
        .await?;

        tx.commit().await?;

        tracing::debug!(%user_id, amount, kind = kind.as_str(), balance_after, "Credits added");
        Ok(balance_after)
    }

    /// Current balance
    pub async fn balance(&self, user_id: Uuid) -> Result<i32, CreditError> {
        let row: Option<(i32,)> =
            sqlx::query_as("SELECT credits_balance FROM profiles WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.db)
                .await?;

        row.map(|(balance,)| balance)
            .ok_or(CreditError::ProfileNotFound(user_id))
    }
}
