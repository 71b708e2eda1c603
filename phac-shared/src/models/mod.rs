/// Database models for PHAC
///
/// Each model owns its row type and the queries that read or write it.
///
/// # Models
///
/// - `user`: login identity (email + password hash)
/// - `profile`: per-user dashboard profile, plan and credit balance
/// - `license_key`: license keys scripts are bound to
/// - `script`: records of protected (or failed) scripts
/// - `activity_log`: user-visible activity history
/// - `credit_transaction`: append-only credit ledger
///
/// # Example
///
/// ```no_run
/// use phac_shared::models::user::{CreateUser, User};
/// use phac_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let user = User::create(&pool, CreateUser {
///     email: "owner@example.com".to_string(),
///     password_hash: "$argon2id$...".to_string(),
/// }).await?;
/// # Ok(())
/// # }
/// ```

pub mod activity_log;
pub mod credit_transaction;
pub mod license_key;
pub mod profile;
pub mod script;
pub mod user;

/// A text column held a value that doesn't map to any enum variant
#[derive(Debug, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    pub(crate) fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}
