/// Authentication utilities
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and the sign-up password policy
/// - [`jwt`]: access/refresh token generation and validation
/// - [`middleware`]: request authentication context and bearer parsing
///
/// # Example
///
/// ```no_run
/// use phac_shared::auth::password::{hash_password, verify_password};
/// use phac_shared::auth::jwt::{create_token, Claims, TokenType};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("S3cret!pass")?;
/// assert!(verify_password("S3cret!pass", &hash)?);
///
/// let claims = Claims::new(Uuid::new_v4(), TokenType::Access);
/// let token = create_token(&claims, "secret-key")?;
/// # Ok(())
/// # }
/// ```

pub mod jwt;
pub mod middleware;
pub mod password;
