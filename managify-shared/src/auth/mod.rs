/// Authentication and authorization utilities
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and complexity rules
/// - [`jwt`]: HS256 access tokens carrying the user's identity
/// - [`middleware`]: bearer-token extraction into an [`AuthContext`](middleware::AuthContext)
/// - [`authorization`]: admin, owner and membership checks
///
/// # Example
///
/// ```no_run
/// use managify_shared::auth::password::{hash_password, verify_password};
/// use managify_shared::auth::jwt::{create_token, Claims};
/// use managify_shared::models::DocId;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("Secr3t!pw")?;
/// assert!(verify_password("Secr3t!pw", &hash)?);
///
/// let claims = Claims::new(DocId::new(), "Ada", "ada@example.com", false);
/// let token = create_token(&claims, "secret-key-at-least-32-bytes-long")?;
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod jwt;
pub mod middleware;
pub mod password;
