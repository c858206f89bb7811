/// Authentication utilities
///
/// # Modules
///
/// - [`jwt`]: HS256 token generation and validation
/// - [`privy`]: Privy access token verification
/// - [`verifier`]: Mode selection between Privy, JWT and anonymous access
/// - [`middleware`]: Axum middleware adding [`middleware::AuthContext`]
///
/// # Example
///
/// ```no_run
/// use nation_shared::auth::jwt::{create_token, Claims};
/// use nation_shared::auth::verifier::TokenVerifier;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let secret = "a-secret-key-of-at-least-32-bytes!";
/// let token = create_token(&Claims::new("user-1"), secret)?;
///
/// let verifier = TokenVerifier::Jwt { secret: secret.to_string() };
/// assert_eq!(verifier.verify(&token).await?, "user-1");
/// # Ok(())
/// # }
/// ```

pub mod jwt;
pub mod middleware;
pub mod privy;
pub mod verifier;
