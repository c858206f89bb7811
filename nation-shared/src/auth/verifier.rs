/// Bearer token verification
///
/// The server picks one verifier at startup:
///
/// - **Privy**: `ENV` ends with `dev` or `prod`
/// - **Jwt**: a `JWT_SECRET` is configured
/// - **Anonymous**: neither; every non-empty token maps to a fixed user

use super::jwt::validate_token;
use super::middleware::AuthError;
use super::privy::PrivyClient;
use std::sync::Arc;
use tracing::debug;

/// User id handed out in anonymous mode
pub const ANONYMOUS_USER_ID: &str = "test_user_id";

/// Turns a bearer token into a user id
#[derive(Debug, Clone)]
pub enum TokenVerifier {
    /// Privy access tokens
    Privy(Arc<PrivyClient>),

    /// HS256 tokens signed with a shared secret
    Jwt { secret: String },

    /// Accept any token
    Anonymous,
}

impl TokenVerifier {
    /// Name used in startup logs
    pub fn mode(&self) -> &'static str {
        match self {
            TokenVerifier::Privy(_) => "privy",
            TokenVerifier::Jwt { .. } => "jwt",
            TokenVerifier::Anonymous => "anonymous",
        }
    }

    /// Verifies the token and returns the caller's user id
    pub async fn verify(&self, token: &str) -> Result<String, AuthError> {
        if token.is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        match self {
            TokenVerifier::Privy(client) => client.authenticate(token).await.map_err(|e| {
                debug!(error = %e, "Privy token rejected");
                AuthError::InvalidToken
            }),
            TokenVerifier::Jwt { secret } => validate_token(token, secret)
                .map(|claims| claims.sub)
                .map_err(|e| {
                    debug!(error = %e, "JWT rejected");
                    AuthError::InvalidToken
                }),
            TokenVerifier::Anonymous => Ok(ANONYMOUS_USER_ID.to_string()),
        }
    }
}
