/// JWT token generation and validation module
///
/// Used when the server runs outside the Privy environments and a
/// `JWT_SECRET` is configured. Tokens are signed with HS256 and carry the
/// user id in `sub`.
///
/// # Validation
///
/// - **Algorithm**: HS256 only
/// - **Subject**: `sub` must be present
/// - **Expiration**: checked when `exp` is present, optional otherwise
/// - **Issuer / audience**: not constrained
///
/// # Example
///
/// ```
/// use nation_shared::auth::jwt::{create_token, validate_token, Claims};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let claims = Claims::new("did:privy:alice");
/// let token = create_token(&claims, "your-secret-key")?;
///
/// let validated = validate_token(&token, "your-secret-key")?;
/// assert_eq!(validated.sub, "did:privy:alice");
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Default lifetime of tokens minted by [`Claims::new`]
pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;

/// Error type for JWT operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to create token
    #[error("Failed to create token: {0}")]
    CreateError(String),

    /// Failed to validate token
    #[error("Failed to validate token: {0}")]
    ValidationError(String),

    /// Token has expired
    #[error("Token has expired")]
    Expired,

    /// Required claim missing
    #[error("Missing claim: {0}")]
    MissingClaim(String),
}

/// JWT claims structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - user ID
    pub sub: String,

    /// Issued at (Unix timestamp)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Expiration time (Unix timestamp)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

impl Claims {
    /// Creates claims expiring in 24 hours
    pub fn new(sub: impl Into<String>) -> Self {
        Self::with_expiration(sub, Duration::hours(DEFAULT_TOKEN_TTL_HOURS))
    }

    /// Creates claims with custom expiration
    ///
    /// A negative duration produces an already expired token, which is
    /// handy in tests.
    pub fn with_expiration(sub: impl Into<String>, expires_in: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: sub.into(),
            iat: Some(now.timestamp()),
            exp: Some((now + expires_in).timestamp()),
        }
    }

    /// Creates claims without an expiration
    pub fn without_expiration(sub: impl Into<String>) -> Self {
        Self {
            sub: sub.into(),
            iat: Some(Utc::now().timestamp()),
            exp: None,
        }
    }

    /// Checks if token has expired
    pub fn is_expired(&self) -> bool {
        match self.exp {
            Some(exp) => Utc::now().timestamp() >= exp,
            None => false,
        }
    }
}

/// Creates a JWT token from claims
///
/// # Errors
///
/// Returns `JwtError::CreateError` if encoding fails
pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    let header = Header::new(Algorithm::HS256);
    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&header, claims, &key)
        .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
}

/// Validates a JWT token and extracts claims
///
/// # Errors
///
/// Returns an error if the signature is invalid, the token has expired,
/// `sub` is missing or the token is malformed.
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.required_spec_claims = HashSet::from(["sub".to_string()]);
    validation.validate_exp = true;
    validation.validate_aud = false;
    validation.leeway = 0;

    let token_data = decode::<Claims>(token, &key, &validation).map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
        jsonwebtoken::errors::ErrorKind::MissingRequiredClaim(claim) => {
            JwtError::MissingClaim(claim.clone())
        }
        _ => JwtError::ValidationError(format!("Token validation failed: {}", e)),
    })?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    #[test]
    fn test_create_and_validate() {
        let claims = Claims::new("user-1");
        let token = create_token(&claims, SECRET).unwrap();

        let validated = validate_token(&token, SECRET).unwrap();
        assert_eq!(validated.sub, "user-1");
        assert_eq!(validated.exp, claims.exp);
    }

    #[test]
    fn test_wrong_secret() {
        let token = create_token(&Claims::new("user-1"), SECRET).unwrap();
        let result = validate_token(&token, "another-secret-key-entirely-different");
        assert!(matches!(result, Err(JwtError::ValidationError(_))));
    }

    #[test]
    fn test_expired_token() {
        let claims = Claims::with_expiration("user-1", Duration::seconds(-60));
        assert!(claims.is_expired());

        let token = create_token(&claims, SECRET).unwrap();
        assert!(matches!(validate_token(&token, SECRET), Err(JwtError::Expired)));
    }

    #[test]
    fn test_exp_is_optional() {
        let claims = Claims::without_expiration("user-1");
        assert!(!claims.is_expired());

        let token = create_token(&claims, SECRET).unwrap();
        let validated = validate_token(&token, SECRET).unwrap();
        assert_eq!(validated.sub, "user-1");
        assert!(validated.exp.is_none());
    }

    #[test]
    fn test_sub_is_required() {
        #[derive(Serialize)]
        struct NoSubject {
            name: String,
        }

        let token = encode(
            &Header::new(Algorithm::HS256),
            &NoSubject {
                name: "nobody".to_string(),
            },
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert!(validate_token(&token, SECRET).is_err());
    }

    #[test]
    fn test_malformed_token() {
        assert!(validate_token("not-a-token", SECRET).is_err());
        assert!(validate_token("", SECRET).is_err());
    }
}
