/// Privy access token verification
///
/// Privy issues ES256-signed access tokens whose subject is the user's DID.
/// A token is accepted when its signature checks out against the app's
/// verification key, the issuer is `privy.io`, the audience is the app id,
/// and the Privy API still knows the user.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Issuer claim of every Privy access token
pub const PRIVY_ISSUER: &str = "privy.io";

/// Default Privy REST endpoint
pub const DEFAULT_PRIVY_API_BASE: &str = "https://auth.privy.io";

/// Error type for Privy verification
#[derive(Debug, thiserror::Error)]
pub enum PrivyError {
    /// Verification key could not be parsed
    #[error("Invalid verification key: {0}")]
    InvalidKey(String),

    /// Token failed signature or claim validation
    #[error("Invalid access token: {0}")]
    InvalidToken(String),

    /// Privy does not know the user
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// Privy API call failed
    #[error("Privy API error: {0}")]
    Api(String),
}

/// Privy application settings
#[derive(Debug, Clone)]
pub struct PrivyConfig {
    /// Privy app id, also the expected token audience
    pub app_id: String,

    /// App secret used for basic auth against the REST API
    pub app_secret: String,

    /// PEM encoded ES256 public key from the Privy dashboard
    pub verification_key: String,

    /// REST API base URL
    pub api_base: String,
}

/// Claims carried by a Privy access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivyClaims {
    /// User DID
    pub sub: String,

    /// Session id
    #[serde(default)]
    pub sid: Option<String>,

    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

/// Verifies Privy tokens and looks users up
pub struct PrivyClient {
    config: PrivyConfig,
    key: DecodingKey,
    http: reqwest::Client,
}

impl std::fmt::Debug for PrivyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivyClient")
            .field("app_id", &self.config.app_id)
            .field("api_base", &self.config.api_base)
            .finish()
    }
}

impl PrivyClient {
    /// Parses the verification key and prepares the HTTP client
    ///
    /// Keys pasted into environment variables often carry literal `\n`
    /// sequences; they are turned back into newlines.
    pub fn new(config: PrivyConfig) -> Result<Self, PrivyError> {
        let pem = config.verification_key.replace("\\n", "\n");
        let key = DecodingKey::from_ec_pem(pem.as_bytes())
            .map_err(|e| PrivyError::InvalidKey(e.to_string()))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| PrivyError::Api(e.to_string()))?;

        Ok(Self { config, key, http })
    }

    /// Returns the configured app id
    pub fn app_id(&self) -> &str {
        &self.config.app_id
    }

    /// Checks signature, issuer, audience and expiry
    pub fn verify_access_token(&self, token: &str) -> Result<PrivyClaims, PrivyError> {
        let mut validation = Validation::new(Algorithm::ES256);
        validation.set_issuer(&[PRIVY_ISSUER]);
        validation.set_audience(&[self.config.app_id.as_str()]);

        decode::<PrivyClaims>(token, &self.key, &validation)
            .map(|data| data.claims)
            .map_err(|e| PrivyError::InvalidToken(e.to_string()))
    }

    /// Fetches the user record to confirm the DID still exists
    pub async fn get_user(&self, user_id: &str) -> Result<serde_json::Value, PrivyError> {
        let url = format!(
            "{}/api/v1/users/{}",
            self.config.api_base.trim_end_matches('/'),
            user_id
        );

        let response = self
            .http
            .get(&url)
            .basic_auth(&self.config.app_id, Some(&self.config.app_secret))
            .header("privy-app-id", &self.config.app_id)
            .send()
            .await
            .map_err(|e| PrivyError::Api(e.to_string()))?;

        match response.status() {
            status if status.is_success() => response
                .json()
                .await
                .map_err(|e| PrivyError::Api(e.to_string())),
            StatusCode::NOT_FOUND => Err(PrivyError::UserNotFound(user_id.to_string())),
            status => Err(PrivyError::Api(format!("unexpected status {}", status))),
        }
    }

    /// Verifies the token and confirms the user, returning the DID
    pub async fn authenticate(&self, token: &str) -> Result<String, PrivyError> {
        let claims = self.verify_access_token(token)?;
        self.get_user(&claims.sub).await?;
        debug!(user_id = %claims.sub, "Privy user verified");
        Ok(claims.sub)
    }
}
