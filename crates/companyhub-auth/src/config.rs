use serde::{Deserialize, Serialize};

/// Authentication settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// When false, company routes are served without a bearer token.
    pub enabled: bool,
    /// HMAC secret for signing access tokens.
    pub access_token_secret: String,
    /// `iss` claim written to and required on access tokens.
    pub issuer: String,
    pub access_token_ttl_secs: u64,
    pub refresh_token_ttl_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            access_token_secret: String::new(),
            issuer: "companyhub".to_string(),
            access_token_ttl_secs: 15 * 60,
            refresh_token_ttl_secs: 30 * 24 * 60 * 60,
        }
    }
}

impl AuthConfig {
    /// Default settings with the given signing secret.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            access_token_secret: secret.into(),
            ..Self::default()
        }
    }

    pub fn access_token_ttl(&self) -> time::Duration {
        time::Duration::seconds(i64::try_from(self.access_token_ttl_secs).unwrap_or(i64::MAX))
    }

    pub fn refresh_token_ttl(&self) -> time::Duration {
        time::Duration::seconds(i64::try_from(self.refresh_token_ttl_secs).unwrap_or(i64::MAX))
    }
}
