//! Sign-up, sign-in, refresh and logout.

use companyhub_storage::{
    DynSessionStorage, DynUserStorage, NewUser, RefreshSession, SessionClient,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};
use crate::jwt::{AccessTokenClaims, JwtService};
use crate::password;

const MIN_PASSWORD_LEN: usize = 8;
const MAX_FIELD_LEN: usize = 255;

/// Registration input.
#[derive(Debug, Clone, Deserialize)]
pub struct SignUp {
    pub username: String,
    pub password: String,
    pub email: String,
}

impl SignUp {
    fn validate(&self) -> AuthResult<()> {
        if self.username.trim().is_empty() || self.username.len() > MAX_FIELD_LEN {
            return Err(AuthError::invalid_input("username must be 1-255 characters"));
        }
        if self.password.len() < MIN_PASSWORD_LEN {
            return Err(AuthError::invalid_input(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        if !self.email.contains('@') || self.email.len() > MAX_FIELD_LEN {
            return Err(AuthError::invalid_input("email is invalid"));
        }
        Ok(())
    }
}

/// Tokens handed to a client after sign-in or refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: Uuid,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
}

/// Issues and validates credentials.
pub struct AuthService {
    users: DynUserStorage,
    sessions: DynSessionStorage,
    jwt: JwtService,
    config: AuthConfig,
}

impl AuthService {
    /// # Errors
    ///
    /// Fails if the configured signing secret is empty.
    pub fn new(
        users: DynUserStorage,
        sessions: DynSessionStorage,
        config: AuthConfig,
    ) -> AuthResult<Self> {
        let jwt = JwtService::new(&config.access_token_secret, config.issuer.clone())?;
        Ok(Self {
            users,
            sessions,
            jwt,
            config,
        })
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Registers a user and returns its id.
    pub async fn sign_up(&self, request: SignUp) -> AuthResult<Uuid> {
        request.validate()?;

        let password = request.password;
        let password_hash = tokio::task::spawn_blocking(move || password::hash_password(&password))
            .await
            .map_err(|e| AuthError::PasswordHash(e.to_string()))?
            .map_err(|e| AuthError::PasswordHash(e.to_string()))?;

        let new_user = NewUser {
            username: request.username,
            email: request.email,
            password_hash,
        };
        let id = self.users.create_user(&new_user).await.map_err(|e| {
            if e.is_already_exists() {
                AuthError::UsernameTaken(new_user.username.clone())
            } else {
                AuthError::from(e)
            }
        })?;

        info!(user_id = %id, username = %new_user.username, "user registered");
        Ok(id)
    }

    /// Checks credentials and opens a refresh session.
    pub async fn sign_in(
        &self,
        username: &str,
        password: &str,
        client: SessionClient,
    ) -> AuthResult<TokenPair> {
        let user = self
            .users
            .find_by_username(username)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let candidate = password.to_string();
        let stored = user.password_hash.clone();
        let matches =
            tokio::task::spawn_blocking(move || password::verify_password(&candidate, &stored))
                .await
                .map_err(|e| AuthError::PasswordHash(e.to_string()))?
                .map_err(|e| AuthError::PasswordHash(e.to_string()))?;
        if !matches {
            return Err(AuthError::InvalidCredentials);
        }

        self.issue_tokens(user.id, &user.username, client).await
    }

    /// Redeems a refresh token for a new token pair.
    ///
    /// The old session is consumed. A token presented from a client whose
    /// fingerprint differs from the one it was issued to revokes every
    /// session of that user.
    pub async fn refresh(
        &self,
        refresh_token: Uuid,
        client: SessionClient,
    ) -> AuthResult<TokenPair> {
        let session = self
            .sessions
            .take_session(refresh_token)
            .await?
            .ok_or(AuthError::InvalidRefreshToken)?;

        if session.is_expired() {
            return Err(AuthError::SessionExpired);
        }

        if session.client.fingerprint != client.fingerprint {
            let revoked = self.sessions.delete_user_sessions(session.user_id).await?;
            warn!(
                user_id = %session.user_id,
                revoked,
                "refresh token presented with a foreign fingerprint"
            );
            return Err(AuthError::InvalidRefreshToken);
        }

        let user = self
            .users
            .find_by_id(session.user_id)
            .await?
            .ok_or(AuthError::InvalidRefreshToken)?;

        self.issue_tokens(user.id, &user.username, client).await
    }

    /// Ends the session behind `refresh_token`. Unknown tokens are ignored.
    pub async fn logout(&self, refresh_token: Uuid) -> AuthResult<()> {
        match self.sessions.delete_session(refresh_token).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Validates an access token and returns its claims.
    pub fn verify_access_token(&self, token: &str) -> AuthResult<AccessTokenClaims> {
        Ok(self.jwt.decode(token)?)
    }

    async fn issue_tokens(
        &self,
        user_id: Uuid,
        username: &str,
        client: SessionClient,
    ) -> AuthResult<TokenPair> {
        let claims = AccessTokenClaims::new(
            user_id,
            username,
            self.jwt.issuer(),
            self.config.access_token_ttl(),
        );
        let access_token = self.jwt.encode(&claims)?;

        let session = RefreshSession::issue(user_id, client, self.config.refresh_token_ttl());
        self.sessions.create_session(&session).await?;

        Ok(TokenPair {
            access_token,
            refresh_token: session.token,
            expires_in: self.config.access_token_ttl_secs,
        })
    }
}
