//! Authentication for CompanyHub.
//!
//! - [`password`]: Argon2id password hashing
//! - [`jwt`]: HS256 access tokens
//! - [`service`]: sign-up, sign-in, refresh-token rotation and logout
//!
//! ## Example
//!
//! ```ignore
//! use companyhub_auth::{AuthConfig, AuthService, SignUp};
//!
//! let auth = AuthService::new(users, sessions, AuthConfig::with_secret("s3cret"))?;
//! auth.sign_up(SignUp { username, password, email }).await?;
//! let tokens = auth.sign_in("alice", "password", client).await?;
//! let claims = auth.verify_access_token(&tokens.access_token)?;
//! ```

pub mod config;
pub mod error;
pub mod jwt;
pub mod password;
pub mod service;

pub use config::AuthConfig;
pub use error::{AuthError, AuthResult};
pub use jwt::{AccessTokenClaims, JwtError, JwtService};
pub use service::{AuthService, SignUp, TokenPair};
