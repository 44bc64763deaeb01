/// Session Token Lifecycle
///
/// `SessionService` turns credentials into an (access token, refresh token)
/// pair, trades a refresh token for a fresh access token, and decides what a
/// logout has to do. It holds no per-session state: validity is purely a matter
/// of signature and expiry, so every call is independent of every other.

use std::sync::Arc;

use crate::auth::claims::{AccessClaims, RefreshClaims};
use crate::auth::jwt::TokenCodec;
use crate::auth::password::CredentialVerifier;
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError, ValidationError};
use crate::store::UserStore;

/// Tokens issued by a successful login
#[derive(Debug, Clone)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    /// Lifetime of `refresh_token` in seconds, used as the cookie Max-Age
    pub refresh_ttl: i64,
}

/// What the HTTP layer must do to complete a logout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutOutcome {
    /// Nothing to clear
    NoSession,
    /// Instruct the client to drop the refresh cookie
    ClearCookie,
}

#[derive(Clone)]
pub struct SessionService {
    users: Arc<dyn UserStore>,
    verifier: Arc<dyn CredentialVerifier>,
    codec: TokenCodec,
    settings: JwtSettings,
}

impl SessionService {
    pub fn new(
        users: Arc<dyn UserStore>,
        verifier: Arc<dyn CredentialVerifier>,
        codec: TokenCodec,
        settings: JwtSettings,
    ) -> Self {
        Self {
            users,
            verifier,
            codec,
            settings,
        }
    }

    /// Authenticate with username and password and issue both tokens.
    ///
    /// # Errors
    /// - `ValidationError::MissingFields` if either field is missing or blank;
    ///   the user store is not consulted
    /// - `AuthError::Unauthorized` for an unknown user, an inactive user or a
    ///   wrong password, indistinguishably
    pub async fn login(
        &self,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<SessionTokens, AppError> {
        let username = username.map(str::trim).filter(|u| !u.is_empty());
        let password = password.filter(|p| !p.is_empty());
        let (username, password) = match (username, password) {
            (Some(username), Some(password)) => (username, password),
            _ => return Err(ValidationError::MissingFields.into()),
        };

        let user = match self.users.find_by_username(username).await? {
            Some(user) if user.active => user,
            Some(_) => {
                tracing::info!(username = %username, "Login attempt for inactive account");
                return Err(AuthError::Unauthorized.into());
            }
            None => {
                tracing::info!(username = %username, "Login attempt for unknown account");
                return Err(AuthError::Unauthorized.into());
            }
        };

        if !self.verifier.check(password, &user.password_hash).await? {
            tracing::info!(username = %username, "Login attempt with wrong password");
            return Err(AuthError::Unauthorized.into());
        }

        // Both tokens exist before anything is handed back, so a failure here
        // never leaves the client with half a session.
        let access_token = self.issue_access_token(&user.username, user.roles.clone())?;
        let refresh_token = self.codec.issue(
            &RefreshClaims::new(user.username.as_str()),
            &self.settings.refresh_token_secret,
            self.settings.refresh_token_expiry,
        )?;

        tracing::info!(username = %user.username, "User logged in");

        Ok(SessionTokens {
            access_token,
            refresh_token,
            refresh_ttl: self.settings.refresh_token_expiry,
        })
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// Roles are read from the store on every call, so a role change takes
    /// effect within one access token lifetime. The refresh token itself is
    /// neither rotated nor reissued.
    ///
    /// # Errors
    /// - `AuthError::Unauthorized` if no refresh token was presented or its
    ///   user no longer exists
    /// - `AuthError::Forbidden` if the token is expired, forged or unparseable
    pub async fn refresh(&self, refresh_token: Option<&str>) -> Result<String, AppError> {
        let refresh_token = refresh_token
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::Unauthorized)?;

        let claims: RefreshClaims = self
            .codec
            .verify(refresh_token, &self.settings.refresh_token_secret)
            .map_err(|e| {
                tracing::warn!(error = %e, "Refresh token rejected");
                AuthError::Forbidden
            })?;

        let user = self
            .users
            .find_by_username(&claims.username)
            .await?
            .ok_or_else(|| {
                tracing::warn!(username = %claims.username, "Refresh for a user that no longer exists");
                AuthError::Unauthorized
            })?;

        let access_token = self.issue_access_token(&user.username, user.roles)?;

        tracing::info!(username = %user.username, "Access token refreshed");
        Ok(access_token)
    }

    /// Decide how to end the session. Never fails: ending a session that
    /// does not exist is not an error.
    pub fn logout(&self, refresh_token: Option<&str>) -> LogoutOutcome {
        match refresh_token {
            Some(token) if !token.is_empty() => LogoutOutcome::ClearCookie,
            _ => LogoutOutcome::NoSession,
        }
    }

    /// Check a Bearer access token and return its claims.
    pub fn authenticate(&self, access_token: &str) -> Result<AccessClaims, AppError> {
        self.codec
            .verify(access_token, &self.settings.access_token_secret)
            .map_err(|e| {
                tracing::warn!(error = %e, "Access token rejected");
                AuthError::Forbidden.into()
            })
    }

    fn issue_access_token(&self, username: &str, roles: Vec<String>) -> Result<String, AppError> {
        self.codec.issue(
            &AccessClaims::new(username, roles),
            &self.settings.access_token_secret,
            self.settings.access_token_expiry,
        )
    }
}
