/// Session token payloads
///
/// The access token carries the full identity (username and roles); the refresh
/// token carries only the username so every refresh takes a fresh roles snapshot.

use serde::{Deserialize, Serialize};

/// Identity captured into an access token
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub username: String,
    pub roles: Vec<String>,
}

/// Payload of an access token
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AccessClaims {
    #[serde(rename = "UserInfo")]
    pub user_info: UserInfo,
}

impl AccessClaims {
    pub fn new(username: impl Into<String>, roles: Vec<String>) -> Self {
        Self {
            user_info: UserInfo {
                username: username.into(),
                roles,
            },
        }
    }

    pub fn username(&self) -> &str {
        &self.user_info.username
    }

    pub fn roles(&self) -> &[String] {
        &self.user_info.roles
    }
}

/// Payload of a refresh token
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RefreshClaims {
    pub username: String,
}

impl RefreshClaims {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }
}

/// Any payload plus the registered time claims (RFC 7519 `iat` / `exp`)
#[derive(Debug, Serialize, Deserialize, Clone)]
pub(crate) struct Timestamped<T> {
    #[serde(flatten)]
    pub claims: T,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}
