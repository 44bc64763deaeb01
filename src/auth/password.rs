/// Password Hashing and Verification
///
/// bcrypt is deliberately slow, so both hashing and checking run on tokio's
/// blocking pool instead of stalling the request workers.

use async_trait::async_trait;

use crate::error::AppError;

/// One-way credential check used at login
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// `Ok(true)` when `password` matches `hash`.
    async fn check(&self, password: &str, hash: &str) -> Result<bool, AppError>;
}

/// bcrypt-backed hasher and verifier
#[derive(Debug, Clone, Copy)]
pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    /// Hash a password for storage
    ///
    /// # Errors
    /// Returns error if the cost is out of bcrypt's range or the blocking task fails
    pub async fn hash(&self, password: &str) -> Result<String, AppError> {
        let password = password.to_string();
        let cost = self.cost;

        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))?
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
    }
}

#[async_trait]
impl CredentialVerifier for BcryptHasher {
    async fn check(&self, password: &str, hash: &str) -> Result<bool, AppError> {
        let password = password.to_string();
        let hash = hash.to_string();

        tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|e| AppError::Internal(format!("Password verification task failed: {}", e)))?
            .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))
    }
}
