/// JWT Token Codec
///
/// Encodes and verifies HS256-signed, expiring tokens over any serde payload.
/// The codec holds no secrets; callers pass the key for the token kind they
/// are handling, so access and refresh tokens can never share one by accident.

use std::sync::Arc;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::auth::claims::Timestamped;
use crate::auth::clock::Clock;
use crate::error::{AppError, TokenError};

#[derive(Clone)]
pub struct TokenCodec {
    clock: Arc<dyn Clock>,
}

impl TokenCodec {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Sign `claims` with `secret`, stamping `iat = now` and `exp = now + ttl_seconds`.
    ///
    /// # Errors
    /// Returns an internal error if the payload cannot be serialized or signed
    pub fn issue<T: Serialize>(
        &self,
        claims: &T,
        secret: &str,
        ttl_seconds: i64,
    ) -> Result<String, AppError> {
        let now = self.clock.now();
        let stamped = Timestamped {
            claims,
            iat: now,
            exp: now + ttl_seconds,
        };

        encode(
            &Header::new(Algorithm::HS256),
            &stamped,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
    }

    /// Check the signature of `token` against `secret`, then its expiry, and
    /// return the embedded payload.
    ///
    /// The signature is checked first: a forged token is reported as
    /// `InvalidSignature` even when it is also past its expiry.
    pub fn verify<T: DeserializeOwned>(&self, token: &str, secret: &str) -> Result<T, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is judged against the injected clock below
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        let data = decode::<Timestamped<T>>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Malformed(e.to_string()),
        })?;

        if self.clock.now() >= data.claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(data.claims.claims)
    }
}
