use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Identity;
use crate::error::AppError;

/// Represents the claims encoded within a session token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// The user's id.
    pub sub: String,
    pub email: String,
    /// Issued-at, seconds since epoch.
    pub iat: usize,
    /// Expiry, seconds since epoch.
    pub exp: usize,
}

/// Issues and verifies HS256 session tokens.
///
/// The signing key is handed in once at startup and never read from the
/// environment afterwards.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }

    /// Signs a token for `identity` that expires `ttl` from now.
    pub fn issue(&self, identity: &Identity) -> Result<String, AppError> {
        let now = Utc::now().timestamp() as usize;
        let claims = Claims {
            sub: identity.user_id.to_string(),
            email: identity.email.clone(),
            iat: now,
            exp: now.saturating_add(usize::try_from(self.ttl.as_secs()).unwrap_or(usize::MAX)),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to generate token: {}", e)))
    }

    /// Verifies a token and returns the identity it carries.
    ///
    /// `None` means the request carried no token at all.
    pub fn verify(&self, token: Option<&str>) -> Result<Identity, AppError> {
        let token = token.ok_or(AppError::TokenMissing)?;
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)?.claims;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::TokenInvalid)?;

        Ok(Identity {
            user_id,
            email: claims.email,
        })
    }
}
