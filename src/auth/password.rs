use std::fmt;

use actix_web::web;
use bcrypt::{hash, verify, BcryptError};

use crate::error::AppError;

/// Cost used when nothing else is configured.
pub const DEFAULT_COST: u32 = 10;

#[derive(Debug)]
pub enum PasswordError {
    /// The stored digest is not a bcrypt hash.
    InvalidDigestFormat(String),
    /// Any other hashing failure.
    Hashing(String),
}

impl fmt::Display for PasswordError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PasswordError::InvalidDigestFormat(msg) => write!(f, "invalid digest format: {}", msg),
            PasswordError::Hashing(msg) => write!(f, "failed to hash password: {}", msg),
        }
    }
}

impl std::error::Error for PasswordError {}

impl From<PasswordError> for AppError {
    fn from(error: PasswordError) -> AppError {
        AppError::Internal(error.to_string())
    }
}

/// Salted one-way password hashing (bcrypt).
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(DEFAULT_COST)
    }
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        hash(password, self.cost).map_err(|e| PasswordError::Hashing(e.to_string()))
    }

    /// Returns `Ok(false)` on mismatch; errors only when `digest` is malformed.
    pub fn verify(&self, password: &str, digest: &str) -> Result<bool, PasswordError> {
        match verify(password, digest) {
            Ok(matches) => Ok(matches),
            Err(
                e @ (BcryptError::InvalidHash(_)
                | BcryptError::InvalidPrefix(_)
                | BcryptError::InvalidCost(_)
                | BcryptError::InvalidBase64(_)),
            ) => Err(PasswordError::InvalidDigestFormat(e.to_string())),
            Err(e) => Err(PasswordError::Hashing(e.to_string())),
        }
    }

    /// Hashes on the blocking thread pool so the request executor stays free.
    pub async fn hash_async(&self, password: String) -> Result<String, AppError> {
        let hasher = *self;
        let digest = web::block(move || hasher.hash(&password)).await??;
        Ok(digest)
    }

    /// Verifies on the blocking thread pool.
    pub async fn verify_async(&self, password: String, digest: String) -> Result<bool, AppError> {
        let hasher = *self;
        let matches = web::block(move || hasher.verify(&password, &digest)).await??;
        Ok(matches)
    }
}
