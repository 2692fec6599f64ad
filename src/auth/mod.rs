pub mod extractors;
pub mod middleware;
pub mod password;
pub mod token;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;
use crate::models::user::{normalize_email, PublicUser};

// Re-export necessary items
pub use extractors::AuthenticatedUser;
pub use middleware::AuthMiddleware;
pub use password::{PasswordError, PasswordHasher};
pub use token::{Claims, TokenService};

lazy_static! {
    static ref EMAIL_REGEX: regex::Regex =
        regex::Regex::new(r"^[a-zA-Z0-9._-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap();
}

/// The caller identity carried inside a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: Uuid,
    pub email: String,
}

/// Represents the payload for a new user registration request.
///
/// Fields are optional so that an incomplete body is reported as a
/// validation error rather than a malformed request.
#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct RegisterRequest {
    /// Full name, 7 to 30 characters, unique across users.
    #[validate(
        required(message = "Please provide your full name"),
        length(min = 7, max = 30, message = "Full name must be between 7 and 30 characters")
    )]
    pub name: Option<String>,
    /// Email address, unique and compared case-insensitively.
    #[validate(
        required(message = "Please provide an email address"),
        length(max = 255, message = "Email cannot exceed 255 characters"),
        regex(path = "EMAIL_REGEX", message = "Please provide a valid email")
    )]
    pub email: Option<String>,
    /// At least 8 characters.
    #[validate(
        required(message = "Please provide a password"),
        length(min = 8, message = "Password must be at least 8 characters long")
    )]
    pub password: Option<String>,
}

/// A registration that passed validation.
#[derive(Debug)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl RegisterRequest {
    /// Trims the name, normalizes the email and validates every field.
    pub fn validated(self) -> Result<Registration, AppError> {
        let request = RegisterRequest {
            name: self.name.map(|n| n.trim().to_string()),
            email: self.email.map(|e| normalize_email(&e)),
            password: self.password,
        };
        request.validate()?;

        match (request.name, request.email, request.password) {
            (Some(name), Some(email), Some(password)) => Ok(Registration {
                name,
                email,
                password,
            }),
            _ => Err(AppError::BadRequest("All fields are mandatory".into())),
        }
    }
}

/// Represents the payload for a user login request.
#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(
        required(message = "Please provide an email address"),
        length(min = 1, message = "Please provide an email address")
    )]
    pub email: Option<String>,
    #[validate(
        required(message = "Please provide a password"),
        length(min = 1, message = "Please provide a password")
    )]
    pub password: Option<String>,
}

impl LoginRequest {
    /// Returns the normalized email and the password.
    pub fn validated(self) -> Result<(String, String), AppError> {
        let request = LoginRequest {
            email: self.email.map(|e| normalize_email(&e)),
            password: self.password,
        };
        request.validate()?;

        match (request.email, request.password) {
            (Some(email), Some(password)) => Ok((email, password)),
            _ => Err(AppError::BadRequest("All fields are mandatory".into())),
        }
    }
}

/// Response after successful registration or login: the session token and
/// the user without any credential material.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: PublicUser,
}
