//!
//! # Custom Error Handling
//!
//! This module defines the error type `AppError` used throughout the service.
//! Every failure a handler, service or store can produce is one of its variants,
//! and `AppError` implements `actix_web::error::ResponseError` so that handlers can
//! simply return `Result<_, AppError>` and let Actix render the JSON error envelope.
//!
//! Internal details (database messages, hashing failures) are logged server-side
//! and never leave the process; callers only ever see a safe message.

use std::collections::BTreeMap;
use std::fmt;

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use log::{debug, error, info, warn};
use serde_json::json;
use validator::ValidationErrors;

/// Field name to the list of messages describing why that field was rejected.
pub type ValidationDetails = BTreeMap<String, Vec<String>>;

const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid email or password";
const INTERNAL_MESSAGE: &str = "Something went wrong, please try again later";

/// Represents all possible errors that can occur within the application.
#[derive(Debug)]
pub enum AppError {
    /// Input failed schema validation (HTTP 422), with per-field detail.
    Validation(ValidationDetails),
    /// Malformed request that is not a field-level validation problem (HTTP 400).
    BadRequest(String),
    /// A user with the same email or name already exists (HTTP 400).
    DuplicateUser,
    /// Unknown email or wrong password (HTTP 401).
    InvalidCredentials,
    /// Correct credentials for an account whose active flag is false (HTTP 401).
    /// Rendered with the same message as `InvalidCredentials`.
    AccountDeactivated,
    /// No bearer token on a protected route (HTTP 401).
    TokenMissing,
    /// Bad signature or malformed token (HTTP 401).
    TokenInvalid,
    /// Token past its expiry (HTTP 401).
    TokenExpired,
    /// Path identifier that is not a well-formed id (HTTP 400).
    InvalidId(String),
    /// Missing, not owned, or in the wrong lifecycle state (HTTP 404).
    NotFound(String),
    /// Too many requests from one client (HTTP 429).
    RateLimited(String),
    /// The store did not answer within the request deadline (HTTP 504).
    Timeout,
    /// Unexpected store or runtime failure (HTTP 500). The payload is logged, never returned.
    Internal(String),
}

impl AppError {
    /// Builds a `Validation` error for a single field.
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        let mut details = ValidationDetails::new();
        details.insert(field.to_string(), vec![message.into()]);
        AppError::Validation(details)
    }

    /// The message that is safe to show to the caller.
    fn public_message(&self) -> String {
        match self {
            AppError::Validation(_) => "Validation failed".to_string(),
            AppError::BadRequest(msg) => msg.clone(),
            AppError::DuplicateUser => "User is already registered".to_string(),
            AppError::InvalidCredentials | AppError::AccountDeactivated => {
                INVALID_CREDENTIALS_MESSAGE.to_string()
            }
            AppError::TokenMissing => "No token, authorization denied".to_string(),
            AppError::TokenInvalid | AppError::TokenExpired => {
                "Token is not valid or has expired".to_string()
            }
            AppError::InvalidId(id) => format!("Invalid id: {}", id),
            AppError::NotFound(msg) => msg.clone(),
            AppError::RateLimited(msg) => msg.clone(),
            AppError::Timeout => "The request timed out".to_string(),
            AppError::Internal(_) => INTERNAL_MESSAGE.to_string(),
        }
    }

    fn log(&self) {
        match self {
            AppError::Internal(detail) => error!("internal error: {}", detail),
            AppError::Timeout => warn!("store call exceeded the request deadline"),
            AppError::RateLimited(_) => info!("{}", self),
            AppError::AccountDeactivated => info!("login rejected: account is deactivated"),
            AppError::InvalidCredentials => info!("login rejected: invalid credentials"),
            _ => debug!("{}", self),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AppError::Validation(details) => {
                let fields: Vec<&str> = details.keys().map(String::as_str).collect();
                write!(f, "Validation Error: {}", fields.join(", "))
            }
            AppError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            AppError::DuplicateUser => write!(f, "Duplicate User"),
            AppError::InvalidCredentials => write!(f, "Invalid Credentials"),
            AppError::AccountDeactivated => write!(f, "Account Deactivated"),
            AppError::TokenMissing => write!(f, "Token Missing"),
            AppError::TokenInvalid => write!(f, "Token Invalid"),
            AppError::TokenExpired => write!(f, "Token Expired"),
            AppError::InvalidId(id) => write!(f, "Invalid Id: {}", id),
            AppError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            AppError::RateLimited(msg) => write!(f, "Rate Limited: {}", msg),
            AppError::Timeout => write!(f, "Timeout"),
            AppError::Internal(msg) => write!(f, "Internal Server Error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

/// Converts `AppError` variants into `HttpResponse` objects.
///
/// Every response uses the `{ "success": false, "error": ... }` envelope;
/// validation failures additionally carry a `details` map keyed by field.
impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::BadRequest(_) | AppError::InvalidId(_) | AppError::DuplicateUser => {
                StatusCode::BAD_REQUEST
            }
            AppError::InvalidCredentials
            | AppError::AccountDeactivated
            | AppError::TokenMissing
            | AppError::TokenInvalid
            | AppError::TokenExpired => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        self.log();
        let body = match self {
            AppError::Validation(details) => json!({
                "success": false,
                "error": self.public_message(),
                "details": details,
            }),
            _ => json!({
                "success": false,
                "error": self.public_message(),
            }),
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}

/// Converts `sqlx::Error` into `AppError`.
///
/// `RowNotFound` becomes `NotFound`, unique-constraint violations become
/// `DuplicateUser` (the only unique columns are the user's email and name),
/// and pool timeouts become `Timeout`.
impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> AppError {
        match &error {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".into()),
            sqlx::Error::PoolTimedOut => AppError::Timeout,
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::DuplicateUser
            }
            _ => AppError::Internal(format!("database error: {}", error)),
        }
    }
}

/// Converts `validator::ValidationErrors` into `AppError::Validation`,
/// keeping one message per failed rule.
impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> AppError {
        let mut details = ValidationDetails::new();
        for (field, field_errors) in errors.field_errors() {
            let messages = field_errors
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{} is invalid", field))
                })
                .collect();
            details.insert(field.to_string(), messages);
        }
        AppError::Validation(details)
    }
}

/// Converts `jsonwebtoken::errors::Error` into the token error kinds.
impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(error: jsonwebtoken::errors::Error) -> AppError {
        match error.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::TokenExpired,
            _ => AppError::TokenInvalid,
        }
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(error: bcrypt::BcryptError) -> AppError {
        AppError::Internal(format!("password hashing failed: {}", error))
    }
}

impl From<actix_web::error::BlockingError> for AppError {
    fn from(error: actix_web::error::BlockingError) -> AppError {
        AppError::Internal(format!("blocking task failed: {}", error))
    }
}
