use std::sync::Arc;
use std::time::Duration;

use log::info;

use super::with_deadline;
use crate::auth::{AuthResponse, Identity, LoginRequest, PasswordHasher, RegisterRequest, TokenService};
use crate::error::AppError;
use crate::models::{NewUser, User};
use crate::store::UserStore;

/// Registration and login.
pub struct AuthService {
    users: Arc<dyn UserStore>,
    hasher: PasswordHasher,
    tokens: TokenService,
    timeout: Duration,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        hasher: PasswordHasher,
        tokens: TokenService,
        timeout: Duration,
    ) -> Self {
        Self {
            users,
            hasher,
            tokens,
            timeout,
        }
    }

    /// Creates the account and signs the new user in.
    pub async fn register(&self, request: RegisterRequest) -> Result<AuthResponse, AppError> {
        let registration = request.validated()?;

        // Skip the hashing cost for an email that is obviously taken. The
        // insert still enforces uniqueness of both email and name.
        if with_deadline(self.timeout, self.users.find_user_by_email(&registration.email))
            .await?
            .is_some()
        {
            return Err(AppError::DuplicateUser);
        }

        let password_hash = self.hasher.hash_async(registration.password).await?;
        let new_user = NewUser::new(registration.name, &registration.email, password_hash);
        let user = with_deadline(self.timeout, self.users.insert_user(new_user)).await?;

        info!("registered user {}", user.id);
        self.signed_in(user)
    }

    /// Checks credentials and issues a fresh token.
    ///
    /// Unknown email, wrong password and a deactivated account all render
    /// the same response; only the log line tells them apart. The password
    /// is checked first so the active flag is never revealed to someone who
    /// does not know it.
    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse, AppError> {
        let (email, password) = request.validated()?;

        let user = with_deadline(self.timeout, self.users.find_user_by_email(&email))
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        let matches = self
            .hasher
            .verify_async(password, user.password_hash.clone())
            .await?;
        if !matches {
            return Err(AppError::InvalidCredentials);
        }
        if !user.is_active {
            return Err(AppError::AccountDeactivated);
        }

        info!("user {} logged in", user.id);
        self.signed_in(user)
    }

    fn signed_in(&self, user: User) -> Result<AuthResponse, AppError> {
        let token = self.tokens.issue(&Identity {
            user_id: user.id,
            email: user.email.clone(),
        })?;
        Ok(AuthResponse {
            token,
            user: user.into(),
        })
    }
}
