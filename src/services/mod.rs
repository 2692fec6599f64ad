//! Business operations sitting between the HTTP handlers and the stores.
//!
//! Handlers only translate HTTP into calls on [`AuthService`] and
//! [`TaskService`]; every rule about who may see or change what lives here
//! or below in the models and stores.

pub mod auth;
pub mod tasks;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use actix_web::web;

use crate::auth::{PasswordHasher, TokenService};
use crate::config::Config;
use crate::error::AppError;
use crate::store::{TaskStore, UserStore};

pub use auth::AuthService;
pub use tasks::{parse_task_id, TaskList, TaskService};

/// Runs a store call under the request deadline.
pub(crate) async fn with_deadline<T, F>(deadline: Duration, call: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, AppError>>,
{
    match tokio::time::timeout(deadline, call).await {
        Ok(result) => result,
        Err(_) => Err(AppError::Timeout),
    }
}

/// The shared application state registered as app data on every worker.
#[derive(Clone)]
pub struct Services {
    pub auth: web::Data<AuthService>,
    pub tasks: web::Data<TaskService>,
    pub tokens: web::Data<TokenService>,
}

impl Services {
    pub fn new(
        users: Arc<dyn UserStore>,
        tasks: Arc<dyn TaskStore>,
        hasher: PasswordHasher,
        tokens: TokenService,
        timeout: Duration,
    ) -> Self {
        Self {
            auth: web::Data::new(AuthService::new(users, hasher, tokens.clone(), timeout)),
            tasks: web::Data::new(TaskService::new(tasks, timeout)),
            tokens: web::Data::new(tokens),
        }
    }

    pub fn from_config(users: Arc<dyn UserStore>, tasks: Arc<dyn TaskStore>, config: &Config) -> Self {
        Self::new(
            users,
            tasks,
            PasswordHasher::new(config.bcrypt_cost),
            TokenService::new(&config.jwt_secret, config.jwt_expiration),
            config.request_timeout,
        )
    }

    pub fn register(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(self.auth.clone())
            .app_data(self.tasks.clone())
            .app_data(self.tokens.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_rt::test]
    async fn test_with_deadline() {
        let fast = with_deadline(Duration::from_millis(50), async { Ok::<_, AppError>(7) }).await;
        assert_eq!(fast.unwrap(), 7);

        let slow = with_deadline(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<_, AppError>(7)
        })
        .await;
        assert!(matches!(slow, Err(AppError::Timeout)));
    }
}
