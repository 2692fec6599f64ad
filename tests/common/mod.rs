#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use actix_http::Request;
use actix_web::body::{self, MessageBody};
use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::{header, StatusCode};
use actix_web::middleware::Logger;
use actix_web::{test, App};
use serde_json::{json, Value};

use taskrunner::auth::{PasswordHasher, TokenService};
use taskrunner::config::RateLimitConfig;
use taskrunner::rate_limit::Limiters;
use taskrunner::routes;
use taskrunner::services::Services;
use taskrunner::store::{MemoryStore, TaskStore, UserStore};

pub const JWT_SECRET: &str = "integration-test-secret";
pub const PASSWORD: &str = "secret123";

/// Everything one test app is built from. The store is kept so tests can
/// reach behind the API (e.g. to deactivate an account).
pub struct TestContext {
    pub store: Arc<MemoryStore>,
    pub services: Services,
    pub limiters: Limiters,
}

impl TestContext {
    pub fn new() -> Self {
        let generous = RateLimitConfig {
            max_requests: 10_000,
            window: Duration::from_secs(60),
        };
        Self::with_limits(generous, generous)
    }

    pub fn with_limits(auth: RateLimitConfig, general: RateLimitConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let users: Arc<dyn UserStore> = store.clone();
        let tasks: Arc<dyn TaskStore> = store.clone();
        let services = Services::new(
            users,
            tasks,
            PasswordHasher::new(4),
            tokens(),
            Duration::from_secs(5),
        );
        Self {
            store,
            services,
            limiters: Limiters::new(auth, general),
        }
    }

    /// The full application, as `main` assembles it minus CORS.
    pub async fn init_app(
        &self,
    ) -> impl Service<Request, Response = ServiceResponse<impl MessageBody>, Error = actix_web::Error>
    {
        let services = self.services.clone();
        let limiters = self.limiters.clone();
        test::init_service(
            App::new()
                .wrap(Logger::default())
                .configure(|cfg| services.register(cfg))
                .configure(|cfg| routes::config(cfg, &limiters)),
        )
        .await
    }
}

pub fn tokens() -> TokenService {
    TokenService::new(JWT_SECRET, Duration::from_secs(7 * 24 * 60 * 60))
}

/// Calls the app and returns the status and JSON body, whether the request
/// was answered by a handler or rejected by a middleware.
pub async fn send<S, B>(app: &S, req: Request) -> (StatusCode, Value)
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let (status, bytes) = match test::try_call_service(app, req).await {
        Ok(resp) => {
            let status = resp.status();
            (status, test::read_body(resp).await)
        }
        Err(err) => {
            let resp = err.error_response();
            let status = resp.status();
            (status, body::to_bytes(resp.into_body()).await.unwrap())
        }
    };
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

pub fn bearer(req: test::TestRequest, token: &str) -> test::TestRequest {
    req.insert_header((header::AUTHORIZATION, format!("Bearer {}", token)))
}

/// Registers a user and returns `(token, user id)`.
pub async fn register<S, B>(app: &S, name: &str, email: &str) -> (String, String)
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let req = test::TestRequest::post()
        .uri("/api/v1/auth/register")
        .set_json(json!({ "name": name, "email": email, "password": PASSWORD }))
        .to_request();
    let (status, body) = send(app, req).await;
    assert_eq!(status, StatusCode::CREATED, "registration failed: {}", body);
    (
        body["data"]["token"].as_str().unwrap().to_string(),
        body["data"]["user"]["id"].as_str().unwrap().to_string(),
    )
}

/// Creates a task and returns its JSON.
pub async fn create_task<S, B>(app: &S, token: &str, payload: Value) -> Value
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let req = bearer(test::TestRequest::post().uri("/api/v1/tasks"), token)
        .set_json(payload)
        .to_request();
    let (status, body) = send(app, req).await;
    assert_eq!(status, StatusCode::CREATED, "task creation failed: {}", body);
    body["data"].clone()
}
