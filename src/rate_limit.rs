//! Fixed-window request limiting per client IP.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{HeaderName, HeaderValue},
    Error,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use log::warn;
use parking_lot::Mutex;

use crate::config::{Config, RateLimitConfig};
use crate::error::AppError;

/// Past this many tracked clients, expired windows are swept on access.
const PRUNE_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

#[derive(Debug)]
struct Inner {
    config: RateLimitConfig,
    message: String,
    windows: Mutex<HashMap<String, Window>>,
}

/// Quota left for a client after an accepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub limit: u32,
    pub remaining: u32,
    /// Time until the current window closes.
    pub reset: Duration,
}

/// Allows at most `max_requests` per `window` per key.
///
/// Cloning shares the counters, so one limiter can be handed to every
/// worker's `App`.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    inner: Arc<Inner>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, message: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                message: message.into(),
                windows: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Counts one request for `key`.
    pub fn check(&self, key: &str) -> Result<RateLimitStatus, AppError> {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> Result<RateLimitStatus, AppError> {
        let RateLimitConfig {
            max_requests,
            window,
        } = self.inner.config;
        let mut windows = self.inner.windows.lock();

        if windows.len() >= PRUNE_THRESHOLD {
            windows.retain(|_, w| now.duration_since(w.started) < window);
        }

        let entry = windows.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(entry.started) >= window {
            *entry = Window {
                started: now,
                count: 0,
            };
        }
        if entry.count >= max_requests {
            warn!("rate limit exceeded for {}", key);
            return Err(AppError::RateLimited(self.inner.message.clone()));
        }

        entry.count += 1;
        Ok(RateLimitStatus {
            limit: max_requests,
            remaining: max_requests - entry.count,
            reset: window.saturating_sub(now.duration_since(entry.started)),
        })
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimiter
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = RateLimiterService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimiterService {
            service,
            limiter: self.clone(),
        }))
    }
}

pub struct RateLimiterService<S> {
    service: S,
    limiter: RateLimiter,
}

impl<S, B> Service<ServiceRequest> for RateLimiterService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // The socket address; forwarded headers are client-controlled.
        let key = req
            .peer_addr()
            .map(|addr| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        match self.limiter.check(&key) {
            Ok(status) => {
                let fut = self.service.call(req);
                Box::pin(async move {
                    let mut res = fut.await?;
                    let headers = res.headers_mut();
                    headers.insert(
                        HeaderName::from_static("ratelimit-limit"),
                        HeaderValue::from(status.limit),
                    );
                    headers.insert(
                        HeaderName::from_static("ratelimit-remaining"),
                        HeaderValue::from(status.remaining),
                    );
                    headers.insert(
                        HeaderName::from_static("ratelimit-reset"),
                        HeaderValue::from(status.reset.as_secs()),
                    );
                    Ok(res)
                })
            }
            Err(app_err) => Box::pin(async move { Err(app_err.into()) }),
        }
    }
}

/// The two limiters the API is wrapped in.
#[derive(Debug, Clone)]
pub struct Limiters {
    /// Registration and login.
    pub auth: RateLimiter,
    /// Everything under `/api/v1`.
    pub general: RateLimiter,
}

impl Limiters {
    pub fn new(auth: RateLimitConfig, general: RateLimitConfig) -> Self {
        Self {
            auth: RateLimiter::new(
                auth,
                format!(
                    "Too many login attempts from this IP, please try again after {}",
                    describe(auth.window)
                ),
            ),
            general: RateLimiter::new(
                general,
                format!(
                    "Too many requests from this IP, please try again after {}",
                    describe(general.window)
                ),
            ),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.auth_rate_limit, config.rate_limit)
    }
}

fn describe(window: Duration) -> String {
    match window.as_secs() {
        3600 => "an hour".to_string(),
        secs if secs >= 60 => format!("{} minutes", secs / 60),
        secs => format!("{} seconds", secs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test, web, App, HttpResponse};
    use std::net::SocketAddr;

    fn limiter(max_requests: u32, window: Duration) -> RateLimiter {
        RateLimiter::new(
            RateLimitConfig {
                max_requests,
                window,
            },
            "slow down",
        )
    }

    #[::core::prelude::v1::test]
    fn test_window_counts_and_resets() {
        let limiter = limiter(2, Duration::from_secs(60));
        let start = Instant::now();

        assert_eq!(limiter.check_at("1.2.3.4", start).unwrap().remaining, 1);
        assert_eq!(limiter.check_at("1.2.3.4", start).unwrap().remaining, 0);
        assert!(matches!(
            limiter.check_at("1.2.3.4", start),
            Err(AppError::RateLimited(_))
        ));
        // Other clients have their own window.
        assert!(limiter.check_at("5.6.7.8", start).is_ok());

        let later = start + Duration::from_secs(61);
        assert_eq!(limiter.check_at("1.2.3.4", later).unwrap().remaining, 1);
    }

    #[::core::prelude::v1::test]
    fn test_messages_name_the_window() {
        let limiters = Limiters::new(
            RateLimitConfig {
                max_requests: 10,
                window: Duration::from_secs(3600),
            },
            RateLimitConfig {
                max_requests: 100,
                window: Duration::from_secs(900),
            },
        );
        assert!(limiters.auth.inner.message.ends_with("after an hour"));
        assert!(limiters.general.inner.message.ends_with("after 15 minutes"));
    }

    #[actix_rt::test]
    async fn test_middleware_rejects_over_limit() {
        let app = test::init_service(
            App::new().service(
                web::scope("/limited")
                    .wrap(limiter(1, Duration::from_secs(60)))
                    .route("", web::get().to(HttpResponse::Ok)),
            ),
        )
        .await;
        let peer: SocketAddr = "10.0.0.1:4000".parse().unwrap();

        let req = test::TestRequest::get().uri("/limited").peer_addr(peer).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get("ratelimit-remaining").unwrap(), "0");

        let req = test::TestRequest::get().uri("/limited").peer_addr(peer).to_request();
        let err = test::try_call_service(&app, req).await.unwrap_err();
        assert_eq!(
            err.as_response_error().status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }
}
