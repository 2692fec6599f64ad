use actix_web::{get, HttpResponse};
use chrono::Utc;
use serde_json::json;

const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// `GET /`: service banner.
#[get("/")]
pub async fn index() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "message": "TaskRunner API is running",
        "version": SERVICE_VERSION,
        "timestamp": Utc::now(),
        "status": "active",
    }))
}

/// `GET /health`: liveness probe. Does not touch the store.
#[get("/health")]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "version": SERVICE_VERSION,
        "timestamp": Utc::now(),
    }))
}
