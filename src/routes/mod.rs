pub mod auth;
pub mod health;
pub mod tasks;

use actix_cors::Cors;
use actix_web::{http::header, web, HttpRequest, HttpResponse};
use serde_json::json;

use crate::error::AppError;
use crate::rate_limit::Limiters;

/// Registers every route.
///
/// `/api/v1` is wrapped in the general limiter and `/api/v1/auth` additionally
/// in the auth limiter. Each task route requires a bearer token on its own,
/// so unmatched paths under `/api/v1/tasks` still reach the 404 handler.
pub fn config(cfg: &mut web::ServiceConfig, limiters: &Limiters) {
    cfg.app_data(json_config())
        .app_data(query_config())
        .service(health::index)
        .service(health::health)
        .service(
            web::scope("/api/v1")
                .wrap(limiters.general.clone())
                .service(
                    web::scope("/auth")
                        .wrap(limiters.auth.clone())
                        .service(auth::register)
                        .service(auth::login),
                )
                .service(
                    web::scope("/tasks")
                        // Before `/{id}`, so "trash" is not taken for an id.
                        .service(tasks::list_trash)
                        .service(tasks::create_task)
                        .service(tasks::list_tasks)
                        .service(tasks::get_task)
                        .service(tasks::update_task)
                        .service(tasks::delete_task)
                        .service(tasks::restore_task)
                        .service(tasks::purge_task),
                ),
        )
        .default_service(web::route().to(not_found));
}

/// CORS for the configured client origin, or any origin when none is set.
/// Credentials are only allowed with an explicit origin.
pub fn cors(client_url: Option<&str>) -> Cors {
    let cors = Cors::default()
        .allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE"])
        .allowed_headers(vec![header::AUTHORIZATION, header::ACCEPT, header::CONTENT_TYPE])
        .max_age(3600);
    match client_url {
        Some(origin) => cors.allowed_origin(origin).supports_credentials(),
        None => cors.allow_any_origin(),
    }
}

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .error_handler(|err, _req| AppError::BadRequest(format!("Invalid request body: {}", err)).into())
}

fn query_config() -> web::QueryConfig {
    web::QueryConfig::default()
        .error_handler(|err, _req| AppError::BadRequest(format!("Invalid query string: {}", err)).into())
}

async fn not_found(req: HttpRequest) -> HttpResponse {
    HttpResponse::NotFound().json(json!({
        "success": false,
        "message": "Route not found",
        "requestedRoute": format!("{} {}", req.method(), req.path()),
    }))
}
