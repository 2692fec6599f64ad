use actix_web::{post, web, HttpResponse};

use crate::{
    auth::{LoginRequest, RegisterRequest},
    error::AppError,
    response::ApiResponse,
    services::AuthService,
};

/// Register a new user
///
/// Creates a new user account and returns an authentication token.
#[post("/register")]
pub async fn register(
    service: web::Data<AuthService>,
    body: web::Json<RegisterRequest>,
) -> Result<HttpResponse, AppError> {
    let auth = service.register(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(ApiResponse::with_message("User registered successfully", auth)))
}

/// Login user
///
/// Authenticates a user and returns an authentication token.
#[post("/login")]
pub async fn login(
    service: web::Data<AuthService>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, AppError> {
    let auth = service.login(body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::with_message("Login successful", auth)))
}
