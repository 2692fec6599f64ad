use actix_web::dev::Payload;
use actix_web::{Error as ActixError, FromRequest, HttpMessage, HttpRequest};
use std::future::{ready, Ready};

use super::Identity;
use crate::error::AppError;

/// The authenticated caller, as placed in the request extensions by
/// [`AuthMiddleware`](crate::auth::AuthMiddleware).
///
/// On a route the middleware does not cover the extension is absent and the
/// extractor fails with `TokenMissing`.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Identity);

impl FromRequest for AuthenticatedUser {
    type Error = ActixError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        match req.extensions().get::<Identity>().cloned() {
            Some(identity) => ready(Ok(AuthenticatedUser(identity))),
            None => ready(Err(AppError::TokenMissing.into())),
        }
    }
}
