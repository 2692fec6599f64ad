#![doc = "The `taskrunner` library crate."]
#![doc = ""]
#![doc = "Domain models, persistence, authentication, rate limiting and routing for the"]
#![doc = "TaskRunner API. The binary (`main.rs`) reads the configuration, opens the store"]
#![doc = "and serves the routes registered by [`routes::config`]."]

pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod rate_limit;
pub mod response;
pub mod routes;
pub mod services;
pub mod store;

pub use crate::config::Config;
pub use crate::error::AppError;
