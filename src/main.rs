use std::process;
use std::sync::Arc;

use actix_web::{middleware::Logger, App, HttpServer};
use log::{error, info, warn};

use taskrunner::rate_limit::Limiters;
use taskrunner::routes;
use taskrunner::services::Services;
use taskrunner::store::{self, MemoryStore, PgStore, TaskStore, UserStore};
use taskrunner::Config;

/// Retries until the database answers; the service is useless without it.
async fn connect_with_retry(config: &Config) -> PgStore {
    loop {
        match PgStore::connect(&config.database_url, config.request_timeout).await {
            Ok(store) => {
                info!("connected to the database");
                return store;
            }
            Err(e) => {
                error!(
                    "database connection failed: {}; retrying in {}s",
                    e,
                    config.db_retry_interval.as_secs()
                );
                tokio::time::sleep(config.db_retry_interval).await;
            }
        }
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("invalid configuration: {}", e);
            process::exit(1);
        }
    };

    let (users, tasks): (Arc<dyn UserStore>, Arc<dyn TaskStore>) = if config.uses_memory_store() {
        warn!("using the in-memory store; data is lost on restart");
        store::split(MemoryStore::new())
    } else {
        let pg = connect_with_retry(&config).await;
        if let Err(e) = pg.migrate().await {
            error!("{}", e);
            process::exit(1);
        }
        store::split(pg)
    };

    let services = Services::from_config(users, tasks, &config);
    let limiters = Limiters::from_config(&config);
    let client_url = config.client_url.clone();

    info!("Starting TaskRunner server at {}", config.server_url());
    HttpServer::new(move || {
        App::new()
            .wrap(routes::cors(client_url.as_deref()))
            .wrap(Logger::default())
            .configure(|cfg| services.register(cfg))
            .configure(|cfg| routes::config(cfg, &limiters))
    })
    .bind((config.server_host.as_str(), config.server_port))?
    .run()
    .await
}
