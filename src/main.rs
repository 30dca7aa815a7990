use std::sync::Arc;
use std::time::Duration;

use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};

mod api;
mod config;
mod db;
mod docs;
mod engine;
mod error;
mod jobs;
mod model;
mod provider;
mod repository;
mod routes;
mod service;
mod utils;

#[cfg(test)]
mod testing;

rust_i18n::i18n!("locales", fallback = "en");

use config::Config;
use db::init_db;

use crate::docs::ApiDoc;
use crate::jobs::{InMemoryJobQueue, JobQueue};
use crate::provider::mysql::{
    MySqlHolidayProvider, MySqlLeaveProvider, MySqlOvertimeProvider, MySqlShiftCatalog,
};
use crate::repository::attendance::MySqlAttendanceStore;
use crate::service::{AttendanceService, Collaborators};
use crate::utils::retry::RetryPolicy;
use crate::utils::warmup;
use tracing::{error, info};
use tracing_appender::rolling;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[get("/health")]
async fn health() -> impl Responder {
    "OK"
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let max_level = config
        .log_level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::DEBUG);
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(max_level)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    rust_i18n::set_locale(&config.default_locale);
    info!("Server starting...");

    let pool = init_db(&config.database_url).await?;

    let collaborators = Collaborators {
        catalog: Arc::new(MySqlShiftCatalog::new(pool.clone())),
        holidays: Arc::new(MySqlHolidayProvider::new(pool.clone())),
        leave: Arc::new(MySqlLeaveProvider::new(pool.clone())),
        overtime: Arc::new(MySqlOvertimeProvider::new(pool.clone())),
    };
    let service = Arc::new(AttendanceService::new(
        collaborators,
        Arc::new(MySqlAttendanceStore::new(pool.clone())),
        RetryPolicy::from(&config),
        config.engine_settings(),
        config.default_shift_code.clone(),
    ));
    let queue: Arc<dyn JobQueue> = Arc::new(InMemoryJobQueue::new(
        service.clone(),
        Duration::from_secs(config.job_status_ttl_secs),
    ));

    let pool_for_warmup = pool.clone();
    let service_for_warmup = service.clone();
    actix_web::rt::spawn(async move {
        let today = chrono::Local::now().date_naive();
        // Warm up today's shift windows in batches of 250
        if let Err(e) =
            warmup::warmup_shift_windows(&pool_for_warmup, &service_for_warmup, today, 250).await
        {
            error!(error = %e, "Failed to warm up shift windows");
        }
    });

    let server_addr = config.server_addr.clone();
    let service_data = Data::from(service);
    let queue_data: Data<dyn JobQueue> = Data::from(queue);

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // ← important: wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(service_data.clone())
            .app_data(queue_data.clone())
            .service(health)
            .configure(|cfg| routes::configure(cfg, &config))
    })
    .bind(server_addr)?
    .run()
    .await?;

    Ok(())
}
