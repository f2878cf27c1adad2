use std::sync::Arc;

use actix_web::middleware::Logger;
use actix_web::{App, HttpServer, web};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use natours::config::{Config, Environment};
use natours::services::email::{LogMailer, Mailer};
use natours::{db, error as app_error, routes};

fn init_tracing(environment: Environment) {
    let default_filter = match environment {
        Environment::Development => "info,natours=debug",
        Environment::Production => "info",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();
}

/// Un panic laisse le processus dans un état inconnu : log puis arrêt
fn install_panic_hook() {
    std::panic::set_hook(Box::new(|panic| {
        error!(%panic, "UNCAUGHT PANIC! Shutting down...");
        std::process::exit(1);
    }));
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // 1. Configuration (avant les logs : APP_ENV choisit le filtre par défaut)
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    init_tracing(config.environment);
    install_panic_hook();
    app_error::init_environment(config.environment);
    info!(environment = ?config.environment, "configuration loaded");

    // 2. Base de données
    info!("Connecting to database...");
    let db = match db::establish_connection(&config.database_url).await {
        Ok(db) => db,
        Err(e) => {
            error!(error = %e, "failed to connect to database");
            std::process::exit(1);
        }
    };
    if let Err(e) = db::sync_schema(&db).await {
        error!(error = %e, "failed to create schema");
        std::process::exit(1);
    }
    info!("Database connected");

    // 3. Serveur
    let address = (config.host.clone(), config.port);
    info!("Starting server on http://{}:{}", address.0, address.1);

    let db = web::Data::new(db);
    let mailer: Arc<dyn Mailer> = Arc::new(LogMailer);
    let mailer = web::Data::from(mailer);
    let config = web::Data::new(config);

    let result = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(db.clone())
            .app_data(config.clone())
            .app_data(mailer.clone())
            .configure(routes::configure_routes)
    })
    .bind(address)?
    .run()
    .await;

    if let Err(e) = &result {
        error!(error = %e, "server stopped with an error");
    }
    result
}
