mod auth;
mod config;
mod error;
mod ingest;
mod services;
mod state;
mod store;

use crate::config::AppConfig;
use crate::state::AppState;
use actix_web::middleware::{from_fn, Logger};
use actix_web::{web, App, HttpResponse, HttpServer};
use env_logger::Env;
use log::{error, info};
use serde_json::json;
use std::io;

async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(json!({ "error": "Not Found" }))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let config = AppConfig::from_env().map_err(|e| {
        error!("Invalid configuration: {}", e);
        io::Error::new(io::ErrorKind::InvalidInput, e)
    })?;
    let store = store::connect(&config.store).map_err(|e| {
        error!("Could not open the store: {}", e);
        io::Error::other(e)
    })?;

    let bind = (config.host.clone(), config.port);
    let state = AppState::new(config, store);

    info!("Server running at http://{}:{}", bind.0, bind.1);

    HttpServer::new(move || {
        App::new()
            .app_data(web::JsonConfig::default().limit(64 * 1024))
            .app_data(web::Data::new(state.clone()))
            .wrap(from_fn(auth::require_session))
            .wrap(Logger::default())
            // `/api/auth` before the catch-all `/api` scope.
            .service(services::auth::configure_routes())
            .service(services::uploads::configure_routes())
            .default_service(web::route().to(not_found))
    })
    .bind(bind)?
    .run()
    .await?;

    info!("Server stopped");
    Ok(())
}
