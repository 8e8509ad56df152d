use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};

use heimdall::api::{self, AppState, KvUserDirectory, SessionIssuer};
use heimdall::challenge::TurnstileVerifier;
use heimdall::config::Config;
use heimdall::engine::RiskEngine;
use heimdall::geolocation::GeoIpService;
use heimdall::persistence::SqliteKeyValueStore;
use heimdall::scoring::RiskCalculator;

/// Main server entry point for the adaptive authentication risk engine
#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("Starting Heimdall server...");

    // Load configuration
    let config_path = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = if config_path.exists() {
        Config::from_file(&config_path)?
    } else {
        log::warn!("Config file not found, using defaults");
        Config::default()
    };

    if config.challenge.turnstile_secret.is_empty() {
        log::warn!("No turnstile secret configured; challenge verification will fail closed");
    }

    // Open the keyed store and reclaim expired rows
    let store = Arc::new(SqliteKeyValueStore::new(&config.store.db_path)?);
    let purged = store.purge_expired()?;
    if purged > 0 {
        log::info!("Purged {} expired store entries", purged);
    }

    // GeoIP lookups are optional; a missing database only removes the
    // location signal
    let geoip = match &config.geoip.database {
        Some(path) => match GeoIpService::new(path) {
            Ok(service) => {
                log::info!("GeoIP database loaded: {:?}", path);
                Some(service)
            }
            Err(e) => {
                log::warn!("GeoIP database unavailable ({}), lookups disabled", e);
                None
            }
        },
        None => None,
    };

    // Assemble the pipeline
    let engine = RiskEngine::with_windows(
        store.clone(),
        RiskCalculator::with_weights(config.risk.weights),
        config.detection.brute_force_window_seconds,
        config.detection.stuffing_window_seconds,
    );

    let state = web::Data::new(AppState {
        engine,
        directory: Arc::new(KvUserDirectory::new(
            store.clone(),
            config.auth.password_salt.clone(),
        )),
        sessions: SessionIssuer::new(store.clone(), config.auth.session_ttl_seconds),
        verifier: TurnstileVerifier::new(
            config.challenge.turnstile_secret.clone(),
            config.challenge.verify_url.clone(),
        ),
        geoip,
    });

    let bind_address = config.server.bind_address.clone();
    log::info!("Listening on {}", bind_address);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(middleware::Logger::default())
            .wrap(cors)
            .app_data(state.clone())
            .configure(api::configure)
    })
    .bind(&bind_address)?
    .run()
    .await?;

    log::info!("Heimdall server stopped");
    Ok(())
}
