#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for PPE compliance detection.
//!
//! Accepts image uploads on `POST /detect`, runs them through the analysis
//! pipeline and serves the generated per-person crops from `/artifacts`
//! until the lifecycle tasks delete them.

pub mod config;
mod error;
mod handlers;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use actix_cors::Cors;
use actix_files::Files;
use actix_web::{App, HttpServer, middleware, web};
use image::{Rgb, RgbImage};
use ppe_vision_analysis::{Analyzer, PLACEHOLDER_FILE_NAME};
use ppe_vision_annotate::AnnotateError;
use ppe_vision_artifacts::{ArtifactRegistry, SystemClock};

pub use config::ServerConfig;
pub use error::ApiError;

/// Public path under which the artifact directory is served.
pub const ARTIFACT_URL_PREFIX: &str = "/artifacts";

/// Shared application state.
pub struct AppState {
    /// Detection pipeline and artifact store.
    pub analyzer: Analyzer,
    /// Runtime configuration.
    pub config: ServerConfig,
}

/// Registers the API routes and the artifact file service.
pub fn configure(cfg: &mut web::ServiceConfig, artifact_dir: &Path) {
    cfg.route("/detect", web::post().to(handlers::detect))
        .route("/health", web::get().to(handlers::health))
        .route("/config", web::get().to(handlers::config))
        .route("/cleanup", web::post().to(handlers::cleanup))
        .service(Files::new(ARTIFACT_URL_PREFIX, artifact_dir));
}

/// Opens the artifact registry for `config`, creating its directory.
///
/// # Errors
///
/// Returns an `std::io::Result` error if the directory cannot be created.
pub fn open_registry(config: &ServerConfig) -> std::io::Result<Arc<ArtifactRegistry>> {
    ArtifactRegistry::new(
        config.artifact_dir.clone(),
        ARTIFACT_URL_PREFIX,
        Arc::new(SystemClock),
    )
    .map(Arc::new)
    .map_err(std::io::Error::other)
}

/// Writes the image served in place of a crop that could not be produced.
///
/// # Errors
///
/// Returns [`AnnotateError`] if the file cannot be written.
pub fn write_placeholder(dir: &Path) -> Result<PathBuf, AnnotateError> {
    let path = dir.join(PLACEHOLDER_FILE_NAME);
    let image = RgbImage::from_pixel(200, 200, Rgb([200, 200, 200]));
    ppe_vision_annotate::save_jpeg(&image, &path)?;
    Ok(path)
}

/// Deletes every artifact under the configured directory without starting
/// the server. Returns the number of files removed.
///
/// # Errors
///
/// Returns an `std::io::Result` error if the directory cannot be opened.
pub fn sweep_once(config: &ServerConfig) -> std::io::Result<usize> {
    let registry = open_registry(config)?;
    Ok(registry.sweep_all())
}

/// Starts the PPE vision API server.
///
/// Creates the detector, prepares the artifact directory, spawns the
/// periodic sweep and runs the Actix-Web HTTP server until shutdown. This
/// is a regular async function; the caller provides the runtime (e.g. via
/// `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an `std::io::Result` error if the detector cannot be
/// configured, the artifact directory cannot be prepared, or the HTTP
/// server fails to bind.
#[allow(clippy::future_not_send)]
pub async fn run_server(config: ServerConfig) -> std::io::Result<()> {
    log::info!("Creating PPE detector...");
    let detector = ppe_vision_detection::providers::create_detector_from_env()
        .await
        .map_err(std::io::Error::other)?;

    log::info!("Preparing artifact directory {}...", config.artifact_dir.display());
    let registry = open_registry(&config)?;
    write_placeholder(registry.dir()).map_err(std::io::Error::other)?;

    let sweeper = ppe_vision_artifacts::spawn_periodic_sweep(
        Arc::clone(&registry),
        config.lifecycle.sweep_interval,
        config.lifecycle.sweep_max_age,
    );

    let bind_addr = config.bind_addr.clone();
    let port = config.port;
    let artifact_dir = config.artifact_dir.clone();
    let state = web::Data::new(AppState {
        analyzer: Analyzer::new(Arc::from(detector), registry),
        config,
    });

    log::info!("Starting server on {bind_addr}:{port}");

    let result = HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(|cfg| configure(cfg, &artifact_dir))
    })
    .bind((bind_addr, port))?
    .run()
    .await;

    sweeper.abort();
    result
}
