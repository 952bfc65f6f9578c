//! fedreg-server library - federated registry and diagnosis report service
//!
//! Serves three resources over one axum router: federated data uploads, the
//! model registry and AI diagnosis reports. Accounts and roles gate the
//! registry; everything shares one SQLite pool.

use axum::{extract::DefaultBodyLimit, Router};
use fedreg_common::config::{reports_dir, uploads_dir, AppConfig, StoreBackend};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tower_http::{
    cors::CorsLayer, limit::RequestBodyLimitLayer, services::ServeDir, trace::TraceLayer,
};
use tracing::{info, warn};

pub mod api;
pub mod db;
pub mod error;
pub mod pagination;
pub mod services;

use services::diagnosis::{DiagnosisStore, InMemoryDiagnosisStore, SqliteDiagnosisStore};
use services::{
    DiagnosisService, HttpInferenceClient, HttpObjectStore, LocalDirStore, ObjectStore,
    ReportRenderer, TieredStorage,
};

/// URL prefix of locally stored reports
pub const REPORTS_URL_PREFIX: &str = "/docs";
/// URL prefix of locally stored uploads
pub const UPLOADS_URL_PREFIX: &str = "/uploads";

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<AppConfig>,
    pub diagnosis: Arc<DiagnosisService>,
    /// Tiered storage for federated data images
    pub images: TieredStorage,
    pub reports_dir: PathBuf,
    pub uploads_dir: PathBuf,
    /// Server start time, for uptime reporting
    pub startup_time: Instant,
}

impl AppState {
    /// Assemble state from already-built services
    pub fn new(
        db: SqlitePool,
        config: AppConfig,
        diagnosis: DiagnosisService,
        images: TieredStorage,
        root_folder: &Path,
    ) -> Self {
        Self {
            db,
            config: Arc::new(config),
            diagnosis: Arc::new(diagnosis),
            images,
            reports_dir: reports_dir(root_folder),
            uploads_dir: uploads_dir(root_folder),
            startup_time: Instant::now(),
        }
    }

    /// Build every collaborator from configuration
    pub fn from_config(
        db: SqlitePool,
        config: AppConfig,
        root_folder: &Path,
    ) -> anyhow::Result<Self> {
        let remote = remote_store(&config);

        let reports = TieredStorage::new(
            remote.clone(),
            LocalDirStore::new(reports_dir(root_folder), REPORTS_URL_PREFIX),
        );
        let images = TieredStorage::new(
            remote,
            LocalDirStore::new(uploads_dir(root_folder), UPLOADS_URL_PREFIX),
        );

        let renderer = match &config.reports.font_path {
            Some(path) => ReportRenderer::with_font_file(path),
            None => ReportRenderer::new(),
        };

        if config.inference.api_url.is_none() {
            warn!("No inference API URL configured; diagnosis submissions will fail");
        }
        let inference = Arc::new(HttpInferenceClient::from_config(&config.inference)?);

        let store: Arc<dyn DiagnosisStore> = match config.diagnosis.store {
            StoreBackend::Memory => Arc::new(InMemoryDiagnosisStore::new()),
            StoreBackend::Database => Arc::new(SqliteDiagnosisStore::new(db.clone())),
        };
        info!(store = ?config.diagnosis.store, "Diagnosis record store selected");

        let diagnosis = DiagnosisService::new(
            inference,
            renderer,
            reports,
            store,
            config.inference.model.clone(),
        )
        .with_pagination(config.pagination.clone());

        Ok(Self::new(db, config, diagnosis, images, root_folder))
    }
}

/// Remote bucket client, when enabled and configured
fn remote_store(config: &AppConfig) -> Option<Arc<dyn ObjectStore>> {
    if !config.storage.enabled {
        info!("Remote object storage disabled; using local disk");
        return None;
    }
    match HttpObjectStore::from_config(&config.storage) {
        Ok(store) => {
            info!("Remote object storage enabled");
            Some(Arc::new(store) as Arc<dyn ObjectStore>)
        }
        Err(e) => {
            warn!(error = %e, "Remote object storage misconfigured; using local disk");
            None
        }
    }
}

/// Build application router
///
/// `/health` and the auth, federated data and diagnosis endpoints are public;
/// the model registry and account management check tokens per handler.
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.server.max_upload_bytes;
    let reports = ServeDir::new(&state.reports_dir);
    let uploads = ServeDir::new(&state.uploads_dir);

    Router::new()
        .merge(api::health_routes())
        .merge(api::auth_routes())
        .merge(api::federated_data_routes())
        .merge(api::model_routes())
        .merge(api::diagnosis_routes())
        .nest_service(REPORTS_URL_PREFIX, reports)
        .nest_service(UPLOADS_URL_PREFIX, uploads)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
