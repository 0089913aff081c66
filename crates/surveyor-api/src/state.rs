//! Application state wiring the engine together.
//!
//! The core services are generic over the store and gateway ports; AppState
//! pins them to the concrete infra implementations.

use std::path::PathBuf;
use std::sync::Arc;

use surveyor_core::ratelimit::RateLimiter;
use surveyor_core::session::SessionManager;
use surveyor_infra::fs::export::ExportDir;
use surveyor_infra::fs::store::FsSurveyStore;
use surveyor_infra::fs::{load_config, resolve_data_dir, DataLayout};
use surveyor_types::config::EngineConfig;

/// Session manager pinned to the file store.
pub type ConcreteSessionManager = SessionManager<FsSurveyStore>;

/// Shared application state used by all CLI commands.
#[derive(Clone)]
pub struct AppState {
    pub config: EngineConfig,
    pub store: Arc<FsSurveyStore>,
    pub limiter: Arc<RateLimiter>,
    pub sessions: Arc<ConcreteSessionManager>,
    pub exports: Arc<ExportDir>,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Initialize the application state: load config, open the store.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir).await?;

        let layout = DataLayout::new(&data_dir);
        let config = load_config(&layout.config_path()).await?;

        let store = Arc::new(FsSurveyStore::open(layout.clone(), &config.limits).await?);
        let exports = Arc::new(ExportDir::open(layout.exports_dir()).await?);
        let limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
        let sessions = Arc::new(SessionManager::new(store.clone(), config.clone()));

        Ok(Self {
            config,
            store,
            limiter,
            sessions,
            exports,
            data_dir,
        })
    }
}
