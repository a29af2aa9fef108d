//! Application state.

use std::sync::Arc;

use sclip_media::{CliMediaTools, MediaTools};
use sclip_store::{JobStore, SqliteStore};
use sclip_worker::{Orchestrator, WorkerConfig};

use crate::auth::JwtVerifier;
use crate::config::ApiConfig;
use crate::services::AccountService;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub orchestrator: Arc<Orchestrator>,
    pub jwt: Arc<JwtVerifier>,
    pub accounts: AccountService,
}

impl AppState {
    /// Create new application state backed by SQLite and the CLI tools.
    pub async fn new(config: ApiConfig, worker: WorkerConfig) -> anyhow::Result<Self> {
        if config.jwt_secret.is_empty() {
            anyhow::bail!("JWT_SECRET must be set");
        }

        let store = SqliteStore::connect(&config.database_url).await?;
        if let Err(e) = CliMediaTools::check_available() {
            tracing::warn!("Media tools unavailable, jobs will fail: {}", e);
        }
        let tools = CliMediaTools::new(worker.timeouts);

        Ok(Self::from_parts(config, worker, Arc::new(store), Arc::new(tools)))
    }

    /// Assemble state from an existing store and tool set.
    pub fn from_parts(
        config: ApiConfig,
        worker: WorkerConfig,
        store: Arc<dyn JobStore>,
        tools: Arc<dyn MediaTools>,
    ) -> Self {
        let jwt = JwtVerifier::new(&config.jwt_secret);
        let accounts = AccountService::new(Arc::clone(&store), config.admin_account_ids.clone());
        let orchestrator = Orchestrator::new(store, tools, worker);

        Self {
            config,
            orchestrator: Arc::new(orchestrator),
            jwt: Arc::new(jwt),
            accounts,
        }
    }
}
