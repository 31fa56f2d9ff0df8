//! Application state wiring the chat services together.
//!
//! AppState holds the service instances used by both CLI and REST API.
//! The chat services are generic over the `DocumentStore` port, but AppState
//! pins them to the store selected in `config.toml`.

use std::path::PathBuf;
use std::sync::Arc;

use duologue_core::ChatServices;
use duologue_infra::config::{load_global_config, resolve_data_dir};
use duologue_infra::store::ConfiguredStore;
use duologue_types::config::GlobalConfig;

/// Chat services pinned to the configured store.
pub type ConcreteServices = ChatServices<ConfiguredStore>;

/// Shared application state.
///
/// Used by both CLI commands and REST API handlers.
#[derive(Clone)]
pub struct AppState {
    pub services: ConcreteServices,
    pub config: Arc<GlobalConfig>,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Initialize the application state: load config, open the store, wire services.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();

        // Ensure data directory exists
        tokio::fs::create_dir_all(&data_dir).await?;

        let config = load_global_config(&data_dir).await;
        let store = ConfiguredStore::open(&config.store, &data_dir).await?;
        tracing::info!(
            backend = %store.backend(),
            data_dir = %data_dir.display(),
            "document store ready"
        );

        Ok(Self::new(ChatServices::new(Arc::new(store)), config, data_dir))
    }

    pub fn new(services: ConcreteServices, config: GlobalConfig, data_dir: PathBuf) -> Self {
        Self {
            services,
            config: Arc::new(config),
            data_dir,
        }
    }

    /// State over a fresh in-memory store, for tests.
    #[cfg(test)]
    pub fn in_memory() -> Self {
        use duologue_core::store::memory::MemoryDocumentStore;

        let store = ConfiguredStore::Memory(MemoryDocumentStore::new());
        Self::new(
            ChatServices::new(Arc::new(store)),
            GlobalConfig::default(),
            PathBuf::from("."),
        )
    }
}
