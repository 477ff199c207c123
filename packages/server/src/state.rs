use std::sync::Arc;

use filehub_common::storage::BlobStore;
use sea_orm::DatabaseConnection;

use crate::config::AppConfig;
use crate::dedup::{CoordinatorOptions, DedupCoordinator, RecordStamper, SeaOrmRegistry};

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<DedupCoordinator>,
    pub config: AppConfig,
}

impl AppState {
    /// Wire the engine to a database and blob store.
    pub fn new(config: AppConfig, db: DatabaseConnection, blobs: Arc<dyn BlobStore>) -> Self {
        let registry = Arc::new(SeaOrmRegistry::new(db, RecordStamper::default()));
        let coordinator = Arc::new(DedupCoordinator::new(
            registry,
            blobs,
            CoordinatorOptions::from_config(&config.storage),
        ));
        Self {
            coordinator,
            config,
        }
    }
}
