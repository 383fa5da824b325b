//! Business logic services

pub mod catalog;
pub mod import;

use crate::{config::AppConfig, error::AppResult, repository::DynRepository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalog: catalog::CatalogService,
    pub import: import::ImportService,
    repository: DynRepository,
}

impl Services {
    /// Create all services around one repository handle
    pub fn new(repository: DynRepository, config: &AppConfig) -> Self {
        Self {
            catalog: catalog::CatalogService::new(repository.clone(), config.catalog.clone()),
            import: import::ImportService::new(repository.clone(), config.import.clone()),
            repository,
        }
    }

    /// Round trip to the store, used by the readiness probe
    pub async fn check_storage(&self) -> AppResult<()> {
        self.repository.library_exists("").await.map(|_| ())
    }

    /// Closes the repository. Call once, after the server stopped.
    pub async fn shutdown(&self) {
        self.repository.close().await;
        tracing::info!("Repository closed");
    }
}
