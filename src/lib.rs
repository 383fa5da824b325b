//! Library Catalog
//!
//! A multi-tenant library catalog server. Items share a base set of fields
//! and each variant (book, magazine) adds its own; one column registry drives
//! validation, listing, search and bulk import for every variant.

use std::sync::Arc;

pub mod api;
pub mod catalog;
pub mod config;
pub mod error;
pub mod import;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}

impl AppState {
    pub fn new(config: AppConfig, repository: repository::DynRepository) -> Self {
        let services = services::Services::new(repository, &config);
        Self {
            config: Arc::new(config),
            services: Arc::new(services),
        }
    }
}
