//! Storage layer: the repository trait and its backends.
//!
//! Every item query carries the tenant slug; nothing here reads across
//! libraries.

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    error::AppResult,
    models::{
        column::SelectOption,
        enums::NamedEntity,
        item::{ItemCommand, ItemQuery, ItemRow, ScopedName},
        user::UserCommand,
    },
};

pub use memory::MemoryRepository;
pub use postgres::PgRepository;

/// Shared handle injected into the services
pub type DynRepository = Arc<dyn Repository>;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Repository: Send + Sync {
    async fn library_exists(&self, slug: &str) -> AppResult<bool>;

    /// Creates an item, its variant extension and all relations atomically.
    /// Named entities referenced by the command are found or created inside
    /// the same unit of work.
    async fn create_item(&self, command: &ItemCommand) -> AppResult<i64>;

    /// Replaces the fields of an existing item of the command's library.
    async fn update_item(&self, id: i64, command: &ItemCommand) -> AppResult<()>;

    async fn find_items(&self, query: &ItemQuery) -> AppResult<Vec<ItemRow>>;

    /// First row of `query`, if any.
    async fn find_item(&self, query: &ItemQuery) -> AppResult<Option<ItemRow>>;

    /// Returns the id of the entity with this key, creating it when absent.
    /// Safe to race: the store's unique key decides the winner.
    async fn find_or_create(&self, entity: NamedEntity, key: &ScopedName) -> AppResult<i64>;

    async fn find_named(&self, entity: NamedEntity, key: &ScopedName) -> AppResult<Option<i64>>;

    /// Options of one entity, by name. `None` lists the global options.
    async fn list_named(&self, entity: NamedEntity, library_slug: Option<String>) -> AppResult<Vec<SelectOption>>;

    async fn create_user(&self, user: &UserCommand) -> AppResult<i64>;

    /// Releases connections. Called once on shutdown.
    async fn close(&self);
}
