//! Import service: request checks and the row import of an upload.

use futures::Stream;

use crate::{
    config::ImportConfig,
    error::{AppError, AppResult},
    import::{self, RowResult},
    models::{enums::RowKind, import_report::ImportReport},
    repository::DynRepository,
};

#[derive(Clone)]
pub struct ImportService {
    repository: DynRepository,
    config: ImportConfig,
}

impl ImportService {
    pub fn new(repository: DynRepository, config: ImportConfig) -> Self {
        Self { repository, config }
    }

    pub fn channel_capacity(&self) -> usize {
        self.config.channel_capacity
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.config.max_upload_bytes
    }

    /// Checks the declared row kind and the library before any row is read.
    pub async fn prepare(&self, slug: &str, kind: Option<&str>) -> AppResult<RowKind> {
        let kind = kind
            .unwrap_or_default()
            .parse::<RowKind>()
            .map_err(AppError::BadRequest)?;
        if !self.repository.library_exists(slug).await? {
            return Err(AppError::NotFound(format!("Library '{}' not found", slug)));
        }
        Ok(kind)
    }

    /// Imports every row; per-row failures end up in the report.
    pub async fn run<S>(&self, slug: &str, kind: RowKind, rows: S) -> ImportReport
    where
        S: Stream<Item = RowResult> + Send,
    {
        tracing::info!(library = slug, kind = %kind, "Import started");
        import::import_rows(self.repository.as_ref(), slug, kind, rows, self.config.max_reported_failures).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MockRepository;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_invalid_kind_is_rejected_before_storage() {
        let mut mock = MockRepository::new();
        mock.expect_library_exists().never();
        let service = ImportService::new(Arc::new(mock), ImportConfig::default());

        let err = service.prepare("lib", Some("x")).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(ref m) if m.contains("'x'")));
        assert!(matches!(service.prepare("lib", None).await, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_unknown_library_is_not_found() {
        let mut mock = MockRepository::new();
        mock.expect_library_exists().returning(|_| Ok(false));
        let service = ImportService::new(Arc::new(mock), ImportConfig::default());

        let err = service.prepare("nowhere", Some("item")).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
