//! Collaborators injected into pipelines: identity, parsing, object storage,
//! record persistence and the remote analytics endpoint.

pub mod analytics;
pub mod parser;
pub mod records;
pub mod session;
pub mod storage;

pub use analytics::{AnalyticsClient, RemoteStrategy};
pub use parser::{DocumentParser, ParsedDocument, ParserRegistry};
pub use records::{
    FileRecordStore, InMemoryRecordStore, RecordFilter, RecordStore, RestRecordStore, SortOrder,
};
pub use session::SessionContext;
pub use storage::{InMemoryObjectStorage, LocalObjectStorage, ObjectStorage};

use crate::core::config::{BizflowConfig, StorageBackend};
use crate::core::error::AppError;
use std::path::Path;
use std::sync::Arc;

/// Record store selected by `[storage]`, with relative paths resolved
/// against `workspace`.
#[allow(clippy::result_large_err)]
pub fn record_store_from_config(
    config: &BizflowConfig,
    workspace: &Path,
) -> Result<Arc<dyn RecordStore>, AppError> {
    let store: Arc<dyn RecordStore> = match config.storage.backend {
        StorageBackend::Memory => Arc::new(InMemoryRecordStore::new()),
        StorageBackend::File => Arc::new(FileRecordStore::new(workspace.join(&config.storage.data_dir))),
        StorageBackend::Rest => Arc::new(RestRecordStore::from_config(&config.storage)?),
    };
    tracing::debug!(backend = store.backend(), "record store selected");
    Ok(store)
}

/// Local object storage rooted at `[upload].objects_dir`.
pub fn object_storage_from_config(config: &BizflowConfig, workspace: &Path) -> Arc<dyn ObjectStorage> {
    Arc::new(LocalObjectStorage::new(workspace.join(&config.upload.objects_dir)))
}
