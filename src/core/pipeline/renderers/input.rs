#![allow(clippy::result_large_err)]

use crate::core::error::AppError;
use crate::core::pipeline::feature::Feature;
use crate::core::pipeline::renderer::{Rendered, StageAction, StageRenderer};
use crate::core::pipeline::stage::Stage;
use crate::core::pipeline::state::PipelineState;
use crate::services::parser::{file_extension, ParserRegistry};
use crate::services::storage::{object_path, ObjectStorage};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

/// Reads a local file, validates it against the feature's allow-list and the
/// size limit, parses it, uploads it and submits the converted input.
pub struct DocumentInputRenderer {
    path: PathBuf,
    storage: Arc<dyn ObjectStorage>,
    parsers: Arc<ParserRegistry>,
    bucket: String,
    max_size_mb: u64,
}

impl DocumentInputRenderer {
    pub fn new(
        path: impl Into<PathBuf>,
        storage: Arc<dyn ObjectStorage>,
        parsers: Arc<ParserRegistry>,
        bucket: impl Into<String>,
        max_size_mb: u64,
    ) -> Self {
        Self {
            path: path.into(),
            storage,
            parsers,
            bucket: bucket.into(),
            max_size_mb,
        }
    }
}

#[async_trait]
impl<F: Feature> StageRenderer<F> for DocumentInputRenderer {
    fn stage(&self) -> Stage {
        Stage::Input
    }

    async fn render(
        &self,
        feature: &F,
        state: &PipelineState<F::Input, F::Mapped, F::Output>,
    ) -> Result<Rendered<F>, AppError> {
        if state.input().is_some() {
            return Ok(Rendered::idle());
        }

        let descriptor = feature.descriptor();
        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| AppError::input(format!("'{}' is not a file", self.path.display())))?;

        let extension = file_extension(&file_name);
        if !descriptor.accepts_extension(&extension) {
            return Err(AppError::input(format!(
                "File type not supported. Please upload {} files.",
                descriptor.allowed_file_types.join(", ")
            ))
            .with_context(file_name));
        }

        let unreadable =
            |err: std::io::Error| AppError::input(format!("cannot read '{}': {}", self.path.display(), err));
        let size = tokio::fs::metadata(&self.path).await.map_err(unreadable)?.len();
        if size > self.max_size_mb.saturating_mul(1024 * 1024) {
            return Err(AppError::input(format!(
                "File size exceeds the maximum limit of {}MB.",
                self.max_size_mb
            ))
            .with_context(file_name));
        }
        let bytes = tokio::fs::read(&self.path).await.map_err(unreadable)?;

        let document = self.parsers.parse(&file_name, &bytes)?;
        let data = feature.input_from_document(document)?;

        let url = self
            .storage
            .upload(&self.bucket, &object_path(&file_name), &bytes)
            .await
            .map_err(|err| AppError::input(format!("upload failed: {}", err.message)))?;
        tracing::info!(feature = descriptor.key, %url, size = bytes.len(), "document uploaded");

        Ok(Rendered::action(StageAction::SubmitInput {
            data,
            source_url: url,
        })
        .with_view(format!("Uploaded {} ({} bytes)", file_name, bytes.len())))
    }
}

/// Submits input supplied directly, with no upload provenance.
pub struct ManualInputRenderer<I> {
    data: I,
}

impl<I> ManualInputRenderer<I> {
    pub fn new(data: I) -> Self {
        Self { data }
    }
}

#[async_trait]
impl<F: Feature> StageRenderer<F> for ManualInputRenderer<F::Input> {
    fn stage(&self) -> Stage {
        Stage::Input
    }

    async fn render(
        &self,
        _feature: &F,
        state: &PipelineState<F::Input, F::Mapped, F::Output>,
    ) -> Result<Rendered<F>, AppError> {
        if state.input().is_some() {
            return Ok(Rendered::idle());
        }
        Ok(Rendered::action(StageAction::SubmitInput {
            data: self.data.clone(),
            source_url: String::new(),
        }))
    }
}
