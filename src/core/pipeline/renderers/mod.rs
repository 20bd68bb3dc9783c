//! Built-in stage renderers used by the CLI and embedders.

pub mod input;
pub mod mapping;
pub mod processing;
pub mod storage;
pub mod visualization;

pub use input::{DocumentInputRenderer, ManualInputRenderer};
pub use mapping::ParamsMappingRenderer;
pub use processing::AutoProcessingRenderer;
pub use storage::SaveStorageRenderer;
pub use visualization::{format_summary, SummaryVisualizationRenderer};

use crate::core::error::AppError;
use crate::core::pipeline::feature::{Feature, MappingParams};
use crate::core::pipeline::renderer::{StageRenderer, StageRenderers};
use crate::core::types::OutputFormat;

/// Standard renderer set around a caller-chosen input renderer.
#[allow(clippy::result_large_err)]
pub fn standard<F, R>(
    input: R,
    params: MappingParams,
    format: OutputFormat,
    save: bool,
) -> Result<StageRenderers<F>, AppError>
where
    F: Feature,
    R: StageRenderer<F> + 'static,
{
    StageRenderers::builder()
        .register(input)
        .register(ParamsMappingRenderer::new(params))
        .register(AutoProcessingRenderer)
        .register(SummaryVisualizationRenderer::new(format))
        .register(SaveStorageRenderer::new(save))
        .build()
}
