use crate::core::error::AppError;
use crate::core::pipeline::feature::Feature;
use crate::core::pipeline::renderer::{Rendered, StageAction, StageRenderer};
use crate::core::pipeline::stage::Stage;
use crate::core::pipeline::state::PipelineState;
use async_trait::async_trait;

/// Starts processing as soon as the stage is shown.
///
/// Stays idle while a run is underway or an error banner is showing, and
/// moves on when the result already matches the current mapping.
#[derive(Debug, Default)]
pub struct AutoProcessingRenderer;

#[async_trait]
impl<F: Feature> StageRenderer<F> for AutoProcessingRenderer {
    fn stage(&self) -> Stage {
        Stage::Processing
    }

    async fn render(
        &self,
        _feature: &F,
        state: &PipelineState<F::Input, F::Mapped, F::Output>,
    ) -> Result<Rendered<F>, AppError> {
        if state.is_processing() {
            return Ok(Rendered::idle().with_view("Processing..."));
        }
        if let Some(error) = state.error() {
            return Ok(Rendered::idle().with_view(format!("Error: {}", error)));
        }
        if state.result_is_current() {
            return Ok(Rendered::action(StageAction::Navigate(Stage::Visualization)));
        }
        Ok(Rendered::action(StageAction::RunProcessing))
    }
}
