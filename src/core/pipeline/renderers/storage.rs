use crate::core::error::AppError;
use crate::core::pipeline::feature::Feature;
use crate::core::pipeline::renderer::{Rendered, StageAction, StageRenderer};
use crate::core::pipeline::stage::Stage;
use crate::core::pipeline::state::PipelineState;
use async_trait::async_trait;

/// Requests a save of the current result when saving is enabled.
#[derive(Debug)]
pub struct SaveStorageRenderer {
    enabled: bool,
}

impl SaveStorageRenderer {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

#[async_trait]
impl<F: Feature> StageRenderer<F> for SaveStorageRenderer {
    fn stage(&self) -> Stage {
        Stage::Storage
    }

    async fn render(
        &self,
        feature: &F,
        state: &PipelineState<F::Input, F::Mapped, F::Output>,
    ) -> Result<Rendered<F>, AppError> {
        if !self.enabled {
            return Ok(Rendered::idle().with_view("Saving disabled"));
        }
        if state.is_saving() {
            return Ok(Rendered::idle().with_view("Saving..."));
        }
        if state.result_is_saved() {
            return Ok(Rendered::idle().with_view(format!(
                "Saved to '{}'",
                feature.descriptor().table_name
            )));
        }
        Ok(Rendered::action(StageAction::Save))
    }
}
