#![allow(clippy::result_large_err)]

use crate::core::error::AppError;
use crate::core::pipeline::feature::{Feature, MappingParams};
use crate::core::pipeline::renderer::{Rendered, StageAction, StageRenderer};
use crate::core::pipeline::stage::Stage;
use crate::core::pipeline::state::PipelineState;
use async_trait::async_trait;

/// Applies [`Feature::map`] with a fixed set of parameters, once per input.
pub struct ParamsMappingRenderer {
    params: MappingParams,
}

impl ParamsMappingRenderer {
    pub fn new(params: MappingParams) -> Self {
        Self { params }
    }
}

#[async_trait]
impl<F: Feature> StageRenderer<F> for ParamsMappingRenderer {
    fn stage(&self) -> Stage {
        Stage::Mapping
    }

    async fn render(
        &self,
        feature: &F,
        state: &PipelineState<F::Input, F::Mapped, F::Output>,
    ) -> Result<Rendered<F>, AppError> {
        let input = match (state.input(), state.mapped()) {
            (Some(input), None) => input,
            _ => return Ok(Rendered::idle()),
        };
        let mapped = feature.map(input, &self.params)?;
        Ok(Rendered::action(StageAction::SubmitMapping(mapped))
            .with_view(format!("Mapped with {} parameter(s)", self.params.len())))
    }
}
