#![allow(clippy::result_large_err)]

use crate::core::error::AppError;
use crate::core::pipeline::feature::Feature;
use crate::core::pipeline::stage::Stage;
use crate::core::pipeline::state::PipelineState;
use async_trait::async_trait;
use std::collections::HashMap;

/// What a stage asks the controller to do after rendering.
pub enum StageAction<F: Feature> {
    Idle,
    SubmitInput { data: F::Input, source_url: String },
    SubmitMapping(F::Mapped),
    RunProcessing,
    Navigate(Stage),
    Save,
    DismissError,
}

impl<F: Feature> StageAction<F> {
    pub fn kind(&self) -> &'static str {
        match self {
            StageAction::Idle => "idle",
            StageAction::SubmitInput { .. } => "submit_input",
            StageAction::SubmitMapping(_) => "submit_mapping",
            StageAction::RunProcessing => "run_processing",
            StageAction::Navigate(_) => "navigate",
            StageAction::Save => "save",
            StageAction::DismissError => "dismiss_error",
        }
    }
}

impl<F: Feature> std::fmt::Debug for StageAction<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageAction::Navigate(stage) => write!(f, "Navigate({})", stage),
            other => f.write_str(other.kind()),
        }
    }
}

/// Output of one render: an optional textual view and the next action.
pub struct Rendered<F: Feature> {
    pub view: Option<String>,
    pub action: StageAction<F>,
}

impl<F: Feature> Rendered<F> {
    pub fn action(action: StageAction<F>) -> Self {
        Self { view: None, action }
    }

    pub fn idle() -> Self {
        Self::action(StageAction::Idle)
    }

    pub fn with_view(mut self, view: impl Into<String>) -> Self {
        self.view = Some(view.into());
        self
    }
}

/// One stage's presentation logic. Renderers only read state; every change
/// goes back through the returned action.
#[async_trait]
pub trait StageRenderer<F: Feature>: Send + Sync {
    fn stage(&self) -> Stage;

    async fn render(
        &self,
        feature: &F,
        state: &PipelineState<F::Input, F::Mapped, F::Output>,
    ) -> Result<Rendered<F>, AppError>;
}

/// The five renderers of a pipeline, one per stage.
pub struct StageRenderers<F: Feature> {
    renderers: HashMap<Stage, Box<dyn StageRenderer<F>>>,
}

impl<F: Feature> StageRenderers<F> {
    pub fn builder() -> StageRenderersBuilder<F> {
        StageRenderersBuilder {
            renderers: HashMap::new(),
        }
    }

    pub fn get(&self, stage: Stage) -> Option<&dyn StageRenderer<F>> {
        self.renderers.get(&stage).map(|renderer| renderer.as_ref())
    }
}

pub struct StageRenderersBuilder<F: Feature> {
    renderers: HashMap<Stage, Box<dyn StageRenderer<F>>>,
}

impl<F: Feature> StageRenderersBuilder<F> {
    pub fn register<R>(mut self, renderer: R) -> Self
    where
        R: StageRenderer<F> + 'static,
    {
        let stage = renderer.stage();
        if self.renderers.insert(stage, Box::new(renderer)).is_some() {
            panic!("renderer for stage '{}' registered twice", stage);
        }
        self
    }

    pub fn build(self) -> Result<StageRenderers<F>, AppError> {
        let missing: Vec<&str> = Stage::ALL
            .iter()
            .filter(|stage| !self.renderers.contains_key(stage))
            .map(Stage::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(AppError::new(
                crate::core::types::ErrorCategory::ValidationError,
                format!("no renderer registered for stage(s): {}", missing.join(", ")),
            ));
        }
        Ok(StageRenderers {
            renderers: self.renderers,
        })
    }
}
