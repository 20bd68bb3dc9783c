#![allow(clippy::result_large_err)]

use crate::core::error::AppError;
use crate::core::pipeline::controller::{ActionOutcome, PipelineController, ProcessingStatus};
use crate::core::pipeline::feature::Feature;
use crate::core::pipeline::renderer::StageRenderers;
use crate::core::pipeline::stage::Stage;
use crate::core::types::ErrorCategory;

const DEFAULT_MAX_STEPS: usize = 16;

/// One render + dispatch cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    pub stage: Stage,
    pub action: &'static str,
    pub view: Option<String>,
    pub outcome: ActionOutcome,
}

impl StepReport {
    fn ends_run(&self) -> bool {
        match &self.outcome {
            ActionOutcome::Idle | ActionOutcome::Rejected(_) | ActionOutcome::Saved(_) => true,
            ActionOutcome::Processed(status) => !matches!(status, ProcessingStatus::Completed),
            ActionOutcome::Advanced(_) | ActionOutcome::ErrorDismissed => false,
        }
    }
}

/// Steps taken by [`PipelineDriver::run`].
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub steps: Vec<StepReport>,
}

impl RunReport {
    pub fn views(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().filter_map(|step| step.view.as_deref())
    }

    pub fn last_outcome(&self) -> Option<&ActionOutcome> {
        self.steps.last().map(|step| &step.outcome)
    }
}

/// Renders the active stage and feeds its action to the controller.
pub struct PipelineDriver<F: Feature> {
    controller: PipelineController<F>,
    renderers: StageRenderers<F>,
    max_steps: usize,
}

impl<F: Feature> PipelineDriver<F> {
    pub fn new(controller: PipelineController<F>, renderers: StageRenderers<F>) -> Self {
        Self {
            controller,
            renderers,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    pub fn controller(&self) -> &PipelineController<F> {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut PipelineController<F> {
        &mut self.controller
    }

    pub fn into_controller(self) -> PipelineController<F> {
        self.controller
    }

    /// Render the active stage once and dispatch the resulting action.
    /// Renderer errors are reported and returned without touching state.
    pub async fn step(&mut self) -> Result<StepReport, AppError> {
        let stage = self.controller.state().active_stage();
        let renderer = self.renderers.get(stage).ok_or_else(|| {
            AppError::new(
                ErrorCategory::InternalError,
                format!("no renderer for stage '{}'", stage),
            )
        })?;

        let rendered = match renderer
            .render(self.controller.feature(), self.controller.state())
            .await
        {
            Ok(rendered) => rendered,
            Err(err) => {
                self.controller.reporter().report_error(&err);
                return Err(err);
            }
        };

        let action = rendered.action.kind();
        tracing::debug!(feature = self.controller.descriptor().key, %stage, action, "stage rendered");
        let outcome = self.controller.dispatch(rendered.action).await?;

        Ok(StepReport {
            stage,
            action,
            view: rendered.view,
            outcome,
        })
    }

    /// Step until a stage goes idle, a save completes, processing does not
    /// succeed, or the step limit is reached.
    pub async fn run(&mut self) -> Result<RunReport, AppError> {
        let mut report = RunReport::default();
        while report.steps.len() < self.max_steps {
            let step = self.step().await?;
            let done = step.ends_run();
            report.steps.push(step);
            if done {
                return Ok(report);
            }
        }
        tracing::warn!(
            feature = self.controller.descriptor().key,
            steps = self.max_steps,
            "pipeline run stopped at the step limit"
        );
        Ok(report)
    }
}
