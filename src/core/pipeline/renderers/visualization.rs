use crate::core::error::AppError;
use crate::core::pipeline::feature::Feature;
use crate::core::pipeline::renderer::{Rendered, StageAction, StageRenderer};
use crate::core::pipeline::stage::Stage;
use crate::core::pipeline::state::PipelineState;
use crate::core::types::OutputFormat;
use async_trait::async_trait;
use bizflow_types::SummaryLine;

/// Shows the result as summary lines or pretty JSON, then moves to storage.
#[derive(Debug, Default)]
pub struct SummaryVisualizationRenderer {
    format: OutputFormat,
}

impl SummaryVisualizationRenderer {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }
}

/// Text block of a feature summary: a title line followed by aligned
/// `label: value` rows.
pub fn format_summary(title: &str, lines: &[SummaryLine]) -> String {
    let width = lines.iter().map(|line| line.label.len()).max().unwrap_or(0);
    let mut out = String::from(title);
    for line in lines {
        out.push('\n');
        out.push_str(&format!("  {:<width$}  {}", format!("{}:", line.label), line.value, width = width + 1));
    }
    out
}

#[async_trait]
impl<F: Feature> StageRenderer<F> for SummaryVisualizationRenderer {
    fn stage(&self) -> Stage {
        Stage::Visualization
    }

    async fn render(
        &self,
        feature: &F,
        state: &PipelineState<F::Input, F::Mapped, F::Output>,
    ) -> Result<Rendered<F>, AppError> {
        let Some(result) = state.result() else {
            return Ok(Rendered::idle());
        };
        let view = match self.format {
            OutputFormat::Text => format_summary(feature.descriptor().title, &feature.summarize(result)),
            OutputFormat::Json => serde_json::to_string_pretty(result)?,
        };
        Ok(Rendered::action(StageAction::Navigate(Stage::Storage)).with_view(view))
    }
}
