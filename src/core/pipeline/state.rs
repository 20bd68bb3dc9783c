use crate::core::pipeline::stage::{prerequisite, DataPresence, Stage};
use bizflow_types::ErrorInfo;
use serde::Serialize;

/// The single owned entity of a pipeline controller.
///
/// Fields are only mutated by [`PipelineController`](super::PipelineController);
/// everything else reads them through the accessors.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineState<I, M, R> {
    pub(crate) input: Option<I>,
    pub(crate) mapped: Option<M>,
    pub(crate) result: Option<R>,
    pub(crate) error: Option<ErrorInfo>,
    pub(crate) source_url: String,
    pub(crate) active_stage: Stage,
    pub(crate) is_processing: bool,
    pub(crate) is_saving: bool,
    /// Bumped on every accepted mapping.
    pub(crate) mapping_revision: u64,
    /// Mapping revision the current result was computed from.
    pub(crate) result_revision: Option<u64>,
    /// Mapping revision of the last result persisted.
    pub(crate) saved_revision: Option<u64>,
}

impl<I, M, R> Default for PipelineState<I, M, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I, M, R> PipelineState<I, M, R> {
    pub fn new() -> Self {
        Self {
            input: None,
            mapped: None,
            result: None,
            error: None,
            source_url: String::new(),
            active_stage: Stage::Input,
            is_processing: false,
            is_saving: false,
            mapping_revision: 0,
            result_revision: None,
            saved_revision: None,
        }
    }

    pub fn input(&self) -> Option<&I> {
        self.input.as_ref()
    }

    pub fn mapped(&self) -> Option<&M> {
        self.mapped.as_ref()
    }

    pub fn result(&self) -> Option<&R> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&ErrorInfo> {
        self.error.as_ref()
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn active_stage(&self) -> Stage {
        self.active_stage
    }

    pub fn is_processing(&self) -> bool {
        self.is_processing
    }

    pub fn is_saving(&self) -> bool {
        self.is_saving
    }

    pub fn is_busy(&self) -> bool {
        self.is_processing || self.is_saving
    }

    pub fn mapping_revision(&self) -> u64 {
        self.mapping_revision
    }

    /// True when the result was computed from the mapping currently held.
    pub fn result_is_current(&self) -> bool {
        self.result.is_some() && self.result_revision == Some(self.mapping_revision)
    }

    /// True when the current result has already been persisted.
    pub fn result_is_saved(&self) -> bool {
        self.result.is_some() && self.saved_revision.is_some() && self.saved_revision == self.result_revision
    }

    pub fn presence(&self) -> DataPresence {
        DataPresence {
            input: self.input.is_some(),
            mapped: self.mapped.is_some(),
            result: self.result.is_some(),
        }
    }

    /// Gating check for manual navigation.
    pub fn can_enter(&self, stage: Stage) -> bool {
        self.presence().satisfies(prerequisite(stage))
    }

    /// Stages whose tab is enabled.
    pub fn enabled_stages(&self) -> Vec<Stage> {
        self.presence().enabled_stages()
    }

    /// Checks the data-dependency invariants; used by debug assertions and tests.
    pub fn invariants_hold(&self) -> bool {
        let mapped_needs_input = self.mapped.is_none() || self.input.is_some();
        let result_needs_mapped = self.result.is_none() || self.mapped.is_some();
        mapped_needs_input && result_needs_mapped && self.can_enter(self.active_stage)
    }
}
