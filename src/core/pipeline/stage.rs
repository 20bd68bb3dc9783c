//! Stage ordering and the gating table.

pub use bizflow_types::Stage;

/// Data a stage needs before it can be entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prerequisite {
    /// Always reachable.
    None,
    /// Needs captured input.
    Input,
    /// Needs mapped parameters.
    Mapped,
    /// Needs a processing result.
    Result,
}

/// Gating table: which data must exist before `stage` may become active.
pub fn prerequisite(stage: Stage) -> Prerequisite {
    match stage {
        Stage::Input => Prerequisite::None,
        Stage::Mapping => Prerequisite::Input,
        Stage::Processing => Prerequisite::Mapped,
        Stage::Visualization | Stage::Storage => Prerequisite::Result,
    }
}

/// Presence flags for the three data slots of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DataPresence {
    pub input: bool,
    pub mapped: bool,
    pub result: bool,
}

impl DataPresence {
    pub fn satisfies(&self, prerequisite: Prerequisite) -> bool {
        match prerequisite {
            Prerequisite::None => true,
            Prerequisite::Input => self.input,
            Prerequisite::Mapped => self.mapped,
            Prerequisite::Result => self.result,
        }
    }

    /// Stages that can be entered with the data currently present, in order.
    pub fn enabled_stages(&self) -> Vec<Stage> {
        Stage::ALL
            .into_iter()
            .filter(|stage| self.satisfies(prerequisite(*stage)))
            .collect()
    }
}
