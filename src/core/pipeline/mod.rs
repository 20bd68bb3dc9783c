//! The generic five-stage feature pipeline.

pub mod controller;
pub mod driver;
pub mod feature;
pub mod renderer;
pub mod renderers;
pub mod stage;
pub mod state;
pub mod strategy;

pub use controller::{
    ActionOutcome, PipelineBuilder, PipelineController, ProcessingJob, ProcessingOutcome,
    ProcessingStatus, SaveOutcome, SkipReason,
};
pub use driver::{PipelineDriver, RunReport, StepReport};
pub use feature::{Feature, FeatureDescriptor, MappingParams, Payload};
pub use renderer::{Rendered, StageAction, StageRenderer, StageRenderers};
pub use stage::Stage;
pub use state::PipelineState;
pub use strategy::{checked_ratio, ensure_finite, FnStrategy, ProcessingStrategy};
