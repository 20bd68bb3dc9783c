pub mod config;
pub mod error;
pub mod pipeline;
pub mod types;

pub use config::{BizflowConfig, ConfigLoader, ConfigValidator};
pub use error::{AppError, ErrorReporter, RecordingReporter, TracingErrorReporter};
pub use pipeline::{
    Feature, FeatureDescriptor, MappingParams, PipelineController, PipelineDriver, PipelineState,
    ProcessingStrategy, Stage,
};
pub use types::*;
