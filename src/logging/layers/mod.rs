use tracing_subscriber::layer::Layer;

pub mod console;
pub mod file;
pub mod opentelemetry;

/// Boxed layer type that can wrap any concrete subscriber layer.
pub type BoxLayer<S> = Box<dyn Layer<S> + Send + Sync>;
