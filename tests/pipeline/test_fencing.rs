use async_trait::async_trait;
use bizflow::core::error::AppError;
use bizflow::core::pipeline::{
    FnStrategy, PipelineController, ProcessingStatus, ProcessingStrategy, SkipReason, Stage,
};
use bizflow::features::forecasting::{forecast, DemandPoint, Forecast, ForecastRequest, Frequency};
use bizflow::features::DemandForecasting;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Finishes only once the test releases a permit.
struct GatedStrategy {
    gate: Arc<Semaphore>,
}

#[async_trait]
impl ProcessingStrategy<ForecastRequest, Forecast> for GatedStrategy {
    fn name(&self) -> &str {
        "gated"
    }

    async fn process(&self, mapped: &ForecastRequest) -> Result<Forecast, AppError> {
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| AppError::processing("gate closed"))?;
        forecast(mapped)
    }
}

struct NeverFinishes;

#[async_trait]
impl ProcessingStrategy<ForecastRequest, Forecast> for NeverFinishes {
    async fn process(&self, _mapped: &ForecastRequest) -> Result<Forecast, AppError> {
        std::future::pending::<()>().await;
        Err(AppError::processing("unreachable"))
    }
}

fn request(values: &[f64]) -> ForecastRequest {
    ForecastRequest {
        history: values.to_vec(),
        periods: 1,
        frequency: Frequency::Daily,
    }
}

fn points(values: &[f64]) -> Vec<DemandPoint> {
    values
        .iter()
        .map(|demand| DemandPoint {
            period: String::new(),
            demand: *demand,
        })
        .collect()
}

fn ready_controller(
    strategy: Arc<dyn ProcessingStrategy<ForecastRequest, Forecast>>,
    timeout: Option<Duration>,
) -> PipelineController<DemandForecasting> {
    let mut controller = PipelineController::builder(DemandForecasting)
        .strategy(strategy)
        .processing_timeout(timeout)
        .build()
        .unwrap();
    controller.on_input_processed(points(&[2.0, 4.0, 6.0]), "");
    assert!(controller.on_data_mapped(request(&[2.0, 4.0, 6.0])));
    controller
}

fn gated() -> (Arc<Semaphore>, Arc<GatedStrategy>) {
    let gate = Arc::new(Semaphore::new(0));
    let strategy = Arc::new(GatedStrategy { gate: gate.clone() });
    (gate, strategy)
}

#[tokio::test]
async fn test_restart_fences_out_the_previous_run() {
    let (gate, strategy) = gated();
    let mut controller = ready_controller(strategy, None);

    let first = controller.begin_processing().unwrap();
    let second = controller.restart_processing().unwrap();
    assert_eq!(first.seq(), 1);
    assert_eq!(second.seq(), 2);
    assert_eq!(controller.last_sequence(), 2);

    let first_outcome = first.run().await;
    assert!(first_outcome.result.as_ref().unwrap_err().is_cancelled());
    assert_eq!(controller.complete_processing(first_outcome), ProcessingStatus::Stale);
    assert!(controller.state().is_processing());
    assert!(controller.state().result().is_none());

    gate.add_permits(1);
    let second_outcome = tokio::spawn(second.run()).await.unwrap();
    assert_eq!(
        controller.complete_processing(second_outcome),
        ProcessingStatus::Completed
    );
    assert_eq!(controller.state().result().unwrap().forecast, vec![8.0]);
    assert!(!controller.has_in_flight());
}

#[tokio::test]
async fn test_new_input_discards_in_flight_outcome() {
    let (gate, strategy) = gated();
    let mut controller = ready_controller(strategy, None);

    let job = controller.begin_processing().unwrap();
    controller.on_input_processed(points(&[1.0, 1.0]), "file://next.csv");
    assert!(!controller.has_in_flight());
    assert!(!controller.state().is_processing());

    gate.add_permits(1);
    let outcome = job.run().await;
    assert_eq!(controller.complete_processing(outcome), ProcessingStatus::Stale);
    assert!(controller.state().result().is_none());
    assert!(controller.state().error().is_none());
    assert_eq!(controller.state().active_stage(), Stage::Mapping);
}

#[tokio::test]
async fn test_second_start_is_rejected_while_running() {
    let (gate, strategy) = gated();
    let mut controller = ready_controller(strategy, None);

    let job = controller.begin_processing().unwrap();
    assert!(controller.begin_processing().is_none());
    assert_eq!(
        controller.run_processing().await,
        ProcessingStatus::Skipped(SkipReason::AlreadyProcessing)
    );
    assert_eq!(controller.last_sequence(), 1);

    gate.add_permits(1);
    let outcome = job.run().await;
    assert_eq!(controller.complete_processing(outcome), ProcessingStatus::Completed);
}

#[tokio::test]
async fn test_remap_during_run_leaves_result_stale() {
    let (gate, strategy) = gated();
    let mut controller = ready_controller(strategy, None);

    let job = controller.begin_processing().unwrap();
    assert!(controller.on_data_mapped(request(&[2.0, 4.0, 6.0, 8.0])));
    assert!(controller.has_in_flight());

    gate.add_permits(1);
    let outcome = job.run().await;
    assert_eq!(controller.complete_processing(outcome), ProcessingStatus::Completed);
    let state = controller.state();
    assert!(state.result().is_some());
    assert!(!state.result_is_current());
    assert_eq!(state.mapping_revision(), 2);
}

#[tokio::test]
async fn test_timeout_fails_the_run() {
    let mut controller = ready_controller(Arc::new(NeverFinishes), Some(Duration::from_millis(50)));

    let info = match controller.run_processing().await {
        ProcessingStatus::Failed(info) => info,
        other => panic!("expected timeout, got {:?}", other),
    };
    assert_eq!(info.code, "BF-TIME");
    assert_eq!(info.category, "TimeoutError");
    assert!(info.message.contains("50ms"));
    assert_eq!(controller.state().error(), Some(&info));
    assert!(!controller.state().is_processing());
}

#[tokio::test]
async fn test_panicking_strategy_becomes_processing_error() {
    let strategy = FnStrategy::new("explodes", |_: &ForecastRequest| -> Result<Forecast, AppError> {
        panic!("division by zero in strategy")
    });
    let mut controller = ready_controller(Arc::new(strategy), None);

    let info = match controller.run_processing().await {
        ProcessingStatus::Failed(info) => info,
        other => panic!("expected failure, got {:?}", other),
    };
    assert_eq!(info.code, "BF-PROC");
    assert_eq!(info.message, "processing strategy panicked");
    assert!(!controller.has_in_flight());
}

#[tokio::test]
async fn test_dropping_a_run_cancels_it() {
    let mut controller = ready_controller(Arc::new(NeverFinishes), None);

    let abandoned = tokio::time::timeout(Duration::from_millis(20), controller.run_processing()).await;
    assert!(abandoned.is_err());
    assert!(!controller.has_in_flight());
    assert!(!controller.state().is_processing());
    assert!(controller.state().error().is_none());

    assert!(!controller.cancel_processing());
}
