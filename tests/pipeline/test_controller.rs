use async_trait::async_trait;
use bizflow::core::error::{AppError, Notification, RecordingReporter};
use bizflow::core::pipeline::{
    ActionOutcome, FnStrategy, PipelineController, ProcessingStatus, SaveOutcome, SkipReason,
    Stage, StageAction,
};
use bizflow::core::types::ErrorCategory;
use bizflow::features::forecasting::{DemandPoint, Forecast, ForecastRequest, Frequency};
use bizflow::features::DemandForecasting;
use bizflow::services::records::{record_id, InMemoryRecordStore, RecordFilter, RecordStore};
use bizflow::services::{AnalyticsClient, SessionContext};
use bizflow_types::SessionUser;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

fn history(values: &[f64]) -> Vec<DemandPoint> {
    values
        .iter()
        .enumerate()
        .map(|(i, demand)| DemandPoint {
            period: format!("w{}", i + 1),
            demand: *demand,
        })
        .collect()
}

fn request(values: &[f64], periods: u64) -> ForecastRequest {
    ForecastRequest {
        history: values.to_vec(),
        periods,
        frequency: Frequency::Weekly,
    }
}

fn signed_in() -> Arc<SessionContext> {
    Arc::new(SessionContext::authenticated(SessionUser {
        id: "user-1".into(),
        name: "Robin".into(),
        email: "robin@example.com".into(),
    }))
}

struct Harness {
    controller: PipelineController<DemandForecasting>,
    store: Arc<InMemoryRecordStore>,
    reporter: Arc<RecordingReporter>,
}

fn harness(session: Arc<SessionContext>) -> Harness {
    let store = Arc::new(InMemoryRecordStore::new());
    let reporter = Arc::new(RecordingReporter::new());
    let controller = PipelineController::builder(DemandForecasting)
        .session(session)
        .record_store(store.clone())
        .reporter(reporter.clone())
        .build()
        .unwrap();
    Harness {
        controller,
        store,
        reporter,
    }
}

struct FailingStore;

#[async_trait]
impl RecordStore for FailingStore {
    fn backend(&self) -> &'static str {
        "failing"
    }

    async fn insert(&self, _table: &str, _record: Value) -> Result<Value, AppError> {
        Err(AppError::storage("database unavailable").with_code("status_503"))
    }

    async fn get(&self, _table: &str, _filter: &RecordFilter) -> Result<Vec<Value>, AppError> {
        Ok(Vec::new())
    }

    async fn update(&self, _table: &str, _id: &str, _patch: Value) -> Result<Value, AppError> {
        Err(AppError::storage("database unavailable"))
    }

    async fn delete(&self, _table: &str, _id: &str) -> Result<(), AppError> {
        Err(AppError::storage("database unavailable"))
    }
}

#[tokio::test]
async fn test_fresh_controller_starts_at_input() {
    let Harness { controller, .. } = harness(signed_in());
    let state = controller.state();
    assert_eq!(state.active_stage(), Stage::Input);
    assert_eq!(state.enabled_stages(), vec![Stage::Input]);
    assert!(state.input().is_none());
    assert!(!state.is_busy());
    assert_eq!(controller.last_sequence(), 0);
    assert_eq!(controller.strategy_name(), "linear-trend");
    assert_eq!(controller.descriptor().table_name, "forecasts");
}

#[tokio::test]
async fn test_happy_path_through_all_stages() {
    let Harness {
        mut controller,
        store,
        reporter,
    } = harness(signed_in());

    let outcome = controller
        .dispatch(StageAction::SubmitInput {
            data: history(&[10.0, 12.0, 14.0, 16.0]),
            source_url: "memory://uploads/1_sales.csv".into(),
        })
        .await
        .unwrap();
    assert_eq!(outcome, ActionOutcome::Advanced(Stage::Mapping));

    let outcome = controller
        .dispatch(StageAction::SubmitMapping(request(&[10.0, 12.0, 14.0, 16.0], 2)))
        .await
        .unwrap();
    assert_eq!(outcome, ActionOutcome::Advanced(Stage::Processing));

    let outcome = controller.dispatch(StageAction::RunProcessing).await.unwrap();
    assert_eq!(outcome, ActionOutcome::Processed(ProcessingStatus::Completed));
    let state = controller.state();
    assert_eq!(state.active_stage(), Stage::Visualization);
    assert_eq!(state.result().map(|r| r.forecast.clone()), Some(vec![18.0, 20.0]));
    assert!(state.result_is_current());
    assert!(!state.is_processing());
    assert_eq!(controller.last_sequence(), 1);
    assert_eq!(state.enabled_stages(), Stage::ALL.to_vec());

    let outcome = controller.dispatch(StageAction::Save).await.unwrap();
    let record = match outcome {
        ActionOutcome::Saved(SaveOutcome::Saved(record)) => record,
        other => panic!("unexpected outcome {:?}", other),
    };
    assert!(record["title"]
        .as_str()
        .unwrap()
        .starts_with("Demand Forecasting - "));
    assert_eq!(record["user_id"], "user-1");
    assert_eq!(record["file_url"], "memory://uploads/1_sales.csv");
    assert_eq!(record["data"]["forecast"], serde_json::json!([18.0, 20.0]));
    assert_eq!(record["input_data"][0]["period"], "w1");
    assert_eq!(record["mapped_data"]["periods"], 2);
    assert!(record["id"].is_string());

    assert_eq!(store.count("forecasts").await, 1);
    assert!(controller.state().result_is_saved());
    assert!(!controller.state().is_saving());
    assert_eq!(
        reporter.notifications(),
        vec![Notification::Info(
            "Data saved successfully to 'forecasts'".into()
        )]
    );
}

#[tokio::test]
async fn test_mapping_without_input_is_rejected() {
    let Harness { mut controller, .. } = harness(signed_in());
    let outcome = controller
        .dispatch(StageAction::SubmitMapping(request(&[1.0, 2.0], 1)))
        .await
        .unwrap();
    assert_eq!(outcome, ActionOutcome::Rejected(SkipReason::NoInput));
    assert!(controller.state().mapped().is_none());
    assert_eq!(controller.state().active_stage(), Stage::Input);
    assert_eq!(controller.state().mapping_revision(), 0);
}

#[tokio::test]
async fn test_navigation_is_gated_on_data() {
    let Harness { mut controller, .. } = harness(signed_in());

    let outcome = controller
        .dispatch(StageAction::Navigate(Stage::Visualization))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        ActionOutcome::Rejected(SkipReason::StageLocked(Stage::Visualization))
    );

    controller.on_input_processed(history(&[1.0, 2.0]), "");
    assert!(!controller.set_active_stage(Stage::Processing));
    assert!(controller.set_active_stage(Stage::Input));
    assert!(controller.state().input().is_some());
    assert!(controller.set_active_stage(Stage::Mapping));
}

#[tokio::test]
async fn test_new_input_clears_downstream_state() {
    let Harness { mut controller, .. } = harness(signed_in());
    controller.on_input_processed(history(&[1.0, 2.0, 3.0]), "file://a.csv");
    assert!(controller.on_data_mapped(request(&[1.0, 2.0, 3.0], 1)));
    assert_eq!(controller.run_processing().await, ProcessingStatus::Completed);

    controller.on_input_processed(history(&[5.0, 5.0]), "file://b.csv");
    let state = controller.state();
    assert_eq!(state.active_stage(), Stage::Mapping);
    assert_eq!(state.source_url(), "file://b.csv");
    assert!(state.mapped().is_none());
    assert!(state.result().is_none());
    assert!(state.error().is_none());
    assert_eq!(state.enabled_stages(), vec![Stage::Input, Stage::Mapping]);
}

#[tokio::test]
async fn test_failure_sets_banner_and_keeps_previous_result() {
    let Harness { mut controller, .. } = harness(signed_in());
    controller.on_input_processed(history(&[3.0, 6.0]), "");
    controller.on_data_mapped(request(&[3.0, 6.0], 1));
    assert_eq!(controller.run_processing().await, ProcessingStatus::Completed);

    let before = controller.state().result().cloned();
    assert!(before.is_some());

    controller.on_data_mapped(request(&[3.0], 1));
    let status = controller.run_processing().await;
    let info = match status {
        ProcessingStatus::Failed(info) => info,
        other => panic!("expected failure, got {:?}", other),
    };
    assert_eq!(info.category, "ProcessingError");
    assert!(info.message.contains("at least 2"));

    let state = controller.state();
    assert_eq!(state.error(), Some(&info));
    assert_eq!(state.active_stage(), Stage::Processing);
    assert_eq!(state.result().cloned(), before);
    assert!(!state.result_is_current());
    assert!(!state.is_processing());

    let outcome = controller.dispatch(StageAction::DismissError).await.unwrap();
    assert_eq!(outcome, ActionOutcome::ErrorDismissed);
    assert!(controller.state().error().is_none());
}

#[tokio::test]
async fn test_rerun_with_corrected_mapping_clears_error() {
    let Harness { mut controller, .. } = harness(signed_in());
    controller.on_input_processed(history(&[4.0, 6.0, 8.0]), "");
    controller.on_data_mapped(request(&[4.0], 1));
    assert!(matches!(
        controller.run_processing().await,
        ProcessingStatus::Failed(_)
    ));
    assert!(controller.state().error().is_some());
    assert!(controller.state().result().is_none());

    assert!(controller.on_data_mapped(request(&[4.0, 6.0, 8.0], 1)));
    assert_eq!(controller.run_processing().await, ProcessingStatus::Completed);

    let state = controller.state();
    assert!(state.error().is_none());
    assert_eq!(state.result().map(|r| r.forecast.clone()), Some(vec![10.0]));
    assert_eq!(state.active_stage(), Stage::Visualization);
    assert_eq!(controller.last_sequence(), 2);
}

#[tokio::test]
async fn test_saved_record_reads_back_with_identical_result() {
    let Harness {
        mut controller,
        store,
        ..
    } = harness(signed_in());
    controller.on_input_processed(history(&[2.0, 5.0, 7.0, 11.0]), "file://demand.csv");
    controller.on_data_mapped(request(&[2.0, 5.0, 7.0, 11.0], 3));
    assert_eq!(controller.run_processing().await, ProcessingStatus::Completed);

    let record = match controller.save_result().await.unwrap() {
        SaveOutcome::Saved(record) => record,
        other => panic!("unexpected outcome {:?}", other),
    };
    let id = record_id(&record).unwrap();

    let rows = store
        .get("forecasts", &RecordFilter::new().eq("id", id))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    let expected = serde_json::to_value(controller.state().result().unwrap()).unwrap();
    assert_eq!(rows[0]["data"], expected);

    let decoded: Forecast = serde_json::from_value(rows[0]["data"].clone()).unwrap();
    assert_eq!(Some(&decoded), controller.state().result());
}

#[tokio::test]
async fn test_processing_without_mapping_is_skipped() {
    let Harness { mut controller, .. } = harness(signed_in());
    assert_eq!(
        controller.run_processing().await,
        ProcessingStatus::Skipped(SkipReason::NoMappedData)
    );
    assert_eq!(controller.last_sequence(), 0);
}

#[tokio::test]
async fn test_save_is_skipped_without_result_or_user() {
    let Harness {
        mut controller,
        store,
        ..
    } = harness(Arc::new(SessionContext::anonymous()));
    assert_eq!(
        controller.save_result().await.unwrap(),
        SaveOutcome::Skipped(SkipReason::NoResult)
    );

    controller.on_input_processed(history(&[1.0, 2.0]), "");
    controller.on_data_mapped(request(&[1.0, 2.0], 1));
    controller.run_processing().await;
    assert_eq!(
        controller.save_result().await.unwrap(),
        SaveOutcome::Skipped(SkipReason::Unauthenticated)
    );
    assert_eq!(store.count("forecasts").await, 0);
    assert!(!controller.state().result_is_saved());
}

#[tokio::test]
async fn test_save_failure_is_reported_and_returned() {
    let reporter = Arc::new(RecordingReporter::new());
    let mut controller = PipelineController::builder(DemandForecasting)
        .session(signed_in())
        .record_store(Arc::new(FailingStore))
        .reporter(reporter.clone())
        .build()
        .unwrap();
    controller.on_input_processed(history(&[1.0, 2.0]), "");
    controller.on_data_mapped(request(&[1.0, 2.0], 1));
    controller.run_processing().await;

    let err = controller.dispatch(StageAction::Save).await.unwrap_err();
    assert_eq!(err.category, ErrorCategory::StorageError);
    assert_eq!(err.context.get("table").map(String::as_str), Some("forecasts"));
    assert!(!controller.state().is_saving());
    assert!(!controller.state().result_is_saved());
    assert_eq!(
        reporter.notifications(),
        vec![Notification::Error {
            code: "status_503".into(),
            message: "database unavailable".into()
        }]
    );
}

#[tokio::test]
async fn test_explicit_strategy_wins_over_analytics_and_builtin() {
    let fixed = FnStrategy::new("fixed", |_: &ForecastRequest| {
        Ok(Forecast {
            frequency: Frequency::Daily,
            forecast: vec![42.0],
            slope: 0.0,
            intercept: 42.0,
            mean_absolute_error: 0.0,
        })
    });
    let client = AnalyticsClient::new("http://127.0.0.1:9", "v1", None, Duration::from_secs(1)).unwrap();

    let mut controller = PipelineController::builder(DemandForecasting)
        .analytics(Arc::new(client.clone()))
        .strategy(Arc::new(fixed))
        .build()
        .unwrap();
    assert_eq!(controller.strategy_name(), "fixed");
    controller.on_input_processed(history(&[1.0]), "");
    controller.on_data_mapped(request(&[1.0], 1));
    assert_eq!(controller.run_processing().await, ProcessingStatus::Completed);
    assert_eq!(controller.state().result().unwrap().forecast, vec![42.0]);

    let remote = PipelineController::builder(DemandForecasting)
        .analytics(Arc::new(client))
        .build()
        .unwrap();
    assert_eq!(remote.strategy_name(), "remote");
}
