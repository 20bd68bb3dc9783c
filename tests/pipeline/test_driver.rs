use bizflow::core::error::{Notification, RecordingReporter};
use bizflow::core::pipeline::renderers::{self, ManualInputRenderer};
use bizflow::core::pipeline::{
    ActionOutcome, MappingParams, PipelineController, PipelineDriver, ProcessingStatus,
    SaveOutcome, SkipReason, Stage, StageRenderers,
};
use bizflow::core::types::OutputFormat;
use bizflow::features::forecasting::DemandPoint;
use bizflow::features::DemandForecasting;
use bizflow::services::records::InMemoryRecordStore;
use bizflow::services::SessionContext;
use bizflow_types::SessionUser;
use std::sync::Arc;

fn history(values: &[f64]) -> Vec<DemandPoint> {
    values
        .iter()
        .enumerate()
        .map(|(i, demand)| DemandPoint {
            period: format!("2024-0{}", i + 1),
            demand: *demand,
        })
        .collect()
}

fn renderers(
    values: &[f64],
    params: MappingParams,
    format: OutputFormat,
    save: bool,
) -> StageRenderers<DemandForecasting> {
    renderers::standard(ManualInputRenderer::new(history(values)), params, format, save).unwrap()
}

fn controller(
    session: SessionContext,
    store: Arc<InMemoryRecordStore>,
    reporter: Arc<RecordingReporter>,
) -> PipelineController<DemandForecasting> {
    PipelineController::builder(DemandForecasting)
        .session(Arc::new(session))
        .record_store(store)
        .reporter(reporter)
        .build()
        .unwrap()
}

fn user() -> SessionContext {
    SessionContext::authenticated(SessionUser {
        id: "owner".into(),
        name: "Sam".into(),
        email: "sam@example.com".into(),
    })
}

#[tokio::test]
async fn test_run_walks_every_stage_and_saves() {
    let store = Arc::new(InMemoryRecordStore::new());
    let reporter = Arc::new(RecordingReporter::new());
    let mut driver = PipelineDriver::new(
        controller(user(), store.clone(), reporter.clone()),
        renderers(
            &[100.0, 110.0, 120.0],
            MappingParams::new().with("periods", 2),
            OutputFormat::Text,
            true,
        ),
    );

    let report = driver.run().await.unwrap();
    let stages: Vec<Stage> = report.steps.iter().map(|step| step.stage).collect();
    assert_eq!(stages, Stage::ALL.to_vec());
    let actions: Vec<&str> = report.steps.iter().map(|step| step.action).collect();
    assert_eq!(
        actions,
        vec!["submit_input", "submit_mapping", "run_processing", "navigate", "save"]
    );
    assert_eq!(
        report.steps[2].outcome,
        ActionOutcome::Processed(ProcessingStatus::Completed)
    );
    assert!(matches!(
        report.last_outcome(),
        Some(ActionOutcome::Saved(SaveOutcome::Saved(_)))
    ));

    let views: Vec<&str> = report.views().collect();
    assert_eq!(views[0], "Mapped with 1 parameter(s)");
    assert!(views[1].starts_with("Demand Forecasting\n"));
    assert!(views[1].contains("t+1:"));
    assert!(views[1].contains("130.00"));

    assert_eq!(store.count("forecasts").await, 1);
    assert_eq!(
        reporter.notifications(),
        vec![Notification::Info("Data saved successfully to 'forecasts'".into())]
    );

    let next = driver.step().await.unwrap();
    assert_eq!(next.outcome, ActionOutcome::Idle);
    assert_eq!(next.view.as_deref(), Some("Saved to 'forecasts'"));
}

#[tokio::test]
async fn test_json_view_and_disabled_save() {
    let store = Arc::new(InMemoryRecordStore::new());
    let mut driver = PipelineDriver::new(
        controller(user(), store.clone(), Arc::new(RecordingReporter::new())),
        renderers(&[5.0, 5.0], MappingParams::new(), OutputFormat::Json, false),
    );

    let report = driver.run().await.unwrap();
    assert_eq!(report.last_outcome(), Some(&ActionOutcome::Idle));
    let visualization = report
        .steps
        .iter()
        .find(|step| step.stage == Stage::Visualization)
        .and_then(|step| step.view.clone())
        .unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&visualization).unwrap();
    assert_eq!(parsed["forecast"].as_array().unwrap().len(), 5);
    assert_eq!(parsed["frequency"], "daily");
    assert_eq!(report.views().last(), Some("Saving disabled"));
    assert_eq!(store.count("forecasts").await, 0);
}

#[tokio::test]
async fn test_anonymous_save_stops_the_run() {
    let store = Arc::new(InMemoryRecordStore::new());
    let mut driver = PipelineDriver::new(
        controller(SessionContext::anonymous(), store.clone(), Arc::new(RecordingReporter::new())),
        renderers(&[1.0, 2.0], MappingParams::new(), OutputFormat::Text, true),
    );

    let report = driver.run().await.unwrap();
    assert_eq!(
        report.last_outcome(),
        Some(&ActionOutcome::Saved(SaveOutcome::Skipped(
            SkipReason::Unauthenticated
        )))
    );
    assert_eq!(store.count("forecasts").await, 0);
}

#[tokio::test]
async fn test_mapping_error_is_reported_and_state_is_kept() {
    let reporter = Arc::new(RecordingReporter::new());
    let mut driver = PipelineDriver::new(
        controller(user(), Arc::new(InMemoryRecordStore::new()), reporter.clone()),
        renderers(
            &[1.0, 2.0],
            MappingParams::new().with("periods", 0),
            OutputFormat::Text,
            true,
        ),
    );

    let err = driver.run().await.unwrap_err();
    assert_eq!(err.code, "BF-MAP");
    assert!(err.message.contains("periods must be between 1 and 60"));

    let state = driver.controller().state();
    assert_eq!(state.active_stage(), Stage::Mapping);
    assert!(state.input().is_some());
    assert!(state.mapped().is_none());
    assert!(matches!(
        reporter.notifications().as_slice(),
        [Notification::Error { code, .. }] if code == "BF-MAP"
    ));
}

#[tokio::test]
async fn test_failed_processing_ends_run_and_shows_banner() {
    let mut driver = PipelineDriver::new(
        controller(user(), Arc::new(InMemoryRecordStore::new()), Arc::new(RecordingReporter::new())),
        renderers(&[7.0], MappingParams::new(), OutputFormat::Text, true),
    );

    let report = driver.run().await.unwrap();
    assert_eq!(report.steps.len(), 3);
    assert!(matches!(
        report.last_outcome(),
        Some(ActionOutcome::Processed(ProcessingStatus::Failed(_)))
    ));

    let banner = driver.step().await.unwrap();
    assert_eq!(banner.outcome, ActionOutcome::Idle);
    assert!(banner.view.unwrap().starts_with("Error: [BF-PROC]"));

    let controller = driver.controller_mut();
    controller.dismiss_error();
    assert!(controller.state().error().is_none());
}

#[tokio::test]
async fn test_step_limit_stops_early() {
    let mut driver = PipelineDriver::new(
        controller(user(), Arc::new(InMemoryRecordStore::new()), Arc::new(RecordingReporter::new())),
        renderers(&[1.0, 2.0, 3.0], MappingParams::new(), OutputFormat::Text, true),
    )
    .with_max_steps(2);

    let report = driver.run().await.unwrap();
    assert_eq!(report.steps.len(), 2);
    let controller = driver.into_controller();
    assert_eq!(controller.state().active_stage(), Stage::Processing);
    assert!(controller.state().result().is_none());
}
