use bizflow::core::config::AnalyticsConfig;
use bizflow::core::pipeline::{PipelineController, ProcessingStatus, Stage};
use bizflow::features::suppliers::{CriteriaWeights, ScoringPlan, SupplierMetrics};
use bizflow::features::SupplierPerformance;
use bizflow::services::AnalyticsClient;
use serde_json::json;
use serial_test::serial;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn metrics() -> Vec<SupplierMetrics> {
    vec![SupplierMetrics {
        supplier: "Acme".into(),
        on_time_rate: 95.0,
        quality_rate: 90.0,
        cost_score: 80.0,
        responsiveness: 85.0,
    }]
}

fn plan() -> ScoringPlan {
    ScoringPlan {
        suppliers: metrics(),
        weights: CriteriaWeights::default(),
    }
}

fn remote_controller(server: &MockServer, key: Option<&str>) -> PipelineController<SupplierPerformance> {
    let client = AnalyticsClient::new(
        &server.uri(),
        "v1",
        key.map(str::to_string),
        Duration::from_secs(5),
    )
    .unwrap();
    let mut controller = PipelineController::builder(SupplierPerformance)
        .analytics(Arc::new(client))
        .build()
        .unwrap();
    controller.on_input_processed(metrics(), "");
    assert!(controller.on_data_mapped(plan()));
    controller
}

#[tokio::test]
async fn test_remote_strategy_posts_mapped_data() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/suppliers/score"))
        .and(header("Authorization", "Bearer token-1"))
        .and(body_json(json!({ "input": plan() })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ranking": [{"rank": 1, "supplier": "Acme", "score": 91.0, "grade": "A"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut controller = remote_controller(&server, Some("token-1"));
    assert_eq!(controller.strategy_name(), "remote");
    assert_eq!(controller.run_processing().await, ProcessingStatus::Completed);

    let ranking = &controller.state().result().unwrap().ranking;
    assert_eq!(ranking[0].score, 91.0);
    assert_eq!(ranking[0].grade, 'A');
    assert_eq!(controller.state().active_stage(), Stage::Visualization);
}

#[tokio::test]
async fn test_remote_error_envelope_becomes_banner() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(422)
                .set_body_json(json!({"message": "weights must sum to 1", "code": "invalid_input"})),
        )
        .mount(&server)
        .await;

    let mut controller = remote_controller(&server, Some("token-1"));
    let info = match controller.run_processing().await {
        ProcessingStatus::Failed(info) => info,
        other => panic!("expected failure, got {:?}", other),
    };
    assert_eq!(info.code, "invalid_input");
    assert_eq!(info.message, "weights must sum to 1");
    assert_eq!(info.category, "ProcessingError");
    assert!(controller.state().result().is_none());
}

#[tokio::test]
async fn test_unexpected_response_shape_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"scores": []})))
        .mount(&server)
        .await;

    let mut controller = remote_controller(&server, Some("token-1"));
    match controller.run_processing().await {
        ProcessingStatus::Failed(info) => {
            assert_eq!(info.code, "decode_error");
            assert!(info.message.contains("suppliers/score"));
        }
        other => panic!("expected failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_api_key_never_reaches_server() {
    let server = MockServer::start().await;
    let mut controller = remote_controller(&server, None);

    match controller.run_processing().await {
        ProcessingStatus::Failed(info) => assert_eq!(info.code, "auth_error"),
        other => panic!("expected failure, got {:?}", other),
    }
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
#[serial]
async fn test_client_from_config_reads_key_from_env() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("Authorization", "Bearer from-env"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let config = AnalyticsConfig {
        base_url: server.uri(),
        api_version: "v1".into(),
        api_key_env: "BIZFLOW_TEST_ANALYTICS_KEY".into(),
        timeout: "5s".into(),
    };
    std::env::set_var("BIZFLOW_TEST_ANALYTICS_KEY", "from-env");
    let client = AnalyticsClient::from_config(&config).unwrap();
    std::env::remove_var("BIZFLOW_TEST_ANALYTICS_KEY");

    assert!(client.has_api_key());
    let envelope = client.call("text/generate", json!({"prompt": "hi"})).await;
    assert!(envelope.success);
    assert_eq!(envelope.data, Some(json!({"ok": true})));

    let bad_timeout = AnalyticsConfig {
        timeout: "soon".into(),
        ..config
    };
    assert!(AnalyticsClient::from_config(&bad_timeout).is_err());
}
