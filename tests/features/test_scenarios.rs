use bizflow::core::pipeline::{Feature, MappingParams, PipelineController, ProcessingStatus};
use bizflow::core::types::ErrorCategory;
use bizflow::features::inventory::StockStatus;
use bizflow::features::segmentation::Segment;
use bizflow::features::{
    BusinessReporting, CustomerSegmentation, DemandForecasting, InventoryManagement,
    PricingStrategies, SupplierPerformance,
};
use bizflow::services::ParserRegistry;

/// Parse `body` as an upload named `file_name`, map it and run the feature's
/// built-in strategy through a controller.
async fn run_upload<F: Feature>(
    feature: F,
    file_name: &str,
    body: &str,
    params: MappingParams,
) -> F::Output {
    let document = ParserRegistry::with_defaults()
        .parse(file_name, body.as_bytes())
        .unwrap();
    let input = feature.input_from_document(document).unwrap();
    let mapped = feature.map(&input, &params).unwrap();

    let mut controller = PipelineController::builder(feature).build().unwrap();
    controller.on_input_processed(input, format!("memory://{}", file_name));
    assert!(controller.on_data_mapped(mapped));
    let status = controller.run_processing().await;
    assert_eq!(status, ProcessingStatus::Completed);
    assert!(controller.state().result_is_current());
    controller.state().result().cloned().unwrap()
}

const SALES_CSV: &str = "\
Date,Sales,Expenses
2025-03-01,15000,8000
2025-01-01,10000,6000
2025-02-01,12000,7000
";

#[tokio::test]
async fn test_business_report_from_csv() {
    let report = run_upload(BusinessReporting, "q1.csv", SALES_CSV, MappingParams::new()).await;

    assert_eq!(report.summary.total_sales, 37000.0);
    assert_eq!(report.summary.total_expenses, 21000.0);
    assert_eq!(report.summary.total_profit, 16000.0);
    assert_eq!(report.summary.profit_margin, 43.24);
    let periods = report.periods.unwrap();
    assert_eq!(periods.len(), 3);
    assert_eq!(periods[0].period, "Jan 2025");
    assert_eq!(periods[0].profit, 4000.0);
    assert_eq!(report.top_periods[0].period, "Mar 2025");
}

#[tokio::test]
async fn test_summary_report_has_no_period_table() {
    let report = run_upload(
        BusinessReporting,
        "q1.csv",
        SALES_CSV,
        MappingParams::new()
            .with("report_type", "summary")
            .with("aggregation", "daily"),
    )
    .await;
    assert!(report.periods.is_none());
    assert_eq!(report.top_periods[0].period, "2025-03-01");
}

#[tokio::test]
async fn test_forecast_from_json_upload() {
    let body = r#"[
        {"period": "w1", "demand": 10},
        {"period": "w2", "demand": 12},
        {"period": "w3", "demand": 14},
        {"period": "w4", "demand": 16}
    ]"#;
    let forecast = run_upload(
        DemandForecasting,
        "demand.json",
        body,
        MappingParams::new()
            .with("periods", 2)
            .with("frequency", "weekly"),
    )
    .await;
    assert_eq!(forecast.forecast, vec![18.0, 20.0]);
    assert_eq!(forecast.slope, 2.0);
    assert_eq!(forecast.mean_absolute_error, 0.0);
}

#[tokio::test]
async fn test_inventory_levels_from_csv() {
    let body = "\
sku,name,current_stock,daily_demand,lead_time_days
SKU-1,Widget,25,4;5;6,4
SKU-2,Gadget,60,4;5;6,4
";
    let report = run_upload(InventoryManagement, "stock.csv", body, MappingParams::new()).await;

    let widget = &report.items[0];
    assert_eq!(widget.safety_stock, 15.0);
    assert_eq!(widget.reorder_point, 35.0);
    assert_eq!(widget.optimal_stock, 85.0);
    assert_eq!(widget.status, StockStatus::Critical);
    assert_eq!(report.items[1].status, StockStatus::Optimal);
    assert_eq!(report.critical_count, 1);
}

#[tokio::test]
async fn test_price_suggestions_from_csv() {
    let body = "\
product,cost,current_price,competitor_prices
Desk,100,120,140;160
Lamp,10,10,
";
    let report = run_upload(PricingStrategies, "prices.csv", body, MappingParams::new()).await;

    let desk = &report.suggestions[0];
    assert_eq!(desk.market_price, 150.0);
    assert_eq!(desk.suggested_price, 140.0);
    assert_eq!(desk.change_pct, 16.67);
    let lamp = &report.suggestions[1];
    assert_eq!(lamp.suggested_price, 13.0);
}

#[tokio::test]
async fn test_customer_segments_from_csv() {
    let body = "\
customer_id,name,total_spend,order_count,days_since_last_order
C-1,Ada,5000,20,120
C-2,Ben,1500,3,10
C-3,Cy,200,12,40
C-4,Di,100,1,60
";
    let report = run_upload(CustomerSegmentation, "customers.csv", body, MappingParams::new()).await;

    let assigned: Vec<Segment> = report.assignments.iter().map(|a| a.segment).collect();
    assert_eq!(
        assigned,
        vec![Segment::AtRisk, Segment::Champions, Segment::Loyal, Segment::Regular]
    );
    let order: Vec<Segment> = report.segments.iter().map(|s| s.segment).collect();
    assert_eq!(order, Segment::ORDER.to_vec());
    assert_eq!(report.segments[3].total_spend, 5000.0);
}

#[tokio::test]
async fn test_supplier_ranking_from_csv() {
    let body = "\
Supplier,On Time Rate,Quality Rate,Cost Score,Responsiveness
Acme,95,90,80,85
Globex,98,97,95,92
";
    let ranking = run_upload(SupplierPerformance, "suppliers.csv", body, MappingParams::new())
        .await
        .ranking;

    assert_eq!(ranking[0].supplier, "Globex");
    assert_eq!(ranking[0].score, 96.45);
    assert_eq!(ranking[0].grade, 'A');
    assert_eq!(ranking[1].supplier, "Acme");
    assert_eq!(ranking[1].score, 89.25);
    assert_eq!(ranking[1].grade, 'B');
}

#[test]
fn test_document_with_wrong_columns_is_an_input_error() {
    let document = ParserRegistry::with_defaults()
        .parse("sales.csv", b"Date,Revenue\n2025-01-01,10\n")
        .unwrap();
    let err = BusinessReporting.input_from_document(document).unwrap_err();
    assert_eq!(err.category, ErrorCategory::InputError);
    assert!(err.message.contains("Business Reporting input layout"));
}

#[test]
fn test_unsupported_extension_is_an_input_error() {
    let err = ParserRegistry::with_defaults()
        .parse("sales.xlsx", b"PK")
        .unwrap_err();
    assert_eq!(err.category, ErrorCategory::InputError);
    assert!(err.message.contains("unsupported file type '.xlsx'"));
}
