use crate::{
    cli::args::{FeaturesArgs, RecordArgs, RecordsListArgs, ReportFormat, RunArgs, WorkspaceArgs},
    core::{
        config::validation::parse_duration,
        pipeline::{
            renderers::{self, DocumentInputRenderer},
            ActionOutcome, Feature, MappingParams, PipelineController, PipelineDriver,
            ProcessingStatus, SaveOutcome, Stage,
        },
        BizflowConfig, ConfigLoader, ConfigValidator,
    },
    features::{
        self, BusinessReporting, CustomerSegmentation, DemandForecasting, FeatureKind,
        InventoryManagement, PricingStrategies, SupplierPerformance,
    },
    services::{
        self, records::record_id, AnalyticsClient, ParserRegistry, RecordFilter, SessionContext,
        SortOrder,
    },
    Result,
};
use anyhow::{anyhow, Context};
use serde_json::Value;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Workspace root plus its validated configuration.
fn load_workspace(location: &WorkspaceArgs) -> Result<(PathBuf, BizflowConfig)> {
    let workspace = match &location.workspace {
        Some(path) => path.clone(),
        None => env::current_dir().context("cannot determine current directory")?,
    };

    let config = match &location.config {
        Some(path) => ConfigLoader::load(path)?,
        None => ConfigLoader::load_from_workspace(&workspace)?,
    };
    ConfigValidator::validate(&config)?;
    Ok((workspace, config))
}

pub async fn features(args: FeaturesArgs) -> Result<()> {
    let descriptors = features::descriptors();
    match args.format {
        ReportFormat::Text => {
            let width = descriptors.iter().map(|d| d.key.len()).max().unwrap_or(0);
            for descriptor in &descriptors {
                println!(
                    "{:<width$}  {} (table: {}, files: {})",
                    descriptor.key,
                    descriptor.title,
                    descriptor.table_name,
                    descriptor.allowed_file_types.join(" "),
                    width = width
                );
            }
        }
        ReportFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&descriptors)?);
        }
    }
    Ok(())
}

pub async fn run(args: RunArgs) -> Result<()> {
    tracing::info!(feature = %args.feature, input = %args.input.display(), "starting pipeline run");
    let (workspace, config) = load_workspace(&args.location)?;

    match args.feature {
        FeatureKind::BusinessReporting => run_feature(BusinessReporting, &args, &config, &workspace).await,
        FeatureKind::DemandForecasting => run_feature(DemandForecasting, &args, &config, &workspace).await,
        FeatureKind::InventoryManagement => {
            run_feature(InventoryManagement, &args, &config, &workspace).await
        }
        FeatureKind::PricingStrategies => run_feature(PricingStrategies, &args, &config, &workspace).await,
        FeatureKind::CustomerSegmentation => {
            run_feature(CustomerSegmentation, &args, &config, &workspace).await
        }
        FeatureKind::SupplierPerformance => {
            run_feature(SupplierPerformance, &args, &config, &workspace).await
        }
    }
}

async fn run_feature<F: Feature>(
    feature: F,
    args: &RunArgs,
    config: &BizflowConfig,
    workspace: &Path,
) -> Result<()> {
    let params = MappingParams::parse_pairs(&args.params)?;
    let timeout = match args.timeout.as_deref().or(config.processing.timeout.as_deref()) {
        Some(value) => Some(parse_duration("processing.timeout", value)?),
        None => None,
    };

    let mut builder = PipelineController::builder(feature)
        .session(Arc::new(SessionContext::from_config(&config.session)))
        .record_store(services::record_store_from_config(config, workspace)?)
        .processing_timeout(timeout);
    if args.remote || config.processing.use_remote {
        let client = AnalyticsClient::from_config(&config.analytics)?;
        if !client.has_api_key() {
            tracing::warn!(
                env = %config.analytics.api_key_env,
                "analytics API key is not set; remote calls will fail"
            );
        }
        builder = builder.analytics(Arc::new(client));
    }
    let controller = builder.build()?;
    tracing::debug!(strategy = controller.strategy_name(), "pipeline ready");

    let input = DocumentInputRenderer::new(
        &args.input,
        services::object_storage_from_config(config, workspace),
        Arc::new(ParserRegistry::with_defaults()),
        config.upload.bucket.clone(),
        config.upload.max_size_mb,
    );
    let renderers = renderers::standard(input, params, args.format.into(), args.save)?;
    let mut driver = PipelineDriver::new(controller, renderers);
    let report = driver.run().await?;

    for step in &report.steps {
        if let Some(view) = &step.view {
            if step.stage == Stage::Visualization || args.format == ReportFormat::Text {
                println!("{}", view);
            } else {
                eprintln!("{}", view);
            }
        }
    }

    let table = driver.controller().descriptor().table_name;
    match report.last_outcome() {
        Some(ActionOutcome::Processed(ProcessingStatus::Failed(info))) => {
            Err(anyhow!("processing failed: {}", info))
        }
        Some(ActionOutcome::Processed(status)) if *status != ProcessingStatus::Completed => {
            Err(anyhow!("processing did not complete: {:?}", status))
        }
        Some(ActionOutcome::Rejected(reason)) => Err(anyhow!("pipeline stopped: {}", reason)),
        Some(ActionOutcome::Saved(SaveOutcome::Skipped(reason))) => {
            Err(anyhow!("result not saved: {}", reason))
        }
        Some(ActionOutcome::Saved(SaveOutcome::Saved(record))) => {
            eprintln!(
                "Saved record {} to '{}'",
                record_id(record).unwrap_or("?"),
                table
            );
            Ok(())
        }
        _ => Ok(()),
    }
}

pub async fn records_list(args: RecordsListArgs) -> Result<()> {
    let (workspace, config) = load_workspace(&args.location)?;
    let store = services::record_store_from_config(&config, &workspace)?;

    let mut filter = RecordFilter::new().order("created_at", SortOrder::Desc);
    if let Some(user) = &args.user {
        filter = filter.eq("user_id", user.as_str());
    }
    if let Some(limit) = args.limit {
        filter = filter.limit(limit);
    }

    let rows = store.get(&args.table, &filter).await?;
    if rows.is_empty() {
        println!("No records in '{}'", args.table);
        return Ok(());
    }
    for row in &rows {
        println!(
            "{}  {}  {}",
            record_id(row).unwrap_or("-"),
            text_field(row, "created_at"),
            text_field(row, "title")
        );
    }
    Ok(())
}

pub async fn records_show(args: RecordArgs) -> Result<()> {
    let (workspace, config) = load_workspace(&args.location)?;
    let store = services::record_store_from_config(&config, &workspace)?;

    let filter = RecordFilter::new().eq("id", args.id.as_str()).limit(1);
    let row = store
        .get(&args.table, &filter)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("record {} not found in '{}'", args.id, args.table))?;
    println!("{}", serde_json::to_string_pretty(&row)?);
    Ok(())
}

pub async fn records_delete(args: RecordArgs) -> Result<()> {
    let (workspace, config) = load_workspace(&args.location)?;
    let store = services::record_store_from_config(&config, &workspace)?;

    store.delete(&args.table, &args.id).await?;
    println!("Deleted {} from '{}'", args.id, args.table);
    Ok(())
}

fn text_field<'a>(row: &'a Value, key: &str) -> &'a str {
    row.get(key).and_then(Value::as_str).unwrap_or("-")
}
