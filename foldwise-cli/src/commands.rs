//! Subcommand handlers.

use crate::{Commands, ConfigAction, EvaluateArgs};
use foldwise_core::config::{FoldwiseConfig, load_validated};
use foldwise_core::evaluation::Evaluation;
use foldwise_core::execution::{CrossValidationReport, LogStatusSink};
use foldwise_core::models::default_registry;
use foldwise_core::{
    BuiltinModel, CrossValidationExecution, CsvSource, RepeatedCrossValidation,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub async fn handle_command(command: Commands, config_path: Option<&Path>) -> anyhow::Result<()> {
    match command {
        Commands::Evaluate(args) => handle_evaluate(args, config_path).await,
        Commands::Models => {
            println!("Available models:");
            for (tag, description) in default_registry().list() {
                println!("  {tag:<14} {description}");
            }
            Ok(())
        }
        Commands::Config { action } => handle_config(action, config_path).await,
    }
}

fn load(config_path: Option<&Path>) -> anyhow::Result<FoldwiseConfig> {
    load_validated(config_path).map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
}

/// Apply command-line flags on top of the loaded configuration.
fn apply_overrides(config: &mut FoldwiseConfig, args: &EvaluateArgs) -> anyhow::Result<()> {
    let cv = &mut config.cross_validation;
    if let Some(model) = &args.model {
        cv.model = model.clone();
    }
    if let Some(folds) = args.folds {
        cv.set_folds(folds)?;
    }
    if let Some(seed) = args.seed {
        cv.seed = seed;
    }
    if let Some(threads) = args.threads {
        cv.num_threads = threads;
    }
    if let Some(runs) = args.runs {
        cv.runs = runs;
    }
    if args.predictions.is_some() {
        cv.prediction_output = args.predictions;
    }
    cv.separate_folds |= args.separate_folds;
    cv.discard_predictions |= args.discard_predictions;
    if args.no_wait {
        cv.wait_for_jobs = false;
    }
    if let Some(delimiter) = args.delimiter {
        config.data.delimiter = delimiter;
    }
    if let Some(column) = &args.class_column {
        config.data.class_column = Some(column.clone());
    }
    config.cross_validation.validate()?;
    Ok(())
}

async fn handle_evaluate(args: EvaluateArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let mut config = load(config_path)?;
    apply_overrides(&mut config, &args)?;
    let cv_config = &config.cross_validation;

    let mut source = CsvSource::new(&args.dataset).with_delimiter(config.data.delimiter);
    if let Some(column) = &config.data.class_column {
        source = source.with_class_column(column.clone());
    }
    let data = source.load().await?;
    let model = default_registry().create(&cv_config.model)?;

    let mut execution = CrossValidationExecution::<BuiltinModel>::from_config(cv_config);
    execution.set_model(model);
    execution.set_data(data);
    execution.set_status_sink(Arc::new(LogStatusSink));

    let stop = execution.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stop.stop();
        }
    });

    let mut repeated = RepeatedCrossValidation::new(execution, cv_config.runs)?;
    let reports = repeated.execute().await?;
    print_reports(&reports, args.json)?;

    if let Some(failure) = reports.iter().find_map(|r| r.failure()) {
        anyhow::bail!("Cross-validation failed: {failure}");
    }
    Ok(())
}

fn print_reports(
    reports: &[CrossValidationReport<BuiltinModel, Evaluation>],
    json: bool,
) -> anyhow::Result<()> {
    if json {
        let runs: Vec<serde_json::Value> = reports
            .iter()
            .map(|report| {
                serde_json::json!({
                    "run": report.metadata(),
                    "summary": report.aggregate().map(Evaluation::summary),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&runs)?);
        return Ok(());
    }

    for (run, report) in reports.iter().enumerate() {
        if reports.len() > 1 {
            println!("=== Run {} ===\n", run + 1);
        }
        if let Some(predictions) = &report.prediction_output {
            print!("{predictions}");
        }
        if report.stopped {
            println!("Cross-validation stopped before completion.");
            continue;
        }
        if let Some(failure) = report.failure() {
            println!("Partial results, {failure}\n");
        }
        if let Some(aggregate) = report.aggregate() {
            println!("{}", aggregate.summary());
        }
        println!(
            "{} folds, {} thread(s), {} ms",
            report.folds, report.actual_num_threads, report.duration_ms
        );
    }
    Ok(())
}

async fn handle_config(action: ConfigAction, config_path: Option<&Path>) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init { path } => {
            let target = path.unwrap_or_else(|| PathBuf::from("foldwise.toml"));
            if target.exists() {
                println!("Configuration file already exists at: {}", target.display());
                return Ok(());
            }
            if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            let toml_str = toml::to_string_pretty(&FoldwiseConfig::default())?;
            tokio::fs::write(&target, toml_str).await?;
            println!("Created default configuration at: {}", target.display());
            Ok(())
        }
        ConfigAction::Show => {
            let config = load(config_path)?;
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}
