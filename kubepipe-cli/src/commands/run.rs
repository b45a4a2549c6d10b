//! Run command
//!
//! Loads a pipeline file, executes it on the cluster and prints a summary.

use anyhow::{Context, Result};
use clap::Args;
use clap::builder::FalseyValueParser;
use colored::*;
use kubepipe_client::KubePlatform;
use kubepipe_core::Phase;
use kubepipe_runner::{PipelineController, PipelineReport, RunnerConfig};
use kubepipe_spec::SpecLoader;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

/// Arguments of `kubepipe run`
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Enable debug logging
    #[arg(long, env = "DEBUG", value_parser = FalseyValueParser::new())]
    pub debug: bool,

    /// Pipeline file to run
    #[arg(short = 'f', long = "file", env = "PIPELINE_FILE")]
    pub file: PathBuf,

    /// Kubeconfig to use instead of the default lookup
    #[arg(long = "kube-config", env = "KUBECONFIG")]
    pub kube_config: Option<PathBuf>,
}

impl RunArgs {
    fn into_config(self) -> Result<Config> {
        let runner = RunnerConfig::from_env().context("Invalid runner configuration")?;
        runner.validate().context("Invalid runner configuration")?;

        Ok(Config {
            pipeline_file: self.file,
            kube_config: self.kube_config,
            debug: self.debug,
            runner,
        })
    }
}

/// Handle `kubepipe run`
pub async fn handle_run(args: RunArgs) -> Result<()> {
    let config = args.into_config()?;
    init_logging(&config);

    let platform = KubePlatform::connect(config.kube_config.as_deref())
        .await
        .context("Failed to connect to the cluster")?;
    info!("Connected to cluster");

    let controller = PipelineController::new(
        Arc::new(platform),
        Arc::new(SpecLoader::default()),
        config.runner.clone(),
    );

    let report = controller
        .run(&config.pipeline_file)
        .await
        .with_context(|| format!("Pipeline {} failed", config.pipeline_file.display()))?;

    print_report(&report);
    Ok(())
}

fn init_logging(config: &Config) {
    // stdout carries container output
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_filter().into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn print_report(report: &PipelineReport) {
    let failed = report.failed_stages().count();
    if failed == 0 {
        eprintln!("{}", format!("✓ Pipeline '{}' completed", report.pipeline).green().bold());
    } else {
        eprintln!(
            "{}",
            format!("✗ Pipeline '{}' completed with {} failed stage(s)", report.pipeline, failed)
                .yellow()
                .bold()
        );
    }

    eprintln!("  Run:      {}", report.run_id.to_string().cyan());
    eprintln!("  Duration: {}s", report.duration().num_seconds());
    if !report.prepared.is_empty() {
        eprintln!("  Prepared: {}", report.prepared.join(", ").dimmed());
    }

    for outcome in &report.stages {
        let phase = match outcome.phase {
            Phase::Succeeded => outcome.phase.to_string().green(),
            Phase::Failed => outcome.phase.to_string().red(),
            _ => outcome.phase.to_string().yellow(),
        };
        eprintln!(
            "  - {} ({}): {} in {}s",
            outcome.stage.bold(),
            outcome.workload,
            phase,
            outcome.duration().num_seconds()
        );
    }

    if report.abandoned_log_streams > 0 {
        eprintln!(
            "  {}",
            format!("{} log stream(s) cut off", report.abandoned_log_streams).dimmed()
        );
    }
}
