use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use safeguard_common::MonitorConfig;
use safeguard_graph::AnalysisReport;
use safeguard_monitor::Monitor;

#[derive(Parser)]
#[command(name = "monitor", about = "Social-graph safety analysis and monitoring")]
#[command(version)]
struct Cli {
    /// Directory for history and report documents (overrides SAFEGUARD_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Graph document (overrides SAFEGUARD_GRAPH_PATH)
    #[arg(long, global = true)]
    graph: Option<PathBuf>,

    /// Annotation document (overrides SAFEGUARD_ANNOTATIONS_PATH)
    #[arg(long, global = true)]
    annotations: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a one-shot analysis and write the analysis documents
    Analyze,
    /// Run one monitoring cycle and print any new alerts
    Check,
    /// Print monitor status as JSON
    Status,
    /// Print status, trends and alert summary as JSON
    Report,
    /// Check on a schedule until interrupted
    Watch,
    /// Print the JSON schema of the analysis document
    Schema,
}

fn load_config(cli: &Cli) -> Result<MonitorConfig> {
    let mut config = MonitorConfig::from_env()?;
    if let Some(dir) = &cli.data_dir {
        // Inputs default to the data dir unless set explicitly.
        let defaults = MonitorConfig::with_data_dir(dir);
        if std::env::var_os("SAFEGUARD_GRAPH_PATH").is_none() {
            config.graph_path = defaults.graph_path;
        }
        if std::env::var_os("SAFEGUARD_ANNOTATIONS_PATH").is_none() {
            config.annotations_path = defaults.annotations_path;
        }
        config.data_dir = dir.clone();
    }
    if let Some(path) = &cli.graph {
        config.graph_path = path.clone();
    }
    if let Some(path) = &cli.annotations {
        config.annotations_path = path.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let filter = EnvFilter::from_default_env().add_directive("safeguard=info".parse()?);
    if cli.json_logs {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    if matches!(cli.command, Commands::Schema) {
        let schema = schemars::schema_for!(AnalysisReport);
        println!("{}", serde_json::to_string_pretty(&schema)?);
        return Ok(());
    }

    let config = load_config(&cli)?;
    config.log_summary();
    let monitor = Arc::new(Monitor::from_config(config));

    match cli.command {
        Commands::Analyze => {
            let (report, communities) = monitor.analyze()?;
            let m = &report.metadata;
            println!(
                "nodes={} edges={} kids={} adults={} danger_sources={} kids_in_pull={} zones={} communities={}",
                m.total_nodes,
                m.total_edges,
                m.total_kids,
                m.total_adults,
                m.danger_source_count,
                m.kids_in_pull,
                report.danger_zones.len(),
                communities.communities.len(),
            );
            for rec in &report.recommendations {
                println!("[{}] {}: {}", rec.priority, rec.message, rec.action);
            }
        }
        Commands::Check => {
            let result = monitor.check_now().await;
            monitor.flush_dispatches().await;
            let outcome = result?;
            info!("Check complete. {}", outcome.stats);
            println!("{}", serde_json::to_string_pretty(&outcome.alerts)?);
        }
        Commands::Status => {
            let status = monitor.status().await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::Report => {
            let report = monitor.report().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Watch => {
            monitor.start().await;
            tokio::signal::ctrl_c().await?;
            info!("Interrupt received, shutting down");
            monitor.stop().await;
            monitor.flush_dispatches().await;
        }
        Commands::Schema => {}
    }

    Ok(())
}
