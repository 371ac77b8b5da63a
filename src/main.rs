use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use schedviz::api::SchedulerClient;
use schedviz::config::DashboardSettings;
use schedviz::layout::{LayoutConfig, layout_collapsed, parse_path_list};
use schedviz::queue::{QueuePayload, QueueTree};
use schedviz::server::run_http_server;
use schedviz::utilization::{NodeUtilizationsInfo, chart_for_partition};
use schedviz::viewer::run_viewer;

#[derive(Debug, Parser)]
#[command(name = "schedviz", about = "Queue hierarchy and node utilization dashboard")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the laid-out queue tree of a partition as JSON.
    Layout {
        #[arg(long)]
        partition: Option<String>,
        /// Read the queue payload from a JSON or YAML file instead of the scheduler.
        #[arg(long)]
        input: Option<PathBuf>,
        /// Comma-separated queue paths to collapse before layout.
        #[arg(long)]
        collapsed: Option<String>,
    },
    /// Print node utilization chart datasets of a partition as JSON.
    Utilization {
        #[arg(long)]
        partition: Option<String>,
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Serve layouts and charts over HTTP.
    Serve {
        #[arg(long, default_value = "127.0.0.1:8080")]
        bind: String,
    },
    /// Open the native viewer.
    Viewer,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = DashboardSettings::from_env().context("failed to load configuration")?;
    let _log_guard = init_tracing(settings.log_dir.as_deref())?;

    match cli.command {
        Commands::Layout {
            partition,
            input,
            collapsed,
        } => {
            let partition = partition.unwrap_or_else(|| settings.partition.clone());
            let tree = match input {
                Some(path) => QueueTree::from_response(&read_fixture::<QueuePayload>(&path)?),
                None => SchedulerClient::new(&settings)
                    .fetch_queue_tree(&partition)
                    .await
                    .with_context(|| format!("failed to fetch queues of partition `{partition}`"))?,
            };
            let collapsed = collapsed.as_deref().map(parse_path_list).unwrap_or_default();
            print_json(&layout_collapsed(tree, &collapsed, LayoutConfig::default()))?;
        }
        Commands::Utilization { partition, input } => {
            let partition = partition.unwrap_or_else(|| settings.partition.clone());
            let infos = match input {
                Some(path) => read_fixture::<Vec<NodeUtilizationsInfo>>(&path)?,
                None => SchedulerClient::new(&settings)
                    .fetch_node_utilizations()
                    .await
                    .context("failed to fetch node utilizations")?,
            };
            print_json(&chart_for_partition(&infos, &partition))?;
        }
        Commands::Serve { bind } => run_http_server(&settings, &bind).await?,
        Commands::Viewer => run_viewer(&settings)?,
    }

    Ok(())
}

/// Logs go to stderr so command output on stdout stays machine-readable.
fn init_tracing(log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,schedviz=debug"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "schedviz.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .compact()
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(guard)
}

fn read_fixture<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read input file `{}`", path.display()))?;
    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

    if is_yaml {
        serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse YAML input `{}`", path.display()))
    } else {
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse JSON input `{}`", path.display()))
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render JSON output")?;
    println!("{rendered}");
    Ok(())
}
