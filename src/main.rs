//! Trellis CLI entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "trellis")]
#[command(about = "Schema-driven TypeScript code-graph extraction", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a project into the code graph
    Parse {
        /// Project root (defaults to current directory)
        #[arg(default_value = ".")]
        project: PathBuf,

        /// Path to tsconfig.json (defaults to <project>/tsconfig.json)
        #[arg(long)]
        ts_config: Option<PathBuf>,

        /// Override the deterministic project ID
        #[arg(long)]
        project_id: Option<String>,

        /// Incremental re-parse instead of a full rebuild
        #[arg(short, long)]
        incremental: bool,

        /// Framework schema selection: auto|nestjs|fairsquare|both|vanilla
        #[arg(long, default_value = "auto")]
        project_type: String,

        /// Files per streaming commit chunk
        #[arg(long, default_value = "50")]
        chunk_size: usize,

        /// Streaming commit mode: auto|always|never
        #[arg(long, default_value = "auto")]
        streaming: String,

        /// AST node kinds to skip during traversal (repeatable)
        #[arg(long = "exclude-node-type")]
        excluded_node_types: Vec<String>,

        /// Also write <project>/code-graph.json
        #[arg(long)]
        artifact: bool,

        /// Run in a background worker and stream progress
        #[arg(long)]
        background: bool,

        /// Keep watching for changes after the initial parse (sync only)
        #[arg(short, long)]
        watch: bool,

        /// Watch coalescing window in milliseconds
        #[arg(long, default_value = "1000")]
        watch_debounce_ms: u64,
    },
    /// Parse and write the graph artifact without keeping a store
    Artifact {
        /// Project root (defaults to current directory)
        #[arg(default_value = ".")]
        project: PathBuf,

        /// Path to tsconfig.json (defaults to <project>/tsconfig.json)
        #[arg(long)]
        ts_config: Option<PathBuf>,

        /// Framework schema selection: auto|nestjs|fairsquare|both|vanilla
        #[arg(long, default_value = "auto")]
        project_type: String,
    },
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "trellis={log_level}"
        )))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Parse {
            project,
            ts_config,
            project_id,
            incremental,
            project_type,
            chunk_size,
            streaming,
            excluded_node_types,
            artifact,
            background,
            watch,
            watch_debounce_ms,
        } => {
            commands::parse(commands::ParseArgs {
                project,
                ts_config,
                project_id,
                incremental,
                project_type,
                chunk_size,
                streaming,
                excluded_node_types,
                artifact,
                background,
                watch,
                watch_debounce_ms,
            })
            .await
        }
        Commands::Artifact {
            project,
            ts_config,
            project_type,
        } => commands::artifact(project, ts_config, project_type).await,
        Commands::Version => {
            println!("trellis v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
