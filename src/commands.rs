//! CLI command implementations

use std::path::PathBuf;
use std::sync::Arc;

use trellis_parser::{
    DEFAULT_JOB_TIMEOUT, JobManager, JobMessage, ParseOptions, StreamingMode, parse_project,
};
use trellis_schema::ProjectType;
use trellis_store::{GraphStore, MemoryStore};
use trellis_watcher::WatchService;

pub struct ParseArgs {
    pub project: PathBuf,
    pub ts_config: Option<PathBuf>,
    pub project_id: Option<String>,
    pub incremental: bool,
    pub project_type: String,
    pub chunk_size: usize,
    pub streaming: String,
    pub excluded_node_types: Vec<String>,
    pub artifact: bool,
    pub background: bool,
    pub watch: bool,
    pub watch_debounce_ms: u64,
}

fn build_options(args: &ParseArgs) -> anyhow::Result<ParseOptions> {
    let ts_config = args
        .ts_config
        .clone()
        .unwrap_or_else(|| args.project.join("tsconfig.json"));
    let mut options = ParseOptions::new(&args.project, ts_config);
    options.project_id = args.project_id.clone();
    options.clear_existing = !args.incremental;
    options.project_type = args.project_type.parse::<ProjectType>()?;
    options.chunk_size = args.chunk_size;
    options.use_streaming = args.streaming.parse::<StreamingMode>()?;
    options.excluded_node_types = args.excluded_node_types.clone();
    options.write_artifact = args.artifact;
    Ok(options)
}

pub async fn parse(args: ParseArgs) -> anyhow::Result<()> {
    if args.background && args.watch {
        anyhow::bail!("--watch requires a synchronous parse; drop --background");
    }
    let options = build_options(&args)?;
    let store: Arc<dyn GraphStore> = Arc::new(MemoryStore::new());

    if args.background {
        return run_background(store, options);
    }

    tracing::info!("parsing {}", args.project.display());
    let outcome = parse_project(store.as_ref(), &options).await?;
    println!(
        "Parse complete: {} nodes, {} edges ({} files, {} deferred edges resolved, {} ambiguous)",
        outcome.node_count,
        outcome.edge_count,
        outcome.diagnostics.files_parsed,
        outcome.diagnostics.deferred_resolved,
        outcome.diagnostics.ambiguous_resolutions,
    );
    if let Some(path) = &outcome.artifact_path {
        println!("Graph artifact: {}", path.display());
    }

    if args.watch {
        let service = WatchService::new(store, options, args.watch_debounce_ms);
        service.run().await?;
    }
    Ok(())
}

fn run_background(store: Arc<dyn GraphStore>, options: ParseOptions) -> anyhow::Result<()> {
    let manager = JobManager::new();
    let handle = manager.spawn(store, options, DEFAULT_JOB_TIMEOUT);
    tracing::info!("parse job {} started", handle.job_id);
    while let Some(message) = handle.recv() {
        match message {
            JobMessage::Progress { stage, detail } => {
                tracing::info!("[{stage}] {detail}");
            }
            JobMessage::Complete { outcome } => {
                println!(
                    "Parse complete: {} nodes, {} edges",
                    outcome.node_count, outcome.edge_count
                );
                return Ok(());
            }
            JobMessage::Error { message } => {
                anyhow::bail!("parse failed: {message}");
            }
        }
    }
    anyhow::bail!("parse worker exited without a result");
}

pub async fn artifact(
    project: PathBuf,
    ts_config: Option<PathBuf>,
    project_type: String,
) -> anyhow::Result<()> {
    let ts_config = ts_config.unwrap_or_else(|| project.join("tsconfig.json"));
    let mut options = ParseOptions::new(&project, ts_config);
    options.project_type = project_type.parse::<ProjectType>()?;
    options.write_artifact = true;

    let store = MemoryStore::new();
    let outcome = parse_project(&store, &options).await?;
    match outcome.artifact_path {
        Some(path) => println!("Graph artifact written: {}", path.display()),
        None => println!("Parse complete but no artifact was produced"),
    }
    Ok(())
}
