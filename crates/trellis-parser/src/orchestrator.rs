//! Parse orchestration: full rebuilds and incremental re-parse (C9)
//!
//! The project node always moves `parsing → complete` or `parsing → failed`,
//! on every exit path. Per-file parse errors skip the file and continue; a
//! store write error aborts the run. The incremental path saves cross-file
//! edges before deleting affected subgraphs and restores the survivors after
//! the re-parse commits.

use std::path::PathBuf;

use trellis_core::{
    ArtifactMetadata, GraphArtifact, IncrementalSummary, ParseDiagnostics, ParsedEdge, ParsedNode,
    Project, ProjectStatus, Result, TrellisError, content_hash, identity,
};
use trellis_schema::{ProjectType, SchemaRegistry};
use trellis_store::{
    DEFAULT_CHUNK_SIZE, GraphStore, PersistenceAdapter, STREAMING_FILE_THRESHOLD,
};

use crate::change::{self, SourceFileEntry};
use crate::context;
use crate::edges;
use crate::resolver;
use crate::semantic;
use crate::traversal::{self, DeferredEdge, FileMeta};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamingMode {
    Auto,
    Always,
    Never,
}

impl std::str::FromStr for StreamingMode {
    type Err = TrellisError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "auto" => Ok(StreamingMode::Auto),
            "always" => Ok(StreamingMode::Always),
            "never" => Ok(StreamingMode::Never),
            other => Err(TrellisError::Configuration(format!(
                "unknown streaming mode: {other}"
            ))),
        }
    }
}

/// One parse request.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    pub project_path: PathBuf,
    pub ts_config_path: PathBuf,
    /// Overrides the path-derived deterministic project ID.
    pub project_id: Option<String>,
    /// `true` = full rebuild, `false` = incremental.
    pub clear_existing: bool,
    pub project_type: ProjectType,
    pub chunk_size: usize,
    pub use_streaming: StreamingMode,
    /// AST kind names skipped during traversal.
    pub excluded_node_types: Vec<String>,
    /// Write `<project>/code-graph.json` alongside the store commit.
    pub write_artifact: bool,
}

impl ParseOptions {
    pub fn new(project_path: impl Into<PathBuf>, ts_config_path: impl Into<PathBuf>) -> Self {
        ParseOptions {
            project_path: project_path.into(),
            ts_config_path: ts_config_path.into(),
            project_id: None,
            clear_existing: true,
            project_type: ProjectType::Auto,
            chunk_size: DEFAULT_CHUNK_SIZE,
            use_streaming: StreamingMode::Auto,
            excluded_node_types: Vec::new(),
            write_artifact: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParseOutcome {
    pub project_id: String,
    pub node_count: u64,
    pub edge_count: u64,
    pub diagnostics: ParseDiagnostics,
    pub artifact_path: Option<PathBuf>,
}

/// Coarse progress callback: `(stage, detail)`.
pub type ProgressFn = dyn Fn(&str, &str) + Send + Sync;

pub async fn parse_project(store: &dyn GraphStore, options: &ParseOptions) -> Result<ParseOutcome> {
    parse_project_with_progress(store, options, None).await
}

pub async fn parse_project_with_progress(
    store: &dyn GraphStore,
    options: &ParseOptions,
    progress: Option<&ProgressFn>,
) -> Result<ParseOutcome> {
    // Configuration errors fail before any store mutation.
    let root = validate_paths(options)?;
    let project_id = options
        .project_id
        .clone()
        .unwrap_or_else(|| identity::project_id(&root.to_string_lossy()));
    let name = root
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "project".to_string());
    let registry = SchemaRegistry::build(options.project_type, &root)?;

    store
        .upsert_project(&Project::new(&project_id, &name, &root.to_string_lossy()))
        .await?;

    let run = Run {
        store,
        options,
        registry,
        root: root.clone(),
        project_id: project_id.clone(),
        progress,
    };
    let result = if options.clear_existing {
        run.full().await
    } else {
        run.incremental().await
    };

    match result {
        Ok(outcome) => Ok(outcome),
        Err(err) => {
            // `failed` must hold on every exit path; a second store error
            // here must not mask the original.
            if let Err(status_err) = store
                .update_project_status(&project_id, ProjectStatus::Failed, 0, 0)
                .await
            {
                tracing::error!("failed to mark project failed: {status_err}");
            }
            Err(err)
        }
    }
}

fn validate_paths(options: &ParseOptions) -> Result<PathBuf> {
    if !options.project_path.is_dir() {
        return Err(TrellisError::Configuration(format!(
            "project path does not exist: {}",
            options.project_path.display()
        )));
    }
    if !options.ts_config_path.is_file() {
        return Err(TrellisError::Configuration(format!(
            "tsconfig not found: {}",
            options.ts_config_path.display()
        )));
    }
    Ok(options.project_path.canonicalize()?)
}

struct Run<'a> {
    store: &'a dyn GraphStore,
    options: &'a ParseOptions,
    registry: SchemaRegistry,
    root: PathBuf,
    project_id: String,
    progress: Option<&'a ProgressFn>,
}

/// Everything the per-file phase produces across the parsed file set.
#[derive(Default)]
struct ParsedSet {
    nodes: Vec<ParsedNode>,
    edges: Vec<ParsedEdge>,
    deferred: Vec<DeferredEdge>,
    files_parsed: u64,
    files_skipped: u64,
}

impl Run<'_> {
    fn report(&self, stage: &str, detail: &str) {
        if let Some(progress) = self.progress {
            progress(stage, detail);
        }
    }

    async fn full(&self) -> Result<ParseOutcome> {
        self.store.clear_project(&self.project_id).await?;

        let entries = change::enumerate_source_files(&self.root)?;
        self.report("traversal", &format!("{} files", entries.len()));
        let mut set = self.parse_files(&entries)?;
        let mut diagnostics = ParseDiagnostics {
            files_parsed: set.files_parsed,
            files_skipped: set.files_skipped,
            ..Default::default()
        };

        self.finish_phases(&mut set, &[], &mut diagnostics)?;
        let artifact_path = self.maybe_write_artifact(&set, None)?;
        self.commit_and_complete(set, diagnostics, artifact_path, entries.len())
            .await
    }

    async fn incremental(&self) -> Result<ParseOutcome> {
        let (changes, entries) =
            change::detect_changes(&self.root, &self.project_id, self.store).await?;
        if changes.is_empty() {
            tracing::info!("no changes detected");
            let node_count = self.store.node_count(&self.project_id).await?;
            let edge_count = self.store.edge_count(&self.project_id).await?;
            self.store
                .update_project_status(
                    &self.project_id,
                    ProjectStatus::Complete,
                    node_count,
                    edge_count,
                )
                .await?;
            return Ok(ParseOutcome {
                project_id: self.project_id.clone(),
                node_count,
                edge_count,
                diagnostics: ParseDiagnostics::default(),
                artifact_path: None,
            });
        }

        let affected = changes.affected_files();
        let adapter = PersistenceAdapter::new(self.store, &self.project_id);

        self.report("edges", &format!("saving cross-file edges of {} files", affected.len()));
        let saved = adapter.save_cross_file_edges(&affected).await?;
        adapter.delete_subgraphs(&affected).await?;
        let stubs = adapter.load_stubs(&affected).await?;

        let to_parse: Vec<SourceFileEntry> = entries
            .into_iter()
            .filter(|e| changes.files_to_reparse.contains(&e.rel_path))
            .collect();
        self.report("traversal", &format!("{} changed files", to_parse.len()));
        let mut set = self.parse_files(&to_parse)?;
        let mut diagnostics = ParseDiagnostics {
            files_parsed: set.files_parsed,
            files_skipped: set.files_skipped,
            files_deleted: changes.files_to_delete.len() as u64,
            cross_file_edges_saved: saved.len() as u64,
            ..Default::default()
        };

        self.finish_phases(&mut set, &stubs, &mut diagnostics)?;
        let incremental = IncrementalSummary {
            files_reparsed: changes.files_to_reparse.len() as u64,
            files_deleted: changes.files_to_delete.len() as u64,
        };
        let artifact_path = self.maybe_write_artifact(&set, Some(incremental))?;

        let outcome = self
            .commit_and_complete(set, diagnostics, artifact_path, to_parse.len())
            .await;
        let mut outcome = outcome?;

        self.report("restore", &format!("{} saved edges", saved.len()));
        let (restored, expected) = adapter.restore_edges(&saved).await?;
        if restored < expected {
            // Expected when the counterparty file was itself deleted.
            tracing::warn!(restored, expected, "some cross-file edges were not restorable");
        }
        outcome.diagnostics.cross_file_edges_restored = restored;
        // Restoration changes the edge count; refresh before reporting.
        outcome.edge_count = self.store.edge_count(&self.project_id).await?;
        self.store
            .update_project_status(
                &self.project_id,
                ProjectStatus::Complete,
                outcome.node_count,
                outcome.edge_count,
            )
            .await?;
        Ok(outcome)
    }

    /// C3 + C5 for every file in `entries`. A broken file is logged and
    /// skipped; it never aborts the run.
    fn parse_files(&self, entries: &[SourceFileEntry]) -> Result<ParsedSet> {
        let variables_globs = self.registry.variables_globset()?;
        let mut set = ParsedSet::default();
        for entry in entries {
            let bytes = match std::fs::read(&entry.abs_path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(file = %entry.rel_path, "read failed: {e}");
                    set.files_skipped += 1;
                    continue;
                }
            };
            let meta = FileMeta {
                size: entry.size,
                mtime: entry.mtime,
                content_hash: content_hash(&bytes),
            };
            let source = String::from_utf8_lossy(&bytes).into_owned();
            let ts = match crate::ast::TsFile::parse(&entry.rel_path, source) {
                Ok(ts) => ts,
                Err(e) => {
                    tracing::warn!(file = %entry.rel_path, "parse failed: {e}");
                    set.files_skipped += 1;
                    continue;
                }
            };
            let mut output = match traversal::traverse_file(
                &ts,
                &self.registry,
                &self.project_id,
                &meta,
                &self.options.excluded_node_types,
                &variables_globs,
            ) {
                Ok(output) => output,
                Err(e) => {
                    tracing::warn!(file = %entry.rel_path, "traversal failed: {e}");
                    set.files_skipped += 1;
                    continue;
                }
            };
            // Context extraction must see the live AST; it ends with this
            // file's scope and the handles drop with `ts`.
            context::enrich_file(&mut output, &ts);
            set.nodes.append(&mut output.nodes);
            set.edges.append(&mut output.edges);
            set.deferred.append(&mut output.deferred);
            set.files_parsed += 1;
        }
        Ok(set)
    }

    /// C4, C6, C7 over the parsed set (plus stubs for cross-file targets).
    fn finish_phases(
        &self,
        set: &mut ParsedSet,
        stubs: &[ParsedNode],
        diagnostics: &mut ParseDiagnostics,
    ) -> Result<()> {
        self.report("resolve", &format!("{} deferred edges", set.deferred.len()));
        let (resolved, stats) = resolver::resolve_deferred(&set.deferred, &set.nodes, stubs);
        diagnostics.deferred_resolved = stats.resolved;
        diagnostics.deferred_dropped = stats.dropped;
        diagnostics.ambiguous_resolutions = stats.ambiguous;
        set.edges.extend(resolved);

        self.report("enhance", &format!("{} nodes", set.nodes.len()));
        semantic::enhance_nodes(&mut set.nodes, &self.registry);

        let shared = semantic::build_shared_context(set.nodes.iter().chain(stubs.iter()));
        let detection = edges::detect_edges(&set.nodes, stubs, &self.registry, &shared);
        edges::apply_label_grants(&mut set.nodes, &detection.label_grants);
        set.edges.extend(detection.edges);
        Ok(())
    }

    fn maybe_write_artifact(
        &self,
        set: &ParsedSet,
        incremental: Option<IncrementalSummary>,
    ) -> Result<Option<PathBuf>> {
        if !self.options.write_artifact {
            return Ok(None);
        }
        let artifact = GraphArtifact::build(
            &set.nodes,
            &set.edges,
            ArtifactMetadata {
                core_schema: self.registry.core.name.to_string(),
                framework_schemas: self.registry.framework_names(),
                project_type: self.registry.resolved_type().as_str().to_string(),
                project_id: self.project_id.clone(),
                generated: identity::timestamp(),
                incremental,
            },
        )?;
        Ok(Some(artifact.write(&self.root)?))
    }

    async fn commit_and_complete(
        &self,
        set: ParsedSet,
        mut diagnostics: ParseDiagnostics,
        artifact_path: Option<PathBuf>,
        file_count: usize,
    ) -> Result<ParseOutcome> {
        let adapter = PersistenceAdapter::new(self.store, &self.project_id);
        let chunking = chunk_plan(self.options.use_streaming, file_count, self.options.chunk_size);
        self.report(
            "commit",
            &format!("{} nodes, {} edges", set.nodes.len(), set.edges.len()),
        );
        let stats = match adapter.commit(&set.nodes, &set.edges, chunking).await {
            Ok(stats) => stats,
            Err(err) => {
                // The artifact, if written, survives for import-only retries.
                if let Some(path) = &artifact_path {
                    return Err(TrellisError::Store(format!(
                        "{err}; graph artifact preserved at {}",
                        path.display()
                    )));
                }
                return Err(err);
            }
        };
        diagnostics.nodes_created = stats.nodes_written;
        diagnostics.edges_created = stats.edges_written;

        let node_count = self.store.node_count(&self.project_id).await?;
        let edge_count = self.store.edge_count(&self.project_id).await?;
        self.store
            .update_project_status(
                &self.project_id,
                ProjectStatus::Complete,
                node_count,
                edge_count,
            )
            .await?;
        tracing::info!(
            project = %self.project_id,
            "parse complete: {}",
            diagnostics.summary()
        );
        Ok(ParseOutcome {
            project_id: self.project_id.clone(),
            node_count,
            edge_count,
            diagnostics,
            artifact_path,
        })
    }
}

fn chunk_plan(mode: StreamingMode, file_count: usize, chunk_size: usize) -> Option<usize> {
    match mode {
        StreamingMode::Always => Some(chunk_size),
        StreamingMode::Never => None,
        StreamingMode::Auto => (file_count > STREAMING_FILE_THRESHOLD).then_some(chunk_size),
    }
}
