//! Trellis Parser — the schema-driven extraction pipeline
//!
//! Phases: traversal (C3) per file, deferred-edge resolution (C4), context
//! extraction (C5, folded into the per-file pass so it sees live AST),
//! semantic enhancement (C6), edge detection (C7). The orchestrator runs
//! them for full rebuilds and incremental re-parses; the job manager
//! offloads long parses to worker threads.

pub mod ast;
pub mod change;
pub mod context;
pub mod edges;
pub mod job;
pub mod orchestrator;
pub mod resolver;
pub mod semantic;
pub mod traversal;

#[cfg(test)]
pub mod tests;

pub use change::{ChangeSet, SourceFileEntry, detect_changes, enumerate_source_files};
pub use job::{DEFAULT_JOB_TIMEOUT, JobHandle, JobManager, JobMessage, JobOutcome, JobStatus};
pub use orchestrator::{
    ParseOptions, ParseOutcome, StreamingMode, parse_project, parse_project_with_progress,
};
