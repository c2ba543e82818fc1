// Graph pipeline
//
// Discovery, then two parallel passes over the workspace (type index, then
// per-file extraction), then a single-threaded merge in sorted path order.
// Extractors never touch the graph; only the merge step writes to it.

use crate::database::GraphDatabase;
use crate::extractors::csharp::CSharpSource;
use crate::extractors::{
    InlineStatementExtractor, MigrationExtractor, OrmMappingExtractor, SchemaScriptExtractor,
    TypeIndex,
};
use crate::graph::{DependencyGraph, FileFacts, GraphStats};
use crate::workspace::{SourceFile, SourceKind, Workspace};
use rayon::prelude::*;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Cooperative cancellation flag, checked at every file boundary
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("graph run cancelled")]
    Cancelled,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("workspace discovery failed: {0:#}")]
    Discovery(anyhow::Error),
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("database error: {0:#}")]
    Database(anyhow::Error),
}

/// What pass 2 produced for one file
enum FileOutcome {
    Extracted(Vec<FileFacts>),
    Skipped,
    Cancelled,
}

/// Per-run extractor set, shared read-only by the workers
struct Extractors {
    inline: InlineStatementExtractor,
    orm: OrmMappingExtractor,
    migrations: MigrationExtractor,
}

pub struct GraphPipeline {
    workspace: Workspace,
    threads: usize,
    cancel: CancellationToken,
}

impl GraphPipeline {
    pub fn new(workspace: Workspace) -> Self {
        Self {
            workspace,
            threads: num_cpus::get(),
            cancel: CancellationToken::new(),
        }
    }

    /// Worker count; zero keeps the CPU count
    pub fn with_threads(mut self, threads: usize) -> Self {
        if threads > 0 {
            self.threads = threads;
        }
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Build the merged graph for the whole workspace
    pub fn run(&self) -> Result<(DependencyGraph, GraphStats), PipelineError> {
        let started = Instant::now();
        self.check_cancelled()?;

        let files = self.workspace.discover().map_err(PipelineError::Discovery)?;
        info!(
            "Building dependency graph for {} ({} files, {} threads)",
            self.workspace.root.display(),
            files.len(),
            self.threads
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .build()?;

        let index = Arc::new(pool.install(|| self.build_type_index(&files)));
        self.check_cancelled()?;
        debug!("Type index holds {} types", index.len());

        let config = &self.workspace.config;
        let extractors = Extractors {
            inline: InlineStatementExtractor::new(config),
            orm: OrmMappingExtractor::new(config, Arc::clone(&index)),
            migrations: MigrationExtractor::new(config),
        };

        let outcomes: Vec<FileOutcome> = pool.install(|| {
            files
                .par_iter()
                .map(|file| self.extract_file(file, &extractors))
                .collect()
        });
        if self.cancel.is_cancelled() || outcomes.iter().any(|o| matches!(o, FileOutcome::Cancelled)) {
            return Err(PipelineError::Cancelled);
        }

        let mut graph = DependencyGraph::new(config.schema());
        let mut skipped = 0;
        for (file, outcome) in files.iter().zip(&outcomes) {
            match outcome {
                FileOutcome::Extracted(per_extractor) => {
                    let domain = self.workspace.domain_for(&file.relative);
                    for facts in per_extractor {
                        graph.merge(facts, domain);
                    }
                }
                FileOutcome::Skipped => skipped += 1,
                FileOutcome::Cancelled => return Err(PipelineError::Cancelled),
            }
        }
        graph.resolve_deferred();

        let mut stats = graph.stats();
        stats.files_scanned = files.len() - skipped;
        stats.files_skipped = skipped;

        info!(
            "Graph built in {:.2?}: {} nodes, {} edges, {} stubs, {} files skipped",
            started.elapsed(),
            stats.node_total(),
            graph.edge_count(),
            stats.stub_nodes,
            stats.files_skipped
        );
        Ok((graph, stats))
    }

    /// Run, then write the graph to a fresh SQLite file at `output`.
    ///
    /// A cancelled run writes nothing.
    pub fn run_to_database(&self, output: &Path) -> Result<GraphStats, PipelineError> {
        let (graph, stats) = self.run()?;
        self.check_cancelled()?;

        let mut db = GraphDatabase::create(output).map_err(PipelineError::Database)?;
        db.write_graph(&graph, &stats).map_err(PipelineError::Database)?;
        info!("Graph written to {}", output.display());
        Ok(stats)
    }

    fn check_cancelled(&self) -> Result<(), PipelineError> {
        if self.cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        Ok(())
    }

    /// Pass 1: every model-root C# file, folded into one index
    fn build_type_index(&self, files: &[SourceFile]) -> TypeIndex {
        files
            .par_iter()
            .filter(|f| f.kind == SourceKind::CSharp && f.in_model_root)
            .filter_map(|file| {
                if self.cancel.is_cancelled() {
                    return None;
                }
                let content = read_source(file)?;
                let source = CSharpSource::parse(&file.relative, &content)?;
                Some(TypeIndex::from_source(&source))
            })
            .reduce(TypeIndex::new, |mut left, right| {
                left.merge(right);
                left
            })
    }

    /// Pass 2: every extractor that applies to `file`
    fn extract_file(&self, file: &SourceFile, extractors: &Extractors) -> FileOutcome {
        if self.cancel.is_cancelled() {
            return FileOutcome::Cancelled;
        }
        let Some(content) = read_source(file) else {
            return FileOutcome::Skipped;
        };

        let facts = match file.kind {
            SourceKind::SchemaScript => {
                vec![SchemaScriptExtractor::new(file.relative.clone(), content).extract()]
            }
            SourceKind::CSharp => {
                let Some(source) = CSharpSource::parse(&file.relative, &content) else {
                    warn!("Failed to parse {}, skipping", file.relative);
                    return FileOutcome::Skipped;
                };
                let mut facts = vec![
                    extractors.inline.extract(&source),
                    extractors.migrations.extract(&source),
                ];
                if file.in_model_root {
                    facts.push(extractors.orm.extract(&source));
                }
                facts
            }
        };

        let facts: Vec<FileFacts> = facts.into_iter().filter(|f| !f.is_empty()).collect();
        debug!(
            "{}: {} facts",
            file.relative,
            facts.iter().map(|f| f.facts.len()).sum::<usize>()
        );
        FileOutcome::Extracted(facts)
    }
}

/// File text, or `None` (logged) when unreadable or not UTF-8
fn read_source(file: &SourceFile) -> Option<String> {
    let bytes = match std::fs::read(&file.absolute) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Failed to read {}: {}", file.relative, e);
            return None;
        }
    };
    match String::from_utf8(bytes) {
        Ok(content) => match content.strip_prefix('\u{feff}') {
            Some(stripped) => Some(stripped.to_string()),
            None => Some(content),
        },
        Err(_) => {
            warn!("Skipping {}: not valid UTF-8", file.relative);
            None
        }
    }
}
