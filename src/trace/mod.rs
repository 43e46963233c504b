//! API trace: from API-surface call sites up to the UI controls that trigger them.
//!
//! The run has two phases separated by a join barrier:
//! 1. extraction: every source file is parsed on a worker thread, adding
//!    caller edges to the shared [`CallerGraph`] and API call sites to a
//!    shared record list;
//! 2. resolution: once all workers have joined, the graph is frozen and each
//!    record is resolved to its top-level caller and markup binding.

mod types;
mod graph;
mod arguments;
mod parser_csharp;
mod markup;
mod report;

pub use types::*;
pub use graph::{
    is_code_behind, resolve_ascent, resolve_top_level, Ascent, CallerGraph, CallerIndex,
    CODE_BEHIND_SUFFIX,
};
pub use arguments::{resolve_argument_value, NO_PARAMETER};
pub use parser_csharp::{extract_file, new_csharp_parser, FileExtraction};
pub use markup::{binding_pattern, MarkupIndex};
pub use report::{render, render_json, render_text, write_report, ReportFormat, DIVIDER, NO_BINDING};

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;

use ignore::WalkBuilder;
use tracing::{debug, error, info, warn};

use crate::config::TraceConfig;
use crate::{clean_path, read_file_lossy, TraceError};

// ─── File discovery ──────────────────────────────────────────────────

/// Source and markup files found under the root, each list sorted by path.
#[derive(Debug, Default)]
pub struct ProjectFiles {
    pub root: String,
    pub sources: Vec<String>,
    pub markup: Vec<String>,
}

/// Walk `config.root` and split files into source and markup by extension.
///
/// An unreadable or missing root aborts the run; unreadable entries below it
/// are skipped.
pub fn collect_files(config: &TraceConfig) -> Result<ProjectFiles, TraceError> {
    let root = &config.root;
    if !root.is_dir() {
        return Err(TraceError::DirNotFound(root.display().to_string()));
    }
    // Surface permission problems on the root itself as a fatal error.
    std::fs::read_dir(root)?;

    let dir = std::fs::canonicalize(root).unwrap_or_else(|_| PathBuf::from(root));
    let root_str = clean_path(&dir.to_string_lossy());

    let mut walker = WalkBuilder::new(&dir);
    walker.standard_filters(config.respect_ignore_files).hidden(false);
    if config.threads > 0 {
        walker.threads(config.threads);
    }

    let found: Mutex<(Vec<String>, Vec<String>)> = Mutex::new((Vec::new(), Vec::new()));

    walker.build_parallel().run(|| {
        Box::new(|entry| {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    debug!(error = %e, "skipping unreadable directory entry");
                    return ignore::WalkState::Continue;
                }
            };
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                return ignore::WalkState::Continue;
            }
            let path = entry.path();
            let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
                return ignore::WalkState::Continue;
            };
            let is_source = config.source_exts.iter().any(|x| x.eq_ignore_ascii_case(ext));
            let is_markup = !is_source && config.markup_exts.iter().any(|x| x.eq_ignore_ascii_case(ext));
            if is_source || is_markup {
                let clean = clean_path(&path.to_string_lossy());
                let mut guard = found.lock().unwrap_or_else(|e| e.into_inner());
                if is_source {
                    guard.0.push(clean);
                } else {
                    guard.1.push(clean);
                }
            }
            ignore::WalkState::Continue
        })
    });

    let (mut sources, mut markup) = found.into_inner().unwrap_or_else(|e| e.into_inner());
    sources.sort();
    markup.sort();

    Ok(ProjectFiles { root: root_str, sources, markup })
}

// ─── Extraction phase ────────────────────────────────────────────────

/// Everything the extraction phase publishes. Holding a [`CallerIndex`]
/// means the phase is over: the graph can no longer be written.
#[derive(Debug, Default)]
pub struct Extraction {
    pub index: CallerIndex,
    /// Sorted by (file, line, column, API method)
    pub invocations: Vec<ApiInvocation>,
    pub call_sites: usize,
    pub skipped_files: usize,
    pub lossy_files: usize,
}

#[derive(Default)]
struct ChunkStats {
    call_sites: usize,
    skipped: usize,
    lossy: usize,
}

/// Parse every source file on `threads` workers and build the caller graph.
///
/// Returns only after every worker has joined.
pub fn extract_project(
    files: &[String],
    api_surface: &[String],
    threads: usize,
) -> Result<Extraction, TraceError> {
    let start = Instant::now();
    let api_surface: HashSet<String> = api_surface.iter().cloned().collect();
    let graph = CallerGraph::new();
    let records: Mutex<Vec<ApiInvocation>> = Mutex::new(Vec::new());

    let num_threads = threads.max(1);
    let chunk_size = files.len().div_ceil(num_threads).max(1);

    let joined: Vec<std::thread::Result<Result<ChunkStats, TraceError>>> = std::thread::scope(|s| {
        let handles: Vec<_> = files.chunks(chunk_size).map(|chunk| {
            let graph = &graph;
            let records = &records;
            let api_surface = &api_surface;
            s.spawn(move || -> Result<ChunkStats, TraceError> {
                let mut parser = new_csharp_parser()?;
                let mut stats = ChunkStats::default();

                for file_path in chunk {
                    let (content, was_lossy) = match read_file_lossy(Path::new(file_path)) {
                        Ok(r) => r,
                        Err(e) => {
                            warn!(file = %file_path, error = %e, "skipping unreadable source file");
                            stats.skipped += 1;
                            continue;
                        }
                    };
                    if was_lossy {
                        debug!(file = %file_path, "file contains non-UTF8 bytes (lossy conversion applied)");
                        stats.lossy += 1;
                    }

                    match extract_file(&mut parser, file_path, &content, api_surface, graph) {
                        Some(extracted) => {
                            stats.call_sites += extracted.call_sites;
                            if !extracted.invocations.is_empty() {
                                records.lock()
                                    .unwrap_or_else(|e| e.into_inner())
                                    .extend(extracted.invocations);
                            }
                        }
                        None => {
                            warn!(file = %file_path, "tree-sitter returned no tree, skipping file");
                            stats.skipped += 1;
                        }
                    }
                }
                Ok(stats)
            })
        }).collect();

        handles.into_iter().map(|h| h.join()).collect()
    });
    let totals = merge_chunk_results(joined)?;
    let (call_sites, skipped_files, lossy_files) = (totals.call_sites, totals.skipped, totals.lossy);

    let mut invocations = records.into_inner().unwrap_or_else(|e| e.into_inner());
    invocations.sort_by(|a, b| a.file.cmp(&b.file)
        .then_with(|| a.line.cmp(&b.line))
        .then_with(|| a.column.cmp(&b.column))
        .then_with(|| a.api_method.cmp(&b.api_method)));

    let index = graph.freeze();
    info!(
        files = files.len(),
        skipped = skipped_files,
        call_sites,
        callees = index.len(),
        edges = index.edge_count(),
        api_invocations = invocations.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "extraction finished"
    );

    Ok(Extraction { index, invocations, call_sites, skipped_files, lossy_files })
}

/// Sum per-worker statistics. A panicked worker fails the run: the files it
/// had not finished contributed no edges, so any report would be incomplete.
fn merge_chunk_results(
    joined: Vec<std::thread::Result<Result<ChunkStats, TraceError>>>,
) -> Result<ChunkStats, TraceError> {
    let mut total = ChunkStats::default();
    for (worker, result) in joined.into_iter().enumerate() {
        let stats = result.map_err(|payload| {
            let message = payload.downcast_ref::<&str>().map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic payload".to_string());
            error!(worker, %message, "Worker thread panicked during extraction");
            TraceError::WorkerPanicked { worker, message }
        })??;
        total.call_sites += stats.call_sites;
        total.skipped += stats.skipped;
        total.lossy += stats.lossy;
    }
    Ok(total)
}

// ─── Resolution phase ───────────────────────────────────────────────

/// Attach the top-level caller and markup binding to every invocation.
///
/// Markup lookups are memoised per top-level method name.
pub fn resolve_invocations(
    invocations: Vec<ApiInvocation>,
    index: &CallerIndex,
    markup: &MarkupIndex,
) -> Result<Vec<TracedInvocation>, TraceError> {
    let mut bindings: HashMap<String, Option<UiBinding>> = HashMap::new();
    let mut traced = Vec::with_capacity(invocations.len());

    for invocation in invocations {
        let ascent = resolve_ascent(&invocation.immediate, index);
        if ascent.cycle {
            debug!(method = %ascent.top_level, "caller ascent stopped on a cycle");
        }

        let handler = ascent.top_level.name.clone();
        let ui_binding = match bindings.get(&handler) {
            Some(cached) => cached.clone(),
            None => {
                let found = markup.find_binding(&handler)?;
                bindings.insert(handler, found.clone());
                found
            }
        };

        traced.push(TracedInvocation {
            invocation,
            top_level: ascent.top_level,
            chain: ascent.chain,
            cycle: ascent.cycle,
            ui_binding,
        });
    }
    Ok(traced)
}

// ─── Pipeline ────────────────────────────────────────────────────────

/// Run discovery, extraction and resolution over `config.root`.
pub fn run_trace(config: &TraceConfig) -> Result<TraceReport, TraceError> {
    config.validate()?;
    let files = collect_files(config)?;
    eprintln!(
        "[trace] Found {} source files and {} markup files under {}",
        files.sources.len(), files.markup.len(), files.root
    );

    let extraction = extract_project(&files.sources, &config.api_surface, config.effective_threads())?;
    let (markup, markup_skipped) = MarkupIndex::load(&files.markup, &config.event_attrs);

    let invocations = resolve_invocations(extraction.invocations, &extraction.index, &markup)?;
    let ui_bindings_found = invocations.iter().filter(|t| t.ui_binding.is_some()).count();

    let stats = TraceStats {
        source_files: files.sources.len(),
        markup_files: files.markup.len(),
        skipped_files: extraction.skipped_files + markup_skipped,
        lossy_files: extraction.lossy_files,
        call_sites: extraction.call_sites,
        callee_names: extraction.index.len(),
        api_invocations: invocations.len(),
        ui_bindings_found,
    };
    eprintln!(
        "[trace] {} API invocations, {} with a markup binding ({} files skipped)",
        stats.api_invocations, stats.ui_bindings_found, stats.skipped_files
    );

    Ok(TraceReport {
        root: files.root,
        api_surface: config.api_surface.clone(),
        invocations,
        stats,
    })
}

// ─── Tests ──────────────────────────────────────────────────────────


#[cfg(test)]
#[path = "trace_tests.rs"]
mod tests;
