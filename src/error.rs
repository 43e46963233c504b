//! Unified error type for the tracer.

use thiserror::Error;

/// All errors that can abort a trace run.
///
/// Per-file read and parse failures never show up here: they are counted
/// in the run statistics and the file is skipped.
#[derive(Error, Debug)]
pub enum TraceError {
    /// I/O error (report write, root directory access)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Root directory does not exist or is not a directory
    #[error("Directory does not exist: {0}")]
    DirNotFound(String),

    /// Invalid markup binding pattern (built from handler/attribute names)
    #[error("Invalid regex pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// JSON report serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The C# grammar could not be loaded into a parser
    #[error("Failed to load C# grammar: {0}")]
    Grammar(String),

    /// Argument validation error
    #[error("{0}")]
    InvalidArgs(String),

    /// An extraction worker panicked, so its share of the caller graph is missing
    #[error("Extraction worker {worker} panicked: {message}")]
    WorkerPanicked { worker: usize, message: String },
}
