//! Core data types for the API trace: method identities, invocation records,
//! markup bindings and the assembled report.

use std::fmt;

use serde::{Deserialize, Serialize};

// ─── Method identity ─────────────────────────────────────────────────

/// A method node in the caller graph, keyed by `(declaring file, name)`.
///
/// Same-named overloads inside one file collapse into a single node.
/// Field order matters: the derived `Ord` sorts by file first, which is
/// what the caller tie-break relies on.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodIdentity {
    pub file: String,
    pub name: String,
}

impl MethodIdentity {
    pub fn new(name: impl Into<String>, file: impl Into<String>) -> Self {
        Self { file: file.into(), name: name.into() }
    }
}

impl fmt::Display for MethodIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (File: {})", self.name, self.file)
    }
}

// ─── Invocation records ──────────────────────────────────────────────

/// One syntactic call site of an API-surface method, as produced by extraction.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ApiInvocation {
    /// File containing the call site
    pub file: String,
    /// 1-based line of the call expression
    pub line: u32,
    /// 1-based column of the call expression
    pub column: u32,
    /// API-surface method name that was invoked, e.g. "GET_JWT"
    pub api_method: String,
    /// Resolved first argument, or a fallback descriptor
    pub endpoint: String,
    /// Method whose body contains the call site
    pub immediate: MethodIdentity,
}

/// A markup control bound to an event handler.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UiBinding {
    /// Markup file declaring the control
    pub file: String,
    /// Trimmed inner text, or the whole control markup when it has none
    pub text: String,
}

/// An invocation after resolution: top-level caller and UI binding attached.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TracedInvocation {
    #[serde(flatten)]
    pub invocation: ApiInvocation,
    pub top_level: MethodIdentity,
    /// Ascent path from the immediate method (first) to the top-level method (last).
    pub chain: Vec<MethodIdentity>,
    /// True when the ascent stopped because it re-visited a method.
    pub cycle: bool,
    pub ui_binding: Option<UiBinding>,
}

// ─── Report ──────────────────────────────────────────────────────────

/// Counters collected over one run, logged and embedded in the JSON report.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceStats {
    pub source_files: usize,
    pub markup_files: usize,
    /// Source or markup files that could not be read or parsed (skipped)
    pub skipped_files: usize,
    /// Files read with lossy UTF-8 conversion
    pub lossy_files: usize,
    /// Member-access call sites inside method bodies
    pub call_sites: usize,
    /// Distinct callee names in the caller graph
    pub callee_names: usize,
    pub api_invocations: usize,
    pub ui_bindings_found: usize,
}

/// The assembled result of a trace run.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TraceReport {
    pub root: String,
    pub api_surface: Vec<String>,
    pub invocations: Vec<TracedInvocation>,
    pub stats: TraceStats,
}
