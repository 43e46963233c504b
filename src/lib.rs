//! # api_trace: UI-to-API provenance for server-rendered C# web applications
//!
//! Finds every call to a fixed set of API-calling methods, walks the static
//! caller graph up to the outermost method (usually a UI event handler in a
//! code-behind file) and looks up the markup control bound to that handler.
//!
//! ## Library usage
//!
//! The crate is primarily the `api-trace` CLI, but the pipeline is exposed
//! for integration tests and benchmarks:
//!
//! ```no_run
//! use api_trace::{run_trace, render_text, TraceConfig};
//!
//! let config = TraceConfig::new("./Portal");
//! let report = run_trace(&config).unwrap();
//! print!("{}", render_text(&report, false));
//! ```

pub mod config;
pub mod error;
pub mod trace;

pub use config::{parse_extensions, parse_list, TraceConfig, DEFAULT_API_SURFACE};
pub use error::TraceError;
pub use trace::{
    collect_files, extract_project, render, render_json, render_text, resolve_ascent,
    resolve_invocations, resolve_top_level, run_trace, write_report, ApiInvocation, Ascent,
    CallerGraph, CallerIndex, MarkupIndex, MethodIdentity, ReportFormat, TraceReport,
    TraceStats, TracedInvocation, UiBinding,
};

// ─── Path and file helpers ───────────────────────────────────────────

/// Strip the `\\?\` extended-length path prefix that Windows canonicalize adds.
#[must_use]
pub fn clean_path(p: &str) -> String {
    p.strip_prefix(r"\\?\").unwrap_or(p).to_string()
}

/// Read a file as a String, using lossy UTF-8 conversion for non-UTF8 files.
/// Returns `(content, was_lossy)` where `was_lossy` is true if replacement characters
/// were inserted. Legacy WebForms projects often carry Windows-1252 encoded
/// `.aspx` and `.cs` files.
pub fn read_file_lossy(path: &std::path::Path) -> std::io::Result<(String, bool)> {
    let raw = std::fs::read(path)?;
    match String::from_utf8(raw) {
        Ok(s) => Ok((s, false)),
        Err(e) => Ok((String::from_utf8_lossy(e.as_bytes()).into_owned(), true)),
    }
}
