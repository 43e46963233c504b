//! Run configuration shared by the library pipeline and the CLI.

use std::path::PathBuf;

use crate::TraceError;

/// Method names treated as outbound API calls when none are configured.
pub const DEFAULT_API_SURFACE: &[&str] = &[
    "GET_JWT", "POST_JWT", "PUT_JWT", "PATCH_JWT", "DELETE_JWT", "ObtenhaBearerToken",
];

pub const DEFAULT_SOURCE_EXTENSIONS: &str = "cs";
pub const DEFAULT_MARKUP_EXTENSIONS: &str = "aspx";
pub const DEFAULT_EVENT_ATTRIBUTES: &str = "OnClick";

#[derive(Debug, Clone)]
pub struct TraceConfig {
    /// Root directory scanned recursively
    pub root: PathBuf,
    /// API-surface method names (exact, case-sensitive)
    pub api_surface: Vec<String>,
    /// Source file extensions, lowercase, without dot
    pub source_exts: Vec<String>,
    /// Markup file extensions, lowercase, without dot
    pub markup_exts: Vec<String>,
    /// Event-binding attribute names matched in markup (case-insensitive)
    pub event_attrs: Vec<String>,
    /// Extraction worker threads (0 = available parallelism)
    pub threads: usize,
    /// Honour .gitignore/.ignore files while walking
    pub respect_ignore_files: bool,
}

impl TraceConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            api_surface: DEFAULT_API_SURFACE.iter().map(|s| s.to_string()).collect(),
            source_exts: parse_extensions(DEFAULT_SOURCE_EXTENSIONS),
            markup_exts: parse_extensions(DEFAULT_MARKUP_EXTENSIONS),
            event_attrs: parse_list(DEFAULT_EVENT_ATTRIBUTES),
            threads: 0,
            respect_ignore_files: false,
        }
    }

    pub fn validate(&self) -> Result<(), TraceError> {
        if self.api_surface.is_empty() {
            return Err(TraceError::InvalidArgs("At least one API method name is required (--api)".to_string()));
        }
        if self.source_exts.is_empty() {
            return Err(TraceError::InvalidArgs("At least one source extension is required (--source-ext)".to_string()));
        }
        if let Some(ext) = self.source_exts.iter().find(|e| self.markup_exts.contains(e)) {
            return Err(TraceError::InvalidArgs(format!(
                "Extension '{}' cannot be both a source and a markup extension", ext
            )));
        }
        Ok(())
    }

    /// Worker count for the extraction phase.
    pub fn effective_threads(&self) -> usize {
        if self.threads > 0 {
            self.threads
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        }
    }
}

/// Split a comma-separated option value, trimming items and dropping empties.
pub fn parse_list(value: &str) -> Vec<String> {
    value.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

/// Like [`parse_list`], lowercased and with any leading dot removed.
pub fn parse_extensions(value: &str) -> Vec<String> {
    parse_list(value).into_iter()
        .map(|s| s.trim_start_matches('.').to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
