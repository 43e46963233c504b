//! UI cross-reference: find the markup control whose event attribute is
//! bound to a handler method and recover its display text.
//!
//! This is a pattern matcher over raw markup, not a parser. Nested controls
//! of the same tag family or malformed markup can produce a wrong match or
//! miss a valid one.

use regex::Regex;

use crate::config::{parse_list, DEFAULT_EVENT_ATTRIBUTES};
use crate::{read_file_lossy, TraceError};

use super::types::UiBinding;

/// Markup files loaded once and searched per handler name.
#[derive(Debug, Default)]
pub struct MarkupIndex {
    /// (path, content), sorted by path
    files: Vec<(String, String)>,
    event_attrs: Vec<String>,
}

impl MarkupIndex {
    /// Read every markup file. Unreadable files are skipped; the second
    /// element of the result counts them.
    pub fn load(paths: &[String], event_attrs: &[String]) -> (Self, usize) {
        let mut files = Vec::with_capacity(paths.len());
        let mut skipped = 0usize;
        for path in paths {
            match read_file_lossy(std::path::Path::new(path)) {
                Ok((content, _)) => files.push((path.clone(), content)),
                Err(e) => {
                    tracing::warn!(file = %path, error = %e, "skipping unreadable markup file");
                    skipped += 1;
                }
            }
        }
        (Self::from_sources(files, event_attrs), skipped)
    }

    /// Build from in-memory `(path, content)` pairs.
    pub fn from_sources(mut files: Vec<(String, String)>, event_attrs: &[String]) -> Self {
        files.sort_by(|a, b| a.0.cmp(&b.0));
        let event_attrs = if event_attrs.is_empty() {
            parse_list(DEFAULT_EVENT_ATTRIBUTES)
        } else {
            event_attrs.to_vec()
        };
        Self { files, event_attrs }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// First control (by markup file path) bound to `handler`.
    pub fn find_binding(&self, handler: &str) -> Result<Option<UiBinding>, TraceError> {
        let pattern = binding_pattern(handler, &self.event_attrs)?;
        for (path, content) in &self.files {
            if let Some(text) = match_control(&pattern, content) {
                return Ok(Some(UiBinding { file: path.clone(), text }));
            }
        }
        Ok(None)
    }
}

/// Regex matching an `asp:` server control whose event attribute equals
/// `handler`, either as a container (`<asp:X ...>inner</asp:X>`, inner text
/// captured in group 1) or self-closing (`<asp:X ... />`).
pub fn binding_pattern(handler: &str, event_attrs: &[String]) -> Result<Regex, TraceError> {
    let attrs = event_attrs.iter()
        .map(|a| regex::escape(a))
        .collect::<Vec<_>>()
        .join("|");
    let handler = regex::escape(handler);
    let pattern = format!(
        r#"(?is)<asp:\w+\b[^>]*?\b(?:{attrs})\s*=\s*(?:"{handler}"|'{handler}')[^>]*?(?:/>|>(.*?)</asp:\w+\s*>)"#
    );
    Regex::new(&pattern).map_err(|source| TraceError::InvalidPattern { pattern, source })
}

/// Display text of the first match: trimmed inner text, or the whole
/// control markup when the inner text is empty or absent.
fn match_control(pattern: &Regex, content: &str) -> Option<String> {
    let caps = pattern.captures(content)?;
    let inner = caps.get(1).map(|m| m.as_str().trim()).unwrap_or("");
    if inner.is_empty() {
        caps.get(0).map(|m| m.as_str().trim().to_string())
    } else {
        Some(inner.to_string())
    }
}
