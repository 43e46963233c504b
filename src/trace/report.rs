//! Report rendering (text blocks or JSON) and the single atomic write.

use std::io::Write as _;
use std::path::Path;

use crate::TraceError;

use super::types::{TraceReport, TracedInvocation};

/// Line written before every invocation block.
pub const DIVIDER: &str = "--------------------------------------------------------";

/// Written in place of the markup fields when no control is bound.
pub const NO_BINDING: &str = "Markup control not found for this event handler.";

/// Output format of the report file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("Unknown report format: '{}' (expected text or json)", other)),
        }
    }
}

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Text => "txt",
            Self::Json => "json",
        }
    }
}

pub fn render(report: &TraceReport, format: ReportFormat, show_chain: bool) -> Result<String, TraceError> {
    match format {
        ReportFormat::Text => Ok(render_text(report, show_chain)),
        ReportFormat::Json => render_json(report),
    }
}

/// One block per invocation, in report order, each preceded by [`DIVIDER`].
pub fn render_text(report: &TraceReport, show_chain: bool) -> String {
    let mut out = String::new();
    for traced in &report.invocations {
        render_block(&mut out, traced, show_chain);
    }
    out
}

fn render_block(out: &mut String, traced: &TracedInvocation, show_chain: bool) {
    let inv = &traced.invocation;
    out.push_str(DIVIDER);
    out.push('\n');
    out.push_str(&format!("API call in file: {}\n", inv.file));
    out.push_str(&format!("Line: {}\n", inv.line));
    out.push_str(&format!("API method: {}\n", inv.api_method));
    out.push_str(&format!("Endpoint: {}\n", inv.endpoint));
    out.push_str(&format!("Immediate method: {}\n", inv.immediate));
    out.push_str(&format!("Top-level method: {}\n", traced.top_level));
    if show_chain {
        let chain = traced.chain.iter()
            .map(|m| m.name.as_str())
            .collect::<Vec<_>>()
            .join(" <- ");
        let suffix = if traced.cycle { " (cycle)" } else { "" };
        out.push_str(&format!("Call chain: {}{}\n", chain, suffix));
    }
    match &traced.ui_binding {
        Some(binding) => {
            out.push_str(&format!("Markup file: {}\n", binding.file));
            out.push_str(&format!("Control text: {}\n", binding.text));
        }
        None => {
            out.push_str(NO_BINDING);
            out.push('\n');
        }
    }
}

pub fn render_json(report: &TraceReport) -> Result<String, TraceError> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Write `body` to `path` in one step: the content goes to a sibling temp
/// file first and is renamed over the target, so readers never observe a
/// partial report.
pub fn write_report(path: &Path, body: &str) -> Result<(), TraceError> {
    let file_name = path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| TraceError::InvalidArgs(format!("Output path has no file name: {}", path.display())))?;
    let tmp_path = path.with_file_name(format!(".{}.tmp", file_name));

    {
        let file = std::fs::File::create(&tmp_path)?;
        let mut writer = std::io::BufWriter::new(file);
        writer.write_all(body.as_bytes())?;
        writer.flush()?;
    }
    if let Err(e) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    Ok(())
}
