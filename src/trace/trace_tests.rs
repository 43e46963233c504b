//! End-to-end pipeline tests over temporary project trees.

use super::*;
use std::fs;
use tempfile::TempDir;

const PAGE_CODE_BEHIND: &str = r#"
using System;

public partial class Orders : System.Web.UI.Page
{
    protected void Submit_Click(object sender, EventArgs e)
    {
        Helper();
    }

    private string Helper()
    {
        return Http.GET_JWT("https://api/x");
    }
}
"#;

const PAGE_MARKUP: &str = r#"<%@ Page Language="C#" CodeBehind="Orders.aspx.cs" Inherits="Orders" %>
<html>
<body>
    <form runat="server">
        <asp:Button ID="btnSubmit" OnClick="Submit_Click" runat="server">Go</asp:Button>
    </form>
</body>
</html>
"#;

fn write(dir: &TempDir, rel: &str, content: &[u8]) {
    let path = dir.path().join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn orders_project() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(&dir, "Pages/Orders.aspx.cs", PAGE_CODE_BEHIND.as_bytes());
    write(&dir, "Pages/Orders.aspx", PAGE_MARKUP.as_bytes());
    dir
}

fn config_for(dir: &TempDir) -> TraceConfig {
    let mut config = TraceConfig::new(dir.path());
    config.threads = 2;
    config
}

// ─── Discovery ──────────────────────────────────────────────────────

#[test]
fn test_collect_files_splits_by_extension() {
    let dir = orders_project();
    write(&dir, "Shared/Util.CS", b"class Util {}");
    write(&dir, "readme.md", b"# portal");
    write(&dir, "Controls/Menu.ascx", b"<asp:Menu runat=\"server\" />");

    let files = collect_files(&config_for(&dir)).unwrap();
    assert_eq!(files.sources.len(), 2);
    assert!(files.sources.iter().any(|f| f.ends_with("Pages/Orders.aspx.cs")));
    assert!(files.sources.iter().any(|f| f.ends_with("Shared/Util.CS")));
    assert_eq!(files.markup.len(), 1);
    assert!(files.markup[0].ends_with("Pages/Orders.aspx"));

    let mut sorted = files.sources.clone();
    sorted.sort();
    assert_eq!(files.sources, sorted);
}

#[test]
fn test_collect_files_missing_root() {
    let dir = TempDir::new().unwrap();
    let config = TraceConfig::new(dir.path().join("does-not-exist"));
    match collect_files(&config) {
        Err(TraceError::DirNotFound(path)) => assert!(path.ends_with("does-not-exist")),
        other => panic!("expected DirNotFound, got {:?}", other),
    }
}

#[test]
fn test_collect_files_respects_ignore_only_when_asked() {
    let dir = orders_project();
    write(&dir, ".ignore", b"generated/\n");
    write(&dir, "generated/Proxy.cs", b"class Proxy {}");

    let mut config = config_for(&dir);
    assert_eq!(collect_files(&config).unwrap().sources.len(), 2);
    config.respect_ignore_files = true;
    assert_eq!(collect_files(&config).unwrap().sources.len(), 1);
}

// ─── Extraction ─────────────────────────────────────────────────────

#[test]
fn test_extract_project_skips_unreadable_files() {
    let dir = orders_project();
    let files = collect_files(&config_for(&dir)).unwrap();
    let mut sources = files.sources.clone();
    sources.push(clean_path(&dir.path().join("Gone.cs").to_string_lossy()));

    let extraction = extract_project(&sources, &config_for(&dir).api_surface, 2).unwrap();
    assert_eq!(extraction.skipped_files, 1);
    assert_eq!(extraction.invocations.len(), 1);
}

#[test]
fn test_extract_project_counts_lossy_files() {
    let dir = TempDir::new().unwrap();
    let mut bytes = b"// caf\xE9\nclass C { void Run() { Http.DELETE_JWT(\"items/1\"); } }\n".to_vec();
    bytes.push(b'\n');
    write(&dir, "Legacy.cs", &bytes);

    let files = collect_files(&config_for(&dir)).unwrap();
    let extraction = extract_project(&files.sources, &config_for(&dir).api_surface, 1).unwrap();
    assert_eq!(extraction.lossy_files, 1);
    assert_eq!(extraction.invocations.len(), 1);
    assert_eq!(extraction.invocations[0].endpoint, "items/1");
}

#[test]
fn test_extract_project_output_is_sorted_regardless_of_threads() {
    let dir = TempDir::new().unwrap();
    for i in 0..12 {
        let source = format!(
            "class C{i} {{\n  void A{i}() {{ Http.POST_JWT(\"b/{i}\"); }}\n  void B{i}() {{ Http.GET_JWT(\"a/{i}\"); A{i}(); }}\n}}\n"
        );
        write(&dir, &format!("Src/C{:02}.cs", i), source.as_bytes());
    }
    let files = collect_files(&config_for(&dir)).unwrap();
    let api = config_for(&dir).api_surface;

    let single = extract_project(&files.sources, &api, 1).unwrap();
    let multi = extract_project(&files.sources, &api, 5).unwrap();
    assert_eq!(single.invocations.len(), 24);
    assert_eq!(single.invocations, multi.invocations);
    assert_eq!(single.index.edge_count(), multi.index.edge_count());

    let keys: Vec<_> = single.invocations.iter().map(|i| (i.file.clone(), i.line)).collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
}

#[test]
fn test_merge_chunk_results_sums_workers() {
    let joined = vec![
        Ok(Ok(ChunkStats { call_sites: 3, skipped: 1, lossy: 0 })),
        Ok(Ok(ChunkStats { call_sites: 4, skipped: 0, lossy: 2 })),
    ];
    let total = merge_chunk_results(joined).unwrap();
    assert_eq!((total.call_sites, total.skipped, total.lossy), (7, 1, 2));
}

#[test]
fn test_merge_chunk_results_fails_on_panicked_worker() {
    let panicked = std::thread::spawn(|| -> Result<ChunkStats, TraceError> {
        panic!("parser blew up");
    }).join();
    assert!(panicked.is_err());

    let joined = vec![Ok(Ok(ChunkStats { call_sites: 5, skipped: 0, lossy: 0 })), panicked];
    match merge_chunk_results(joined) {
        Err(TraceError::WorkerPanicked { worker, message }) => {
            assert_eq!(worker, 1);
            assert_eq!(message, "parser blew up");
        }
        Err(other) => panic!("expected WorkerPanicked, got {:?}", other),
        Ok(_) => panic!("a panicked worker must fail the run"),
    }
}

#[test]
fn test_merge_chunk_results_propagates_worker_error() {
    let joined = vec![Ok(Err(TraceError::Grammar("bad grammar".to_string())))];
    assert!(matches!(merge_chunk_results(joined), Err(TraceError::Grammar(_))));
}

// ─── Full pipeline ──────────────────────────────────────────────────

#[test]
fn test_run_trace_end_to_end() {
    let dir = orders_project();
    let report = run_trace(&config_for(&dir)).unwrap();

    assert_eq!(report.invocations.len(), 1);
    let traced = &report.invocations[0];
    assert_eq!(traced.invocation.api_method, "GET_JWT");
    assert_eq!(traced.invocation.endpoint, "https://api/x");
    assert_eq!(traced.invocation.immediate.name, "Helper");
    assert_eq!(traced.top_level.name, "Submit_Click");
    assert!(traced.top_level.file.ends_with("Pages/Orders.aspx.cs"));
    assert_eq!(
        traced.chain.iter().map(|m| m.name.as_str()).collect::<Vec<_>>(),
        vec!["Helper", "Submit_Click"]
    );
    assert!(!traced.cycle);

    let binding = traced.ui_binding.as_ref().expect("button should be bound");
    assert_eq!(binding.text, "Go");
    assert!(binding.file.ends_with("Pages/Orders.aspx"));

    assert_eq!(report.stats.source_files, 1);
    assert_eq!(report.stats.markup_files, 1);
    assert_eq!(report.stats.api_invocations, 1);
    assert_eq!(report.stats.ui_bindings_found, 1);
}

#[test]
fn test_run_trace_text_report() {
    let dir = orders_project();
    let report = run_trace(&config_for(&dir)).unwrap();
    let text = render_text(&report, false);

    assert!(text.starts_with(DIVIDER));
    assert_eq!(text.matches(DIVIDER).count(), 1);
    assert!(text.contains("API method: GET_JWT\n"));
    assert!(text.contains("Endpoint: https://api/x\n"));
    assert!(text.contains("Immediate method: Helper (File: "));
    assert!(text.contains("Top-level method: Submit_Click (File: "));
    assert!(text.contains("Control text: Go\n"));
    assert!(!text.contains(NO_BINDING));
}

#[test]
fn test_run_trace_without_markup_reports_no_binding() {
    let dir = TempDir::new().unwrap();
    write(&dir, "Jobs/Sync.cs", b"class Sync { void Run() { Http.PUT_JWT(); } }");

    let report = run_trace(&config_for(&dir)).unwrap();
    assert_eq!(report.invocations.len(), 1);
    let traced = &report.invocations[0];
    assert_eq!(traced.invocation.endpoint, NO_PARAMETER);
    assert_eq!(traced.top_level, traced.invocation.immediate);
    assert!(traced.ui_binding.is_none());
    assert!(render_text(&report, false).contains(NO_BINDING));
}

#[test]
fn test_run_trace_cycle_terminates() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "Loop.cs",
        br#"class Loop {
    void A() { B(); Http.GET_JWT("loop"); }
    void B() { A(); }
}"#,
    );

    let report = run_trace(&config_for(&dir)).unwrap();
    assert_eq!(report.invocations.len(), 1);
    let traced = &report.invocations[0];
    assert!(traced.cycle);
    // The re-visited method is reported.
    assert_eq!(traced.top_level.name, "A");
    assert_eq!(traced.chain.len(), 2);
}

#[test]
fn test_run_trace_is_idempotent() {
    let dir = orders_project();
    write(&dir, "Pages/Admin.aspx.cs", br#"
public partial class Admin : System.Web.UI.Page
{
    protected void Purge_Click(object sender, EventArgs e) { _svc.Purge(); }
}
public class AdminService
{
    public void Purge() { var route = "admin/purge"; Http.DELETE_JWT(route); }
}
"#);
    write(&dir, "Pages/Admin.aspx", br#"<asp:LinkButton OnClick="Purge_Click" runat="server" Text="Purge" />"#);

    let config = config_for(&dir);
    let first = run_trace(&config).unwrap();
    let second = run_trace(&config).unwrap();
    assert_eq!(first.invocations, second.invocations);
    assert_eq!(render_json(&first).unwrap(), render_json(&second).unwrap());

    let purge = first.invocations.iter()
        .find(|t| t.invocation.api_method == "DELETE_JWT")
        .unwrap();
    assert_eq!(purge.invocation.endpoint, "admin/purge");
    assert_eq!(purge.top_level.name, "Purge_Click");
    let binding = purge.ui_binding.as_ref().unwrap();
    assert!(binding.text.starts_with("<asp:LinkButton"));
}

#[test]
fn test_run_trace_rejects_empty_api_surface() {
    let dir = orders_project();
    let mut config = config_for(&dir);
    config.api_surface.clear();
    assert!(matches!(run_trace(&config), Err(TraceError::InvalidArgs(_))));
}

#[test]
fn test_run_trace_and_write_json_report() {
    let dir = orders_project();
    let report = run_trace(&config_for(&dir)).unwrap();
    let out_dir = TempDir::new().unwrap();
    let output = out_dir.path().join("report.json");

    write_report(&output, &render(&report, ReportFormat::Json, false).unwrap()).unwrap();
    let parsed: TraceReport = serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(parsed.invocations, report.invocations);
    assert_eq!(parsed.stats, report.stats);
}
