//! CLI argument structs for all subcommands.

use clap::{Args, Parser};

use api_trace::config::{
    parse_extensions, parse_list, TraceConfig, DEFAULT_EVENT_ATTRIBUTES,
    DEFAULT_MARKUP_EXTENSIONS, DEFAULT_SOURCE_EXTENSIONS,
};

/// Options shared by every command that scans a project tree.
#[derive(Args, Debug, Clone)]
pub struct ScanArgs {
    /// Root directory of the web project (scanned recursively)
    #[arg(short, long, default_value = ".")]
    pub dir: String,

    /// API-calling method names, comma-separated.
    /// Default: GET_JWT,POST_JWT,PUT_JWT,PATCH_JWT,DELETE_JWT,ObtenhaBearerToken
    #[arg(short, long)]
    pub api: Option<String>,

    /// Source file extensions, comma-separated
    #[arg(long, default_value = DEFAULT_SOURCE_EXTENSIONS)]
    pub source_ext: String,

    /// Markup file extensions, comma-separated (e.g. "aspx,ascx,master")
    #[arg(long, default_value = DEFAULT_MARKUP_EXTENSIONS)]
    pub markup_ext: String,

    /// Markup event-binding attributes matched against handler names, comma-separated
    #[arg(long, default_value = DEFAULT_EVENT_ATTRIBUTES)]
    pub event_attr: String,

    /// Number of parallel parsing threads. Each thread gets its own
    /// tree-sitter parser instance. 0 = auto-detect CPU cores.
    #[arg(short, long, default_value = "0")]
    pub threads: usize,

    /// Skip files excluded by .gitignore/.ignore (default: scan everything)
    #[arg(long)]
    pub respect_ignore: bool,
}

impl ScanArgs {
    pub fn to_config(&self) -> TraceConfig {
        let mut config = TraceConfig::new(&self.dir);
        if let Some(api) = &self.api {
            config.api_surface = parse_list(api);
        }
        config.source_exts = parse_extensions(&self.source_ext);
        config.markup_exts = parse_extensions(&self.markup_ext);
        config.event_attrs = parse_list(&self.event_attr);
        config.threads = self.threads;
        config.respect_ignore_files = self.respect_ignore;
        config
    }
}

#[derive(Parser, Debug)]
#[command(after_long_help = r#"WHAT IT DOES:
  Parses every C# source file under --dir, records which method calls which
  (by method name), and finds every call to one of the --api methods. For each
  such call it reports the endpoint argument, the method containing the call,
  the outermost caller reached by walking the caller graph upward, and the
  markup control (button, link, ...) whose OnClick is bound to that caller.

EXAMPLES:
  api-trace trace -d C:\Repos\Portal
  api-trace trace -d ./Portal --api GET_JWT,POST_JWT --format json
  api-trace trace -d ./Portal --markup-ext aspx,ascx --event-attr OnClick,OnCommand --show-chain"#)]
pub struct TraceArgs {
    #[command(flatten)]
    pub scan: ScanArgs,

    /// Report file path (default: <dir>/api-trace-report.txt, or .json with --format json)
    #[arg(short, long)]
    pub output: Option<String>,

    /// Report format: text or json
    #[arg(short, long, default_value = "text")]
    pub format: String,

    /// Include the full caller chain in text reports
    #[arg(long)]
    pub show_chain: bool,
}

#[derive(Parser, Debug)]
pub struct CallersArgs {
    /// Method name whose callers to list
    pub method: String,

    #[command(flatten)]
    pub scan: ScanArgs,
}
