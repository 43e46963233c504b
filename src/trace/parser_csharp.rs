//! C# AST extraction using tree-sitter: caller edges and API-surface call sites.

use std::collections::HashSet;

use tree_sitter::Node;

use crate::TraceError;

use super::arguments::{resolve_argument_value, NO_PARAMETER};
use super::graph::CallerGraph;
use super::types::{ApiInvocation, MethodIdentity};

/// What one file contributed besides its caller edges.
#[derive(Debug, Default)]
pub struct FileExtraction {
    /// Named call sites found inside method declarations
    pub call_sites: usize,
    pub invocations: Vec<ApiInvocation>,
}

/// Create a parser loaded with the C# grammar.
pub fn new_csharp_parser() -> Result<tree_sitter::Parser, TraceError> {
    let mut parser = tree_sitter::Parser::new();
    parser.set_language(&tree_sitter_c_sharp::LANGUAGE.into())
        .map_err(|e| TraceError::Grammar(e.to_string()))?;
    Ok(parser)
}

// ─── Main entry point ───────────────────────────────────────────────

/// Parse one C# file, add a caller edge for every named call inside a
/// method declaration, and return the API-surface invocations.
///
/// Returns `None` when tree-sitter produces no tree; the caller skips the file.
pub fn extract_file(
    parser: &mut tree_sitter::Parser,
    file_path: &str,
    source: &str,
    api_surface: &HashSet<String>,
    graph: &CallerGraph,
) -> Option<FileExtraction> {
    let tree = parser.parse(source, None)?;
    let root = tree.root_node();
    if root.has_error() {
        tracing::debug!(file = %file_path, "syntax errors in file, extracting what parsed");
    }

    let mut ctx = ExtractContext {
        file_path,
        source: source.as_bytes(),
        api_surface,
        graph,
        out: FileExtraction::default(),
    };
    walk_for_invocations(root, None, &mut ctx);
    Some(ctx.out)
}

struct ExtractContext<'s> {
    file_path: &'s str,
    source: &'s [u8],
    api_surface: &'s HashSet<String>,
    graph: &'s CallerGraph,
    out: FileExtraction,
}

fn walk_for_invocations<'a>(node: Node<'a>, enclosing: Option<Node<'a>>, ctx: &mut ExtractContext) {
    let enclosing = if node.kind() == "method_declaration" { Some(node) } else { enclosing };

    if node.kind() == "invocation_expression" {
        if let Some(method) = enclosing {
            handle_invocation(node, method, ctx);
        }
    }

    // Recurse into all children, including the callee expression, so chained
    // calls like a.B().C() yield both B and C.
    for i in 0..node.child_count() {
        if let Some(child) = node.child(i) {
            walk_for_invocations(child, enclosing, ctx);
        }
    }
}

fn handle_invocation(node: Node, method: Node, ctx: &mut ExtractContext) {
    let Some(function) = find_child_by_field(node, "function").or_else(|| node.child(0)) else {
        return;
    };
    let Some(invoked) = call_target_name(function, ctx.source) else {
        return;
    };
    let Some(method_name) = find_child_by_field(method, "name").map(|n| node_text(n, ctx.source)) else {
        return;
    };

    let caller = MethodIdentity::new(method_name, ctx.file_path);
    ctx.graph.add_edge(&invoked, caller.clone());
    ctx.out.call_sites += 1;

    if !ctx.api_surface.contains(&invoked) {
        return;
    }

    let endpoint = match first_argument_expression(node) {
        Some(expr) => resolve_argument_value(expr, method, ctx.source),
        None => NO_PARAMETER.to_string(),
    };
    let pos = node.start_position();
    ctx.out.invocations.push(ApiInvocation {
        file: ctx.file_path.to_string(),
        line: pos.row as u32 + 1,
        column: pos.column as u32 + 1,
        api_method: invoked,
        endpoint,
        immediate: caller,
    });
}

/// Name of the method invoked by `receiver.Name(...)`, `receiver?.Name(...)`
/// or an unqualified `Name(...)` (an implicit `this.` receiver).
fn call_target_name(function: Node, source: &[u8]) -> Option<String> {
    match function.kind() {
        "identifier" | "generic_name" => Some(extract_method_name_from_name_node(function, source)),
        "member_access_expression" | "member_binding_expression" => {
            let name_node = find_child_by_field(function, "name")?;
            Some(extract_method_name_from_name_node(name_node, source))
        }
        "conditional_access_expression" => {
            let binding = find_child_by_kind(function, "member_binding_expression")?;
            call_target_name(binding, source)
        }
        _ => None,
    }
}

/// Extract the method name from a name node, stripping type arguments from
/// `generic_name` (`Get<T>` → `Get`).
fn extract_method_name_from_name_node(name_node: Node, source: &[u8]) -> String {
    if name_node.kind() == "generic_name" {
        if let Some(id_node) = name_node.child(0) {
            if id_node.kind() == "identifier" {
                return node_text(id_node, source).to_string();
            }
        }
        let text = node_text(name_node, source);
        text.split('<').next().unwrap_or(text).to_string()
    } else {
        node_text(name_node, source).to_string()
    }
}

/// Expression of the first argument, skipping `name:` labels and
/// `ref`/`out`/`in` modifiers.
fn first_argument_expression(invocation: Node) -> Option<Node> {
    let args = find_child_by_field(invocation, "arguments")
        .or_else(|| find_child_by_kind(invocation, "argument_list"))?;
    let argument = find_child_by_kind(args, "argument")?;
    let count = argument.named_child_count();
    if count == 0 {
        return None;
    }
    argument.named_child(count - 1)
}

// ─── AST helpers ────────────────────────────────────────────────────

pub(crate) fn node_text<'a>(node: Node, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or("")
}

pub(crate) fn find_child_by_kind<'a>(node: Node<'a>, kind: &str) -> Option<Node<'a>> {
    for i in 0..node.child_count() {
        if let Some(child) = node.child(i) {
            if child.kind() == kind {
                return Some(child);
            }
        }
    }
    None
}

fn find_child_by_field<'a>(node: Node<'a>, field: &str) -> Option<Node<'a>> {
    node.child_by_field_name(field)
}
