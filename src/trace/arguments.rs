//! Argument value resolution: recover a readable value for an API call
//! argument from the enclosing method body.
//!
//! Single-hop and syntactic only. A local variable is followed to its first
//! initialized declaration in the same method; nothing crosses a method
//! boundary and nothing is evaluated.

use tree_sitter::Node;

use super::parser_csharp::{find_child_by_kind, node_text};

/// Reported when the API call has no arguments.
pub const NO_PARAMETER: &str = "no parameter";

/// Resolve `expr` (an argument expression) using `method` (the enclosing
/// `method_declaration`) for local variable lookups.
pub fn resolve_argument_value(expr: Node, method: Node, source: &[u8]) -> String {
    match expr.kind() {
        kind if is_literal_kind(kind) => literal_value(node_text(expr, source)),
        "identifier" => {
            let name = node_text(expr, source);
            match find_local_initializer(method, name, source) {
                Some(init) if is_literal_kind(init.kind()) => literal_value(node_text(init, source)),
                Some(init) => node_text(init, source).to_string(),
                None => format!("Variable: {}", name),
            }
        }
        // Concatenations and everything else are reported as written.
        _ => node_text(expr, source).to_string(),
    }
}

pub(crate) fn is_literal_kind(kind: &str) -> bool {
    matches!(
        kind,
        "string_literal"
            | "verbatim_string_literal"
            | "raw_string_literal"
            | "character_literal"
            | "integer_literal"
            | "real_literal"
            | "boolean_literal"
            | "null_literal"
    )
}

/// First initializer of a variable declarator named `name` anywhere inside
/// `node`, in document order.
fn find_local_initializer<'a>(node: Node<'a>, name: &str, source: &[u8]) -> Option<Node<'a>> {
    if node.kind() == "variable_declarator" {
        let declared = node.child_by_field_name("name")
            .or_else(|| node.named_child(0))
            .map(|n| node_text(n, source));
        if declared == Some(name) {
            if let Some(init) = declarator_initializer(node) {
                return Some(init);
            }
        }
    }

    for i in 0..node.child_count() {
        if let Some(child) = node.child(i) {
            if let Some(found) = find_local_initializer(child, name, source) {
                return Some(found);
            }
        }
    }
    None
}

/// The initializer expression of a `variable_declarator`.
///
/// Older grammars wrap it in `equals_value_clause`; tree-sitter-c-sharp 0.23
/// puts the expression directly after the `=` token.
fn declarator_initializer(declarator: Node) -> Option<Node> {
    if let Some(clause) = find_child_by_kind(declarator, "equals_value_clause") {
        return clause.named_child(0);
    }

    let mut after_equals = false;
    for i in 0..declarator.child_count() {
        let child = declarator.child(i)?;
        if child.kind() == "=" {
            after_equals = true;
        } else if after_equals && child.is_named() {
            return Some(child);
        }
    }
    None
}

// ─── Literal value text ─────────────────────────────────────────────

/// Value text of a literal token: quotes stripped and escapes decoded for
/// strings and chars, everything else verbatim.
pub(crate) fn literal_value(text: &str) -> String {
    let text = text.trim();

    if let Some(inner) = text.strip_prefix("@\"").and_then(|t| t.strip_suffix('"')) {
        return inner.replace("\"\"", "\"");
    }
    if text.starts_with("\"\"\"") {
        let quotes = text.chars().take_while(|&c| c == '"').count();
        let inner = &text[quotes..];
        return inner.trim_end_matches('"').trim().to_string();
    }
    let text = text.strip_suffix("u8").unwrap_or(text);
    if let Some(inner) = text.strip_prefix('"').and_then(|t| t.strip_suffix('"')) {
        return unescape(inner);
    }
    if let Some(inner) = text.strip_prefix('\'').and_then(|t| t.strip_suffix('\'')) {
        return unescape(inner);
    }
    text.to_string()
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some('u') => {
                let hex: String = chars.clone().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) if hex.len() == 4 => {
                        out.push(decoded);
                        for _ in 0..4 {
                            chars.next();
                        }
                    }
                    _ => out.push_str("\\u"),
                }
            }
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
