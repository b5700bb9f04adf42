//! Site locator: from a line number to the syntax node an edit hangs off.

use std::cmp::Reverse;

use crate::error::{EditError, Result};
use crate::syntax::{NodeId, NodeKind, StmtShape, SyntaxTree};

/// Innermost statement or item covering `line`.
///
/// The smallest covering span wins; on equal spans the deeper node does.
/// There is no fallback to nearby lines: a stale line is an error.
pub fn find_anchor(tree: &SyntaxTree, line: usize) -> Result<NodeId> {
    tree.nodes()
        .filter(|(_, n)| {
            matches!(
                n.kind,
                NodeKind::Stmt(_)
                    | NodeKind::Fn { .. }
                    | NodeKind::Struct { .. }
                    | NodeKind::Impl { .. }
                    | NodeKind::Use
            ) && n.covers_line(line)
        })
        .min_by_key(|(_, n)| (n.range.len(), Reverse(n.depth)))
        .map(|(id, _)| id)
        .ok_or_else(|| EditError::site_not_found(tree.path(), line, "statement"))
}

/// Variable the statement at `line` binds or assigns, if any.
pub fn find_receiver(tree: &SyntaxTree, line: usize) -> Option<String> {
    let (_, stmt) = tree
        .nodes()
        .filter(|(_, n)| n.stmt().is_some() && n.covers_line(line))
        .min_by_key(|(_, n)| (n.range.len(), Reverse(n.depth)))?;

    match &stmt.stmt()?.shape {
        StmtShape::Local { binding } => binding.clone(),
        StmtShape::Assign { target } => Some(target.clone()),
        _ => None,
    }
}

/// Outermost `impl`, `fn` or `struct` enclosing `node` (or `node` itself).
pub fn declaration_scope(tree: &SyntaxTree, node: NodeId) -> NodeId {
    std::iter::once(node)
        .chain(tree.ancestors(node))
        .filter(|id| {
            matches!(
                tree.node(*id).kind,
                NodeKind::Impl { .. } | NodeKind::Fn { .. } | NodeKind::Struct { .. }
            )
        })
        .last()
        .unwrap_or(node)
}

/// The `struct` declaring the view type `simple_name`.
pub fn find_declaration(tree: &SyntaxTree, simple_name: &str) -> Result<NodeId> {
    let structs: Vec<(NodeId, &str)> = tree
        .nodes()
        .filter_map(|(id, n)| match &n.kind {
            NodeKind::Struct { name, .. } => Some((id, name.as_str())),
            _ => None,
        })
        .collect();

    if let Some((id, _)) = structs.iter().find(|(_, name)| *name == simple_name) {
        return Ok(*id);
    }

    let hint = structs
        .iter()
        .map(|(_, name)| (strsim::levenshtein(name, simple_name), *name))
        .filter(|(distance, _)| *distance <= 3)
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, name)| format!(" (did you mean `{}`?)", name))
        .unwrap_or_default();

    Err(EditError::SiteNotFound {
        path: tree.path().to_path_buf(),
        line: 0,
        what: format!("declaration of `{}`", simple_name),
        hint,
    })
}

/// The function that builds an instance of `simple_name`.
///
/// Looks at inherent impls only: `fn new` first, then the first function
/// returning `Self`, then the first method taking `self`.
pub fn find_constructor(tree: &SyntaxTree, simple_name: &str) -> Option<NodeId> {
    let mut candidates = Vec::new();
    for (impl_id, node) in tree.nodes() {
        let NodeKind::Impl { self_ty, is_trait } = &node.kind else {
            continue;
        };
        if *is_trait || self_ty != simple_name {
            continue;
        }
        for (id, member) in tree.descendants(impl_id) {
            if member.parent != Some(impl_id) {
                continue;
            }
            if let NodeKind::Fn {
                name,
                has_receiver,
                returns_self,
                ..
            } = &member.kind
            {
                candidates.push((id, name.as_str(), *has_receiver, *returns_self));
            }
        }
    }

    candidates
        .iter()
        .find(|(_, name, _, _)| *name == "new")
        .or_else(|| candidates.iter().find(|(_, _, _, returns_self)| *returns_self))
        .or_else(|| candidates.iter().find(|(_, _, has_receiver, _)| *has_receiver))
        .map(|(id, _, _, _)| *id)
}

/// Receiver for a statement generated inside the function enclosing `node`.
///
/// `self` in methods; in constructors, the binding the body returns.
pub fn implicit_receiver(tree: &SyntaxTree, node: NodeId) -> Option<String> {
    let func = std::iter::once(node)
        .chain(tree.ancestors(node))
        .find(|id| matches!(tree.node(*id).kind, NodeKind::Fn { .. }))?;

    let NodeKind::Fn {
        has_receiver, body, ..
    } = &tree.node(func).kind
    else {
        return None;
    };
    if *has_receiver {
        return Some("self".to_string());
    }

    let NodeKind::Block { tail: Some(tail), .. } = &tree.node(*body).kind else {
        return None;
    };
    let text = tree.slice(tree.node(*tail).range).trim();
    is_identifier(text).then(|| text.to_string())
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    text != "_" && chars.all(|c| c.is_alphanumeric() || c == '_')
}
