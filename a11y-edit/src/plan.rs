//! Edit planner.
//!
//! Planning never touches text. Each function inspects the immutable
//! [`SyntaxTree`] and returns the [`Modification`]s that, rendered by
//! [`crate::surgical::apply`], produce the requested source change.

use tracing::debug;

use crate::config::{GenerationConfig, MainRoleConfig, PageTitleConfig};
use crate::error::{EditError, Result};
use crate::escape;
use crate::locate;
use crate::marker::AttributeKind;
use crate::syntax::{NodeId, NodeKind, StmtShape, SyntaxTree};

/// Code lines of one insertion, before indentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snippet {
    pub lines: Vec<String>,
}

impl Snippet {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }
}

/// One planned change, expressed against nodes of the snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modification {
    /// Whole lines above the anchor's first line
    InsertBefore { anchor: NodeId, snippet: Snippet },
    /// Whole lines below the anchor's last line
    InsertAfter { anchor: NodeId, snippet: Snippet },
    /// Last statement of the block, ahead of any tail expression
    InsertAtEndOfBlock { block: NodeId, snippet: Snippet },
    Replace { node: NodeId, text: String },
    Remove { node: NodeId },
    AddImport { path: String },
}

/// Plan a generated `RECEIVER.METHOD(VALUE);` statement for `kind`.
///
/// With an `existing` marked statement the call is rewritten in place and its
/// marker stays. Otherwise the anchor's shape decides where the marked call
/// goes.
pub fn plan_attribute(
    tree: &SyntaxTree,
    kind: AttributeKind,
    anchor: NodeId,
    receiver: Option<&str>,
    existing: Option<NodeId>,
    value: &str,
    generation: &GenerationConfig,
) -> Result<Vec<Modification>> {
    let argument = generation.argument(kind, value);

    if let Some(stmt) = existing {
        // keep whatever target the marked call already has
        let target = match tree.node(stmt).stmt().map(|s| &s.shape) {
            Some(StmtShape::Call {
                receiver: Some(target),
                ..
            }) => target.clone(),
            _ => resolve_receiver(tree, anchor, receiver)?,
        };
        let text = format!("{}.{}({});", target, kind.method_name(), argument);
        debug!("Replacing marked {} call at line {}", kind, tree.node(stmt).start_line);
        return Ok(vec![Modification::Replace { node: stmt, text }]);
    }

    let target = resolve_receiver(tree, anchor, receiver)?;
    let snippet = Snippet::new([
        kind.marker().to_string(),
        format!("{}.{}({});", target, kind.method_name(), argument),
    ]);

    let node = tree.node(anchor);
    let modification = match &node.kind {
        NodeKind::Fn { body, .. } => Modification::InsertAtEndOfBlock {
            block: *body,
            snippet,
        },
        NodeKind::Stmt(info) => match info.shape {
            StmtShape::Local { .. } | StmtShape::Assign { .. } => {
                Modification::InsertAfter { anchor, snippet }
            }
            _ => Modification::InsertBefore { anchor, snippet },
        },
        _ => return Err(EditError::UnsupportedAnchorShape(node.label())),
    };

    debug!("Planned new {} call on `{}` near {}", kind, target, node.label());
    Ok(vec![modification])
}

fn resolve_receiver(tree: &SyntaxTree, anchor: NodeId, receiver: Option<&str>) -> Result<String> {
    match receiver {
        Some(receiver) => Ok(receiver.to_string()),
        None => locate::implicit_receiver(tree, anchor)
            .ok_or_else(|| EditError::UnsupportedAnchorShape(tree.node(anchor).label())),
    }
}

/// Replace the page-title attribute of `declaration` with one carrying `value`.
pub fn plan_page_title(
    tree: &SyntaxTree,
    declaration: NodeId,
    value: &str,
    config: &PageTitleConfig,
) -> Result<Vec<Modification>> {
    let node = tree.node(declaration);
    let NodeKind::Struct { attributes, .. } = &node.kind else {
        return Err(EditError::UnsupportedAnchorShape(node.label()));
    };

    let name = config.attribute_name();
    let mut mods: Vec<Modification> = attributes
        .iter()
        .filter(|id| matches!(&tree.node(**id).kind, NodeKind::Attribute { name: n } if n == name))
        .map(|id| Modification::Remove { node: *id })
        .collect();
    debug!("Removing {} existing #[{}] attribute(s)", mods.len(), name);

    if !tree.imports().imports(&config.import) {
        mods.push(Modification::AddImport {
            path: config.import.clone(),
        });
    }

    mods.push(Modification::InsertBefore {
        anchor: declaration,
        snippet: Snippet::new([format!("#[{}({})]", name, escape::literal(value))]),
    });
    Ok(mods)
}

/// Give the view the `main` landmark role.
///
/// A view wrapping a generic container gets the semantic container instead;
/// any other view gets a role attribute set in its constructor. Both branches
/// are no-ops when the role is already there.
pub fn plan_main_role(
    tree: &SyntaxTree,
    declaration: NodeId,
    constructor: Option<NodeId>,
    config: &MainRoleConfig,
) -> Result<Vec<Modification>> {
    let node = tree.node(declaration);
    let NodeKind::Struct { name, base, .. } = &node.kind else {
        return Err(EditError::UnsupportedAnchorShape(node.label()));
    };

    if let Some(base) = base {
        if let NodeKind::TypeRef { segments } = &tree.node(*base).kind {
            if tree.imports().resolves_to(segments, &config.import) {
                debug!("{} already wraps {}", name, config.import);
                return Ok(Vec::new());
            }
            let simple = segments.last().map(String::as_str).unwrap_or_default();
            if config.generic_types.iter().any(|g| g == simple) {
                let mut mods = Vec::new();
                if !tree.imports().imports(&config.import) {
                    mods.push(Modification::AddImport {
                        path: config.import.clone(),
                    });
                }
                mods.push(Modification::Replace {
                    node: *base,
                    text: config.semantic_type.clone(),
                });
                return Ok(mods);
            }
        }
    }

    let constructor = constructor.ok_or_else(|| {
        EditError::UnsupportedAnchorShape(format!("{} has no constructor", name))
    })?;
    let NodeKind::Fn { body, .. } = &tree.node(constructor).kind else {
        return Err(EditError::UnsupportedAnchorShape(tree.node(constructor).label()));
    };

    if has_main_role(tree, constructor) {
        debug!("{} already sets the main role", name);
        return Ok(Vec::new());
    }

    let receiver = locate::implicit_receiver(tree, constructor)
        .ok_or_else(|| EditError::UnsupportedAnchorShape(tree.node(constructor).label()))?;
    Ok(vec![Modification::InsertAtEndOfBlock {
        block: *body,
        snippet: Snippet::new([format!(
            "{}.element().set_attribute(\"role\", \"main\");",
            receiver
        )]),
    }])
}

fn has_main_role(tree: &SyntaxTree, func: NodeId) -> bool {
    tree.descendants(func).any(|(_, n)| {
        matches!(
            n.stmt().map(|s| &s.shape),
            Some(StmtShape::Call { method, args, .. })
                if method == "set_attribute" && args.len() == 2 && args[0] == "\"role\"" && args[1] == "\"main\""
        )
    })
}
