//! Generated-code markers.
//!
//! Every statement the engine generates is preceded by a marker comment naming
//! its attribute kind. A later edit of the same kind on the same receiver finds
//! the marked statement and replaces it instead of adding another one.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::session::Capability;
use crate::syntax::{NodeId, NodeKind, StmtShape, SyntaxTree};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttributeKind {
    Label,
    AriaLabel,
    Title,
    AltText,
}

impl AttributeKind {
    pub fn all() -> [AttributeKind; 4] {
        [
            AttributeKind::Label,
            AttributeKind::AriaLabel,
            AttributeKind::Title,
            AttributeKind::AltText,
        ]
    }

    pub fn method_name(self) -> &'static str {
        match self {
            AttributeKind::Label => "set_label",
            AttributeKind::AriaLabel => "set_aria_label",
            AttributeKind::Title => "set_title",
            AttributeKind::AltText => "set_alt",
        }
    }

    pub fn marker(self) -> &'static str {
        match self {
            AttributeKind::Label => "// <a11y-edit:label>",
            AttributeKind::AriaLabel => "// <a11y-edit:aria-label>",
            AttributeKind::Title => "// <a11y-edit:title>",
            AttributeKind::AltText => "// <a11y-edit:alt-text>",
        }
    }

    pub fn required_capability(self) -> Capability {
        match self {
            AttributeKind::Label => Capability::Label,
            AttributeKind::AriaLabel => Capability::AriaLabel,
            AttributeKind::Title => Capability::Element,
            AttributeKind::AltText => Capability::ImageAlt,
        }
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttributeKind::Label => "label",
            AttributeKind::AriaLabel => "aria-label",
            AttributeKind::Title => "title",
            AttributeKind::AltText => "alt-text",
        };
        f.write_str(name)
    }
}

/// First marked call of `kind` inside `scope`, in source order.
///
/// When `receiver` is given, the call target must equal it (whitespace
/// removed). With no receiver any target matches, so an edit anchored on a
/// statement that binds nothing takes over the first marked call of `kind` in
/// the scope, whichever component that call was generated for.
pub fn find_existing(
    tree: &SyntaxTree,
    scope: NodeId,
    kind: AttributeKind,
    receiver: Option<&str>,
) -> Option<NodeId> {
    let wanted = receiver.map(compact);

    tree.descendants(scope)
        .find(|(_, node)| {
            let NodeKind::Stmt(info) = &node.kind else {
                return false;
            };
            let StmtShape::Call {
                receiver: target,
                method,
                ..
            } = &info.shape
            else {
                return false;
            };

            info.comment_above.as_deref() == Some(kind.marker())
                && method == kind.method_name()
                && match &wanted {
                    Some(wanted) => target.as_deref() == Some(wanted.as_str()),
                    None => true,
                }
        })
        .map(|(id, _)| id)
}

/// Every marked call in `scope`, for diagnostics.
pub fn markers_in(tree: &SyntaxTree, scope: NodeId) -> Vec<(AttributeKind, NodeId)> {
    let mut found = Vec::new();
    for (id, node) in tree.descendants(scope) {
        let Some(comment) = node.stmt().and_then(|s| s.comment_above.as_deref()) else {
            continue;
        };
        if let Some(kind) = AttributeKind::all().into_iter().find(|k| k.marker() == comment) {
            found.push((kind, id));
        }
    }
    found
}

fn compact(text: &str) -> String {
    text.split_whitespace().collect()
}
