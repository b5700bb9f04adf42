/// Surgical rendering of planned modifications.
///
/// Every [`Modification`] is resolved against the immutable snapshot into a
/// byte-range [`Replacement`]; the replacements are then applied to the
/// original text in one pass. Bytes outside the replaced ranges are copied
/// through untouched, so comments, blank lines, line endings and a leading
/// byte-order mark all survive the edit.
use std::cmp::Ordering;
use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{EditError, Result};
use crate::location::LineRemap;
use crate::plan::{Modification, Snippet};
use crate::syntax::{NodeId, NodeKind, SyntaxTree};

/// A single textual replacement of `start..end` (byte offsets).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub start: usize,
    pub end: usize,
    pub text: String,
    /// Plan order, breaks ties between insertions at the same offset
    pub seq: usize,
}

impl Replacement {
    pub fn new(start: usize, end: usize, text: impl Into<String>, seq: usize) -> Self {
        Self {
            start,
            end,
            text: text.into(),
            seq,
        }
    }

    pub fn insert(at: usize, text: impl Into<String>, seq: usize) -> Self {
        Self::new(at, at, text, seq)
    }
}

impl Ord for Replacement {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.start, self.end, self.seq).cmp(&(other.start, other.end, other.seq))
    }
}

impl PartialOrd for Replacement {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Result of rendering a modification list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    pub text: String,
    /// Newlines added minus newlines removed
    pub line_delta: isize,
    pub remap: LineRemap,
}

impl Patch {
    pub fn changed(&self, original: &str) -> bool {
        self.text != original
    }
}

/// Apply `replacements` to `source`.
///
/// Replacements are sorted by `(start, end, seq)`; any overlap is an error.
pub fn render(source: &str, mut replacements: Vec<Replacement>) -> Result<String> {
    if replacements.is_empty() {
        return Ok(source.to_string());
    }

    replacements.sort();
    check_overlaps(&replacements)?;

    let mut result = String::with_capacity(source.len());
    let mut cursor = 0;
    for replacement in &replacements {
        result.push_str(&source[cursor..replacement.start]);
        result.push_str(&replacement.text);
        cursor = replacement.end;
    }
    result.push_str(&source[cursor..]);
    Ok(result)
}

fn check_overlaps(sorted: &[Replacement]) -> Result<()> {
    for pair in sorted.windows(2) {
        if pair[1].start < pair[0].end {
            return Err(EditError::ConflictingModifications {
                first: pair[0].start,
                second: pair[1].start,
            });
        }
    }
    Ok(())
}

/// Render `mods` against `tree`.
pub fn apply(tree: &SyntaxTree, mods: &[Modification]) -> Result<Patch> {
    let mut replacements = Vec::with_capacity(mods.len());
    let mut imports: Vec<&str> = Vec::new();

    for (seq, modification) in mods.iter().enumerate() {
        if let Modification::AddImport { path } = modification {
            if imports.contains(&path.as_str()) {
                continue;
            }
            imports.push(path);
        }
        replacements.push(resolve(tree, modification, seq));
    }

    replacements.sort();
    check_overlaps(&replacements)?;

    let source = tree.text();
    let mut remap = LineRemap::new(tree.path());
    let mut line_delta = 0isize;
    for r in &replacements {
        let delta = newlines(&r.text) - newlines(&source[r.start..r.end]);
        remap.push(first_line_after(tree, r.end), delta);
        line_delta += delta;
    }

    let text = render(source, replacements)?;
    debug!(
        "Rendered {} modification(s) on {}: {:+} line(s)",
        mods.len(),
        tree.path().display(),
        line_delta
    );

    Ok(Patch {
        text,
        line_delta,
        remap,
    })
}

fn newlines(text: &str) -> isize {
    text.bytes().filter(|b| *b == b'\n').count() as isize
}

/// First old line that starts at or after `offset`.
fn first_line_after(tree: &SyntaxTree, offset: usize) -> usize {
    let index = tree.index();
    let line = index.line_of(offset);
    if index.line_start(line) == offset {
        line
    } else {
        line + 1
    }
}

fn resolve(tree: &SyntaxTree, modification: &Modification, seq: usize) -> Replacement {
    let nl = tree.newline();
    match modification {
        Modification::InsertBefore { anchor, snippet } => insert_before(tree, *anchor, snippet, seq),

        Modification::InsertAfter { anchor, snippet } => {
            let node = tree.node(*anchor);
            let indent = tree.indent_at(node.head).to_string();
            if !ends_line_or_comment(tree, node.range.end) {
                // more code follows on the anchor's line: break after it
                let mut text = String::new();
                for line in &snippet.lines {
                    text.push_str(nl);
                    text.push_str(&indent);
                    text.push_str(line);
                }
                return Replacement::insert(node.range.end, text, seq);
            }
            let at = tree.next_line_start(node.range.end);
            let mut text = String::new();
            if at == tree.text().len() && !tree.text().ends_with('\n') {
                text.push_str(nl);
            }
            text.push_str(&lines(snippet, &indent, nl));
            Replacement::insert(at, text, seq)
        }

        Modification::InsertAtEndOfBlock { block, snippet } => {
            insert_at_end_of_block(tree, *block, snippet, seq)
        }

        Modification::Replace { node, text } => {
            let range = tree.node(*node).range;
            Replacement::new(range.start, range.end, text.clone(), seq)
        }

        Modification::Remove { node } => {
            let range = tree.node(*node).range;
            if tree.starts_line(range.start) && tree.ends_line(range.end) {
                let start = tree.line_start_of(range.start);
                let end = tree.next_line_start(range.end);
                Replacement::new(start, end, "", seq)
            } else {
                // drop the blanks that separated it from what follows
                let rest = &tree.text()[range.end..];
                let blanks = rest.len() - rest.trim_start_matches([' ', '\t']).len();
                Replacement::new(range.start, range.end + blanks, "", seq)
            }
        }

        Modification::AddImport { path } => {
            let line = format!("use {};{}", path, nl);
            if let Some((_, last)) = tree.top_level_uses().last() {
                let at = tree.next_line_start(last.range.end);
                let mut text = String::new();
                if at == tree.text().len() && !tree.text().ends_with('\n') {
                    text.push_str(nl);
                }
                text.push_str(&line);
                Replacement::insert(at, text, seq)
            } else if let Some(first) = tree.first_item_offset() {
                let at = tree.line_start_of(first);
                Replacement::insert(at, format!("{}{}", line, nl), seq)
            } else {
                Replacement::insert(tree.text().len(), line, seq)
            }
        }
    }
}

/// Only whitespace or a line comment between `offset` and the end of its line.
fn ends_line_or_comment(tree: &SyntaxTree, offset: usize) -> bool {
    let rest = tree.text()[offset..].split('\n').next().unwrap_or("");
    let rest = rest.trim();
    rest.is_empty() || rest.starts_with("//")
}

fn insert_before(tree: &SyntaxTree, anchor: NodeId, snippet: &Snippet, seq: usize) -> Replacement {
    let nl = tree.newline();
    let head = tree.node(anchor).head;
    let indent = tree.indent_at(head).to_string();

    if tree.starts_line(head) {
        Replacement::insert(tree.line_start_of(head), lines(snippet, &indent, nl), seq)
    } else {
        // something precedes the anchor on its line: break before it
        let mut text = String::new();
        for line in &snippet.lines {
            text.push_str(line);
            text.push_str(nl);
            text.push_str(&indent);
        }
        Replacement::insert(head, text, seq)
    }
}

fn insert_at_end_of_block(tree: &SyntaxTree, block: NodeId, snippet: &Snippet, seq: usize) -> Replacement {
    let nl = tree.newline();
    let NodeKind::Block { close, tail, .. } = &tree.node(block).kind else {
        // planner only targets blocks; treat anything else as its own anchor
        return insert_before(tree, block, snippet, seq);
    };

    if let Some(tail) = tail {
        return insert_before(tree, *tail, snippet, seq);
    }

    let brace_indent = tree.indent_at(*close).to_string();
    let last_stmt = tree
        .descendants(block)
        .filter(|(_, n)| n.parent == Some(block) && n.stmt().is_some())
        .last();
    let inner = match last_stmt {
        Some((_, stmt)) => tree.indent_at(stmt.head).to_string(),
        None => format!("{}    ", brace_indent),
    };

    if tree.starts_line(*close) {
        Replacement::insert(tree.line_start_of(*close), lines(snippet, &inner, nl), seq)
    } else {
        let text = format!("{}{}{}", nl, lines(snippet, &inner, nl), brace_indent);
        Replacement::insert(*close, text, seq)
    }
}

fn lines(snippet: &Snippet, indent: &str, nl: &str) -> String {
    snippet
        .lines
        .iter()
        .map(|line| format!("{}{}{}", indent, line, nl))
        .collect()
}

/// Replace `path` with `text` atomically.
///
/// The new content goes to a temporary file in the same directory, which
/// takes over the original's permissions and is then renamed over it. On any
/// failure the original file is left as it was.
pub fn write_atomic(path: &Path, text: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(dir).map_err(|e| EditError::io(path, e))?;
    temp.write_all(text.as_bytes())
        .map_err(|e| EditError::io(path, e))?;

    if let Ok(metadata) = fs::metadata(path) {
        fs::set_permissions(temp.path(), metadata.permissions())
            .map_err(|e| EditError::io(path, e))?;
    }
    temp.as_file()
        .sync_all()
        .map_err(|e| EditError::io(path, e))?;

    temp.persist(path).map_err(|e| EditError::io(path, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::LineShift;
    use crate::syntax::StmtShape;

    #[test]
    fn test_single_replacement() {
        let source = "fn foo() {\n    let x = 1;\n}";
        let result = render(source, vec![Replacement::new(23, 24, "42", 0)]).unwrap();
        assert_eq!(result, "fn foo() {\n    let x = 42;\n}");
    }

    #[test]
    fn test_multiple_replacements_any_order() {
        let source = "let a = 1;\nlet b = 2;";
        let replacements = vec![
            Replacement::new(19, 20, "20", 1),
            Replacement::new(8, 9, "10", 0),
        ];
        assert_eq!(render(source, replacements).unwrap(), "let a = 10;\nlet b = 20;");
    }

    #[test]
    fn test_preserves_whitespace_and_comments() {
        let source = "fn foo() {\n\n    // comment\n    let x = old;\n}";
        let start = source.find("old").unwrap();
        let result = render(source, vec![Replacement::new(start, start + 3, "new", 0)]).unwrap();
        assert_eq!(result, "fn foo() {\n\n    // comment\n    let x = new;\n}");
    }

    #[test]
    fn test_insertions_at_same_offset_keep_plan_order() {
        let result = render(
            "ab",
            vec![Replacement::insert(1, "2", 1), Replacement::insert(1, "1", 0)],
        )
        .unwrap();
        assert_eq!(result, "a12b");
    }

    #[test]
    fn test_overlap_is_an_error() {
        let err = render(
            "abcdef",
            vec![Replacement::new(1, 4, "x", 0), Replacement::new(3, 5, "y", 1)],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            EditError::ConflictingModifications { first: 1, second: 3 }
        ));
    }

    const VIEW: &str = "use ui::layout::VerticalLayout;

pub struct SignupView(VerticalLayout);

impl SignupView {
    pub fn new() -> Self {
        let view = Self(VerticalLayout::new());
        let email = TextField::new();
        view.add(&email);
        view
    }

    pub fn clear(&self) {}
}
";

    fn tree(src: &str) -> SyntaxTree {
        SyntaxTree::parse_str("signup.rs", src.to_string()).unwrap()
    }

    fn stmt_at(tree: &SyntaxTree, line: usize) -> NodeId {
        tree.nodes()
            .find(|(_, n)| n.stmt().is_some() && n.start_line == line)
            .map(|(id, _)| id)
            .unwrap()
    }

    fn snippet(lines: &[&str]) -> Snippet {
        Snippet::new(lines.iter().copied())
    }

    #[test]
    fn test_insert_after_let_and_remap() {
        let t = tree(VIEW);
        let patch = apply(
            &t,
            &[Modification::InsertAfter {
                anchor: stmt_at(&t, 8),
                snippet: snippet(&["// <a11y-edit:label>", "email.set_label(\"Email\");"]),
            }],
        )
        .unwrap();

        assert!(patch.text.contains(
            "        let email = TextField::new();\n        // <a11y-edit:label>\n        email.set_label(\"Email\");\n        view.add(&email);\n"
        ));
        assert_eq!(patch.line_delta, 2);
        assert_eq!(patch.remap.steps, vec![LineShift { first_line: 9, delta: 2 }]);
        assert_eq!(patch.remap.map_line(8), 8);
        assert_eq!(patch.remap.map_line(9), 11);
    }

    #[test]
    fn test_insert_after_let_inside_one_line_closure() {
        let src = "impl SignupView {
    pub fn new() -> Self {
        let view = Self(VerticalLayout::new());
        view.on_open(move || { let hint = Span::new(); view.add(&hint); });
        view
    }
}
";
        let t = tree(src);
        let hint = t
            .nodes()
            .find(|(_, n)| {
                matches!(
                    n.stmt().map(|s| &s.shape),
                    Some(StmtShape::Local { binding: Some(b) }) if b == "hint"
                )
            })
            .map(|(id, _)| id)
            .unwrap();
        let patch = apply(
            &t,
            &[Modification::InsertAfter {
                anchor: hint,
                snippet: snippet(&["// <a11y-edit:title>", "hint.set_title(\"Hint\");"]),
            }],
        )
        .unwrap();

        assert!(patch.text.contains(
            "        view.on_open(move || { let hint = Span::new();\n        // <a11y-edit:title>\n        hint.set_title(\"Hint\"); view.add(&hint); });\n        view\n"
        ));
        assert!(SyntaxTree::parse_str("signup.rs", patch.text.clone()).is_ok());
        assert_eq!(patch.remap.map_line(4), 4);
        assert_eq!(patch.remap.map_line(5), 7);
    }

    #[test]
    fn test_insert_after_let_keeps_trailing_comment_line() {
        let src = "fn build() {\n    let name = TextField::new(); // user name\n    form.add(&name);\n}\n";
        let t = tree(src);
        let patch = apply(
            &t,
            &[Modification::InsertAfter {
                anchor: stmt_at(&t, 2),
                snippet: snippet(&["name.set_label(\"Name\");"]),
            }],
        )
        .unwrap();

        assert_eq!(
            patch.text,
            "fn build() {\n    let name = TextField::new(); // user name\n    name.set_label(\"Name\");\n    form.add(&name);\n}\n"
        );
    }

    #[test]
    fn test_insert_before_tail_at_end_of_block() {
        let t = tree(VIEW);
        let body = t
            .nodes()
            .find_map(|(_, n)| match &n.kind {
                NodeKind::Fn { name, body, .. } if name == "new" => Some(*body),
                _ => None,
            })
            .unwrap();
        let patch = apply(
            &t,
            &[Modification::InsertAtEndOfBlock {
                block: body,
                snippet: snippet(&["view.element().set_attribute(\"role\", \"main\");"]),
            }],
        )
        .unwrap();

        assert!(patch.text.contains(
            "        view.add(&email);\n        view.element().set_attribute(\"role\", \"main\");\n        view\n    }"
        ));
        assert_eq!(patch.remap.steps, vec![LineShift { first_line: 10, delta: 1 }]);
    }

    #[test]
    fn test_insert_into_empty_inline_block() {
        let t = tree(VIEW);
        let body = t
            .nodes()
            .find_map(|(_, n)| match &n.kind {
                NodeKind::Fn { name, body, .. } if name == "clear" => Some(*body),
                _ => None,
            })
            .unwrap();
        let patch = apply(
            &t,
            &[Modification::InsertAtEndOfBlock {
                block: body,
                snippet: snippet(&["self.set_title(\"x\");"]),
            }],
        )
        .unwrap();

        assert!(patch
            .text
            .contains("    pub fn clear(&self) {\n        self.set_title(\"x\");\n    }\n}"));
        assert_eq!(patch.line_delta, 2);
        // the line holding the brace moves, the signature line does not
        assert_eq!(patch.remap.map_line(13), 13);
        assert_eq!(patch.remap.map_line(14), 16);
    }

    #[test]
    fn test_replace_keeps_surroundings() {
        let t = tree(VIEW);
        let base = t
            .nodes()
            .find(|(_, n)| matches!(n.kind, NodeKind::TypeRef { .. }))
            .map(|(id, _)| id)
            .unwrap();
        let patch = apply(
            &t,
            &[
                Modification::AddImport {
                    path: "ui::html::Main".to_string(),
                },
                Modification::Replace {
                    node: base,
                    text: "Main".to_string(),
                },
            ],
        )
        .unwrap();

        assert!(patch.text.starts_with(
            "use ui::layout::VerticalLayout;\nuse ui::html::Main;\n\npub struct SignupView(Main);\n"
        ));
        assert_eq!(patch.line_delta, 1);
    }

    #[test]
    fn test_duplicate_imports_collapse() {
        let t = tree(VIEW);
        let import = Modification::AddImport {
            path: "ui::html::Main".to_string(),
        };
        let patch = apply(&t, &[import.clone(), import]).unwrap();
        assert_eq!(patch.text.matches("use ui::html::Main;").count(), 1);
    }

    #[test]
    fn test_import_without_uses_goes_before_first_item() {
        let t = tree("//! Views.\n\npub struct A;\n");
        let patch = apply(
            &t,
            &[Modification::AddImport {
                path: "ui::html::Main".to_string(),
            }],
        )
        .unwrap();
        assert_eq!(patch.text, "//! Views.\n\nuse ui::html::Main;\n\npub struct A;\n");
    }

    #[test]
    fn test_remove_attribute_line_and_insert_at_head() {
        let src = "#[derive(Default)]\n#[page_title(\"Old\")]\npub struct A;\n";
        let t = tree(src);
        let (decl, strukt) = t.nodes().next().unwrap();
        let NodeKind::Struct { attributes, .. } = &strukt.kind else {
            panic!("expected a struct")
        };
        let patch = apply(
            &t,
            &[
                Modification::Remove {
                    node: attributes[1],
                },
                Modification::InsertBefore {
                    anchor: decl,
                    snippet: snippet(&["#[page_title(\"New\")]"]),
                },
            ],
        )
        .unwrap();

        assert_eq!(patch.text, "#[derive(Default)]\n#[page_title(\"New\")]\npub struct A;\n");
        assert_eq!(patch.line_delta, 0);
    }

    #[test]
    fn test_crlf_is_kept() {
        let src = VIEW.replace('\n', "\r\n");
        let t = tree(&src);
        let patch = apply(
            &t,
            &[Modification::InsertBefore {
                anchor: stmt_at(&t, 9),
                snippet: snippet(&["// <a11y-edit:title>", "view.set_title(\"x\");"]),
            }],
        )
        .unwrap();

        assert!(patch.text.contains(
            "        // <a11y-edit:title>\r\n        view.set_title(\"x\");\r\n        view.add(&email);\r\n"
        ));
        assert!(!patch.text.replace("\r\n", "").contains('\n'));
    }

    #[test]
    fn test_conflicting_modifications() {
        let t = tree(VIEW);
        let stmt = stmt_at(&t, 9);
        assert!(matches!(
            t.node(stmt).stmt().map(|s| &s.shape),
            Some(StmtShape::Call { .. })
        ));
        let err = apply(
            &t,
            &[
                Modification::Replace {
                    node: stmt,
                    text: "a();".to_string(),
                },
                Modification::Remove { node: stmt },
            ],
        )
        .unwrap_err();
        assert!(matches!(err, EditError::ConflictingModifications { .. }));
    }

    #[test]
    fn test_write_atomic_replaces_content() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("view.rs");
        fs::write(&path, "old").unwrap();

        write_atomic(&path, "new").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
