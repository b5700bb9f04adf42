/// Syntax tree store.
///
/// A [`SyntaxTree`] keeps the original text verbatim, parses it once with
/// `syn`, and flattens the parts the engine cares about into an arena of
/// [`Node`]s addressed by [`NodeId`]. Nothing in the tree is ever mutated:
/// edits are planned against this snapshot and rendered by
/// [`crate::surgical::apply`] in a single pass, so every byte outside a
/// modified range is copied through untouched.
use proc_macro2::LineColumn;
use std::path::{Path, PathBuf};
use syn::spanned::Spanned;
use syn::visit::{self, Visit};
use syn::{
    Block, Expr, Fields, FnArg, ImplItemFn, ItemFn, ItemImpl, ItemMod, ItemStruct, ItemUse, Pat,
    ReturnType, Signature, Stmt, Type, Visibility,
};

use crate::error::{EditError, Result};
use crate::imports::ImportIndex;

const BOM: &str = "\u{feff}";

/// Byte offsets of line starts, for converting `proc_macro2` positions.
#[derive(Debug, Clone)]
pub struct LineIndex {
    starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut starts = vec![0];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                starts.push(i + 1);
            }
        }
        Self {
            starts,
            len: text.len(),
        }
    }

    /// Byte offset where 1-based `line` starts (end of text past the last line).
    pub fn line_start(&self, line: usize) -> usize {
        match line.checked_sub(1).and_then(|i| self.starts.get(i)) {
            Some(&start) => start,
            None if line == 0 => 0,
            None => self.len,
        }
    }

    /// 1-based line containing `offset`.
    pub fn line_of(&self, offset: usize) -> usize {
        self.starts.partition_point(|&start| start <= offset)
    }

    /// Convert a `proc_macro2` position (1-based line, column in chars) into a
    /// byte offset. `base` is skipped on the first line (a stripped BOM).
    pub fn offset(&self, text: &str, pos: LineColumn, base: usize) -> usize {
        let mut start = self.line_start(pos.line);
        if pos.line <= 1 {
            start += base;
        }
        let end = self.line_start(pos.line + 1).max(start);
        let line = &text[start.min(text.len())..end.min(text.len())];
        line.char_indices()
            .nth(pos.column)
            .map(|(i, _)| start + i)
            .unwrap_or(start + line.len())
    }
}

/// Half-open byte range into the original text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextRange {
    pub start: usize,
    pub end: usize,
}

impl TextRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub(crate) fn len(&self) -> usize {
        self.end - self.start
    }
}

/// Stable index of a node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Use,
    Struct {
        name: String,
        base: Option<NodeId>,
        attributes: Vec<NodeId>,
    },
    Attribute {
        name: String,
    },
    TypeRef {
        segments: Vec<String>,
    },
    Impl {
        self_ty: String,
        is_trait: bool,
    },
    Fn {
        name: String,
        has_receiver: bool,
        returns_self: bool,
        body: NodeId,
    },
    Block {
        open: usize,
        close: usize,
        tail: Option<NodeId>,
    },
    Stmt(StmtInfo),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StmtInfo {
    pub shape: StmtShape,
    /// Final expression of its block, without a semicolon
    pub is_tail: bool,
    /// Pure `//` comment on the line directly above the statement
    pub comment_above: Option<String>,
}

/// What a statement does, as far as the planner and matcher care.
///
/// Receivers, targets and arguments are the source text with whitespace
/// removed, so `self . name` and `self.name` compare equal.
#[derive(Debug, Clone, PartialEq)]
pub enum StmtShape {
    Local {
        binding: Option<String>,
    },
    Assign {
        target: String,
    },
    Call {
        receiver: Option<String>,
        method: String,
        args: Vec<String>,
    },
    Other,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub range: TextRange,
    /// Offset that "insert before" targets. For statements this is the start
    /// of the statement; for structs it is the visibility or `struct` keyword,
    /// after any attributes.
    pub head: usize,
    pub start_line: usize,
    pub end_line: usize,
    pub parent: Option<NodeId>,
    pub depth: usize,
}

impl Node {
    pub fn covers_line(&self, line: usize) -> bool {
        self.start_line <= line && line <= self.end_line
    }

    pub fn stmt(&self) -> Option<&StmtInfo> {
        match &self.kind {
            NodeKind::Stmt(info) => Some(info),
            _ => None,
        }
    }

    pub fn label(&self) -> String {
        let what = match &self.kind {
            NodeKind::Use => "use item".to_string(),
            NodeKind::Struct { name, .. } => format!("struct {}", name),
            NodeKind::Attribute { name } => format!("attribute #[{}]", name),
            NodeKind::TypeRef { segments } => format!("type {}", segments.join("::")),
            NodeKind::Impl { self_ty, .. } => format!("impl {}", self_ty),
            NodeKind::Fn { name, .. } => format!("fn {}", name),
            NodeKind::Block { .. } => "block".to_string(),
            NodeKind::Stmt(info) => match &info.shape {
                StmtShape::Local { .. } => "let statement".to_string(),
                StmtShape::Assign { .. } => "assignment".to_string(),
                StmtShape::Call { method, .. } => format!("call to {}", method),
                StmtShape::Other => "statement".to_string(),
            },
        };
        format!("{} (lines {}-{})", what, self.start_line, self.end_line)
    }
}

/// One parsed source file. Owned by a single edit transaction.
pub struct SyntaxTree {
    path: PathBuf,
    text: String,
    index: LineIndex,
    nodes: Vec<Node>,
    imports: ImportIndex,
    first_item: Option<usize>,
}

impl SyntaxTree {
    /// Read and parse `path`. This is the transaction's only read of the file.
    pub fn parse(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| EditError::io(path, e))?;
        Self::parse_str(path, text)
    }

    pub fn parse_str(path: impl Into<PathBuf>, text: String) -> Result<Self> {
        let tree = Self::build(path.into(), text);
        // With span locations on, proc-macro2 keeps a copy of every parsed
        // source per thread. The arena holds byte offsets only, so release it.
        proc_macro2::extra::invalidate_current_thread_spans();
        tree
    }

    fn build(path: PathBuf, text: String) -> Result<Self> {
        let base = if text.starts_with(BOM) { BOM.len() } else { 0 };

        let file = syn::parse_file(&text[base..]).map_err(|e| {
            let pos = e.span().start();
            EditError::Parse {
                path: path.clone(),
                line: pos.line,
                column: pos.column + 1,
                message: e.to_string(),
            }
        })?;

        let index = LineIndex::new(&text);
        let mut builder = ArenaBuilder {
            text: &text,
            index: &index,
            base,
            nodes: Vec::new(),
            stack: Vec::new(),
            mod_depth: 0,
        };
        builder.visit_file(&file);
        let nodes = builder.nodes;

        let first_item = file
            .items
            .first()
            .map(|item| index.offset(&text, item.span().start(), base));
        let imports = ImportIndex::scan(&file);

        Ok(Self {
            path,
            text,
            index,
            nodes,
            imports,
            first_item,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn index(&self) -> &LineIndex {
        &self.index
    }

    pub fn imports(&self) -> &ImportIndex {
        &self.imports
    }

    /// The tree as text. Untouched trees serialize to the exact bytes parsed.
    pub fn serialize(&self) -> String {
        self.text.clone()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    /// Nodes nested under `id`, in source order. The arena is built pre-order,
    /// so they sit right after `id` until the depth climbs back.
    pub fn descendants(&self, id: NodeId) -> impl Iterator<Item = (NodeId, &Node)> {
        let depth = self.nodes[id.0].depth;
        self.nodes[id.0 + 1..]
            .iter()
            .enumerate()
            .take_while(move |(_, n)| n.depth > depth)
            .map(move |(i, n)| (NodeId(id.0 + 1 + i), n))
    }

    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.nodes[id.0].parent, move |p| self.nodes[p.0].parent)
    }

    pub fn slice(&self, range: TextRange) -> &str {
        &self.text[range.start..range.end]
    }

    /// Start of the first top-level item, if any.
    pub fn first_item_offset(&self) -> Option<usize> {
        self.first_item
    }

    /// Top-level `use` items, in source order.
    pub fn top_level_uses(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes()
            .filter(|(_, n)| n.depth == 0 && matches!(n.kind, NodeKind::Use))
    }

    pub fn line_start_of(&self, offset: usize) -> usize {
        self.index.line_start(self.index.line_of(offset))
    }

    /// Offset just past the newline that ends the line holding `offset`.
    pub fn next_line_start(&self, offset: usize) -> usize {
        match self.text[offset..].find('\n') {
            Some(i) => offset + i + 1,
            None => self.text.len(),
        }
    }

    /// Leading whitespace of the line holding `offset`.
    pub fn indent_at(&self, offset: usize) -> &str {
        let start = self.line_start_of(offset);
        let line = &self.text[start..];
        let width = line
            .find(|c: char| c != ' ' && c != '\t')
            .unwrap_or(line.len());
        &line[..width]
    }

    /// Only whitespace between the start of the line and `offset`.
    pub fn starts_line(&self, offset: usize) -> bool {
        self.text[self.line_start_of(offset)..offset]
            .chars()
            .all(|c| c == ' ' || c == '\t')
    }

    /// Only whitespace between `offset` and the end of its line.
    pub fn ends_line(&self, offset: usize) -> bool {
        let rest = &self.text[offset..];
        let line = rest.split('\n').next().unwrap_or("");
        line.trim().is_empty()
    }

    /// Line terminator used by the file.
    pub fn newline(&self) -> &'static str {
        if self.text.contains("\r\n") {
            "\r\n"
        } else {
            "\n"
        }
    }
}

struct ArenaBuilder<'a> {
    text: &'a str,
    index: &'a LineIndex,
    base: usize,
    nodes: Vec<Node>,
    stack: Vec<NodeId>,
    mod_depth: usize,
}

impl<'a> ArenaBuilder<'a> {
    fn offset(&self, pos: LineColumn) -> usize {
        self.index.offset(self.text, pos, self.base)
    }

    fn range_of(&self, span: proc_macro2::Span) -> TextRange {
        TextRange::new(self.offset(span.start()), self.offset(span.end()))
    }

    fn push(&mut self, kind: NodeKind, range: TextRange, head: usize) -> NodeId {
        let id = NodeId(self.nodes.len());
        let start_line = self.index.line_of(range.start);
        let end_line = self
            .index
            .line_of(range.end.saturating_sub(1).max(range.start));
        self.nodes.push(Node {
            kind,
            range,
            head,
            start_line,
            end_line,
            parent: self.stack.last().copied(),
            depth: self.stack.len(),
        });
        id
    }

    /// Source text of `span` with all whitespace removed.
    fn compact(&self, span: proc_macro2::Span) -> String {
        let range = self.range_of(span);
        self.text[range.start..range.end]
            .split_whitespace()
            .collect()
    }

    fn comment_above(&self, start: usize) -> Option<String> {
        let line = self.index.line_of(start);
        if line <= 1 {
            return None;
        }
        let line_start = self.index.line_start(line);
        if !self.text[line_start..start].trim().is_empty() {
            return None;
        }
        let above = self.text[self.index.line_start(line - 1)..line_start].trim();
        let is_plain = above.starts_with("//") && !above.starts_with("///") && !above.starts_with("//!");
        is_plain.then(|| above.to_string())
    }

    fn stmt_shape(&self, stmt: &Stmt) -> StmtShape {
        match stmt {
            Stmt::Local(local) => StmtShape::Local {
                binding: pat_binding(&local.pat),
            },
            Stmt::Expr(Expr::Assign(assign), Some(_)) => StmtShape::Assign {
                target: self.compact(assign.left.span()),
            },
            Stmt::Expr(Expr::MethodCall(call), _) => StmtShape::Call {
                receiver: Some(self.compact(call.receiver.span())),
                method: call.method.to_string(),
                args: call.args.iter().map(|a| self.compact(a.span())).collect(),
            },
            Stmt::Expr(Expr::Call(call), _) => match &*call.func {
                Expr::Path(path) => StmtShape::Call {
                    receiver: None,
                    method: path
                        .path
                        .segments
                        .last()
                        .map(|s| s.ident.to_string())
                        .unwrap_or_default(),
                    args: call.args.iter().map(|a| self.compact(a.span())).collect(),
                },
                _ => StmtShape::Other,
            },
            _ => StmtShape::Other,
        }
    }

    fn enter_fn(&mut self, sig: &Signature, block: &Block, span: proc_macro2::Span) {
        let range = self.range_of(span);
        let id = self.push(
            NodeKind::Fn {
                name: sig.ident.to_string(),
                has_receiver: matches!(sig.inputs.first(), Some(FnArg::Receiver(_))),
                returns_self: returns_self(&sig.output),
                body: NodeId(0),
            },
            range,
            range.start,
        );

        self.stack.push(id);
        // visit_block pushes the body node before anything else
        let body = NodeId(self.nodes.len());
        self.visit_block(block);
        self.stack.pop();

        if let NodeKind::Fn { body: slot, .. } = &mut self.nodes[id.0].kind {
            *slot = body;
        }
    }
}

impl<'ast, 'a> Visit<'ast> for ArenaBuilder<'a> {
    fn visit_item_use(&mut self, node: &'ast ItemUse) {
        // only file-level imports matter for import placement
        if self.stack.is_empty() && self.mod_depth == 0 {
            let range = self.range_of(node.span());
            self.push(NodeKind::Use, range, range.start);
        }
    }

    fn visit_item_mod(&mut self, node: &'ast ItemMod) {
        self.mod_depth += 1;
        visit::visit_item_mod(self, node);
        self.mod_depth -= 1;
    }

    fn visit_item_struct(&mut self, node: &'ast ItemStruct) {
        let range = self.range_of(node.span());
        let head = match &node.vis {
            Visibility::Inherited => self.offset(node.struct_token.span.start()),
            vis => self.offset(vis.span().start()),
        };
        let id = self.push(
            NodeKind::Struct {
                name: node.ident.to_string(),
                base: None,
                attributes: Vec::new(),
            },
            range,
            head,
        );

        self.stack.push(id);
        let mut attributes = Vec::new();
        for attr in &node.attrs {
            let name = attr
                .path()
                .segments
                .last()
                .map(|s| s.ident.to_string())
                .unwrap_or_default();
            let range = self.range_of(attr.span());
            attributes.push(self.push(NodeKind::Attribute { name }, range, range.start));
        }

        let mut base = None;
        if let Fields::Unnamed(fields) = &node.fields {
            if let Some(Type::Path(ty)) = fields.unnamed.first().map(|f| &f.ty) {
                let segments = ty.path.segments.iter().map(|s| s.ident.to_string()).collect();
                let range = self.range_of(ty.span());
                base = Some(self.push(NodeKind::TypeRef { segments }, range, range.start));
            }
        }
        self.stack.pop();

        if let NodeKind::Struct {
            base: base_slot,
            attributes: attr_slot,
            ..
        } = &mut self.nodes[id.0].kind
        {
            *base_slot = base;
            *attr_slot = attributes;
        }
    }

    fn visit_item_impl(&mut self, node: &'ast ItemImpl) {
        let self_ty = match &*node.self_ty {
            Type::Path(ty) => ty
                .path
                .segments
                .last()
                .map(|s| s.ident.to_string())
                .unwrap_or_default(),
            _ => String::new(),
        };
        let range = self.range_of(node.span());
        let id = self.push(
            NodeKind::Impl {
                self_ty,
                is_trait: node.trait_.is_some(),
            },
            range,
            range.start,
        );

        self.stack.push(id);
        visit::visit_item_impl(self, node);
        self.stack.pop();
    }

    fn visit_item_fn(&mut self, node: &'ast ItemFn) {
        self.enter_fn(&node.sig, &node.block, node.span());
    }

    fn visit_impl_item_fn(&mut self, node: &'ast ImplItemFn) {
        self.enter_fn(&node.sig, &node.block, node.span());
    }

    fn visit_block(&mut self, block: &'ast Block) {
        let open = self.offset(block.brace_token.span.open().start());
        let close = self.offset(block.brace_token.span.close().start());
        let id = self.push(
            NodeKind::Block {
                open,
                close,
                tail: None,
            },
            TextRange::new(open, close + 1),
            open,
        );

        self.stack.push(id);
        let mut tail = None;
        for (i, stmt) in block.stmts.iter().enumerate() {
            let range = self.range_of(stmt.span());
            let is_tail = i + 1 == block.stmts.len() && matches!(stmt, Stmt::Expr(_, None));
            let info = StmtInfo {
                shape: self.stmt_shape(stmt),
                is_tail,
                comment_above: self.comment_above(range.start),
            };
            let sid = self.push(NodeKind::Stmt(info), range, range.start);
            if is_tail {
                tail = Some(sid);
            }

            self.stack.push(sid);
            visit::visit_stmt(self, stmt);
            self.stack.pop();
        }
        self.stack.pop();

        if let NodeKind::Block { tail: slot, .. } = &mut self.nodes[id.0].kind {
            *slot = tail;
        }
    }
}

fn pat_binding(pat: &Pat) -> Option<String> {
    match pat {
        Pat::Ident(ident) => Some(ident.ident.to_string()),
        Pat::Type(typed) => pat_binding(&typed.pat),
        _ => None,
    }
}

fn returns_self(output: &ReturnType) -> bool {
    match output {
        ReturnType::Type(_, ty) => match &**ty {
            Type::Path(path) => path.path.is_ident("Self"),
            _ => false,
        },
        ReturnType::Default => false,
    }
}
