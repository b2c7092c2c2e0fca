use crate::fs::FileSystem;
use crate::pattern::{blank_trimmed, count_newlines};
use crate::tree::doc::Docstring;
use crate::tree::errors::TreeError;
use crate::tree::segment::{self, Piece};
use crate::tree::NULL;
use globset::GlobSet;
use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, OnceLock, Weak};

static PATH_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[/\\]+").expect("valid separator regex"));

/// What a [`Node`] represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Directory,
    File,
    Class,
    Function,
    Method,
    Property,
    /// Code that is not a class or function: preambles, headers, leftovers
    Content,
    /// A file outside the source extensions, pulled in by an include glob
    NonSourceFile,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Directory => "Directory",
            NodeKind::File => "File",
            NodeKind::Class => "Class",
            NodeKind::Function => "Function",
            NodeKind::Method => "Method",
            NodeKind::Property => "Property",
            NodeKind::Content => "Content",
            NodeKind::NonSourceFile => "NonSourceFile",
        }
    }

    /// Kinds that never have children.
    pub fn is_leaf(self) -> bool {
        matches!(
            self,
            NodeKind::Function | NodeKind::Method | NodeKind::Property | NodeKind::Content | NodeKind::NonSourceFile
        )
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings shared by every node of one tree.
#[derive(Debug)]
pub struct TreeContext {
    pub(crate) home: PathBuf,
    pub(crate) root: Option<PathBuf>,
    pub(crate) ignore: GlobSet,
    pub(crate) include: GlobSet,
    pub(crate) source_extensions: Vec<String>,
    pub(crate) fs: Arc<dyn FileSystem>,
}

impl TreeContext {
    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn fs(&self) -> &dyn FileSystem {
        self.fs.as_ref()
    }

    pub(crate) fn is_source(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.source_extensions.iter().any(|s| s == ext))
    }
}

#[derive(Debug)]
pub(crate) struct Segments {
    pub(crate) header: Option<Arc<Node>>,
    pub(crate) children: Vec<Arc<Node>>,
}

/// One node of a source tree.
///
/// Children, header, docstring and qualified name are computed on first
/// access and memoized. Parents are held weakly: keep the root alive while
/// navigating upward.
pub struct Node {
    kind: NodeKind,
    name: String,
    text: String,
    raw: Option<String>,
    start_line: usize,
    indent_offset: usize,
    path: Option<Arc<Path>>,
    parent: Weak<Node>,
    ctx: Arc<TreeContext>,
    segments: OnceLock<Segments>,
    doc: OnceLock<Docstring>,
    absolute_name: OnceLock<String>,
}

pub(crate) struct NodeInit {
    pub kind: NodeKind,
    pub name: String,
    pub text: String,
    pub raw: Option<String>,
    pub start_line: usize,
    pub indent_offset: usize,
    pub path: Option<Arc<Path>>,
}

impl Node {
    pub(crate) fn create(init: NodeInit, parent: Weak<Node>, ctx: Arc<TreeContext>) -> Arc<Node> {
        Arc::new(Node {
            kind: init.kind,
            name: init.name,
            text: init.text,
            raw: init.raw,
            start_line: init.start_line,
            indent_offset: init.indent_offset,
            path: init.path,
            parent,
            ctx,
            segments: OnceLock::new(),
            doc: OnceLock::new(),
            absolute_name: OnceLock::new(),
        })
    }

    /// A File (or NonSourceFile) node over `raw`, trimmed of surrounding blank lines.
    pub(crate) fn file_from_text(
        kind: NodeKind,
        name: String,
        raw: String,
        path: Option<Arc<Path>>,
        parent: Weak<Node>,
        ctx: Arc<TreeContext>,
    ) -> Arc<Node> {
        let trimmed = blank_trimmed(&raw);
        let start_line = 1 + count_newlines(&raw[..trimmed.start]);
        let text = raw[trimmed].to_string();
        Node::create(
            NodeInit {
                kind,
                name,
                text,
                raw: Some(raw),
                start_line,
                indent_offset: 0,
                path,
            },
            parent,
            ctx,
        )
    }

    /// A fresh File node in this file's place, over different content.
    pub(crate) fn rebuilt_with(&self, raw: String) -> Arc<Node> {
        Node::file_from_text(
            self.kind,
            self.name.clone(),
            raw,
            self.path.clone(),
            self.parent.clone(),
            self.ctx.clone(),
        )
    }

    fn child_from_piece(self: &Arc<Self>, piece: Piece) -> Arc<Node> {
        Node::create(
            NodeInit {
                kind: piece.kind,
                name: piece.name,
                text: piece.text,
                raw: None,
                start_line: self.start_line + piece.line_offset,
                indent_offset: self.indent_offset + piece.indent,
                path: self.path.clone(),
            },
            Arc::downgrade(self),
            self.ctx.clone(),
        )
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The source owned by this node, without surrounding blank lines.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Full file content as read, for File and NonSourceFile nodes.
    pub fn raw_text(&self) -> Option<&str> {
        self.raw.as_deref()
    }

    /// 1-based line of the first line of [`Node::text`] in its file.
    pub fn start_line(&self) -> usize {
        self.start_line
    }

    /// Columns stripped from the start of every line of [`Node::text`].
    pub fn indent_offset(&self) -> usize {
        self.indent_offset
    }

    pub fn end_line(&self) -> usize {
        self.start_line + count_newlines(&self.text)
    }

    pub fn context(&self) -> &Arc<TreeContext> {
        &self.ctx
    }

    pub fn parent(&self) -> Option<Arc<Node>> {
        self.parent.upgrade()
    }

    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == NodeKind::File
    }

    pub fn is_sentinel(&self) -> bool {
        self.name == NULL
    }

    pub(crate) fn segments(self: &Arc<Self>) -> &Segments {
        self.segments.get_or_init(|| self.build_segments())
    }

    fn build_segments(self: &Arc<Self>) -> Segments {
        match self.kind {
            NodeKind::Directory => crate::tree::builder::directory_segments(self),
            NodeKind::File => {
                let seg = segment::split_file(&self.text);
                tracing::debug!(file = %self.name, children = seg.children.len(), "segmented file");
                Segments {
                    header: Some(self.child_from_piece(seg.header)),
                    children: seg.children.into_iter().map(|p| self.child_from_piece(p)).collect(),
                }
            }
            NodeKind::Class => {
                let seg = segment::split_class(&self.text);
                Segments {
                    header: Some(self.child_from_piece(seg.header)),
                    children: seg.children.into_iter().map(|p| self.child_from_piece(p)).collect(),
                }
            }
            NodeKind::Function | NodeKind::Method | NodeKind::Property => {
                let range = segment::function_header(&self.text);
                let header = Piece {
                    kind: NodeKind::Content,
                    name: NULL.to_string(),
                    text: self.text[range].to_string(),
                    line_offset: 0,
                    indent: 0,
                };
                Segments {
                    header: Some(self.child_from_piece(header)),
                    children: Vec::new(),
                }
            }
            NodeKind::Content | NodeKind::NonSourceFile => Segments {
                header: None,
                children: Vec::new(),
            },
        }
    }

    /// Children in declaration order.
    pub fn children(self: &Arc<Self>) -> &[Arc<Node>] {
        &self.segments().children
    }

    /// The node's own preamble as a content node; leaf fragments are their own header.
    pub fn header(self: &Arc<Self>) -> Arc<Node> {
        match &self.segments().header {
            Some(header) => header.clone(),
            None => self.clone(),
        }
    }

    pub fn children_names(self: &Arc<Self>) -> Vec<&str> {
        self.children().iter().map(|c| c.name()).collect()
    }

    /// Last child with exactly this name.
    pub fn child(self: &Arc<Self>, name: &str) -> Option<Arc<Node>> {
        self.children().iter().rev().find(|c| c.name == name).cloned()
    }

    pub fn doc(self: &Arc<Self>) -> &Docstring {
        self.doc.get_or_init(|| crate::tree::doc::docstring_of(self))
    }

    /// Dot-joined names from the root; placeholder names are transparent.
    pub fn absolute_name(&self) -> &str {
        self.absolute_name.get_or_init(|| match self.parent() {
            None => self.name.clone(),
            Some(parent) if self.is_sentinel() => parent.absolute_name().to_string(),
            Some(parent) => format!("{}.{}", parent.absolute_name(), self.name),
        })
    }

    /// [`Node::absolute_name`] without the root's name.
    pub fn relative_name(&self) -> &str {
        let absolute = self.absolute_name();
        absolute.split_once('.').map_or("", |(_, rest)| rest)
    }

    /// Path of the file or directory this node lives in.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn absolute_path(&self) -> Option<PathBuf> {
        let path = self.path()?;
        std::path::absolute(path).ok().or_else(|| Some(path.to_path_buf()))
    }

    /// Path relative to the configured home directory.
    pub fn relative_path(&self) -> Option<PathBuf> {
        let path = self.absolute_path()?;
        let home = std::path::absolute(&self.ctx.home).unwrap_or_else(|_| self.ctx.home.clone());
        Some(path.strip_prefix(&home).map_or_else(|_| path.clone(), Path::to_path_buf))
    }

    /// Path relative to the current working directory.
    ///
    /// A directory reports its `__init__` file when it has one.
    pub fn execution_path(self: &Arc<Self>) -> Option<PathBuf> {
        let path = if self.is_dir() {
            self.header().absolute_path().or_else(|| self.absolute_path())?
        } else {
            self.absolute_path()?
        };
        match std::env::current_dir() {
            Ok(cwd) => Some(path.strip_prefix(&cwd).map_or_else(|_| path.clone(), Path::to_path_buf)),
            Err(_) => Some(path),
        }
    }

    /// Ancestors from the root down to `self`.
    pub fn track(self: &Arc<Self>) -> Vec<Arc<Node>> {
        let mut chain = vec![self.clone()];
        let mut current = self.parent();
        while let Some(node) = current {
            current = node.parent();
            chain.push(node);
        }
        chain.reverse();
        chain
    }

    /// The File node containing this node, if any.
    pub fn owning_file(self: &Arc<Self>) -> Option<Arc<Node>> {
        self.track().into_iter().rev().find(|n| n.is_file())
    }

    /// Resolve a dotted (or slash-separated) name relative to this node.
    ///
    /// An empty target is `self`; a leading separator moves to the parent.
    /// Children are searched last-declared first, trying both `name` and
    /// `name()`.
    pub fn jumpto(self: &Arc<Self>, target: &str) -> Result<Arc<Node>, TreeError> {
        if target.is_empty() {
            return Ok(self.clone());
        }
        if target == NULL {
            return Err(TreeError::SentinelTarget(target.to_string()));
        }
        let normalized: &str = &PATH_SEPARATORS.replace_all(target, ".");
        let (head, rest) = normalized.split_once('.').unwrap_or((normalized, ""));

        if head.is_empty() {
            let parent = self
                .parent()
                .ok_or_else(|| TreeError::NoParent(self.absolute_name().to_string()))?;
            return parent.jumpto(rest);
        }
        if head == NULL {
            return Err(TreeError::SentinelTarget(head.to_string()));
        }

        let candidates = name_candidates(head);
        if let Some(child) = self
            .children()
            .iter()
            .rev()
            .find(|c| candidates.iter().any(|n| *n == c.name))
        {
            return child.jumpto(rest);
        }
        if candidates.iter().any(|n| *n == self.name) {
            return self.jumpto(rest);
        }
        if self.is_file() && self.ctx.source_extensions.iter().any(|ext| ext == head) {
            return self.jumpto(rest);
        }

        Err(TreeError::NameResolution {
            target: head.to_string(),
            node: self.absolute_name().to_string(),
            suggestion: self.suggest(head),
        })
    }

    fn suggest(self: &Arc<Self>, name: &str) -> Option<String> {
        self.children()
            .iter()
            .filter(|c| !c.is_sentinel())
            .map(|c| (strsim::jaro_winkler(name, &c.name), &c.name))
            .filter(|(score, _)| *score > 0.8)
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, n)| n.clone())
    }

    /// `self` followed by every descendant, depth first, in declaration order.
    pub fn descendants(self: &Arc<Self>) -> Vec<Arc<Node>> {
        let mut out = vec![self.clone()];
        for child in self.children() {
            out.extend(child.descendants());
        }
        out
    }
}

fn name_candidates(name: &str) -> [String; 2] {
    match name.strip_suffix("()") {
        Some(bare) => [bare.to_string(), name.to_string()],
        None => [name.to_string(), format!("{name}()")],
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("start_line", &self.start_line)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind, self.absolute_name())
    }
}
