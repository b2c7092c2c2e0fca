use crate::config::TreeConfig;
use crate::fs::{FileSystem, OsFileSystem};
use crate::tree::errors::TreeError;
use crate::tree::node::{Node, NodeInit, NodeKind, Segments, TreeContext};
use crate::tree::NULL;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

/// Builds source trees from paths or text.
#[derive(Debug, Clone)]
pub struct TreeBuilder {
    home: Option<PathBuf>,
    ignore: Vec<String>,
    include: Vec<String>,
    source_extensions: Vec<String>,
    fs: Arc<dyn FileSystem>,
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::from_config(&TreeConfig::default())
    }
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &TreeConfig) -> Self {
        Self {
            home: config.tree.home.clone(),
            ignore: config.tree.ignore.clone(),
            include: config.tree.include.clone(),
            source_extensions: config.tree.source_extensions.clone(),
            fs: Arc::new(OsFileSystem),
        }
    }

    /// Directory relative paths are resolved and displayed against.
    pub fn home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = Some(home.into());
        self
    }

    pub fn ignore<I, S>(mut self, globs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore = globs.into_iter().map(Into::into).collect();
        self
    }

    pub fn include<I, S>(mut self, globs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include = globs.into_iter().map(Into::into).collect();
        self
    }

    pub fn source_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.source_extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    pub fn file_system(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    fn resolved_home(&self) -> PathBuf {
        match &self.home {
            Some(home) => home.clone(),
            None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    fn context(&self, root: Option<PathBuf>) -> Result<Arc<TreeContext>, TreeError> {
        Ok(Arc::new(TreeContext {
            home: self.resolved_home(),
            root,
            ignore: compile_globs(&self.ignore)?,
            include: compile_globs(&self.include)?,
            source_extensions: self.source_extensions.clone(),
            fs: self.fs.clone(),
        }))
    }

    /// Context for trees built from text; they never walk directories.
    pub(crate) fn text_context(&self) -> Arc<TreeContext> {
        Arc::new(TreeContext {
            home: self.resolved_home(),
            root: None,
            ignore: GlobSet::empty(),
            include: GlobSet::empty(),
            source_extensions: self.source_extensions.clone(),
            fs: self.fs.clone(),
        })
    }

    /// Open a directory or a file. Relative paths are taken from home.
    pub fn open(&self, path: impl AsRef<Path>) -> Result<Arc<Node>, TreeError> {
        let path = path.as_ref();
        let path = match &self.home {
            Some(home) if path.is_relative() => home.join(path),
            _ => path.to_path_buf(),
        };
        if !self.fs.exists(&path) {
            return Err(TreeError::NotFound(path));
        }
        if self.fs.is_dir(&path) {
            let ctx = self.context(Some(path.clone()))?;
            debug!(path = %path.display(), "opening directory tree");
            return Ok(directory_node(&path, Weak::new(), ctx));
        }
        let ctx = self.context(path.parent().map(Path::to_path_buf))?;
        read_file(&ctx, &path, NodeKind::File, Weak::new())
    }

    /// Open `path`, requiring it to be a directory.
    pub fn open_dir(&self, path: impl AsRef<Path>) -> Result<Arc<Node>, TreeError> {
        let node = self.open(path.as_ref())?;
        if node.is_dir() {
            Ok(node)
        } else {
            Err(TreeError::NotADirectory(path.as_ref().to_path_buf()))
        }
    }

    /// Build a file tree from text that has no backing file.
    pub fn parse(&self, name: &str, text: &str) -> Result<Arc<Node>, TreeError> {
        let ctx = self.context(None)?;
        Ok(Node::file_from_text(
            NodeKind::File,
            name.to_string(),
            text.to_string(),
            None,
            Weak::new(),
            ctx,
        ))
    }
}

fn compile_globs(globs: &[String]) -> Result<GlobSet, TreeError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in globs {
        let glob = Glob::new(pattern).map_err(|source| TreeError::InvalidGlob {
            pattern: pattern.clone(),
            source,
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|source| TreeError::InvalidGlob {
        pattern: globs.join(", "),
        source,
    })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name(path))
}

fn directory_node(path: &Path, parent: Weak<Node>, ctx: Arc<TreeContext>) -> Arc<Node> {
    Node::create(
        NodeInit {
            kind: NodeKind::Directory,
            name: file_name(path),
            text: String::new(),
            raw: None,
            start_line: 1,
            indent_offset: 0,
            path: Some(Arc::from(path)),
        },
        parent,
        ctx,
    )
}

pub(crate) fn read_file(
    ctx: &Arc<TreeContext>,
    path: &Path,
    kind: NodeKind,
    parent: Weak<Node>,
) -> Result<Arc<Node>, TreeError> {
    let raw = ctx.fs.read_to_string(path).map_err(|source| TreeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let name = match kind {
        NodeKind::NonSourceFile => file_name(path),
        _ => file_stem(path),
    };
    Ok(Node::file_from_text(kind, name, raw, Some(Arc::from(path)), parent, ctx.clone()))
}

fn matches_any(ctx: &TreeContext, set: &GlobSet, path: &Path) -> bool {
    if set.is_empty() {
        return false;
    }
    if path.file_name().is_some_and(|name| set.is_match(name)) {
        return true;
    }
    let relative = ctx
        .root
        .as_deref()
        .and_then(|root| path.strip_prefix(root).ok())
        .unwrap_or(path);
    set.is_match(relative)
}

/// Children of a directory: source files, non-empty subdirectories and
/// included non-source files, sorted by name.
pub(crate) fn directory_segments(dir: &Arc<Node>) -> Segments {
    let ctx = dir.context().clone();
    let mut children = Vec::new();
    let mut init_file: Option<Arc<Path>> = None;

    let Some(dir_path) = dir.path() else {
        return Segments {
            header: None,
            children,
        };
    };
    let entries = match ctx.fs.read_dir(dir_path) {
        Ok(entries) => entries,
        Err(error) => {
            warn!(path = %dir_path.display(), %error, "skipping unreadable directory");
            Vec::new()
        }
    };

    for entry in entries {
        if matches_any(&ctx, &ctx.ignore, &entry) {
            debug!(path = %entry.display(), "ignored");
            continue;
        }
        if ctx.fs.is_dir(&entry) {
            let sub = directory_node(&entry, Arc::downgrade(dir), ctx.clone());
            if sub.children().is_empty() {
                debug!(path = %entry.display(), "pruned directory without sources");
            } else {
                children.push(sub);
            }
            continue;
        }
        let kind = if ctx.is_source(&entry) {
            NodeKind::File
        } else if matches_any(&ctx, &ctx.include, &entry) {
            NodeKind::NonSourceFile
        } else {
            continue;
        };
        match read_file(&ctx, &entry, kind, Arc::downgrade(dir)) {
            Ok(node) => {
                if kind == NodeKind::File && node.name() == "__init__" {
                    init_file = Some(Arc::from(entry.as_path()));
                }
                children.push(node);
            }
            Err(error) => warn!(%error, "skipping unreadable file"),
        }
    }

    let header = Node::create(
        NodeInit {
            kind: NodeKind::Content,
            name: NULL.to_string(),
            text: String::new(),
            raw: None,
            start_line: 1,
            indent_offset: 0,
            path: init_file.or_else(|| Some(Arc::from(dir_path))),
        },
        Arc::downgrade(dir),
        ctx.clone(),
    );

    Segments {
        header: Some(header),
        children,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn directory_children_are_sorted_and_pruned() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "pkg/__init__.py", "\"\"\"Package doc.\"\"\"\n");
        write(dir.path(), "pkg/b.py", "x = 1\n");
        write(dir.path(), "pkg/a.py", "y = 2\n");
        write(dir.path(), "pkg/empty/readme.txt", "nothing");
        write(dir.path(), "pkg/build/gen.py", "z = 3\n");
        write(dir.path(), "pkg/data.toml", "k = 1\n");

        let root = TreeBuilder::new()
            .home(dir.path())
            .include(["*.toml"])
            .open("pkg")
            .unwrap();
        assert_eq!(root.kind(), NodeKind::Directory);
        assert_eq!(root.children_names(), ["__init__", "a", "b", "data.toml"]);
        assert_eq!(root.children()[3].kind(), NodeKind::NonSourceFile);
        assert_eq!(root.header().path().unwrap().file_name().unwrap(), "__init__.py");
    }

    #[test]
    fn relative_glob_ignores_nested_path() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a/skip/x.py", "x = 1\n");
        write(dir.path(), "a/keep/x.py", "x = 1\n");

        let root = TreeBuilder::new().ignore(["a/skip"]).open(dir.path()).unwrap();
        let a = root.jumpto("a").unwrap();
        assert_eq!(a.children_names(), ["keep"]);
    }

    #[test]
    fn missing_path_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = TreeBuilder::new().open(dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, TreeError::NotFound(_)));
    }

    #[test]
    fn open_dir_rejects_files() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "m.py", "x = 1\n");
        let err = TreeBuilder::new().open_dir(dir.path().join("m.py")).unwrap_err();
        assert!(matches!(err, TreeError::NotADirectory(_)));
    }

    #[test]
    fn file_start_line_skips_leading_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "m.py", "\n\nx = 1\n");
        let file = TreeBuilder::new().open(dir.path().join("m.py")).unwrap();
        assert_eq!(file.start_line(), 3);
        assert_eq!(file.text(), "x = 1");
        assert_eq!(file.raw_text(), Some("\n\nx = 1\n"));
    }

    #[test]
    fn invalid_glob_is_an_error() {
        let err = TreeBuilder::new().ignore(["a[b"]).parse("m", "x = 1").unwrap_err();
        assert!(matches!(err, TreeError::InvalidGlob { .. }));
    }
}
