use crate::fs::FileSystem;
use crate::pattern::{Pattern, Replace};
use crate::tree::Node;
use similar::{DiffTag, TextDiff};
use std::ops::{Range, RangeInclusive};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

/// One staged replacement of a whole file's content.
///
/// Edits on the same file can be chained: an edit staged `based_on` an
/// earlier one substitutes over the earlier edit's result and supersedes
/// it, so only the newest generation of a chain is ever written.
#[derive(Debug)]
#[must_use = "Edit does nothing until its transaction is confirmed"]
pub struct Edit {
    node: Arc<Node>,
    file: Arc<Node>,
    target: PathBuf,
    /// File content before the first edit of the chain
    original_text: String,
    /// Text this edit substituted over
    base_text: String,
    new_text: String,
    /// Lines of `node` within `base_text`; `None` for whole-file edits
    lines: Option<RangeInclusive<usize>>,
    pattern: Pattern,
    count: usize,
    overwrite: bool,
    expected_before: EditVerification,
    expected_after: EditVerification,
    generation: usize,
    based_on: Option<Arc<Edit>>,
    superseded: OnceLock<()>,
    written: AtomicBool,
    fs: Arc<dyn FileSystem>,
}

/// Verification strategy for edit safety.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditVerification {
    /// Exact text match required
    ExactMatch(String),
    /// xxh3 hash of expected text (faster for large files)
    Hash(u64),
}

impl EditVerification {
    /// Check if the provided text matches the verification criteria.
    pub fn matches(&self, text: &str) -> bool {
        match self {
            EditVerification::ExactMatch(expected) => text == expected,
            EditVerification::Hash(expected_hash) => xxh3_64(text.as_bytes()) == *expected_hash,
        }
    }

    /// Create verification from text, using hash for text over 1KB.
    pub fn from_text(text: &str) -> Self {
        if text.len() > 1024 {
            EditVerification::Hash(xxh3_64(text.as_bytes()))
        } else {
            EditVerification::ExactMatch(text.to_string())
        }
    }

    /// Get hash value regardless of variant.
    pub fn hash(&self) -> u64 {
        match self {
            EditVerification::Hash(h) => *h,
            EditVerification::ExactMatch(text) => xxh3_64(text.as_bytes()),
        }
    }
}

/// Whether an edit is still the newest generation of its chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditState {
    Active,
    Superseded,
}

#[derive(Error, Debug)]
pub enum EditError {
    #[error("{0} is not inside a source file")]
    NotInFile(String),

    #[error("{0} has no backing file to write")]
    NoBackingFile(String),
}

/// Why writing one file failed during confirm or rollback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The file changed on disk since the edit was staged
    Conflict,
    Io(String),
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::Conflict => write!(f, "modified since the edit was staged"),
            FailureReason::Io(message) => write!(f, "{message}"),
        }
    }
}

impl Edit {
    /// Substitute `pattern` inside `node` and stage the resulting file text.
    ///
    /// Returns `Ok(None)` when nothing matched. For nodes inside a file,
    /// only the node's own lines are rewritten. When chained, those lines
    /// are followed through the earlier edits to where they sit in the
    /// predecessor's result.
    pub(crate) fn stage<R: Replace>(
        node: &Arc<Node>,
        pattern: &Pattern,
        repl: R,
        overwrite: bool,
        based_on: Option<Arc<Edit>>,
    ) -> Result<Option<Edit>, EditError> {
        let file = node
            .owning_file()
            .ok_or_else(|| EditError::NotInFile(node.to_string()))?;
        let source = file
            .path()
            .ok_or_else(|| EditError::NoBackingFile(file.to_string()))?
            .to_path_buf();
        let raw = file.raw_text().unwrap_or_default();

        let (base_text, original_text) = match &based_on {
            Some(prev) => (prev.new_text.clone(), prev.original_text.clone()),
            None => (raw.to_string(), raw.to_string()),
        };

        let lines = (!node.is_file())
            .then(|| follow_lines(raw, &base_text, node.start_line(), node.end_line()));
        let range = match &lines {
            Some(lines) => line_span(&base_text, *lines.start(), *lines.end()),
            None => 0..base_text.len(),
        };
        let substituted = pattern.substitute(&base_text[range.clone()], None, repl);
        if substituted.count == 0 {
            return Ok(None);
        }
        let mut new_text = String::with_capacity(base_text.len() + substituted.text.len());
        new_text.push_str(&base_text[..range.start]);
        new_text.push_str(&substituted.text);
        new_text.push_str(&base_text[range.end..]);

        let fs = file.context().fs.clone();
        let (target, overwrite, generation) = match &based_on {
            Some(prev) => {
                prev.supersede();
                (prev.target.clone(), prev.overwrite, prev.generation + 1)
            }
            None if overwrite => (source, true, 1),
            None => (copy_path(fs.as_ref(), &source), false, 1),
        };

        tracing::debug!(
            target = %target.display(),
            count = substituted.count,
            generation,
            "staged edit"
        );

        Ok(Some(Edit {
            node: node.clone(),
            file,
            target,
            expected_before: EditVerification::from_text(&original_text),
            expected_after: EditVerification::from_text(&new_text),
            original_text,
            base_text,
            new_text,
            lines,
            pattern: pattern.clone(),
            count: substituted.count,
            overwrite,
            generation,
            based_on,
            superseded: OnceLock::new(),
            written: AtomicBool::new(false),
            fs,
        }))
    }

    /// Node the replacement was requested on.
    pub fn node(&self) -> &Arc<Node> {
        &self.node
    }

    /// File node owning [`Edit::node`].
    pub fn file(&self) -> &Arc<Node> {
        &self.file
    }

    /// Path written on confirm.
    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn original_text(&self) -> &str {
        &self.original_text
    }

    pub fn base_text(&self) -> &str {
        &self.base_text
    }

    pub fn new_text(&self) -> &str {
        &self.new_text
    }

    /// Lines of [`Edit::node`] in [`Edit::base_text`], for edits below file level.
    pub fn line_range(&self) -> Option<RangeInclusive<usize>> {
        self.lines.clone()
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// Number of substitutions made.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn overwrite(&self) -> bool {
        self.overwrite
    }

    /// 1 for a fresh edit, one more than its predecessor when chained.
    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn based_on(&self) -> Option<&Arc<Edit>> {
        self.based_on.as_ref()
    }

    pub fn state(&self) -> EditState {
        if self.superseded.get().is_some() {
            EditState::Superseded
        } else {
            EditState::Active
        }
    }

    pub fn is_active(&self) -> bool {
        self.state() == EditState::Active
    }

    /// True when the last confirm wrote this edit and no rollback undid it.
    pub fn is_written(&self) -> bool {
        self.written.load(Ordering::SeqCst)
    }

    pub(crate) fn applies_to(&self, file: &Node) -> bool {
        self.file.path().is_some() && self.file.path() == file.path()
    }

    fn supersede(&self) {
        let _ = self.superseded.set(());
    }

    /// What the target must contain before this edit may be written.
    ///
    /// `None` means the target must not exist yet: a copy no earlier
    /// generation has written.
    fn expected_on_disk(&self) -> Option<&EditVerification> {
        let mut prev = self.based_on.as_deref();
        while let Some(edit) = prev {
            if edit.is_written() {
                return Some(&edit.expected_after);
            }
            prev = edit.based_on.as_deref();
        }
        self.overwrite.then_some(&self.expected_before)
    }

    /// Write `new_text` to the target, refusing if the file changed.
    pub(crate) fn write(&self) -> Result<(), FailureReason> {
        match self.expected_on_disk() {
            Some(expected) => {
                let current = self
                    .fs
                    .read_to_string(&self.target)
                    .map_err(|e| FailureReason::Io(e.to_string()))?;
                if !expected.matches(&current) {
                    return Err(FailureReason::Conflict);
                }
            }
            None if self.fs.exists(&self.target) => return Err(FailureReason::Conflict),
            None => {}
        }
        self.fs
            .write(&self.target, &self.new_text)
            .map_err(|e| FailureReason::Io(e.to_string()))?;
        self.mark_chain_written(false);
        self.written.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Restore the original content, or remove the copy this edit created.
    pub(crate) fn revert(&self, force: bool) -> Result<(), FailureReason> {
        if !force {
            let current = self
                .fs
                .read_to_string(&self.target)
                .map_err(|e| FailureReason::Io(e.to_string()))?;
            if !self.expected_after.matches(&current) {
                return Err(FailureReason::Conflict);
            }
        }
        let result = if self.overwrite {
            self.fs.write(&self.target, &self.original_text)
        } else if self.fs.exists(&self.target) {
            self.fs.remove(&self.target)
        } else {
            Ok(())
        };
        result.map_err(|e| FailureReason::Io(e.to_string()))?;
        self.mark_chain_written(false);
        self.written.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn mark_chain_written(&self, written: bool) {
        let mut prev = self.based_on.as_deref();
        while let Some(edit) = prev {
            edit.written.store(written, Ordering::SeqCst);
            prev = edit.based_on.as_deref();
        }
    }
}

/// Byte range of lines `first..=last` (1-based) in `text`, newline excluded.
fn line_span(text: &str, first: usize, last: usize) -> Range<usize> {
    let mut start = if first <= 1 { 0 } else { text.len() };
    let mut end = text.len();
    let mut line = 1;
    for (i, b) in text.bytes().enumerate() {
        if b != b'\n' {
            continue;
        }
        if line == last {
            end = i;
        }
        line += 1;
        if line == first {
            start = i + 1;
        }
        if line > last {
            break;
        }
    }
    start..end.max(start)
}

/// Where lines `first..=last` (1-based) of `from` sit in `to`.
///
/// Unchanged lines move by the size of the hunks above them; a boundary
/// line inside a changed hunk widens to cover the whole hunk.
fn follow_lines(from: &str, to: &str, first: usize, last: usize) -> RangeInclusive<usize> {
    if from == to {
        return first..=last;
    }
    let diff = TextDiff::from_lines(from, to);
    let locate = |line: usize, is_end: bool| {
        let index = line.saturating_sub(1);
        for op in diff.ops() {
            let old = op.old_range();
            if !old.contains(&index) {
                continue;
            }
            let new = op.new_range();
            return match op.tag() {
                DiffTag::Equal => new.start + (index - old.start) + 1,
                _ if is_end => new.end,
                _ => new.start + 1,
            };
        }
        line
    };
    let start = locate(first, false);
    start..=locate(last, true).max(start)
}

/// First `<stem>_copy[_copy…].<ext>` sibling of `path` that does not exist.
fn copy_path(fs: &dyn FileSystem, path: &Path) -> PathBuf {
    let extension = path.extension().map(|e| e.to_string_lossy().into_owned());
    let mut stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut candidate = path.to_path_buf();
    while fs.exists(&candidate) {
        stem.push_str("_copy");
        let name = match &extension {
            Some(ext) => format!("{stem}.{ext}"),
            None => stem.clone(),
        };
        candidate = path.with_file_name(name);
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::OsFileSystem;

    #[test]
    fn test_edit_verification_exact_match() {
        let text = "hello world";
        let verify = EditVerification::ExactMatch(text.to_string());
        assert!(verify.matches(text));
        assert!(!verify.matches("hello"));
    }

    #[test]
    fn test_edit_verification_hash() {
        let text = "hello world";
        let verify = EditVerification::Hash(xxh3_64(text.as_bytes()));
        assert!(verify.matches(text));
        assert!(!verify.matches("goodbye world"));
    }

    #[test]
    fn test_edit_verification_from_text_switches_to_hash() {
        assert!(matches!(EditVerification::from_text("small"), EditVerification::ExactMatch(_)));
        let large = "x".repeat(2000);
        let verify = EditVerification::from_text(&large);
        assert!(matches!(verify, EditVerification::Hash(_)));
        assert_eq!(verify.hash(), xxh3_64(large.as_bytes()));
    }

    #[test]
    fn test_line_span() {
        let text = "a\nbb\nccc\nd";
        assert_eq!(&text[line_span(text, 2, 3)], "bb\nccc");
        assert_eq!(&text[line_span(text, 1, 1)], "a");
        assert_eq!(&text[line_span(text, 4, 4)], "d");
        assert_eq!(&text[line_span(text, 3, 9)], "ccc\nd");
    }

    #[test]
    fn test_follow_lines_shifts_below_a_grown_hunk() {
        let from = "x = old\n\n\ndef f():\n    return old\n";
        let to = "x = 1\ny = 2\nv = old\n\n\ndef f():\n    return old\n";
        assert_eq!(follow_lines(from, to, 4, 5), 6..=7);
        assert_eq!(follow_lines(from, from, 4, 5), 4..=5);
    }

    #[test]
    fn test_follow_lines_widens_over_changed_boundary() {
        let from = "a\nb\nc\nd\n";
        let to = "a\nB1\nB2\nc\n";
        assert_eq!(follow_lines(from, to, 2, 3), 2..=4);
        assert_eq!(follow_lines(from, to, 1, 1), 1..=1);
    }

    #[test]
    fn test_copy_path_skips_existing() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("mod.py");
        std::fs::write(&original, "").unwrap();
        std::fs::write(dir.path().join("mod_copy.py"), "").unwrap();
        let copy = copy_path(&OsFileSystem, &original);
        assert_eq!(copy.file_name().unwrap(), "mod_copy_copy.py");
    }
}
