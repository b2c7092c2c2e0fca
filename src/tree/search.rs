use crate::pattern::{Pattern, PatternError, SearchOptions};
use crate::transaction::Transaction;
use crate::tree::node::Node;
use std::path::PathBuf;
use std::sync::Arc;

/// One matching line, attributed to the node it physically belongs to.
#[derive(Debug, Clone)]
pub struct Finding {
    pub node: Arc<Node>,
    pub pattern: Pattern,
    /// 1-based line in the node's file
    pub line_number: usize,
    /// The whole matching line, with the node's indent restored
    pub line_text: String,
    /// Index of the staged edit this finding came from, 0 otherwise
    pub ordinal: usize,
}

impl Finding {
    pub fn path(&self) -> Option<PathBuf> {
        self.node.relative_path()
    }

    /// Columns (0-based byte offsets into `line_text`) of each match of the pattern.
    pub fn spans(&self) -> Vec<std::ops::Range<usize>> {
        self.pattern
            .find_all(&self.line_text)
            .into_iter()
            .filter(|m| !m.is_empty())
            .map(|m| m.range())
            .collect()
    }

    fn sort_key(&self) -> (Option<&std::path::Path>, usize, usize) {
        (self.node.path(), self.line_number, self.ordinal)
    }
}

/// Ordered collection of [`Finding`]s.
#[derive(Debug, Clone, Default)]
pub struct FindResult {
    findings: Vec<Finding>,
    // Rebuilt file roots whose descendants appear in `findings`
    anchors: Vec<Arc<Node>>,
}

impl FindResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, finding: Finding) {
        self.findings.push(finding);
    }

    pub fn join(&mut self, other: FindResult) {
        self.findings.extend(other.findings);
        self.anchors.extend(other.anchors);
    }

    pub fn len(&self) -> usize {
        self.findings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Finding> {
        self.findings.iter()
    }

    /// Sort by file path, then line, then ordinal.
    pub fn sort(&mut self) {
        self.findings.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    }

    pub fn line_numbers(&self) -> Vec<usize> {
        self.findings.iter().map(|f| f.line_number).collect()
    }

    /// Keep `root` alive for as long as findings under it are held.
    pub(crate) fn anchor(&mut self, root: Arc<Node>) {
        self.anchors.push(root);
    }

    pub(crate) fn retain_lines(&mut self, lines: std::ops::RangeInclusive<usize>) {
        self.findings.retain(|f| lines.contains(&f.line_number));
    }

    pub(crate) fn with_ordinal(mut self, ordinal: usize) -> Self {
        for f in &mut self.findings {
            f.ordinal = ordinal;
        }
        self
    }
}

impl IntoIterator for FindResult {
    type Item = Finding;
    type IntoIter = std::vec::IntoIter<Finding>;

    fn into_iter(self) -> Self::IntoIter {
        self.findings.into_iter()
    }
}

impl<'a> IntoIterator for &'a FindResult {
    type Item = &'a Finding;
    type IntoIter = std::slice::Iter<'a, Finding>;

    fn into_iter(self) -> Self::IntoIter {
        self.findings.iter()
    }
}

impl Node {
    /// Every line in this subtree that matches `pattern` after `options`
    /// are applied.
    pub fn find_all(self: &Arc<Self>, pattern: &Pattern, options: &SearchOptions) -> Result<FindResult, PatternError> {
        let pattern = pattern.transform(options)?;
        let line_pattern = pattern.expand_to_line()?;
        Ok(self.find_lines(&pattern, &line_pattern, None))
    }

    /// Like [`Node::find_all`], but files with an active staged edit in
    /// `transaction` are searched as they would read after confirming.
    pub fn find_all_based_on(
        self: &Arc<Self>,
        pattern: &Pattern,
        options: &SearchOptions,
        transaction: &Transaction,
    ) -> Result<FindResult, PatternError> {
        let pattern = pattern.transform(options)?;
        let line_pattern = pattern.expand_to_line()?;
        Ok(self.find_lines(&pattern, &line_pattern, Some(transaction)))
    }

    pub(crate) fn find_lines(
        self: &Arc<Self>,
        pattern: &Pattern,
        line_pattern: &Pattern,
        based_on: Option<&Transaction>,
    ) -> FindResult {
        if let (Some(tx), true) = (based_on, self.is_file()) {
            if let Some(edit) = tx.active_edit_for(self) {
                let latest = self.rebuilt_with(edit.new_text().to_string());
                let mut result = latest.find_lines(pattern, line_pattern, None);
                result.anchor(latest);
                return result;
            }
        }

        let mut result = FindResult::new();
        if self.children().is_empty() {
            let padding = " ".repeat(self.indent_offset());
            for m in line_pattern.find_all_by_line(self.text()) {
                if m.matched.is_empty() {
                    continue;
                }
                result.push(Finding {
                    node: self.clone(),
                    pattern: pattern.clone(),
                    line_number: self.start_line() + m.line - 1,
                    line_text: format!("{padding}{}", m.as_str()),
                    ordinal: 0,
                });
            }
            return result;
        }

        result.join(self.header().find_lines(pattern, line_pattern, based_on));
        for child in self.children() {
            result.join(child.find_lines(pattern, line_pattern, based_on));
        }
        result
    }
}
