//! Staged multi-file replacements with confirm and rollback.
//!
//! [`Node::replace`] stages one [`Edit`] per touched file without writing
//! anything. [`Transaction::confirm`] writes them, checking each file for
//! external modification first; [`Transaction::rollback`] undoes a confirm.
//! Per-file failures are collected in a [`WriteSummary`] rather than raised.

use crate::edit::{Edit, EditError, FailureReason};
use crate::pattern::{Pattern, PatternError, Replace, SearchOptions};
use crate::tree::{FindResult, Node, NodeKind};
use similar::TextDiff;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("transaction is already confirmed")]
    AlreadyConfirmed,

    #[error("transaction is not confirmed, nothing to roll back")]
    NotConfirmed,

    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error(transparent)]
    Edit(#[from] EditError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TxState {
    #[default]
    Staged,
    Confirmed,
    RolledBack,
}

/// A file that could not be written, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteFailure {
    pub path: PathBuf,
    pub reason: FailureReason,
}

/// Outcome of [`Transaction::confirm`] or [`Transaction::rollback`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub successful: Vec<PathBuf>,
    pub failed: Vec<WriteFailure>,
    /// Targets of edits skipped because a later edit in their chain replaced them
    pub superseded: Vec<PathBuf>,
}

impl WriteSummary {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    fn fail(&mut self, path: PathBuf, reason: FailureReason) {
        warn!(path = %path.display(), %reason, "file not written");
        self.failed.push(WriteFailure { path, reason });
    }
}

/// Ordered batch of staged [`Edit`]s.
#[derive(Debug, Default)]
#[must_use = "staged edits are not written until the transaction is confirmed"]
pub struct Transaction {
    edits: Vec<Arc<Edit>>,
    pattern: Option<Pattern>,
    state: TxState,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn edits(&self) -> &[Arc<Edit>] {
        &self.edits
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn state(&self) -> TxState {
        self.state
    }

    /// Pattern the edits were staged with, after search options were applied.
    pub fn pattern(&self) -> Option<&Pattern> {
        self.pattern.as_ref()
    }

    /// Total substitutions across all edits.
    pub fn count(&self) -> usize {
        self.edits.iter().map(|e| e.count()).sum()
    }

    /// Append `other`'s edits after this transaction's.
    pub fn join(&mut self, other: Transaction) {
        if self.pattern.is_none() {
            self.pattern = other.pattern;
        }
        self.edits.extend(other.edits);
    }

    fn push(&mut self, edit: Edit) {
        self.edits.push(Arc::new(edit));
    }

    /// Newest non-superseded edit staged on the file containing `node`.
    pub fn active_edit_for(&self, node: &Arc<Node>) -> Option<&Arc<Edit>> {
        let file = node.owning_file()?;
        self.edits
            .iter()
            .rev()
            .find(|e| e.is_active() && e.applies_to(&file))
    }

    /// Write every active edit.
    ///
    /// Fails only when the transaction is already confirmed. A rolled-back
    /// transaction may be confirmed again.
    pub fn confirm(&mut self) -> Result<WriteSummary, TransactionError> {
        if self.state == TxState::Confirmed {
            return Err(TransactionError::AlreadyConfirmed);
        }
        let mut summary = WriteSummary::default();
        for edit in &self.edits {
            if !edit.is_active() {
                debug!(path = %edit.target().display(), generation = edit.generation(), "superseded edit skipped");
                summary.superseded.push(edit.target().to_path_buf());
                continue;
            }
            match edit.write() {
                Ok(()) => summary.successful.push(edit.target().to_path_buf()),
                Err(reason) => summary.fail(edit.target().to_path_buf(), reason),
            }
        }
        self.state = TxState::Confirmed;
        info!(
            written = summary.successful.len(),
            failed = summary.failed.len(),
            superseded = summary.superseded.len(),
            "transaction confirmed"
        );
        Ok(summary)
    }

    /// Undo a confirm. Edits that were never written are left alone.
    ///
    /// Without `force`, a file that changed since it was written is
    /// reported as a conflict and kept.
    pub fn rollback(&mut self, force: bool) -> Result<WriteSummary, TransactionError> {
        if self.state != TxState::Confirmed {
            return Err(TransactionError::NotConfirmed);
        }
        let mut summary = WriteSummary::default();
        for edit in self.edits.iter().rev() {
            if !edit.is_written() {
                continue;
            }
            match edit.revert(force) {
                Ok(()) => summary.successful.push(edit.target().to_path_buf()),
                Err(reason) => summary.fail(edit.target().to_path_buf(), reason),
            }
        }
        self.state = TxState::RolledBack;
        info!(
            restored = summary.successful.len(),
            failed = summary.failed.len(),
            force,
            "transaction rolled back"
        );
        Ok(summary)
    }

    /// Lines the active edits will change, as they read before the edit.
    ///
    /// Each finding's ordinal is the index of its edit.
    pub fn preview(&self) -> Result<FindResult, PatternError> {
        let mut result = FindResult::new();
        for (ordinal, edit) in self.edits.iter().enumerate() {
            if !edit.is_active() {
                continue;
            }
            let line_pattern = edit.pattern().expand_to_line()?;
            let before = edit.file().rebuilt_with(edit.base_text().to_string());
            let mut found = before.find_lines(edit.pattern(), &line_pattern, None);
            if let Some(lines) = edit.line_range() {
                found.retain_lines(lines);
            }
            found.anchor(before);
            result.join(found.with_ordinal(ordinal));
        }
        Ok(result)
    }

    /// Unified diff of every active edit against the original file content.
    pub fn diff(&self) -> String {
        let mut out = String::new();
        for edit in self.edits.iter().filter(|e| e.is_active()) {
            let source = edit
                .file()
                .path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| edit.file().name().to_string());
            let target = edit.target().display().to_string();
            let diff = TextDiff::from_lines(edit.original_text(), edit.new_text());
            out.push_str(
                &diff
                    .unified_diff()
                    .context_radius(3)
                    .header(&source, &target)
                    .to_string(),
            );
        }
        out
    }
}

/// How [`Node::replace`] stages its edits.
#[derive(Debug, Clone, Copy)]
pub struct ReplaceOptions<'a> {
    pub search: SearchOptions,
    /// Write in place; otherwise each edit goes to a `_copy` sibling
    pub overwrite: bool,
    /// Substitute over the edits this transaction already staged
    pub based_on: Option<&'a Transaction>,
}

impl Default for ReplaceOptions<'_> {
    fn default() -> Self {
        Self {
            search: SearchOptions::default(),
            overwrite: true,
            based_on: None,
        }
    }
}

impl Node {
    /// Stage replacing every match of `pattern` in this subtree with `repl`.
    ///
    /// Directories stage one edit per source file below them; non-source
    /// files are skipped. Nothing is written until the returned transaction
    /// is confirmed.
    pub fn replace<R: Replace>(
        self: &Arc<Self>,
        pattern: &Pattern,
        mut repl: R,
        options: &ReplaceOptions<'_>,
    ) -> Result<Transaction, TransactionError> {
        let pattern = pattern.transform(&options.search)?;
        let mut tx = Transaction {
            pattern: Some(pattern.clone()),
            ..Transaction::default()
        };
        self.stage_into(&mut tx, &pattern, &mut repl, options)?;
        debug!(node = %self, edits = tx.len(), "replace staged");
        Ok(tx)
    }

    /// [`Node::replace`] with an empty replacement.
    pub fn delete(self: &Arc<Self>, pattern: &Pattern, options: &ReplaceOptions<'_>) -> Result<Transaction, TransactionError> {
        self.replace(pattern, "", options)
    }

    fn stage_into<R: Replace>(
        self: &Arc<Self>,
        tx: &mut Transaction,
        pattern: &Pattern,
        repl: &mut R,
        options: &ReplaceOptions<'_>,
    ) -> Result<(), TransactionError> {
        match self.kind() {
            NodeKind::Directory => {
                for child in self.children() {
                    child.stage_into(tx, pattern, repl, options)?;
                }
                Ok(())
            }
            NodeKind::NonSourceFile => Ok(()),
            _ => {
                let based_on = options
                    .based_on
                    .and_then(|prev| prev.active_edit_for(self))
                    .cloned();
                if let Some(edit) = Edit::stage(self, pattern, Replace::by_ref(repl), options.overwrite, based_on)? {
                    tx.push(edit);
                }
                Ok(())
            }
        }
    }
}
