//! srctree: line-exact source trees, bracket-aware search and
//! transactional multi-file replace.
//!
//! A source directory is decomposed into a hierarchy of [`Node`]s
//! (directories, files, classes, functions, methods, properties and the
//! code fragments between them). Every node knows the exact 1-based line
//! its text starts on, so search results point at real file lines.
//!
//! # Architecture
//!
//! - [`pattern`]: plain regexes plus [`SmartPattern`]s that skip balanced
//!   bracket spans at marker points (`f{}` matches `f(a, (b))`).
//! - [`tree`]: building and navigating nodes, search, docstrings and imports.
//! - [`edit`] / [`transaction`]: replacements are staged per file, previewed,
//!   then confirmed or rolled back with conflict detection.
//!
//! # Safety
//!
//! - Nothing touches disk until [`Transaction::confirm`]
//! - Files modified externally since staging are reported, not overwritten
//! - Atomic file writes (tempfile + fsync + rename)
//!
//! # Example
//!
//! ```no_run
//! use srctree::{Pattern, ReplaceOptions, SearchOptions};
//!
//! let root = srctree::tree::open("src").unwrap();
//! let pattern = Pattern::smart("print{}").unwrap();
//! for finding in &root.find_all(&pattern, &SearchOptions::default()).unwrap() {
//!     println!("{}:{} {}", finding.node, finding.line_number, finding.line_text);
//! }
//!
//! let mut tx = root
//!     .replace(&Pattern::regex("old_name").unwrap(), "new_name", &ReplaceOptions::default())
//!     .unwrap();
//! let summary = tx.confirm().unwrap();
//! for failure in &summary.failed {
//!     eprintln!("{}: {}", failure.path.display(), failure.reason);
//! }
//! ```

pub mod cache;
pub mod config;
pub mod edit;
pub mod fs;
pub mod pattern;
pub mod transaction;
pub mod tree;

// Re-exports
pub use config::{load_from_path, load_from_str, ConfigError, TreeConfig};
pub use edit::{Edit, EditError, EditState, EditVerification, FailureReason};
pub use fs::{FileSystem, OsFileSystem};
pub use pattern::{Flags, KeepDelimiter, Match, Pattern, PatternError, Replace, SearchOptions, SmartPattern};
pub use transaction::{ReplaceOptions, Transaction, TransactionError, TxState, WriteFailure, WriteSummary};
pub use tree::{FindResult, Finding, Node, NodeKind, TreeBuilder, TreeError};
