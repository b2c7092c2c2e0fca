//! Source trees: directories, files, classes, functions and the code
//! fragments between them, each knowing its exact lines in the file.

pub mod builder;
pub mod doc;
pub mod errors;
pub mod imports;
pub mod node;
pub mod search;
pub mod segment;

pub use builder::TreeBuilder;
pub use doc::Docstring;
pub use errors::TreeError;
pub use imports::{quote_collapse, FieldValue, ImportField, ImportGroups, ImportRecord, Imports};
pub use node::{Node, NodeKind, TreeContext};
pub use search::{FindResult, Finding};

use std::path::Path;
use std::sync::Arc;

/// Name given to anonymous fragments; transparent in qualified names.
pub const NULL: &str = "NULL";

/// Open a file or directory with default settings.
pub fn open(path: impl AsRef<Path>) -> Result<Arc<Node>, TreeError> {
    TreeBuilder::new().open(path)
}

/// Build a file tree named `name` from text.
pub fn parse(name: &str, text: &str) -> Arc<Node> {
    let ctx = TreeBuilder::new().text_context();
    Node::file_from_text(
        NodeKind::File,
        name.to_string(),
        text.to_string(),
        None,
        std::sync::Weak::new(),
        ctx,
    )
}
