//! Import statement scanning.

use crate::tree::node::{Node, NodeKind};
use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};

static STRING_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)""".*?"""|'''.*?'''|"(?:[^"\\\n]|\\.)*"|'(?:[^'\\\n]|\\.)*'"#)
        .expect("valid string-literal regex")
});

static PARENTHESIZED_IMPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)(\bimport[ \t]*)\(([^)]*)\)").expect("valid import-list regex"));

static IMPORT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\A(?:[ \t]*from[ \t]+([.\w]+)[ \t]+)?[ \t]*import[ \t]+((?:[.\w]+(?:[ \t]+as[ \t]+[.\w]+)?[ \t]*,?[ \t]*)+)")
        .expect("valid import regex")
});

static IMPORTED_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\A([.\w]+)(?:[ \t]+as[ \t]+([.\w]+))?").expect("valid name regex"));

static TYPE_CHECKING_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^if[ \t]+TYPE_CHECKING[ \t]*:(?:\n+    [^\n]*)+(?:\nelse[ \t]*:)?")
        .expect("valid TYPE_CHECKING regex")
});

/// One imported name.
#[derive(Debug, Clone)]
pub struct ImportRecord {
    /// Absolute name of the module doing the import
    pub owner: String,
    pub source_module: Option<String>,
    pub imported_name: String,
    pub alias: Option<String>,
    /// Imported inside an `if TYPE_CHECKING:` block
    pub type_checking_only: bool,
}

impl ImportRecord {
    pub fn is_relative(&self) -> bool {
        self.source_module.as_deref().is_some_and(|m| m.starts_with('.'))
    }

    pub fn field(&self, field: ImportField) -> FieldValue {
        let text = |s: &Option<String>| s.clone().map_or(FieldValue::Missing, FieldValue::Text);
        match field {
            ImportField::Owner => FieldValue::Text(self.owner.clone()),
            ImportField::SourceModule => text(&self.source_module),
            ImportField::ImportedName => FieldValue::Text(self.imported_name.clone()),
            ImportField::Alias => text(&self.alias),
            ImportField::TypeCheckingOnly => FieldValue::Flag(self.type_checking_only),
        }
    }
}

/// Records are the same import when module and name agree. Relative
/// imports depend on their owner's location and never compare equal.
impl PartialEq for ImportRecord {
    fn eq(&self, other: &Self) -> bool {
        !self.is_relative() && self.source_module == other.source_module && self.imported_name == other.imported_name
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportField {
    Owner,
    SourceModule,
    ImportedName,
    Alias,
    TypeCheckingOnly,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldValue {
    Missing,
    Flag(bool),
    Text(String),
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Missing => f.write_str("-"),
            FieldValue::Flag(flag) => write!(f, "{flag}"),
            FieldValue::Text(text) => f.write_str(text),
        }
    }
}

/// Records grouped by one field per level.
#[derive(Debug, Clone, PartialEq)]
pub enum ImportGroups {
    Records(Vec<ImportRecord>),
    Groups(BTreeMap<FieldValue, ImportGroups>),
}

impl ImportGroups {
    fn build(records: Vec<ImportRecord>, by: &[ImportField]) -> Self {
        let Some((&field, rest)) = by.split_first() else {
            return ImportGroups::Records(records);
        };
        let mut buckets: BTreeMap<FieldValue, Vec<ImportRecord>> = BTreeMap::new();
        for record in records {
            buckets.entry(record.field(field)).or_default().push(record);
        }
        ImportGroups::Groups(
            buckets
                .into_iter()
                .map(|(key, group)| (key, ImportGroups::build(group, rest)))
                .collect(),
        )
    }

    pub fn get(&self, key: &FieldValue) -> Option<&ImportGroups> {
        match self {
            ImportGroups::Groups(map) => map.get(key),
            ImportGroups::Records(_) => None,
        }
    }

    pub fn records(&self) -> Option<&[ImportRecord]> {
        match self {
            ImportGroups::Records(records) => Some(records),
            ImportGroups::Groups(_) => None,
        }
    }
}

/// Imports of a module, or of every module below a directory.
#[derive(Debug, Clone, Default)]
pub struct Imports {
    records: Vec<ImportRecord>,
}

impl Imports {
    pub fn records(&self) -> &[ImportRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn group_by(&self, by: &[ImportField]) -> ImportGroups {
        ImportGroups::build(self.records.clone(), by)
    }

    /// Records with later duplicates removed.
    pub fn unique(&self) -> Vec<ImportRecord> {
        let mut kept: Vec<ImportRecord> = Vec::new();
        for record in &self.records {
            if !kept.iter().any(|k| k == record) {
                kept.push(record.clone());
            }
        }
        kept
    }
}

impl From<Vec<ImportRecord>> for Imports {
    fn from(records: Vec<ImportRecord>) -> Self {
        Imports { records }
    }
}

/// Blank out the bodies of string literals, keeping the quotes.
pub fn quote_collapse(text: &str) -> String {
    STRING_LITERAL
        .replace_all(text, |caps: &Captures<'_>| {
            let literal = &caps[0];
            let quote = if literal.starts_with("\"\"\"") || literal.starts_with("'''") {
                &literal[..3]
            } else {
                &literal[..1]
            };
            format!("{quote}{quote}")
        })
        .into_owned()
}

/// Join `import (a,\n b)` lists onto one line.
fn flatten_import_lists(text: &str) -> String {
    PARENTHESIZED_IMPORT
        .replace_all(text, |caps: &Captures<'_>| {
            let names: Vec<&str> = caps[2]
                .lines()
                .map(|line| line.split('#').next().unwrap_or("").trim())
                .flat_map(|line| line.split(','))
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .collect();
            format!("{}{}", &caps[1], names.join(", "))
        })
        .into_owned()
}

fn scan(owner: &str, text: &str, type_checking_only: bool, out: &mut Vec<ImportRecord>) {
    for line in text.lines() {
        let Some(caps) = IMPORT_LINE.captures(line) else {
            continue;
        };
        let source_module = caps.get(1).map(|m| m.as_str().to_string());
        for item in caps[2].split(',') {
            let Some(name) = IMPORTED_NAME.captures(item.trim()) else {
                continue;
            };
            out.push(ImportRecord {
                owner: owner.to_string(),
                source_module: source_module.clone(),
                imported_name: name[1].to_string(),
                alias: name.get(2).map(|m| m.as_str().to_string()),
                type_checking_only,
            });
        }
    }
}

fn collect(node: &Arc<Node>, out: &mut Vec<ImportRecord>) {
    match node.kind() {
        NodeKind::Directory => {
            for child in node.children() {
                collect(child, out);
            }
        }
        NodeKind::NonSourceFile => {}
        _ => {
            let text = flatten_import_lists(&quote_collapse(node.text()));
            let guarded: String = TYPE_CHECKING_BLOCK
                .find_iter(&text)
                .map(|m| m.as_str())
                .collect::<Vec<_>>()
                .join("\n");
            let functional = TYPE_CHECKING_BLOCK.replace_all(&text, "");
            scan(node.absolute_name(), &functional, false, out);
            scan(node.absolute_name(), &guarded, true, out);
        }
    }
}

impl Node {
    /// Import statements of this node's text, or of every source file
    /// below a directory.
    pub fn imports(self: &Arc<Self>) -> Imports {
        let mut records = Vec::new();
        collect(self, &mut records);
        Imports { records }
    }
}
