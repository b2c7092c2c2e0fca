use crate::pattern::SearchOptions;
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;

/// Paths skipped while walking a directory unless configured otherwise.
pub const DEFAULT_IGNORE: &[&str] = &["build", ".git", ".github"];

pub const DEFAULT_SOURCE_EXTENSIONS: &[&str] = &["py"];

/// Contents of `srctree.toml`.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct TreeConfig {
    #[serde(default)]
    pub tree: TreeSection,
    #[serde(default)]
    pub search: SearchOptions,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TreeSection {
    /// Root that relative paths are displayed against
    #[serde(default)]
    pub home: Option<PathBuf>,
    #[serde(default = "default_ignore")]
    pub ignore: Vec<String>,
    /// Non-source files to keep in the tree
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default = "default_source_extensions")]
    pub source_extensions: Vec<String>,
}

impl Default for TreeSection {
    fn default() -> Self {
        Self {
            home: None,
            ignore: default_ignore(),
            include: Vec::new(),
            source_extensions: default_source_extensions(),
        }
    }
}

fn default_ignore() -> Vec<String> {
    DEFAULT_IGNORE.iter().map(|s| s.to_string()).collect()
}

fn default_source_extensions() -> Vec<String> {
    DEFAULT_SOURCE_EXTENSIONS.iter().map(|s| s.to_string()).collect()
}

impl TreeConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        for (field, globs) in [("tree.ignore", &self.tree.ignore), ("tree.include", &self.tree.include)] {
            for pattern in globs {
                if let Err(e) = globset::Glob::new(pattern) {
                    issues.push(ValidationIssue::InvalidGlob {
                        field,
                        pattern: pattern.clone(),
                        message: e.kind().to_string(),
                    });
                }
            }
        }

        if self.tree.source_extensions.is_empty() {
            issues.push(ValidationIssue::NoSourceExtensions);
        }
        for ext in &self.tree.source_extensions {
            if ext.trim().is_empty() || ext.starts_with('.') {
                issues.push(ValidationIssue::BadExtension(ext.clone()));
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    InvalidGlob {
        field: &'static str,
        pattern: String,
        message: String,
    },
    NoSourceExtensions,
    BadExtension(String),
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::InvalidGlob {
                field,
                pattern,
                message,
            } => write!(f, "'{field}' has invalid glob '{pattern}': {message}"),
            ValidationIssue::NoSourceExtensions => {
                write!(f, "'tree.source_extensions' must name at least one extension")
            }
            ValidationIssue::BadExtension(ext) => {
                write!(f, "source extension '{ext}' must be non-empty and given without a leading dot")
            }
        }
    }
}
