use crate::config::schema::{TreeConfig, ValidationError};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the configuration file searched for from the working directory upwards.
pub const CONFIG_FILE_NAME: &str = "srctree.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Toml(#[from] toml_edit::de::Error),

    #[error("invalid config: {0}")]
    Validation(#[from] ValidationError),

    #[error("{}: {source}", path.display())]
    InFile {
        path: PathBuf,
        #[source]
        source: Box<ConfigError>,
    },
}

impl ConfigError {
    /// The parse or validation error underneath any file context.
    pub fn root_cause(&self) -> &ConfigError {
        match self {
            ConfigError::InFile { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

pub fn load_from_str(input: &str) -> Result<TreeConfig, ConfigError> {
    let config: TreeConfig = toml_edit::de::from_str(input)?;
    config.validate()?;
    Ok(config)
}

/// Load a config file. A relative `tree.home` is taken from the file's directory.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<TreeConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut config = load_from_str(&contents).map_err(|source| ConfigError::InFile {
        path: path.to_path_buf(),
        source: Box::new(source),
    })?;

    if let (Some(home), Some(dir)) = (config.tree.home.as_mut(), path.parent()) {
        if home.is_relative() {
            *home = dir.join(&*home);
        }
    }
    tracing::debug!(path = %path.display(), "loaded config");
    Ok(config)
}

/// Nearest `srctree.toml` in `start` or one of its ancestors.
pub fn discover(start: impl AsRef<Path>) -> Option<PathBuf> {
    start
        .as_ref()
        .ancestors()
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .find(|candidate| candidate.is_file())
}

/// Load the nearest `srctree.toml` above `dir`, defaults when there is none.
pub fn load_or_default(dir: impl AsRef<Path>) -> Result<TreeConfig, ConfigError> {
    match discover(dir) {
        Some(path) => load_from_path(path),
        None => Ok(TreeConfig::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_gives_defaults() {
        let config = load_from_str("").unwrap();
        assert_eq!(config.tree.ignore, ["build", ".git", ".github"]);
        assert_eq!(config.tree.source_extensions, ["py"]);
        assert!(config.search.case_sensitive);
        assert!(config.search.regex);
    }

    #[test]
    fn sections_are_read() {
        let config = load_from_str(
            r#"
[tree]
home = "src"
ignore = ["target", "*.egg-info"]
include = ["*.toml"]

[search]
whole_word = true
case_sensitive = false
"#,
        )
        .unwrap();
        assert_eq!(config.tree.home.as_deref(), Some(Path::new("src")));
        assert_eq!(config.tree.include, ["*.toml"]);
        assert!(config.search.whole_word);
        assert!(!config.search.case_sensitive);
        assert!(config.search.regex);
    }

    #[test]
    fn every_issue_is_reported() {
        let err = load_from_str(
            r#"
[tree]
ignore = ["a[b"]
source_extensions = [".py", ""]
"#,
        )
        .unwrap_err();
        match err {
            ConfigError::Validation(source) => assert_eq!(source.issues.len(), 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn path_is_attached_to_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "[tree\n").unwrap();
        let err = load_or_default(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::InFile { .. }));
        assert!(matches!(err.root_cause(), ConfigError::Toml(_)));
        assert!(err.to_string().contains(CONFIG_FILE_NAME));
    }

    #[test]
    fn config_is_found_in_an_ancestor() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE_NAME), "[tree]\nhome = \"src\"\n").unwrap();
        let nested = dir.path().join("pkg/sub");
        fs::create_dir_all(&nested).unwrap();

        assert_eq!(discover(&nested), Some(dir.path().join(CONFIG_FILE_NAME)));
        let config = load_or_default(&nested).unwrap();
        assert_eq!(config.tree.home, Some(dir.path().join("src")));
    }

    #[test]
    fn absolute_home_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let home = dir.path().join("elsewhere");
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, format!("[tree]\nhome = {:?}\n", home.display().to_string())).unwrap();
        assert_eq!(load_from_path(&path).unwrap().tree.home, Some(home));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_from_path(dir.path().join(CONFIG_FILE_NAME));
        assert!(matches!(config, Err(ConfigError::Io { .. })));
    }
}
