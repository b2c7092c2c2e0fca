use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("invalid pattern {pattern:?}: {message}")]
    InvalidRegex { pattern: String, message: String },

    #[error("pattern {pattern:?} ends with a dangling escape character")]
    DanglingEscape { pattern: String },

    #[error("invalid bracket ignore set {ignore:?}: expected pairs drawn from \"()\", \"[]\", \"{{}}\"")]
    InvalidIgnoreSet { ignore: String },

    #[error("smart pattern marker must not be empty")]
    EmptyMarker,
}
