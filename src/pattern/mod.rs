//! Pattern engine: plain regexes plus smart patterns that skip balanced
//! bracket spans at marked points.

pub mod errors;
pub mod ops;
pub mod options;
pub mod smart;
pub mod text;

pub use errors::PatternError;
pub use ops::{KeepDelimiter, LineMatch, Replace, ReplaceRef, Substituted};
pub use options::{Flags, SearchOptions};
pub use smart::{Match, Pattern, RegexPattern, SmartPattern, DEFAULT_IGNORE, DEFAULT_MARKER};
pub use text::{blank_trimmed, count_newlines, find_closing_bracket, line_count};
