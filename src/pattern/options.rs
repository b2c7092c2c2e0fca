use serde::Deserialize;
use std::ops::BitOr;

/// Regex flags carried by a pattern.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Flags {
    /// Case-insensitive matching
    pub ignore_case: bool,
    /// `.` also matches `\n`; bracket spans may cross lines
    pub dot_all: bool,
    /// `^` and `$` match at line boundaries
    pub multi_line: bool,
}

impl Flags {
    pub fn ignore_case(mut self) -> Self {
        self.ignore_case = true;
        self
    }

    pub fn dot_all(mut self) -> Self {
        self.dot_all = true;
        self
    }

    pub fn multi_line(mut self) -> Self {
        self.multi_line = true;
        self
    }

    pub(crate) fn key(self) -> String {
        format!(
            "{}{}{}",
            if self.ignore_case { 'i' } else { '-' },
            if self.dot_all { 's' } else { '-' },
            if self.multi_line { 'm' } else { '-' },
        )
    }
}

impl BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        Flags {
            ignore_case: self.ignore_case || rhs.ignore_case,
            dot_all: self.dot_all || rhs.dot_all,
            multi_line: self.multi_line || rhs.multi_line,
        }
    }
}

/// Pattern transforms applied before compilation.
///
/// These never change how the engine matches; they rewrite the pattern
/// source and flags. See [`super::Pattern::transform`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    /// Wrap the pattern in `\b` word boundaries
    pub whole_word: bool,
    pub case_sensitive: bool,
    /// When false, every metacharacter is escaped
    pub regex: bool,
    pub dotall: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            whole_word: false,
            case_sensitive: true,
            regex: true,
            dotall: false,
        }
    }
}

impl SearchOptions {
    /// True when applying these options leaves a pattern unchanged.
    pub fn is_identity(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_union() {
        let merged = Flags::default().ignore_case() | Flags::default().dot_all();
        assert!(merged.ignore_case);
        assert!(merged.dot_all);
        assert!(!merged.multi_line);
    }

    #[test]
    fn default_options_are_identity() {
        assert!(SearchOptions::default().is_identity());
        let opts = SearchOptions {
            whole_word: true,
            ..Default::default()
        };
        assert!(!opts.is_identity());
    }
}
