//! Operations built on [`Pattern::search`]: iteration, substitution,
//! splitting and line-attributed find-all.
//!
//! A zero-width match always consumes one character before scanning
//! resumes, so iteration is bounded by the input length.

use crate::pattern::smart::{Match, Pattern};
use crate::pattern::text::{char_len_at, count_newlines};

/// Replacement source for [`Pattern::substitute`].
///
/// Strings are inserted literally (no `$1` expansion). Closures receive the
/// match and return the replacement text.
pub trait Replace {
    fn replace_append(&mut self, m: &Match<'_>, dst: &mut String);

    /// Borrow this replacement so it can be used for several substitutions.
    fn by_ref(&mut self) -> ReplaceRef<'_, Self> {
        ReplaceRef(self)
    }
}

/// A mutably borrowed [`Replace`], from [`Replace::by_ref`].
#[derive(Debug)]
pub struct ReplaceRef<'a, R: ?Sized>(&'a mut R);

impl<R: Replace + ?Sized> Replace for ReplaceRef<'_, R> {
    fn replace_append(&mut self, m: &Match<'_>, dst: &mut String) {
        self.0.replace_append(m, dst);
    }
}

impl Replace for &str {
    fn replace_append(&mut self, _m: &Match<'_>, dst: &mut String) {
        dst.push_str(self);
    }
}

impl Replace for String {
    fn replace_append(&mut self, _m: &Match<'_>, dst: &mut String) {
        dst.push_str(self);
    }
}

impl Replace for &String {
    fn replace_append(&mut self, _m: &Match<'_>, dst: &mut String) {
        dst.push_str(self);
    }
}

impl<F, T> Replace for F
where
    F: FnMut(&Match<'_>) -> T,
    T: AsRef<str>,
{
    fn replace_append(&mut self, m: &Match<'_>, dst: &mut String) {
        dst.push_str((*self)(m).as_ref());
    }
}

/// Which neighbouring piece a delimiter stays attached to in [`Pattern::split`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeepDelimiter {
    /// Delimiters are dropped
    #[default]
    None,
    /// Each delimiter ends the piece on its left
    Left,
    /// Each delimiter starts the piece on its right
    Right,
}

/// Result of [`Pattern::substitute`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substituted {
    pub text: String,
    pub count: usize,
}

/// A match attributed to its 1-based line and 0-based byte column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineMatch<'h> {
    pub line: usize,
    pub column: usize,
    pub matched: Match<'h>,
}

impl<'h> LineMatch<'h> {
    pub fn as_str(&self) -> &'h str {
        self.matched.as_str()
    }
}

impl Pattern {
    /// Non-overlapping matches, left to right, at most `limit` of them.
    pub fn matches<'h>(&self, text: &'h str, limit: Option<usize>) -> Vec<Match<'h>> {
        let limit = limit.unwrap_or(usize::MAX);
        let mut found = Vec::new();
        if let Pattern::Regex(p) = self {
            found.extend(
                p.regex()
                    .find_iter(text)
                    .take(limit)
                    .map(|m| Match::new(text, m.start(), m.end())),
            );
            return found;
        }

        let mut pos = 0;
        while found.len() < limit && pos <= text.len() {
            let Some(m) = self.search_at(text, pos) else {
                break;
            };
            found.push(m);
            pos = if m.is_empty() {
                let step = char_len_at(text, m.end());
                if step == 0 {
                    break;
                }
                m.end() + step
            } else {
                m.end()
            };
        }
        found
    }

    /// Every non-overlapping match in `text`.
    pub fn find_all<'h>(&self, text: &'h str) -> Vec<Match<'h>> {
        self.matches(text, None)
    }

    /// Every match with its line number and column.
    ///
    /// Matches may span newlines (a skipped bracket span, or a dot-all
    /// pattern); the line reported is the line the match starts on, and
    /// the running counter accounts for the newlines inside earlier
    /// matches.
    pub fn find_all_by_line<'h>(&self, text: &'h str) -> Vec<LineMatch<'h>> {
        let mut line = 1;
        let mut line_start = 0;
        let mut scanned = 0;
        let mut found = Vec::new();
        for m in self.find_all(text) {
            let between = &text[scanned..m.start()];
            let newlines = count_newlines(between);
            if newlines > 0 {
                line += newlines;
                line_start = between.rfind('\n').map_or(line_start, |i| scanned + i + 1);
            }
            scanned = m.start();
            found.push(LineMatch {
                line,
                column: m.start() - line_start,
                matched: m,
            });
        }
        found
    }

    /// Replace up to `limit` matches (all when `None`).
    pub fn substitute<R: Replace>(&self, text: &str, limit: Option<usize>, mut repl: R) -> Substituted {
        let found = self.matches(text, limit);
        if found.is_empty() {
            return Substituted {
                text: text.to_string(),
                count: 0,
            };
        }
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for m in &found {
            out.push_str(&text[last..m.start()]);
            repl.replace_append(m, &mut out);
            last = m.end();
        }
        out.push_str(&text[last..]);
        Substituted {
            text: out,
            count: found.len(),
        }
    }

    /// Replace every match and return only the new text.
    pub fn replace_all<R: Replace>(&self, text: &str, repl: R) -> String {
        self.substitute(text, None, repl).text
    }

    /// Split `text` on up to `limit` matches.
    pub fn split<'h>(&self, text: &'h str, limit: Option<usize>, keep: KeepDelimiter) -> Vec<&'h str> {
        let mut pieces = Vec::new();
        let mut last = 0;
        for m in self.matches(text, limit) {
            match keep {
                KeepDelimiter::None => {
                    pieces.push(&text[last..m.start()]);
                    last = m.end();
                }
                KeepDelimiter::Left => {
                    pieces.push(&text[last..m.end()]);
                    last = m.end();
                }
                KeepDelimiter::Right => {
                    pieces.push(&text[last..m.start()]);
                    last = m.start();
                }
            }
        }
        pieces.push(&text[last..]);
        pieces
    }
}
