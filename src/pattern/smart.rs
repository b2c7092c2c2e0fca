use crate::cache;
use crate::pattern::errors::PatternError;
use crate::pattern::options::{Flags, SearchOptions};
use crate::pattern::text::{closing_for, find_closing_bracket, has_dangling_escape, char_len_at};
use regex::Regex;
use std::fmt;

/// Default bracket pairs a smart pattern may skip over.
pub const DEFAULT_IGNORE: &str = "()[]{}";

/// Default marker for "skip a balanced span here".
pub const DEFAULT_MARKER: &str = "{}";

/// One located match. Offsets are byte offsets into the haystack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match<'h> {
    haystack: &'h str,
    start: usize,
    end: usize,
}

impl<'h> Match<'h> {
    pub(crate) fn new(haystack: &'h str, start: usize, end: usize) -> Self {
        Self {
            haystack,
            start,
            end,
        }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn range(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }

    pub fn as_str(&self) -> &'h str {
        &self.haystack[self.start..self.end]
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }
}

/// A plain regular expression.
#[derive(Debug, Clone)]
pub struct RegexPattern {
    source: String,
    flags: Flags,
    unanchored: Regex,
    anchored: Regex,
}

impl RegexPattern {
    pub fn new(source: &str, flags: Flags) -> Result<Self, PatternError> {
        reject_dangling_escape(source)?;
        Ok(Self {
            source: source.to_string(),
            flags,
            unanchored: cache::get_or_compile(source, flags, false)?,
            anchored: cache::get_or_compile(source, flags, true)?,
        })
    }

    pub(crate) fn regex(&self) -> &Regex {
        &self.unanchored
    }
}

/// A pattern that can jump over balanced bracket spans at marked points.
///
/// The source is split on every occurrence of the marker. While matching,
/// after each partial segment matches, a run of balanced spans opened by a
/// bracket from the ignore set is consumed verbatim, then matching resumes
/// with the next segment.
///
/// With ignore set `"()"`, `"a{}b"` matches `"ab"` and `"a(c)b"` but not
/// `"a(b)c"`.
#[derive(Debug, Clone)]
pub struct SmartPattern {
    source: String,
    flags: Flags,
    ignore: String,
    marker: String,
    segments: Vec<String>,
    openers: Vec<u8>,
    scout: Regex,
    // anchored[i][j - i] matches segments[i..=j] concatenated
    anchored: Vec<Vec<Regex>>,
}

impl SmartPattern {
    pub fn new(source: &str, flags: Flags, ignore: &str, marker: &str) -> Result<Self, PatternError> {
        if marker.is_empty() {
            return Err(PatternError::EmptyMarker);
        }
        reject_dangling_escape(source)?;
        let openers = parse_ignore_set(ignore)?;

        let segments: Vec<String> = source.split(marker).map(str::to_string).collect();
        let scout = cache::get_or_compile(&segments[0], flags, false)?;
        let mut anchored = Vec::with_capacity(segments.len());
        for i in 0..segments.len() {
            let mut row = Vec::with_capacity(segments.len() - i);
            let mut joined = String::new();
            for segment in &segments[i..] {
                joined.push_str(segment);
                row.push(cache::get_or_compile(&joined, flags, true)?);
            }
            anchored.push(row);
        }

        Ok(Self {
            source: source.to_string(),
            flags,
            ignore: ignore.to_string(),
            marker: marker.to_string(),
            segments,
            openers,
            scout,
            anchored,
        })
    }

    /// Smart pattern with the default ignore set and marker.
    pub fn with_defaults(source: &str) -> Result<Self, PatternError> {
        Self::new(source, Flags::default(), DEFAULT_IGNORE, DEFAULT_MARKER)
    }

    pub fn ignore(&self) -> &str {
        &self.ignore
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    fn has_marker(&self) -> bool {
        self.segments.len() > 1
    }

    /// Anchored match at offset 0 of `hay`; returns the match length.
    fn match_len(&self, hay: &str) -> Option<usize> {
        let last = self.segments.len() - 1;
        let crossline = self.flags.dot_all;
        let mut consumed = 0;
        let mut from = 0;

        for i in 0..last {
            let rest = &hay[consumed..];
            let matched = self.anchored[from][i - from].find(rest)?;
            let mut cursor = matched.end();
            let mut skipped = false;
            while let Some(&b) = rest.as_bytes().get(cursor) {
                if !self.openers.contains(&b) {
                    break;
                }
                cursor = find_closing_bracket(rest, cursor, crossline)?;
                skipped = true;
            }
            if skipped {
                consumed += cursor;
                from = i + 1;
            }
        }

        let tail = self.anchored[from][last - from].find(&hay[consumed..])?;
        Some(consumed + tail.end())
    }

    fn search_from<'h>(&self, hay: &'h str, mut pos: usize) -> Option<Match<'h>> {
        while pos <= hay.len() {
            let candidate = self.scout.find(&hay[pos..])?;
            let at = pos + candidate.start();
            if let Some(len) = self.match_len(&hay[at..]) {
                return Some(Match::new(hay, at, at + len));
            }
            let step = char_len_at(hay, at);
            if step == 0 {
                return None;
            }
            pos = at + step;
        }
        None
    }
}

/// Either a plain regular expression or a [`SmartPattern`].
#[derive(Debug, Clone)]
pub enum Pattern {
    Regex(RegexPattern),
    Smart(SmartPattern),
}

impl Pattern {
    /// Compile a plain regular expression with default flags.
    pub fn regex(source: &str) -> Result<Self, PatternError> {
        Self::regex_with_flags(source, Flags::default())
    }

    pub fn regex_with_flags(source: &str, flags: Flags) -> Result<Self, PatternError> {
        RegexPattern::new(source, flags).map(Pattern::Regex)
    }

    /// Pattern matching `text` literally.
    pub fn literal(text: &str) -> Result<Self, PatternError> {
        Self::regex(&regex::escape(text))
    }

    /// Smart pattern with the default ignore set and marker.
    pub fn smart(source: &str) -> Result<Self, PatternError> {
        SmartPattern::with_defaults(source).map(Pattern::Smart)
    }

    pub fn source(&self) -> &str {
        match self {
            Pattern::Regex(p) => &p.source,
            Pattern::Smart(p) => &p.source,
        }
    }

    pub fn flags(&self) -> Flags {
        match self {
            Pattern::Regex(p) => p.flags,
            Pattern::Smart(p) => p.flags,
        }
    }

    pub fn is_smart(&self) -> bool {
        matches!(self, Pattern::Smart(_))
    }

    /// Rebuild this pattern with a new source and flags, keeping its kind.
    pub fn rebuild(&self, source: &str, flags: Flags) -> Result<Pattern, PatternError> {
        match self {
            Pattern::Regex(_) => Pattern::regex_with_flags(source, flags),
            Pattern::Smart(p) => SmartPattern::new(source, flags, &p.ignore, &p.marker).map(Pattern::Smart),
        }
    }

    /// Apply case, whole-word, literal and dot-all transforms.
    pub fn transform(&self, options: &SearchOptions) -> Result<Pattern, PatternError> {
        if options.is_identity() {
            return Ok(self.clone());
        }
        let mut source = self.source().to_string();
        let mut flags = self.flags();
        if !options.regex {
            source = match self {
                // Escape each segment so the marker keeps its meaning.
                Pattern::Smart(p) => p
                    .segments
                    .iter()
                    .map(|s| regex::escape(s))
                    .collect::<Vec<_>>()
                    .join(&p.marker),
                Pattern::Regex(_) => regex::escape(&source),
            };
        }
        if !options.case_sensitive {
            flags.ignore_case = true;
        }
        if options.whole_word {
            source = format!(r"\b{source}\b");
        }
        if options.dotall {
            flags.dot_all = true;
        }
        self.rebuild(&source, flags)
    }

    /// Widen the pattern so a match covers the whole physical line.
    pub fn expand_to_line(&self) -> Result<Pattern, PatternError> {
        let source = if self.flags().dot_all {
            format!("[^\\n]*{}[^\\n]*", self.source())
        } else {
            format!(".*{}.*", self.source())
        };
        self.rebuild(&source, self.flags())
    }

    /// Leftmost match anywhere in `text`.
    pub fn search<'h>(&self, text: &'h str) -> Option<Match<'h>> {
        self.search_at(text, 0)
    }

    /// Leftmost match starting at or after byte offset `start`.
    pub fn search_at<'h>(&self, text: &'h str, start: usize) -> Option<Match<'h>> {
        match self {
            Pattern::Regex(p) => p
                .unanchored
                .find_at(text, start)
                .map(|m| Match::new(text, m.start(), m.end())),
            Pattern::Smart(p) if !p.has_marker() => p
                .scout
                .find_at(text, start)
                .map(|m| Match::new(text, m.start(), m.end())),
            Pattern::Smart(p) => p.search_from(text, start),
        }
    }

    /// Match anchored at offset 0.
    pub fn match_start<'h>(&self, text: &'h str) -> Option<Match<'h>> {
        match self {
            Pattern::Regex(p) => p.anchored.find(text).map(|m| Match::new(text, 0, m.end())),
            Pattern::Smart(p) => p.match_len(text).map(|len| Match::new(text, 0, len)),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.source())
    }
}

impl TryFrom<&str> for Pattern {
    type Error = PatternError;

    fn try_from(source: &str) -> Result<Self, Self::Error> {
        Pattern::regex(source)
    }
}

impl From<SmartPattern> for Pattern {
    fn from(pattern: SmartPattern) -> Self {
        Pattern::Smart(pattern)
    }
}

fn reject_dangling_escape(source: &str) -> Result<(), PatternError> {
    if has_dangling_escape(source) {
        return Err(PatternError::DanglingEscape {
            pattern: source.to_string(),
        });
    }
    Ok(())
}

/// Opening brackets of an ignore set such as `"()[]"`.
fn parse_ignore_set(ignore: &str) -> Result<Vec<u8>, PatternError> {
    let bytes = ignore.as_bytes();
    if bytes.len() % 2 != 0 {
        return Err(PatternError::InvalidIgnoreSet {
            ignore: ignore.to_string(),
        });
    }
    bytes
        .chunks(2)
        .map(|pair| match closing_for(pair[0]) {
            Some(close) if close == pair[1] => Ok(pair[0]),
            _ => Err(PatternError::InvalidIgnoreSet {
                ignore: ignore.to_string(),
            }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn smart(source: &str, ignore: &str) -> Pattern {
        SmartPattern::new(source, Flags::default(), ignore, DEFAULT_MARKER)
            .unwrap()
            .into()
    }

    #[test]
    fn skips_single_bracket_span() {
        let p = smart("a{}b", "()");
        assert_eq!(p.match_start("ab").map(|m| m.as_str()), Some("ab"));
        assert_eq!(p.match_start("a(c)b").map(|m| m.as_str()), Some("a(c)b"));
        assert!(p.match_start("a(b)c").is_none());
    }

    #[test]
    fn skips_consecutive_spans() {
        let p = smart("a{}b", "()[]");
        assert!(p.match_start("a(c)[c]b").is_some());
        assert!(p.match_start("a(b)[b]c").is_none());
        // '{' is not in the ignore set here
        assert!(p.match_start("a{c}b").is_none());
    }

    #[test]
    fn nested_spans_of_same_type() {
        let p = smart("f{}:", "()");
        let m = p.match_start("f(a, (b, c)):").unwrap();
        assert_eq!(m.as_str(), "f(a, (b, c)):");
    }

    #[test]
    fn span_must_close_on_same_line_without_dotall() {
        let p = smart("f{}:", "()");
        assert!(p.search("f(a,\n b):").is_none());
        let crossing = SmartPattern::new("f{}:", Flags::default().dot_all(), "()", "{}").unwrap();
        assert!(Pattern::from(crossing).search("f(a,\n b):").is_some());
    }

    #[test]
    fn search_reports_absolute_offsets() {
        let p = smart("a{}b", "()");
        let m = p.search("xxa(b)cya(z)b!").unwrap();
        assert_eq!(m.range(), 8..13);
        assert_eq!(m.as_str(), "a(z)b");
    }

    #[test]
    fn search_is_unanchored_and_rejects_bad_spans() {
        let p = smart("a{}b", "()");
        assert!(p.search("a(b)c").is_none());
        assert!(p.search("a(b").is_none());
    }

    #[test]
    fn without_marker_behaves_like_regex() {
        let p = smart("b+", "()");
        let m = p.search("abbbc").unwrap();
        assert_eq!(m.range(), 1..4);
    }

    #[test]
    fn segments_continue_after_skip() {
        // After skipping, matching restarts fresh with the next segment.
        let p = smart("print{} *# *{}x", "()");
        assert!(p.search("print(1) # (y)x").is_some());
    }

    #[test]
    fn dangling_escape_rejected() {
        assert!(matches!(
            Pattern::regex("abc\\"),
            Err(PatternError::DanglingEscape { .. })
        ));
        assert!(matches!(
            Pattern::smart("a{}\\"),
            Err(PatternError::DanglingEscape { .. })
        ));
    }

    #[test]
    fn invalid_ignore_set_rejected() {
        for ignore in ["(", "(]", "<>"] {
            let err = SmartPattern::new("a{}b", Flags::default(), ignore, "{}").unwrap_err();
            assert!(matches!(err, PatternError::InvalidIgnoreSet { .. }), "{ignore}");
        }
        assert!(matches!(
            SmartPattern::new("a{}b", Flags::default(), "()", ""),
            Err(PatternError::EmptyMarker)
        ));
    }

    #[test]
    fn segment_compile_errors_surface_at_construction() {
        assert!(matches!(
            Pattern::smart("(a{}b)"),
            Err(PatternError::InvalidRegex { .. })
        ));
    }

    #[test]
    fn transform_literal_keeps_smart_marker() {
        let p = Pattern::smart("f{}.x").unwrap();
        let literal = p
            .transform(&SearchOptions {
                regex: false,
                ..Default::default()
            })
            .unwrap();
        assert!(literal.search("f(1).x").is_some());
        assert!(literal.search("f(1)yx").is_none());
    }

    #[test]
    fn transform_whole_word_and_case() {
        let p = Pattern::regex("book").unwrap();
        let t = p
            .transform(&SearchOptions {
                whole_word: true,
                case_sensitive: false,
                ..Default::default()
            })
            .unwrap();
        assert!(t.search("a Book here").is_some());
        assert!(t.search("notebook").is_none());
    }

    #[test]
    fn expand_to_line_covers_line() {
        let p = Pattern::regex("needle").unwrap().expand_to_line().unwrap();
        let m = p.search("first\nhay needle hay\nlast").unwrap();
        assert_eq!(m.as_str(), "hay needle hay");
    }
}
