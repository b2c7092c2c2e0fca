//! Heuristic segmentation of source text into node pieces.
//!
//! These functions are pure: they take the text owned by one node and
//! describe its header and children as [`Piece`]s with line offsets
//! relative to that text. Anything that does not look like a class or a
//! function degrades to a content fragment.

use crate::pattern::{blank_trimmed, count_newlines, find_closing_bracket, KeepDelimiter, Pattern};
use crate::tree::node::NodeKind;
use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

/// Width of one indentation level inside a class body.
pub const CLASS_INDENT: usize = 4;

// A new top-level statement: newline followed by a non-indented,
// non-closing-bracket character.
static TOP_LEVEL_BOUNDARY: LazyLock<Pattern> =
    LazyLock::new(|| Pattern::regex(r"\n[^\s)\]}]").expect("valid boundary regex"));

static MEMBER_BOUNDARY: LazyLock<Pattern> = LazyLock::new(|| {
    Pattern::regex(r"(?:\n@[^\n]*)*\n(?:async[ \t]+)?def[ \t]").expect("valid member regex")
});

static LEADING_DOCSTRING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\A(?s:"""(.*?)"""|'''(.*?)''')"#).expect("valid docstring regex"));

static CLASS_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^class[ \t]+(\w+)").expect("valid class-name regex"));

static FUNCTION_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(?:async[ \t]+)?def[ \t]+(\w+)").expect("valid function-name regex")
});

static PROPERTY_DECORATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\A@(?:(?:functools\.)?cached_property|property|\w+\.(?:setter|getter|deleter))\b")
        .expect("valid property regex")
});

/// One segment of a node's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Piece {
    pub kind: NodeKind,
    pub name: String,
    pub text: String,
    /// Lines between the start of the parent's text and `text`
    pub line_offset: usize,
    pub indent: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segmented {
    pub header: Piece,
    pub children: Vec<Piece>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Chunk {
    Function,
    Class,
    Decorator,
    Other,
}

fn classify(chunk: &str) -> Chunk {
    let lead = chunk.trim_start_matches('\n');
    if lead.starts_with('@') {
        Chunk::Decorator
    } else if lead.starts_with("def ") || lead.starts_with("async def ") {
        Chunk::Function
    } else if lead.starts_with("class ") {
        Chunk::Class
    } else {
        Chunk::Other
    }
}

/// Byte range and docstring body of a leading triple-quoted string.
pub(crate) fn leading_docstring(text: &str) -> Option<(Range<usize>, &str)> {
    let caps = LEADING_DOCSTRING.captures(text)?;
    let whole = caps.get(0)?;
    let body = caps.get(1).or_else(|| caps.get(2))?;
    Some((whole.range(), body.as_str()))
}

fn content_piece(text: &str, range: Range<usize>, indent: usize) -> Option<Piece> {
    piece(NodeKind::Content, super::NULL.to_string(), text, range, indent)
}

/// Trim `text[range]` and turn it into a piece; `None` when only blanks remain.
fn piece(kind: NodeKind, name: String, text: &str, range: Range<usize>, indent: usize) -> Option<Piece> {
    let slice = &text[range.clone()];
    let trimmed = blank_trimmed(slice);
    if trimmed.is_empty() {
        return None;
    }
    Some(Piece {
        kind,
        name,
        text: slice[trimmed.clone()].to_string(),
        line_offset: count_newlines(&text[..range.start + trimmed.start]),
        indent,
    })
}

/// Name a class or function piece, degrading to content when no name is found.
fn named_piece(kind: NodeKind, text: &str, range: Range<usize>, indent: usize) -> Option<Piece> {
    let slice = &text[range.clone()];
    let name = match kind {
        NodeKind::Class => CLASS_NAME.captures(slice).map(|c| c[1].to_string()),
        NodeKind::Function | NodeKind::Method => FUNCTION_NAME.captures(slice).map(|c| format!("{}()", &c[1])),
        NodeKind::Property => FUNCTION_NAME.captures(slice).map(|c| c[1].to_string()),
        _ => None,
    };
    match name {
        Some(name) => piece(kind, name, text, range, indent),
        None => {
            tracing::debug!("unnamed {:?} segment kept as content", kind);
            content_piece(text, range, indent)
        }
    }
}

/// Split the (already trimmed) text of a file.
///
/// The header is the leading docstring plus any module-level code that
/// comes before the first class or function; later module-level code
/// becomes content children.
pub fn split_file(text: &str) -> Segmented {
    let doc_end = leading_docstring(text).map_or(0, |(range, _)| range.end);

    let mut groups: Vec<(Chunk, Range<usize>)> = Vec::new();
    let mut content_start: Option<usize> = None;
    let mut decorator_start: Option<usize> = None;
    let mut offset = doc_end;

    for chunk in TOP_LEVEL_BOUNDARY.split(&text[doc_end..], None, KeepDelimiter::Right) {
        let (start, end) = (offset, offset + chunk.len());
        offset = end;
        match classify(chunk) {
            kind @ (Chunk::Function | Chunk::Class) => {
                let def_start = decorator_start.take().unwrap_or(start);
                if let Some(from) = content_start.take() {
                    groups.push((Chunk::Other, from..def_start));
                }
                groups.push((kind, def_start..end));
            }
            Chunk::Decorator => {
                decorator_start.get_or_insert(start);
            }
            Chunk::Other => {
                // A decorator run not followed by a definition is plain code.
                let from = decorator_start.take().unwrap_or(start);
                content_start.get_or_insert(from);
            }
        }
    }
    if let Some(from) = content_start.or(decorator_start) {
        groups.push((Chunk::Other, from..text.len()));
    }

    let mut header_end = doc_end;
    let mut rest = groups.as_slice();
    if let Some(((Chunk::Other, range), tail)) = rest.split_first() {
        header_end = range.end;
        rest = tail;
    }
    let header = piece(NodeKind::Content, super::NULL.to_string(), text, 0..header_end, 0)
        .unwrap_or_else(|| empty_header(0));

    let children = rest
        .iter()
        .filter_map(|(kind, range)| match kind {
            Chunk::Function => named_piece(NodeKind::Function, text, range.clone(), 0),
            Chunk::Class => named_piece(NodeKind::Class, text, range.clone(), 0),
            _ => content_piece(text, range.clone(), 0),
        })
        .collect();

    Segmented { header, children }
}

/// Split a class into its header and member pieces.
///
/// Members are dedented by one level; their `indent` records the shift so
/// reported lines can be padded back to the original column.
pub fn split_class(text: &str) -> Segmented {
    let dedented = text.replace("\n    ", "\n");
    let mut pieces = MEMBER_BOUNDARY
        .split(&dedented, None, KeepDelimiter::Right)
        .into_iter();

    // The header keeps the original indentation: same line count, original text.
    let head_lines = pieces.next().map_or(1, |head| count_newlines(head) + 1);
    let header_end = nth_line_end(text, head_lines);
    let header = piece(NodeKind::Content, super::NULL.to_string(), text, 0..header_end, 0)
        .unwrap_or_else(|| empty_header(0));

    let mut children = Vec::new();
    let mut offset = dedented.len() - pieces.as_slice().iter().map(|p| p.len()).sum::<usize>();
    for member in pieces {
        let range = offset..offset + member.len();
        offset = range.end;
        let lead = member.trim_start_matches('\n');
        let kind = if PROPERTY_DECORATOR.is_match(lead) {
            NodeKind::Property
        } else {
            NodeKind::Method
        };
        if let Some(p) = named_piece(kind, &dedented, range, CLASS_INDENT) {
            children.push(p);
        }
    }

    Segmented { header, children }
}

/// The signature of a function: everything through the line that closes
/// the parameter list.
pub fn function_header(text: &str) -> Range<usize> {
    let first_line_end = text.find('\n').unwrap_or(text.len());
    let signature_end = FUNCTION_NAME
        .find(text)
        .and_then(|m| text[m.end()..].find('(').map(|i| m.end() + i))
        .and_then(|open| find_closing_bracket(text, open, true));
    let end = match signature_end {
        Some(close) => text[close..].find('\n').map_or(text.len(), |i| close + i),
        None => first_line_end,
    };
    0..end
}

/// Byte offset of the end of line `n` (1-based), excluding its newline.
fn nth_line_end(text: &str, n: usize) -> usize {
    text.match_indices('\n')
        .nth(n.saturating_sub(1))
        .map_or(text.len(), |(i, _)| i)
}

fn empty_header(indent: usize) -> Piece {
    Piece {
        kind: NodeKind::Content,
        name: super::NULL.to_string(),
        text: String::new(),
        line_offset: 0,
        indent,
    }
}
