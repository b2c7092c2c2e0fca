//! Small text primitives shared by the engine and the tree builder.

use std::ops::Range;

/// Closing bracket for a supported opening bracket.
pub fn closing_for(open: u8) -> Option<u8> {
    match open {
        b'(' => Some(b')'),
        b'[' => Some(b']'),
        b'{' => Some(b'}'),
        _ => None,
    }
}

/// Find the end of the balanced span opened at `open`.
///
/// Returns the byte offset just past the paired closing bracket. Only
/// brackets of the same type change the depth. Without `crossline`, a
/// newline before the span closes fails the search. Returns `None` when
/// `text[open]` is not an opening bracket or the span never closes.
pub fn find_closing_bracket(text: &str, open: usize, crossline: bool) -> Option<usize> {
    let bytes = text.as_bytes();
    let left = *bytes.get(open)?;
    let right = closing_for(left)?;
    let mut depth: usize = 1;
    for (pos, &b) in bytes.iter().enumerate().skip(open + 1) {
        if b == left {
            depth += 1;
        } else if b == right {
            depth -= 1;
            if depth == 0 {
                return Some(pos + 1);
            }
        } else if b == b'\n' && !crossline {
            return None;
        }
    }
    None
}

pub fn count_newlines(text: &str) -> usize {
    text.bytes().filter(|&b| b == b'\n').count()
}

/// Number of lines in `text`: newlines + 1.
pub fn line_count(text: &str) -> usize {
    1 + count_newlines(text)
}

/// Byte range of `text` with surrounding blank lines removed.
///
/// Leading whole blank lines are dropped (indentation of the first real
/// line is kept); trailing whitespace is dropped entirely.
pub fn blank_trimmed(text: &str) -> Range<usize> {
    let content_start = text.len() - text.trim_start().len();
    let start = text[..content_start].rfind('\n').map_or(0, |i| i + 1);
    let end = text.trim_end().len();
    if end <= start {
        return start..start;
    }
    start..end
}

/// True when the pattern source ends with an unescaped backslash.
pub fn has_dangling_escape(source: &str) -> bool {
    let trailing = source.bytes().rev().take_while(|&b| b == b'\\').count();
    trailing % 2 == 1
}

/// Length in bytes of the char starting at `pos`, or 0 at the end.
pub(crate) fn char_len_at(text: &str, pos: usize) -> usize {
    text[pos..].chars().next().map_or(0, char::len_utf8)
}
