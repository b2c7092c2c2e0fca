//! Docstrings split into numpy-style sections.

use crate::pattern::{KeepDelimiter, Pattern};
use crate::tree::node::{Node, NodeKind};
use crate::tree::segment::{function_header, leading_docstring};
use regex::Regex;
use std::sync::{Arc, LazyLock};

// A section title: one line followed by a line of dashes.
static SECTION_TITLE: LazyLock<Pattern> =
    LazyLock::new(|| Pattern::regex(r"[^\n]*\n[ \t]*-+[ \t]*\n").expect("valid section regex"));

static ANY_DOCSTRING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)"""(.*?)"""|'''(.*?)'''"#).expect("valid docstring regex"));

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Docstring {
    text: String,
    summary: String,
    sections: Vec<(String, String)>,
}

impl Docstring {
    pub fn new(text: &str) -> Self {
        let text = text.trim().to_string();
        let mut summary = String::new();
        let mut sections = Vec::new();
        for (i, part) in SECTION_TITLE
            .split(&text, None, KeepDelimiter::Right)
            .into_iter()
            .enumerate()
        {
            if i == 0 {
                summary = part.trim().to_string();
                continue;
            }
            let (title, body) = part.split_once('\n').unwrap_or((part, ""));
            // Drop the dashes line.
            let body = body.split_once('\n').map_or("", |(_, rest)| rest);
            sections.push((title.trim().to_string(), body.trim().to_string()));
        }
        Self {
            text,
            summary,
            sections,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Text before the first titled section.
    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn sections(&self) -> &[(String, String)] {
        &self.sections
    }

    pub fn section(&self, title: &str) -> Option<&str> {
        self.sections
            .iter()
            .find(|(t, _)| t == title)
            .map(|(_, body)| body.as_str())
    }
}

fn dedent_one_level(text: &str) -> String {
    text.replace("\n    ", "\n")
}

pub(crate) fn docstring_of(node: &Arc<Node>) -> Docstring {
    let text = match node.kind() {
        NodeKind::Directory => node
            .jumpto("__init__")
            .map(|init| init.doc().text().to_string())
            .unwrap_or_default(),
        NodeKind::File => leading_docstring(node.header().text())
            .map(|(_, body)| body.to_string())
            .unwrap_or_default(),
        NodeKind::Class => {
            let own = ANY_DOCSTRING
                .captures(node.header().text())
                .and_then(|c| c.get(1).or_else(|| c.get(2)))
                .map(|m| dedent_one_level(m.as_str()))
                .unwrap_or_default();
            if own.trim().is_empty() {
                node.jumpto("__init__")
                    .map(|init| init.doc().text().to_string())
                    .unwrap_or_default()
            } else {
                own
            }
        }
        NodeKind::Function | NodeKind::Method | NodeKind::Property => {
            let text = node.text();
            let body = &text[function_header(text).end..];
            leading_docstring(body.trim_start())
                .map(|(_, doc)| dedent_one_level(doc))
                .unwrap_or_default()
        }
        NodeKind::Content | NodeKind::NonSourceFile => String::new(),
    };
    Docstring::new(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::parse;

    #[test]
    fn numpy_sections() {
        let doc = Docstring::new(
            "Summary line.\n\nMore words.\n\nParameters\n----------\nx : int\n    A number.\n\nReturns\n-------\nint\n",
        );
        assert_eq!(doc.summary(), "Summary line.\n\nMore words.");
        assert_eq!(doc.section("Parameters"), Some("x : int\n    A number."));
        assert_eq!(doc.section("Returns"), Some("int"));
        assert_eq!(doc.sections().len(), 2);
    }

    #[test]
    fn docstrings_by_node_kind() {
        let root = parse(
            "m",
            "\"\"\"Module summary.\"\"\"\n\n\nclass A:\n    def __init__(self):\n        \"\"\"\n        Init doc.\n\n        Notes\n        -----\n        detail\n        \"\"\"\n\n\ndef f(a,\n      b):\n    '''Function doc.'''\n    return a\n",
        );
        assert_eq!(root.doc().text(), "Module summary.");
        let class = root.jumpto("A").unwrap();
        assert_eq!(class.doc().summary(), "Init doc.");
        assert_eq!(class.doc().section("Notes"), Some("detail"));
        assert_eq!(root.jumpto("f").unwrap().doc().text(), "Function doc.");
    }

    #[test]
    fn content_has_no_doc() {
        let root = parse("m", "x = 1\n");
        assert!(root.header().doc().is_empty());
    }
}
