//! Property tests for the pattern engine.

use proptest::prelude::*;
use srctree::{Flags, Match, Pattern, SmartPattern};

fn smart(source: &str, ignore: &str) -> Pattern {
    SmartPattern::new(source, Flags::default(), ignore, "{}")
        .unwrap()
        .into()
}

proptest! {
    #[test]
    fn balanced_span_is_skipped(inner in "[a-z ,]{0,12}") {
        let p = smart("a{}b", "()");
        let text = format!("a({inner})b");
        let m = p.match_start(&text);
        prop_assert_eq!(m.map(|m| m.as_str()), Some(text.as_str()));
    }

    #[test]
    fn nested_spans_are_skipped(left in "[a-z]{0,5}", right in "[a-z]{0,5}") {
        let p = smart("f{}:", "()[]");
        let text = format!("f({left}[({right})]):");
        prop_assert!(p.match_start(&text).is_some());
    }

    #[test]
    fn unbalanced_span_never_matches(inner in "[c-z ]{0,10}") {
        let p = smart("a{}b", "()");
        let text = format!("a({inner}b");
        prop_assert!(p.search(&text).is_none());
    }

    #[test]
    fn zero_width_matches_make_progress(text in "[a-z(),\n]{0,40}") {
        for p in [Pattern::regex("x*").unwrap(), smart("x*{}", "()")] {
            let found = p.find_all(&text);
            prop_assert!(found.len() <= text.chars().count() + 1);
            let out = p.substitute(&text, None, |m: &Match<'_>| m.as_str().to_string());
            prop_assert_eq!(out.text.as_str(), text.as_str());
            prop_assert_eq!(out.count, found.len());
        }
    }

    #[test]
    fn split_pieces_rejoin(text in "[a-c,]{0,30}") {
        let p = Pattern::regex(",").unwrap();
        let pieces = p.split(&text, None, srctree::KeepDelimiter::Left);
        prop_assert_eq!(pieces.concat(), text);
    }

    #[test]
    fn parsing_is_deterministic(
        names in proptest::collection::vec("[a-z]{1,8}", 1..6),
        values in proptest::collection::vec(0u32..100, 1..6),
    ) {
        let mut source = String::from("\"\"\"Generated.\"\"\"\n\nimport os\n");
        for (name, value) in names.iter().zip(&values) {
            source.push_str(&format!("\n\ndef {name}(x):\n    return x + {value}\n"));
            source.push_str(&format!("\n\nclass C{name}:\n    def m(self):\n        return {value}\n"));
        }
        let first = srctree::tree::parse("gen", &source);
        let second = srctree::tree::parse("gen", &source);
        let shape = |root: &std::sync::Arc<srctree::Node>| {
            root.descendants()
                .iter()
                .map(|n| (n.kind(), n.absolute_name().to_string(), n.start_line(), n.text().to_string()))
                .collect::<Vec<_>>()
        };
        prop_assert_eq!(shape(&first), shape(&second));

        let lines: Vec<&str> = source.lines().collect();
        for node in first.descendants() {
            for (offset, line) in node.text().lines().enumerate() {
                let padding = " ".repeat(node.indent_offset());
                let padded = if line.is_empty() { String::new() } else { format!("{padding}{line}") };
                prop_assert_eq!(lines[node.start_line() + offset - 1], padded.as_str());
            }
        }
    }
}
