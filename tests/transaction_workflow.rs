//! Staging, confirming and rolling back replacements on disk.

use srctree::{
    EditState, FailureReason, Pattern, ReplaceOptions, SearchOptions, TransactionError, TreeBuilder, TxState,
};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const MODELS: &str = "\
class Order:
    def total(self):
        return price(self.items)


def price(items):
    return sum(items)
";

const VIEWS: &str = "\
from models import price


def render(order):
    return price(order.items)
";

fn workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("models.py"), MODELS).unwrap();
    fs::write(dir.path().join("views.py"), VIEWS).unwrap();
    dir
}

fn read(dir: &Path, name: &str) -> String {
    fs::read_to_string(dir.join(name)).unwrap()
}

fn price_call() -> Pattern {
    Pattern::smart("price{}").unwrap()
}

#[test]
fn confirm_writes_every_file() {
    let dir = workspace();
    let root = TreeBuilder::new().open(dir.path()).unwrap();
    let mut tx = root
        .replace(&price_call(), "cost(...)", &ReplaceOptions::default())
        .unwrap();
    assert_eq!(tx.len(), 2);

    let summary = tx.confirm().unwrap();
    assert!(summary.is_clean());
    assert_eq!(summary.successful.len(), 2);
    assert!(read(dir.path(), "models.py").contains("return cost(...)\n"));
    // The bare name in the import has no bracket span but still matches.
    assert_eq!(
        read(dir.path(), "views.py"),
        "from models import cost(...)\n\n\ndef render(order):\n    return cost(...)\n"
    );
}

#[test]
fn external_change_is_a_conflict() {
    let dir = workspace();
    let root = TreeBuilder::new().open(dir.path()).unwrap();
    let mut tx = root
        .replace(&Pattern::regex("items").unwrap(), "lines", &ReplaceOptions::default())
        .unwrap();

    let edited = format!("{MODELS}# touched\n");
    fs::write(dir.path().join("models.py"), &edited).unwrap();

    let summary = tx.confirm().unwrap();
    assert_eq!(summary.failed.len(), 1);
    assert!(summary.failed[0].path.ends_with("models.py"));
    assert_eq!(summary.failed[0].reason, FailureReason::Conflict);
    assert_eq!(read(dir.path(), "models.py"), edited);
    assert!(read(dir.path(), "views.py").contains("order.lines"));
}

#[test]
fn chained_edits_write_only_the_latest() {
    let dir = workspace();
    let root = TreeBuilder::new().open(dir.path()).unwrap();
    let mut first = root
        .replace(&Pattern::regex("items").unwrap(), "lines", &ReplaceOptions::default())
        .unwrap();

    let found = root
        .find_all_based_on(&Pattern::regex("lines").unwrap(), &SearchOptions::default(), &first)
        .unwrap();
    assert_eq!(found.len(), 4);

    let second = root
        .replace(
            &Pattern::regex("lines").unwrap(),
            "rows",
            &ReplaceOptions {
                based_on: Some(&first),
                ..Default::default()
            },
        )
        .unwrap();
    assert!(second.edits().iter().all(|e| e.generation() == 2));
    assert!(first.edits().iter().all(|e| e.state() == EditState::Superseded));

    let chained: Vec<_> = first.edits().to_vec();
    first.join(second);
    let summary = first.confirm().unwrap();
    assert_eq!(summary.superseded.len(), 2);
    assert_eq!(summary.successful.len(), 2);
    assert!(chained.iter().all(|e| !e.is_written()));

    let models = read(dir.path(), "models.py");
    assert!(models.contains("sum(rows)"));
    assert!(!models.contains("lines"));
}

#[test]
fn chained_method_edit_lands_inside_the_method() {
    let dir = workspace();
    let root = TreeBuilder::new().open(dir.path()).unwrap();
    let first = root
        .jumpto("models")
        .unwrap()
        .replace(
            &Pattern::regex("class Order:").unwrap(),
            "import math\n\n\nclass Order:",
            &ReplaceOptions::default(),
        )
        .unwrap();

    let total = root.jumpto("models.Order.total").unwrap();
    let mut second = total
        .replace(
            &Pattern::regex("items").unwrap(),
            "lines",
            &ReplaceOptions {
                based_on: Some(&first),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(second.count(), 1);
    assert_eq!(second.edits()[0].line_range(), Some(5..=6));

    let summary = second.confirm().unwrap();
    assert!(summary.is_clean());
    let models = read(dir.path(), "models.py");
    assert!(models.starts_with("import math\n\n\nclass Order:\n"));
    assert!(models.contains("return price(self.lines)"));
    assert!(models.contains("return sum(items)"));
}

#[test]
fn rollback_restores_and_detects_conflicts() {
    let dir = workspace();
    let root = TreeBuilder::new().open(dir.path()).unwrap();
    let mut tx = root
        .replace(&Pattern::regex("items").unwrap(), "lines", &ReplaceOptions::default())
        .unwrap();
    tx.confirm().unwrap();

    fs::write(dir.path().join("views.py"), "changed\n").unwrap();
    let summary = tx.rollback(false).unwrap();
    assert_eq!(summary.successful.len(), 1);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(read(dir.path(), "models.py"), MODELS);
    assert_eq!(read(dir.path(), "views.py"), "changed\n");
    assert_eq!(tx.state(), TxState::RolledBack);

    tx.confirm().unwrap();
    let summary = tx.rollback(true).unwrap();
    assert!(summary.is_clean());
    assert_eq!(read(dir.path(), "views.py"), VIEWS);
}

#[test]
fn state_machine_misuse_is_an_error() {
    let dir = workspace();
    let root = TreeBuilder::new().open(dir.path()).unwrap();
    let mut tx = root
        .replace(&Pattern::regex("items").unwrap(), "lines", &ReplaceOptions::default())
        .unwrap();
    assert!(matches!(tx.rollback(false), Err(TransactionError::NotConfirmed)));
    tx.confirm().unwrap();
    assert!(matches!(tx.confirm(), Err(TransactionError::AlreadyConfirmed)));
}

#[test]
fn copy_mode_leaves_originals() {
    let dir = workspace();
    let root = TreeBuilder::new().open(dir.path().join("views.py")).unwrap();
    let mut tx = root
        .replace(
            &Pattern::regex("render").unwrap(),
            "draw",
            &ReplaceOptions {
                overwrite: false,
                ..Default::default()
            },
        )
        .unwrap();
    tx.confirm().unwrap();

    assert_eq!(read(dir.path(), "views.py"), VIEWS);
    assert!(read(dir.path(), "views_copy.py").contains("def draw(order):"));

    tx.rollback(false).unwrap();
    assert!(!dir.path().join("views_copy.py").exists());
}

#[test]
fn copy_created_after_staging_is_a_conflict() {
    let dir = workspace();
    let root = TreeBuilder::new().open(dir.path().join("views.py")).unwrap();
    let mut tx = root
        .replace(
            &Pattern::regex("render").unwrap(),
            "draw",
            &ReplaceOptions {
                overwrite: false,
                ..Default::default()
            },
        )
        .unwrap();
    fs::write(dir.path().join("views_copy.py"), "mine\n").unwrap();

    let summary = tx.confirm().unwrap();
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].reason, FailureReason::Conflict);
    assert_eq!(read(dir.path(), "views_copy.py"), "mine\n");
}

#[test]
fn delete_on_a_method_only_touches_its_lines() {
    let dir = workspace();
    let root = TreeBuilder::new().open(dir.path()).unwrap();
    let method = root.jumpto("models.Order.total").unwrap();
    let mut tx = method
        .delete(&Pattern::regex("self\\.").unwrap(), &ReplaceOptions::default())
        .unwrap();
    tx.confirm().unwrap();
    let models = read(dir.path(), "models.py");
    assert!(models.contains("return price(items)"));
    assert!(models.contains("def total(self):"));
}

#[test]
fn bad_pattern_fails_before_staging() {
    let dir = workspace();
    let root = TreeBuilder::new().open(dir.path()).unwrap();
    let literal = SearchOptions {
        regex: false,
        ..Default::default()
    };
    // Literal mode escapes the text, so an unbalanced bracket is fine.
    let tx = root
        .replace(
            &Pattern::regex("sum\\(").unwrap(),
            "total(",
            &ReplaceOptions {
                search: literal,
                ..Default::default()
            },
        )
        .unwrap();
    assert!(tx.is_empty());
    assert!(Pattern::regex("price(").is_err());
}
