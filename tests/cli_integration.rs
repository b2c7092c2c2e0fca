//! Command-line interface tests against the built binary.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn setup_project() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("pkg")).unwrap();
    fs::write(
        dir.path().join("pkg/shop.py"),
        r#""""Shop module."""

import os


class Cart:
    def add(self, item):
        self.items.append(item)


def checkout(cart):
    return len(cart.items)
"#,
    )
    .unwrap();
    dir
}

fn srctree(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_srctree"))
        .current_dir(dir)
        .env("NO_COLOR", "1")
        .args(args)
        .output()
        .unwrap()
}

#[test]
fn test_help_lists_commands() {
    let dir = setup_project();
    let output = srctree(dir.path(), &["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["find", "replace", "tree", "show", "imports"] {
        assert!(stdout.contains(command), "missing {command}: {stdout}");
    }
}

#[test]
fn test_find_json_lines() {
    let dir = setup_project();
    let output = srctree(dir.path(), &["find", "items", "pkg", "--json"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    let records: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["line"], 8);
    assert_eq!(records[0]["node"], "pkg.shop.Cart.add()");
    assert_eq!(records[1]["line"], 12);
    assert_eq!(records[1]["kind"], "Function");
}

#[test]
fn test_replace_preview_does_not_write() {
    let dir = setup_project();
    let before = fs::read_to_string(dir.path().join("pkg/shop.py")).unwrap();
    let output = srctree(dir.path(), &["replace", "items", "lines", "pkg"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("2 replacement(s) in 1 file(s)"), "{stdout}");
    assert_eq!(fs::read_to_string(dir.path().join("pkg/shop.py")).unwrap(), before);
}

#[test]
fn test_replace_apply_with_diff() {
    let dir = setup_project();
    let output = srctree(dir.path(), &["replace", "--diff", "--apply", "items", "lines", "pkg"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("+        self.lines.append(item)"), "{stdout}");
    let after = fs::read_to_string(dir.path().join("pkg/shop.py")).unwrap();
    assert!(after.contains("len(cart.lines)"));
}

#[test]
fn test_show_prints_numbered_source() {
    let dir = setup_project();
    let output = srctree(dir.path(), &["show", "shop.Cart.add", "pkg"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Method(pkg.shop.Cart.add())"), "{stdout}");
    assert!(stdout.contains("8         self.items.append(item)"), "{stdout}");
}

#[test]
fn test_show_unknown_name_fails() {
    let dir = setup_project();
    let output = srctree(dir.path(), &["show", "shop.Crat", "pkg"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("did you mean \"Cart\""), "{stderr}");
}

#[test]
fn test_tree_and_imports() {
    let dir = setup_project();
    let output = srctree(dir.path(), &["tree", "pkg"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Cart [Class] :6"), "{stdout}");

    let output = srctree(dir.path(), &["imports", "pkg"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("import os"));
}

#[test]
fn test_invalid_config_is_reported() {
    let dir = setup_project();
    fs::write(dir.path().join("srctree.toml"), "[tree]\nsource_extensions = []\n").unwrap();
    let output = srctree(dir.path(), &["tree", "pkg"]);
    assert!(!output.status.success());
}
