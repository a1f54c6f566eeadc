//! Structural tests for architectural boundary enforcement.
//!
//! These tests scan source files to verify that the layer boundaries
//! documented in each layer's `mod.rs` hold.

use std::path::{Path, PathBuf};

/// Collect all `.rs` files under a directory recursively.
fn collect_rs_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                files.extend(collect_rs_files(&path));
            } else if path.extension().and_then(|e| e.to_str()) == Some("rs") {
                files.push(path);
            }
        }
    }
    files
}

/// Read a file and strip comment lines to avoid false positives.
fn read_non_comment_lines(path: &Path) -> Vec<String> {
    let Ok(content) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    content
        .lines()
        .filter(|l| {
            let trimmed = l.trim();
            !trimmed.starts_with("//") && !trimmed.starts_with("/*") && !trimmed.starts_with('*')
        })
        .map(String::from)
        .collect()
}

/// Lines in `layer` that mention any of `forbidden`, as `file:line: text`.
fn violations(layer: &str, forbidden: &[&str]) -> Vec<String> {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("src").join(layer);
    let mut found = Vec::new();
    for file in collect_rs_files(&dir) {
        let rel = file
            .strip_prefix(env!("CARGO_MANIFEST_DIR"))
            .unwrap_or(&file)
            .display()
            .to_string();
        for (idx, line) in read_non_comment_lines(&file).iter().enumerate() {
            if forbidden.iter().any(|f| line.contains(f)) {
                found.push(format!("{rel}:{}: {}", idx + 1, line.trim()));
            }
        }
    }
    found
}

#[test]
fn domain_is_pure() {
    let found = violations(
        "domain",
        &[
            "crate::infra",
            "crate::application",
            "crate::commands",
            "crate::output",
            "tokio",
            "std::fs",
            "std::process",
            "std::net",
        ],
    );
    assert!(found.is_empty(), "domain/ must stay pure:\n{}", found.join("\n"));
}

#[test]
fn application_depends_only_on_domain() {
    let found = violations("application", &["crate::infra", "crate::commands", "crate::output"]);
    assert!(
        found.is_empty(),
        "application/ must not reach outward:\n{}",
        found.join("\n")
    );
}

#[test]
fn infra_has_no_imports_from_commands_or_output() {
    let found = violations("infra", &["crate::commands", "crate::output"]);
    assert!(
        found.is_empty(),
        "forbidden import in infra/:\n{}",
        found.join("\n")
    );
}

#[test]
fn services_and_infra_do_not_print() {
    let mut found = violations("infra", &["println!", "eprintln!"]);
    found.extend(violations("application", &["println!", "eprintln!"]));
    assert!(
        found.is_empty(),
        "user-facing output belongs to output/ via ProgressReporter:\n{}",
        found.join("\n")
    );
}
