//! Integration Test: Blocking I/O Prohibition
//!
//! **Policy**: Production code MUST NOT use blocking I/O inside async functions.
//! **Required**: Use `tokio::fs`, `tokio::net`, `tokio::io`, not `std::fs`, `std::net`, `std::io`

use architectural_enforcement::{
    code_part, is_in_async_function, is_in_non_async_function, is_in_test_function,
    production_sources, SourceFile,
};

/// Test that production code does not use blocking I/O
#[test]
fn test_no_blocking_io_in_production_code() {
    let sources = production_sources();
    assert!(!sources.is_empty(), "no production sources found to scan");

    let violations: Vec<String> = sources.iter().flat_map(blocking_io_violations).collect();

    if !violations.is_empty() {
        eprintln!("\n❌ CRITICAL: Blocking I/O calls found in production code!\n");

        for violation in &violations {
            eprintln!("  ❌ {}", violation);
        }

        eprintln!("\n❌ FORBIDDEN blocking I/O:");
        eprintln!("  - std::fs::read(), std::fs::write(), std::fs::File");
        eprintln!("  - std::net::TcpStream, std::net::TcpListener");
        eprintln!("  - std::process::Command::output()");
        eprintln!("  - reqwest::blocking::*");
        eprintln!("\n✅ REQUIRED async I/O:");
        eprintln!("  - tokio::fs::read().await");
        eprintln!("  - tokio::io::stdin() with AsyncBufReadExt");
        eprintln!("  - reqwest::Client::get().send().await");
        eprintln!("\n✅ ACCEPTABLE blocking I/O:");
        eprintln!("  - Non-async functions (config loading before the session starts)");
        eprintln!("  - Test code");

        panic!(
            "\nFound {} blocking I/O violation(s) in production code.\nFix these before merging!",
            violations.len()
        );
    }
}

fn blocking_io_violations(file: &SourceFile) -> Vec<String> {
    let lines = file.line_refs();
    let mut violations = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        let code = code_part(line);

        if is_in_test_function(&lines, idx) || is_in_non_async_function(&lines, idx) {
            continue;
        }

        if code.contains("std::fs::") || code.contains("use std::fs") {
            violations.push(file.violation(idx, "Blocking file I/O"));
        }

        if code.contains("std::net::") || code.contains("use std::net") {
            violations.push(file.violation(idx, "Blocking network I/O"));
        }

        if code.contains("std::process::Command") {
            violations.push(file.violation(idx, "Blocking process I/O"));
        }

        if code.contains("reqwest::blocking") {
            violations.push(file.violation(idx, "Blocking HTTP client"));
        }

        if (code.contains("std::io::stdin()") || code.contains("std::io::stdout()"))
            && is_in_async_function(&lines, idx)
        {
            violations.push(file.violation(idx, "Blocking stdin/stdout in async"));
        }
    }

    violations
}

#[test]
fn test_detector_flags_fs_in_async_fn() {
    let file = SourceFile {
        path: "src/bad.rs".into(),
        lines: vec![
            "pub async fn load() {".to_string(),
            "    let s = std::fs::read_to_string(\"x\");".to_string(),
            "}".to_string(),
        ],
    };

    let violations = blocking_io_violations(&file);
    assert_eq!(violations.len(), 1);
    assert!(violations[0].starts_with("src/bad.rs:2 - Blocking file I/O"));
}

#[test]
fn test_detector_allows_fs_in_sync_fn() {
    let file = SourceFile {
        path: "src/config.rs".into(),
        lines: vec![
            "fn read_config() {".to_string(),
            "    let s = std::fs::read_to_string(\"x\");".to_string(),
            "}".to_string(),
        ],
    };

    assert!(blocking_io_violations(&file).is_empty());
}
