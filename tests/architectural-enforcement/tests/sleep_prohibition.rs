//! Integration Test: Sleep Prohibition
//!
//! **Policy**: Production code MUST NOT call sleep methods. Waiting is done on
//! I/O, channels, or `tokio::time::interval`; deadlines use `tokio::time::timeout`.
//! **Exceptions**: test code

use architectural_enforcement::{code_part, is_in_test_function, production_sources, SourceFile};

/// Test that production code does not contain sleep() calls
#[test]
fn test_no_sleep_in_production_code() {
    let violations: Vec<String> = production_sources()
        .iter()
        .flat_map(sleep_violations)
        .collect();

    if !violations.is_empty() {
        eprintln!("\n❌ CRITICAL: Sleep calls found in production code!\n");

        for violation in &violations {
            eprintln!("  ❌ {}", violation);
        }

        eprintln!("\n✅ ACCEPTABLE:");
        eprintln!("  - Periodic tasks using tokio::time::interval()");
        eprintln!("  - Deadlines using tokio::time::timeout()");
        eprintln!("  - Test code (#[test], #[tokio::test], #[cfg(test)] modules)");
        eprintln!("\n❌ FORBIDDEN:");
        eprintln!("  - Sleep in polling loops");
        eprintln!("  - Sleep as poor man's synchronization");
        eprintln!("  - std::thread::sleep anywhere in async code");

        panic!(
            "\nFound {} sleep violation(s) in production code.\nFix these before merging!",
            violations.len()
        );
    }
}

fn sleep_violations(file: &SourceFile) -> Vec<String> {
    let lines = file.line_refs();

    lines
        .iter()
        .enumerate()
        .filter(|(_, line)| {
            let code = code_part(line);
            code.contains("::sleep(") || code.contains(".sleep(")
        })
        .filter(|(idx, _)| !is_in_test_function(&lines, *idx))
        .map(|(idx, _)| file.violation(idx, "Sleep call"))
        .collect()
}

#[test]
fn test_detector_flags_sleep_in_loop() {
    let file = SourceFile {
        path: "src/poll.rs".into(),
        lines: vec![
            "async fn poll() {".to_string(),
            "    loop {".to_string(),
            "        tokio::time::sleep(Duration::from_secs(1)).await;".to_string(),
            "    }".to_string(),
            "}".to_string(),
        ],
    };

    assert_eq!(sleep_violations(&file).len(), 1);
}

#[test]
fn test_detector_ignores_test_module() {
    let file = SourceFile {
        path: "src/poll.rs".into(),
        lines: vec![
            "#[cfg(test)]".to_string(),
            "mod tests {".to_string(),
            "    async fn slow_reply() {".to_string(),
            "        tokio::time::sleep(delay).await;".to_string(),
            "    }".to_string(),
            "}".to_string(),
        ],
    };

    assert!(sleep_violations(&file).is_empty());
}
