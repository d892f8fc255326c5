//! Architectural Enforcement
//!
//! Source scanners shared by the enforcement tests in `tests/`:
//! - No blocking I/O inside async functions
//! - No sleep calls in production code
//!
//! The scanners are line-based heuristics, not a parser. They find the
//! enclosing function by scanning backwards for a `fn` signature and treat
//! everything under a `#[cfg(test)] mod` as test code.

use std::fs;
use std::path::{Path, PathBuf};

/// Production source directories, relative to the workspace root
pub const PRODUCTION_DIRS: &[&str] = &["conductor/core/src"];

/// Workspace root, resolved from this package's manifest directory
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../..")
}

/// A scanned source file
pub struct SourceFile {
    /// Path as found on disk
    pub path: PathBuf,
    /// File contents split into lines
    pub lines: Vec<String>,
}

impl SourceFile {
    /// Read a file, returning `None` if it cannot be read
    pub fn load(path: &Path) -> Option<Self> {
        let content = fs::read_to_string(path).ok()?;
        Some(Self {
            path: path.to_path_buf(),
            lines: content.lines().map(str::to_string).collect(),
        })
    }

    /// Lines as string slices, for the detectors
    pub fn line_refs(&self) -> Vec<&str> {
        self.lines.iter().map(String::as_str).collect()
    }

    /// Format a violation at a 0-based line index
    pub fn violation(&self, idx: usize, kind: &str) -> String {
        format!(
            "{}:{} - {}: {}",
            self.path.display(),
            idx + 1,
            kind,
            self.lines[idx].trim()
        )
    }
}

/// All `.rs` files under the production directories
pub fn production_sources() -> Vec<SourceFile> {
    let root = workspace_root();
    let mut files = Vec::new();

    for dir in PRODUCTION_DIRS {
        let path = root.join(dir);
        if !path.exists() {
            continue;
        }

        for entry in walkdir::WalkDir::new(&path)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if entry.path().extension().and_then(|s| s.to_str()) == Some("rs") {
                if let Some(file) = SourceFile::load(entry.path()) {
                    files.push(file);
                }
            }
        }
    }

    files
}

/// The part of a line before any `//` comment
pub fn code_part(line: &str) -> &str {
    line.split("//").next().unwrap_or(line)
}

/// Whether a trimmed line is a function signature, and if so whether it is async
///
/// Handles visibility and `const`/`unsafe`/`async` qualifiers in any order.
pub fn fn_signature(line: &str) -> Option<bool> {
    let mut rest = code_part(line).trim();
    let mut is_async = false;

    loop {
        if let Some(after) = rest.strip_prefix("pub(") {
            rest = after.split_once(')').map_or("", |(_, tail)| tail).trim_start();
        } else if let Some(after) = rest.strip_prefix("pub ") {
            rest = after.trim_start();
        } else if let Some(after) = rest.strip_prefix("async ") {
            is_async = true;
            rest = after.trim_start();
        } else if let Some(after) = rest
            .strip_prefix("const ")
            .or_else(|| rest.strip_prefix("unsafe "))
        {
            rest = after.trim_start();
        } else {
            break;
        }
    }

    rest.starts_with("fn ").then_some(is_async)
}

fn is_boundary(line: &str) -> bool {
    let line = line.trim();
    line.starts_with("mod ")
        || line.starts_with("pub mod ")
        || (line.starts_with("impl") && line.contains('{'))
}

/// Index and asyncness of the function enclosing a line
pub fn enclosing_fn(lines: &[&str], current_idx: usize) -> Option<(usize, bool)> {
    for i in (0..current_idx).rev() {
        if let Some(is_async) = fn_signature(lines[i]) {
            return Some((i, is_async));
        }
        if is_boundary(lines[i]) {
            return None;
        }
    }
    None
}

/// Check if line is inside a `#[cfg(test)]` module
pub fn is_in_test_module(lines: &[&str], current_idx: usize) -> bool {
    for i in (0..current_idx).rev() {
        if lines[i].trim().starts_with("#[cfg(test)]") {
            let next = lines[i + 1..current_idx.max(i + 1)]
                .iter()
                .map(|l| l.trim())
                .find(|l| !l.is_empty());
            if next.is_some_and(|l| l.starts_with("mod ")) {
                return true;
            }
        }
    }
    false
}

/// Check if line is inside a test function or test module
pub fn is_in_test_function(lines: &[&str], current_idx: usize) -> bool {
    if is_in_test_module(lines, current_idx) {
        return true;
    }

    let Some((fn_idx, _)) = enclosing_fn(lines, current_idx) else {
        return false;
    };

    // Attributes and doc comments sit directly above the signature
    for i in (0..fn_idx).rev() {
        let line = lines[i].trim();

        if line.starts_with("#[test]")
            || line.starts_with("#[tokio::test")
            || line.starts_with("#[cfg(test)]")
        {
            return true;
        }

        if !(line.starts_with("#[") || line.starts_with("///")) {
            break;
        }
    }

    false
}

/// Check if line is inside an async function
pub fn is_in_async_function(lines: &[&str], current_idx: usize) -> bool {
    matches!(enclosing_fn(lines, current_idx), Some((_, true)))
}

/// Check if line is inside a non-async function (acceptable for blocking I/O)
pub fn is_in_non_async_function(lines: &[&str], current_idx: usize) -> bool {
    matches!(enclosing_fn(lines, current_idx), Some((_, false)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fn_signature_qualifiers() {
        assert_eq!(fn_signature("fn main() {"), Some(false));
        assert_eq!(fn_signature("    pub fn load() -> Self {"), Some(false));
        assert_eq!(fn_signature("pub(crate) async fn run(&self) {"), Some(true));
        assert_eq!(fn_signature("pub async fn stop(self) {"), Some(true));
        assert_eq!(fn_signature("const fn zero() -> u32 {"), Some(false));
        assert_eq!(fn_signature("let f = some_fn();"), None);
        assert_eq!(fn_signature("// fn commented() {"), None);
    }

    #[test]
    fn test_async_function_detection() {
        let code = vec![
            "pub async fn bad_function() {",
            "    let contents = std::fs::read_to_string(\"file.txt\")?;",
            "}",
        ];

        assert!(is_in_async_function(&code, 1));
        assert!(!is_in_non_async_function(&code, 1));
        assert!(!is_in_test_function(&code, 1));
    }

    #[test]
    fn test_non_async_function_detection() {
        let code = vec![
            "fn load_with_env(",
            "    path: Option<&Path>,",
            ") -> Result<Config, Error> {",
            "    let contents = std::fs::read_to_string(path)?;",
            "}",
        ];

        assert!(is_in_non_async_function(&code, 3));
    }

    #[test]
    fn test_test_function_detection() {
        let code = vec![
            "#[tokio::test(start_paused = true)]",
            "async fn test_something() {",
            "    tokio::time::sleep(Duration::from_secs(1)).await;",
            "}",
        ];

        assert!(is_in_test_function(&code, 2));
    }

    #[test]
    fn test_helper_inside_test_module() {
        let code = vec![
            "pub fn real() {}",
            "",
            "#[cfg(test)]",
            "mod tests {",
            "    async fn helper() {",
            "        tokio::time::sleep(delay).await;",
            "    }",
            "}",
        ];

        assert!(!is_in_test_module(&code, 0));
        assert!(is_in_test_function(&code, 5));
    }

    #[test]
    fn test_workspace_root_holds_core_sources() {
        assert!(workspace_root().join(PRODUCTION_DIRS[0]).exists());
    }
}
