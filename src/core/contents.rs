//! Lightweight scanner for Go source files.
//!
//! Only the parts the build needs are extracted: the package clause, the
//! import declarations, and (for test files) the names of top-level test
//! and benchmark functions.

use std::sync::LazyLock;

use regex::Regex;

static PACKAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*package\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap());

static IMPORT_SPEC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(?:[A-Za-z_.][A-Za-z0-9_]*\s+)?["`]([^"`]+)["`]"#).unwrap()
});

static QUOTED_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"["`]([^"`]+)["`]"#).unwrap());

static TEST_FUNC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^func\s+((?:Test|Benchmark)[A-Za-z0-9_]*)\s*\([^)]*\)[^{\n]*\{").unwrap()
});

/// What the build needs to know about one source file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceContents {
    pub package: String,
    /// Imported paths in declaration order, without duplicates.
    pub imports: Vec<String>,
    pub tests: Vec<String>,
    pub benchmarks: Vec<String>,
}

impl SourceContents {
    /// Scan `text`. Test and benchmark functions are collected only when
    /// `collect_tests` is set.
    ///
    /// Imports are read from the declarations directly after the package
    /// clause; text inside string literals never counts as code.
    pub fn parse(text: &str, collect_tests: bool) -> Result<Self, String> {
        let code = mask(text, false);
        let bare = mask(text, true);

        let clause = PACKAGE_RE
            .captures(&bare)
            .ok_or_else(|| "missing package clause".to_string())?;
        let package = clause[1].to_string();
        let header_start = clause.get(0).map_or(0, |m| m.end());

        let mut imports = Vec::new();
        for path in header_imports(&code[header_start..]) {
            if !imports.contains(&path) {
                imports.push(path);
            }
        }

        let mut tests = Vec::new();
        let mut benchmarks = Vec::new();
        if collect_tests {
            for cap in TEST_FUNC_RE.captures_iter(&bare) {
                let name = cap[1].to_string();
                if name.starts_with("Test") {
                    tests.push(name);
                } else {
                    benchmarks.push(name);
                }
            }
        }

        Ok(SourceContents {
            package,
            imports,
            tests,
            benchmarks,
        })
    }
}

/// Import paths of the leading `import` declarations in `code`.
fn header_imports(mut code: &str) -> Vec<String> {
    let mut imports = Vec::new();
    loop {
        code = code.trim_start_matches(|c: char| c.is_whitespace() || c == ';');
        let Some(rest) = code.strip_prefix("import") else {
            break;
        };
        if rest.starts_with(|c: char| c.is_alphanumeric() || c == '_') {
            break;
        }
        let rest = rest.trim_start();

        if let Some(group) = rest.strip_prefix('(') {
            let Some(end) = group.find(')') else {
                break;
            };
            imports.extend(QUOTED_RE.captures_iter(&group[..end]).map(|q| q[1].to_string()));
            code = &group[end + 1..];
        } else {
            let Some(spec) = IMPORT_SPEC_RE.captures(rest) else {
                break;
            };
            imports.push(spec[1].to_string());
            code = &rest[spec.get(0).map_or(0, |m| m.end())..];
        }
    }
    imports
}

/// Blank out comments, and the contents of string and rune literals when
/// `literals` is set.
///
/// Every blanked character becomes spaces of the same byte length and
/// newlines are kept, so offsets line up with the input.
fn mask(text: &str, literals: bool) -> String {
    fn blank(out: &mut String, c: char) {
        if c == '\n' {
            out.push('\n');
        } else {
            for _ in 0..c.len_utf8() {
                out.push(' ');
            }
        }
    }

    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '/' if chars.peek() == Some(&'/') => {
                blank(&mut out, c);
                for d in chars.by_ref() {
                    blank(&mut out, d);
                    if d == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                blank(&mut out, c);
                if let Some(star) = chars.next() {
                    blank(&mut out, star);
                }
                let mut prev = '\0';
                for d in chars.by_ref() {
                    blank(&mut out, d);
                    if prev == '*' && d == '/' {
                        break;
                    }
                    prev = d;
                }
            }
            '"' | '\'' | '`' => {
                out.push(c);
                let raw = c == '`';
                while let Some(d) = chars.next() {
                    if d == c || (!raw && d == '\n') {
                        out.push(d);
                        break;
                    }
                    let escaped = if !raw && d == '\\' { chars.next() } else { None };
                    for e in std::iter::once(d).chain(escaped) {
                        if literals {
                            blank(&mut out, e);
                        } else {
                            out.push(e);
                        }
                    }
                }
            }
            _ => out.push(c),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_and_grouped_imports() {
        let src = r#"
// Package comment mentioning package bogus
package arch

import "fmt"
import (
    "os"
    str "strings"
    _ "example/arch/internal" // side effects
)

func main() {}
"#;
        let contents = SourceContents::parse(src, false).unwrap();
        assert_eq!(contents.package, "arch");
        assert_eq!(
            contents.imports,
            vec!["fmt", "os", "strings", "example/arch/internal"]
        );
        assert!(contents.tests.is_empty());
    }

    #[test]
    fn test_collects_tests_only_when_asked() {
        let src = r#"package arch

import "testing"

func TestB(t *testing.T) {
}

func TestA(t *testing.T) { t.Log("x") }

func BenchmarkLoop(b *testing.B) {
}

func helper() {}

/*
func TestCommented(t *testing.T) {}
*/
"#;
        let plain = SourceContents::parse(src, false).unwrap();
        assert!(plain.tests.is_empty());

        let contents = SourceContents::parse(src, true).unwrap();
        assert_eq!(contents.tests, vec!["TestB", "TestA"]);
        assert_eq!(contents.benchmarks, vec!["BenchmarkLoop"]);
        assert_eq!(contents.imports, vec!["testing"]);
    }

    #[test]
    fn test_comment_markers_inside_strings() {
        let src = "package p\n\nimport \"net/http\" // \"/*\"\n\nimport \"os\"\n\nvar u = \"http://x/*y\"\n";
        let contents = SourceContents::parse(src, false).unwrap();
        assert_eq!(contents.imports, vec!["net/http", "os"]);
    }

    #[test]
    fn test_missing_package_clause() {
        let err = SourceContents::parse("import \"fmt\"\n", false).unwrap_err();
        assert!(err.contains("package"));
    }

    #[test]
    fn test_duplicate_imports_collapse() {
        let src = "package p\nimport \"fmt\"\nimport f \"fmt\"\n";
        let contents = SourceContents::parse(src, false).unwrap();
        assert_eq!(contents.imports, vec!["fmt"]);
    }

    #[test]
    fn test_string_literals_are_not_code() {
        let src = "package gen\n\nimport (\n\t\"fmt\"\n\t\"testing\"\n)\n\nconst template = `\nimport \"github.com/never/imported\"\n\nfunc TestGenerated(t *testing.T) {\n}\n`\n\nvar quoted = \"import \\\"os\\\"\"\n\nfunc TestReal(t *testing.T) {\n\tfmt.Println(template, quoted)\n}\n";
        let contents = SourceContents::parse(src, true).unwrap();
        assert_eq!(contents.imports, vec!["fmt", "testing"]);
        assert_eq!(contents.tests, vec!["TestReal"]);
    }

    #[test]
    fn test_imports_end_at_first_other_declaration() {
        let src = "package p\n\nimport \"os\"\n\nvar x = 1\n\nimport \"late\"\n";
        let contents = SourceContents::parse(src, false).unwrap();
        assert_eq!(contents.imports, vec!["os"]);
    }

    #[test]
    fn test_multibyte_literals_keep_offsets() {
        let src = "// héllo\npackage p; import \"é/x\"\nimport `raw/y`\n";
        let contents = SourceContents::parse(src, false).unwrap();
        assert_eq!(contents.package, "p");
        assert_eq!(contents.imports, vec!["é/x", "raw/y"]);
    }
}
