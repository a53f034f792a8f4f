//! Test fixtures for common project layouts.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::write_file;

/// A project tree written into a temporary directory.
#[derive(Debug, Clone, Default)]
pub struct ProjectFixture {
    /// Files (path relative to project root -> content).
    pub files: BTreeMap<PathBuf, String>,
}

impl ProjectFixture {
    /// A project with an empty root `moor.toml`.
    pub fn new() -> Self {
        ProjectFixture::default().file("moor.toml", "")
    }

    /// Add or replace a file.
    pub fn file(mut self, rel: &str, contents: &str) -> Self {
        self.files.insert(PathBuf::from(rel), contents.to_string());
        self
    }

    /// A package directory `dir` with target `import_path`, one source
    /// file per `(name, imports)` pair.
    pub fn package(mut self, dir: &str, import_path: &str, files: &[(&str, &[&str])]) -> Self {
        let package = package_name(import_path);
        self = self.file(
            &format!("{}/moor.toml", dir),
            &format!("package = \"{}\"\n", import_path),
        );
        for (name, imports) in files {
            self = self.file(&format!("{}/{}", dir, name), &go_source(&package, imports));
        }
        self
    }

    /// A `main` package source at `rel`.
    pub fn command(self, rel: &str, imports: &[&str]) -> Self {
        self.file(rel, &go_source("main", imports))
    }

    /// A test source at `rel` declaring the named test functions.
    pub fn test_file(self, rel: &str, package: &str, tests: &[&str]) -> Self {
        self.file(rel, &go_test_source(package, tests))
    }

    /// Write every file below `root`.
    pub fn write(&self, root: &Path) {
        for (rel, contents) in &self.files {
            write_file(root, &rel.to_string_lossy(), contents);
        }
    }
}

/// Last element of an import path.
pub fn package_name(import_path: &str) -> String {
    import_path
        .rsplit('/')
        .next()
        .unwrap_or(import_path)
        .to_string()
}

/// A Go source in `package` importing `imports`.
pub fn go_source(package: &str, imports: &[&str]) -> String {
    let mut text = format!("package {}\n\n", package);
    if !imports.is_empty() {
        text.push_str("import (\n");
        for import in imports {
            text.push_str(&format!("\t\"{}\"\n", import));
        }
        text.push_str(")\n\n");
    }
    if package == "main" {
        text.push_str("func main() {}\n");
    } else {
        text.push_str(&format!("func {}() {{}}\n", capitalize(package)));
    }
    text
}

/// A Go test source declaring `tests`, which may include benchmarks.
pub fn go_test_source(package: &str, tests: &[&str]) -> String {
    let mut text = format!("package {}\n\nimport \"testing\"\n", package);
    for name in tests {
        let param = if name.starts_with("Benchmark") {
            "b *testing.B"
        } else {
            "t *testing.T"
        };
        text.push_str(&format!("\nfunc {}({}) {{\n}}\n", name, param));
    }
    text
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::contents::SourceContents;

    #[test]
    fn test_generated_sources_parse() {
        let src = go_source("lib", &["fmt", "x/dep"]);
        let contents = SourceContents::parse(&src, false).unwrap();
        assert_eq!(contents.package, "lib");
        assert_eq!(contents.imports, vec!["fmt", "x/dep"]);

        let test = go_test_source("lib", &["TestOne", "BenchmarkTwo"]);
        let contents = SourceContents::parse(&test, true).unwrap();
        assert_eq!(contents.tests, vec!["TestOne"]);
        assert_eq!(contents.benchmarks, vec!["BenchmarkTwo"]);
    }

    #[test]
    fn test_package_fixture_layout() {
        let fixture = ProjectFixture::new().package("lib", "x/lib", &[("a.go", &[])]);
        assert!(fixture.files.contains_key(Path::new("lib/moor.toml")));
        assert!(fixture.files[Path::new("lib/a.go")].starts_with("package lib"));
    }
}
