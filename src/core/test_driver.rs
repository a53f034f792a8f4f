//! Generation of the `main` package that runs a package's tests.

use std::fs;
use std::io;
use std::path::Path;

use anyhow::{Context, Result};

/// Render the driver source for `import_path`.
///
/// Names are emitted sorted and without duplicates regardless of input order.
pub fn render<'a>(
    import_path: &str,
    tests: impl IntoIterator<Item = &'a String>,
    benchmarks: impl IntoIterator<Item = &'a String>,
) -> String {
    let mut tests: Vec<&String> = tests.into_iter().collect();
    tests.sort();
    tests.dedup();
    let mut benchmarks: Vec<&String> = benchmarks.into_iter().collect();
    benchmarks.sort();
    benchmarks.dedup();

    let pkg = import_path.rsplit('/').next().unwrap_or(import_path);

    let mut out = String::from("package main\n\n");
    if !tests.is_empty() || !benchmarks.is_empty() {
        out.push_str(&format!("import \"{}\"\n", import_path));
    }
    out.push_str("import \"testing\"\n");
    out.push_str("import __regexp__ \"regexp\"\n\n");

    out.push_str("var tests = []testing.InternalTest{\n");
    for name in &tests {
        out.push_str(&format!("\t{{\"{pkg}.{name}\", {pkg}.{name}}},\n"));
    }
    out.push_str("}\n\n");

    out.push_str("var benchmarks = []testing.InternalBenchmark{\n");
    for name in &benchmarks {
        out.push_str(&format!("\t{{\"{pkg}.{name}\", {pkg}.{name}}},\n"));
    }
    out.push_str("}\n\n");

    out.push_str(
        "func matchString(pat, str string) (bool, error) {\n\treturn __regexp__.MatchString(pat, str)\n}\n\n",
    );
    out.push_str("func main() {\n\ttesting.Main(matchString, tests, benchmarks, nil)\n}\n");
    out
}

/// Write `text` to `path` unless the file already holds exactly that text.
///
/// Returns whether the file was written.
pub fn write_if_changed(path: &Path, text: &str) -> Result<bool> {
    match fs::read(path) {
        Ok(existing) if existing == text.as_bytes() => return Ok(false),
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(e).with_context(|| format!("failed to read file: {}", path.display()))
        }
    }

    tracing::debug!("write {}", path.display());
    crate::util::fs::write_string(path, text)?;
    Ok(true)
}
