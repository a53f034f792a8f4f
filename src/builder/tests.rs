//! Running test and benchmark binaries.

use anyhow::Result;

use crate::builder::context::BuildContext;
use crate::builder::makefile;
use crate::builder::toolchain::CommandSpec;
use crate::core::node::*;

/// Patterns selecting which tests and benchmarks run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestFilter {
    pub test_pattern: Option<String>,
    pub bench_pattern: Option<String>,
}

impl TestFilter {
    pub fn tests(pattern: Option<String>) -> Self {
        TestFilter {
            test_pattern: pattern,
            bench_pattern: None,
        }
    }

    /// Benchmarks only; `pattern` defaults to every benchmark.
    pub fn benchmarks(pattern: Option<String>) -> Self {
        TestFilter {
            test_pattern: Some("^$".to_string()),
            bench_pattern: Some(pattern.unwrap_or_else(|| ".".to_string())),
        }
    }
}

/// Run every test binary below `id`.
///
/// A failing binary does not stop the others; every failure is returned.
pub fn run_tests(ctx: &mut BuildContext, id: NodeId, filter: &TestFilter) -> Vec<anyhow::Error> {
    let mut failures = Vec::new();
    collect_runs(ctx, id, filter, &mut failures);
    failures
}

fn collect_runs(
    ctx: &mut BuildContext,
    id: NodeId,
    filter: &TestFilter,
    failures: &mut Vec<anyhow::Error>,
) {
    match &ctx.graph.node(id).kind {
        NodeKind::Dir(dir) => {
            if let (Some(m), true) = (dir.makefile, dir.num_test_files > 0) {
                if let Err(e) = makefile::make_tests(ctx, m) {
                    failures.push(e);
                }
                return;
            }
            for child in ctx.graph.children(id) {
                collect_runs(ctx, child, filter, failures);
            }
        }
        NodeKind::Executable(exe) if exe.is_test() => {
            if let Err(e) = run_test_binary(ctx, id, filter) {
                failures.push(e);
            }
        }
        _ => {}
    }
}

fn run_test_binary(ctx: &mut BuildContext, id: NodeId, filter: &TestFilter) -> Result<()> {
    let dir = ctx.graph.parent(id).unwrap_or_else(|| ctx.graph.root_id());
    let program = format!("./{}", ctx.graph.entry(id).name());
    let args = ctx
        .toolchain
        .test_args(filter.test_pattern.as_deref(), filter.bench_pattern.as_deref());

    tracing::info!("testing {}", ctx.graph.path(dir).display());
    ctx.run_tool_in(CommandSpec::new(program).args(args), dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{infer::infer_all, make::make_tests, walker::walk};
    use crate::test_support::{context_with_runner, ProjectFixture, RecordingRunner};
    use tempfile::TempDir;

    #[test]
    fn test_failures_do_not_stop_other_binaries() {
        let tmp = TempDir::new().unwrap();
        ProjectFixture::new()
            .package("a", "x/a", &[("a.go", &[])])
            .test_file("a/a_test.go", "a", &["TestA"])
            .package("b", "x/b", &[("b.go", &[])])
            .test_file("b/b_test.go", "b", &["TestB", "BenchmarkB"])
            .write(tmp.path());

        let runner = RecordingRunner::new().with_failure("./package-test", "FAIL");
        let (mut ctx, log) = context_with_runner(tmp.path(), runner);
        walk(&mut ctx).unwrap();
        infer_all(&mut ctx, true).unwrap();
        let root = ctx.graph.root_id();
        make_tests(&mut ctx, root).unwrap();
        log.clear();

        let failures = run_tests(&mut ctx, root, &TestFilter::tests(Some("B".to_string())));
        assert_eq!(failures.len(), 2);

        let calls = log.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].argv, vec!["./package-test", "-test.run=B"]);
        assert_eq!(calls[0].cwd.as_deref(), Some(tmp.path().join("a").as_path()));
        assert_eq!(calls[1].cwd.as_deref(), Some(tmp.path().join("b").as_path()));
    }

    #[test]
    fn test_benchmark_filter() {
        let filter = TestFilter::benchmarks(None);
        assert_eq!(filter.test_pattern.as_deref(), Some("^$"));
        assert_eq!(filter.bench_pattern.as_deref(), Some("."));
    }
}
