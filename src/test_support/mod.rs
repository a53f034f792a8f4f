//! Test utilities for Moor unit tests.
//!
//! The build engine only reaches external tools through
//! [`CommandRunner`](crate::util::process::CommandRunner), so unit tests
//! swap in a [`RecordingRunner`] that logs every command line and fakes the
//! files a real compiler, archiver or linker would have produced.
//!
//! # Example
//!
//! ```rust,ignore
//! use crate::test_support::{context_with_runner, write_file, RecordingRunner};
//!
//! let tmp = tempfile::TempDir::new().unwrap();
//! write_file(tmp.path(), "moor.toml", "package = \"p\"\n");
//! let (mut ctx, calls) = context_with_runner(tmp.path(), RecordingRunner::new());
//! // walk, infer, make...
//! assert!(calls.lines().iter().any(|l| l.starts_with("go tool compile")));
//! ```

pub mod fixtures;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock, Mutex};
use std::time::{Duration, SystemTime};

use anyhow::{bail, Result};

use crate::builder::context::BuildContext;
use crate::builder::toolchain::{self, Toolchain};
use crate::util::config::ToolchainSettings;
use crate::util::context::InstallPaths;
use crate::util::process::{CommandRunner, ProcessBuilder};

pub use fixtures::*;

static CLOCK_BASE: LazyLock<SystemTime> = LazyLock::new(SystemTime::now);
static CLOCK_TICKS: AtomicU64 = AtomicU64::new(1);

/// A modification time later than every one handed out before.
///
/// Faked tool outputs and "touched" sources draw from the same clock so
/// staleness checks never depend on filesystem timestamp granularity.
pub fn next_mtime() -> SystemTime {
    let tick = CLOCK_TICKS.fetch_add(1, Ordering::SeqCst);
    *CLOCK_BASE + Duration::from_secs(60 + tick)
}

/// Set the modification time of `path`.
pub fn set_mtime(path: &Path, time: SystemTime) {
    let file = fs::File::options()
        .write(true)
        .open(path)
        .unwrap_or_else(|e| panic!("failed to open {}: {}", path.display(), e));
    file.set_modified(time)
        .unwrap_or_else(|e| panic!("failed to set mtime of {}: {}", path.display(), e));
}

/// Advance the modification time of `path` past everything built so far.
pub fn touch(path: &Path) {
    set_mtime(path, next_mtime());
}

/// Write `contents` to `root/rel`, creating parent directories.
pub fn write_file(root: &Path, rel: &str, contents: &str) -> PathBuf {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, contents).unwrap();
    path
}

/// Shared view of the commands a [`RecordingRunner`] has run.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    /// Program followed by its arguments.
    pub argv: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl RecordedCall {
    pub fn line(&self) -> String {
        self.argv.join(" ")
    }
}

impl CallLog {
    fn push(&self, call: RecordedCall) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Every command line, joined with spaces.
    pub fn lines(&self) -> Vec<String> {
        self.calls().iter().map(RecordedCall::line).collect()
    }

    /// Command lines containing `needle`.
    pub fn matching(&self, needle: &str) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|line| line.contains(needle))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }
}

/// What the fake does when a command line contains a pattern.
#[derive(Debug, Clone)]
enum Reaction {
    /// Return this text from [`CommandRunner::output`].
    Output(String),
    /// Create these files, relative to the command's directory.
    Creates(Vec<PathBuf>),
    /// Exit with an error.
    Fail(String),
}

/// Command runner that records instead of executing.
///
/// Compiler, archiver and linker invocations "produce" their output file:
/// the path after `-o`, or after the `grc`/`rcs` archive verbs.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    log: CallLog,
    reactions: Vec<(String, Reaction)>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> CallLog {
        self.log.clone()
    }

    /// Answer commands containing `pattern` with `text`.
    pub fn with_output(mut self, pattern: &str, text: &str) -> Self {
        self.reactions
            .push((pattern.to_string(), Reaction::Output(text.to_string())));
        self
    }

    /// Have commands containing `pattern` create `files`.
    pub fn with_creates(mut self, pattern: &str, files: &[&str]) -> Self {
        self.reactions.push((
            pattern.to_string(),
            Reaction::Creates(files.iter().map(PathBuf::from).collect()),
        ));
        self
    }

    /// Fail commands containing `pattern`.
    pub fn with_failure(mut self, pattern: &str, message: &str) -> Self {
        self.reactions
            .push((pattern.to_string(), Reaction::Fail(message.to_string())));
        self
    }

    fn record(&self, cmd: &ProcessBuilder) -> RecordedCall {
        let mut argv = vec![cmd.get_program().display().to_string()];
        argv.extend(cmd.get_args().iter().cloned());
        let call = RecordedCall {
            argv,
            cwd: cmd.get_cwd().map(Path::to_path_buf),
        };
        self.log.push(call.clone());
        call
    }

    fn react(&self, call: &RecordedCall) -> Result<Option<String>> {
        let line = call.line();
        let cwd = call.cwd.clone().unwrap_or_default();
        let mut output = None;
        for (pattern, reaction) in &self.reactions {
            if !line.contains(pattern.as_str()) {
                continue;
            }
            match reaction {
                Reaction::Output(text) => output = Some(text.clone()),
                Reaction::Creates(files) => {
                    for file in files {
                        produce(&cwd.join(file))?;
                    }
                }
                Reaction::Fail(message) => bail!("command \"{}\" failed: {}", line, message),
            }
        }

        if let Some(target) = produced_file(&call.argv) {
            produce(&cwd.join(target))?;
        }
        Ok(output)
    }
}

/// The file a compile, archive or link command writes.
fn produced_file(argv: &[String]) -> Option<&str> {
    let mut args = argv.iter().skip(1);
    while let Some(arg) = args.next() {
        if arg == "-o" || arg == "grc" || arg == "rcs" {
            return args.next().map(String::as_str);
        }
    }
    None
}

fn produce(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, b"")?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    }
    set_mtime(path, next_mtime());
    Ok(())
}

impl CommandRunner for RecordingRunner {
    fn run(&mut self, cmd: &ProcessBuilder) -> Result<()> {
        let call = self.record(cmd);
        self.react(&call)?;
        Ok(())
    }

    fn output(&mut self, cmd: &ProcessBuilder, _merge_stderr: bool) -> Result<String> {
        let call = self.record(cmd);
        Ok(self.react(&call)?.unwrap_or_default())
    }
}

/// The default `gc` toolchain with the standard library resolved implicitly.
pub fn test_toolchain() -> Box<dyn Toolchain> {
    let settings = ToolchainSettings {
        implicit_std: Some(true),
        ..Default::default()
    };
    toolchain::from_config(&settings, None).unwrap()
}

/// Install locations for a test project, hidden inside it.
pub fn test_install_paths(root: &Path) -> InstallPaths {
    InstallPaths::under(&root.join(".home"))
}

/// A build context for `root` running tools through `runner`.
pub fn context_with_runner(root: &Path, runner: RecordingRunner) -> (BuildContext, CallLog) {
    let log = runner.log();
    let ctx = BuildContext::new(
        root,
        test_toolchain(),
        Box::new(runner),
        test_install_paths(root),
    )
    .unwrap();
    (ctx, log)
}

/// A build context for `root` with a plain recording runner.
pub fn context(root: &Path) -> BuildContext {
    context_with_runner(root, RecordingRunner::new()).0
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_recording_runner_produces_outputs() {
        let tmp = TempDir::new().unwrap();
        let mut runner = RecordingRunner::new();
        let log = runner.log();

        let cmd = ProcessBuilder::new("go")
            .args(["tool", "compile", "-o", "_obj/p.o", "p.go"])
            .cwd(tmp.path());
        runner.run(&cmd).unwrap();

        assert!(tmp.path().join("_obj/p.o").is_file());
        assert_eq!(log.lines(), vec!["go tool compile -o _obj/p.o p.go"]);
    }

    #[test]
    fn test_recording_runner_reactions() {
        let tmp = TempDir::new().unwrap();
        let mut runner = RecordingRunner::new()
            .with_output("version", "go version go1.21.0 linux/amd64")
            .with_failure("broken", "exit status 2");

        let version = ProcessBuilder::new("go").arg("version").cwd(tmp.path());
        assert_eq!(
            runner.output(&version, false).unwrap(),
            "go version go1.21.0 linux/amd64"
        );

        let broken = ProcessBuilder::new("broken").cwd(tmp.path());
        assert!(runner.run(&broken).is_err());
    }

    #[test]
    fn test_clock_is_monotonic() {
        let a = next_mtime();
        let b = next_mtime();
        assert!(b > a);
    }
}
