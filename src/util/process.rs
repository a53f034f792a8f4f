//! Subprocess execution utilities.

use std::collections::{BTreeMap, HashMap};
use std::ffi::OsStr;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};

/// Builder for subprocess execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<String>,
    env: HashMap<String, String>,
    cwd: Option<PathBuf>,
    stdin: Option<Vec<u8>>,
}

impl ProcessBuilder {
    /// Create a new process builder for the given program.
    pub fn new(program: impl AsRef<Path>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            env: HashMap::new(),
            cwd: None,
            stdin: None,
        }
    }

    /// Build from an argv vector; the first element is the program.
    pub fn from_argv(argv: &[String]) -> Result<Self> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| anyhow!("empty command line"))?;
        Ok(ProcessBuilder::new(program).args(args))
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(
            args.into_iter()
                .map(|s| s.as_ref().to_string_lossy().into_owned()),
        );
        self
    }

    /// Set an environment variable.
    pub fn env(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.env
            .insert(key.as_ref().to_string(), value.as_ref().to_string());
        self
    }

    /// Set the working directory.
    pub fn cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }

    /// Set stdin data.
    pub fn stdin(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(data.into());
        self
    }

    pub fn get_program(&self) -> &Path {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    pub fn get_cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    /// Short name of the program, used for timings.
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string())
    }

    fn build_command(&self, program: &Path) -> Command {
        let mut cmd = Command::new(program);
        cmd.args(&self.args);

        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }

        cmd
    }

    /// Resolve the program through `PATH` unless it already names a path.
    fn resolve_program(&self) -> Result<PathBuf> {
        if self.program.components().count() > 1 {
            return Ok(self.program.clone());
        }
        which::which(&self.program)
            .with_context(|| format!("failed to lookup executable \"{}\"", self.program.display()))
    }

    /// Spawn the process, feed stdin from a separate thread, and wait.
    ///
    /// Output is captured when `capture` is set and inherited otherwise.
    fn spawn_and_wait(&self, capture: bool) -> Result<Output> {
        let program = self.resolve_program()?;
        let mut cmd = self.build_command(&program);

        cmd.stdin(if self.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        if capture {
            cmd.stdout(Stdio::piped());
            cmd.stderr(Stdio::piped());
        }

        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn `{}`", self.program.display()))?;

        let feeder = match (self.stdin.clone(), child.stdin.take()) {
            (Some(data), Some(mut pipe)) => Some(thread::spawn(move || pipe.write_all(&data))),
            _ => None,
        };

        let output = child
            .wait_with_output()
            .with_context(|| format!("failed to wait for `{}`", self.program.display()))?;

        if let Some(feeder) = feeder {
            match feeder.join() {
                Ok(result) => {
                    // The child may exit without reading all of its input.
                    if let Err(e) = result {
                        if e.kind() != std::io::ErrorKind::BrokenPipe {
                            return Err(e).context("failed to write stdin");
                        }
                    }
                }
                Err(_) => bail!("stdin writer thread panicked"),
            }
        }

        Ok(output)
    }

    /// Execute the command and wait for completion, capturing output.
    pub fn exec(&self) -> Result<Output> {
        self.spawn_and_wait(true)
    }

    /// Execute with inherited output and return status only.
    pub fn status(&self) -> Result<ExitStatus> {
        Ok(self.spawn_and_wait(false)?.status)
    }

    fn failure(&self, stderr: &str) -> anyhow::Error {
        let mut msg = format!("command \"{}\"", self.display_command());
        if let Some(cwd) = &self.cwd {
            msg.push_str(&format!(" run in directory \"{}\"", cwd.display()));
        }
        msg.push_str(" returned an error");
        let stderr = stderr.trim_end();
        if !stderr.is_empty() {
            msg.push('\n');
            msg.push_str(stderr);
        }
        anyhow!(msg)
    }

    /// Display the command for error messages.
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Runs the external tools a build needs.
pub trait CommandRunner {
    /// Run with the tool's output passed through; non-zero exit is an error.
    fn run(&mut self, cmd: &ProcessBuilder) -> Result<()>;

    /// Run and return stdout, followed by stderr when `merge_stderr` is set.
    fn output(&mut self, cmd: &ProcessBuilder, merge_stderr: bool) -> Result<String>;

    /// Accumulated per-tool timings, when recording is enabled.
    fn timings(&self) -> Option<&Timings> {
        None
    }
}

/// Wall-clock totals per tool.
#[derive(Debug, Clone, Default)]
pub struct Timings {
    by_tool: BTreeMap<String, (Duration, usize)>,
}

impl Timings {
    pub fn record(&mut self, tool: &str, elapsed: Duration) {
        let entry = self.by_tool.entry(tool.to_string()).or_default();
        entry.0 += elapsed;
        entry.1 += 1;
    }

    pub fn is_empty(&self) -> bool {
        self.by_tool.is_empty()
    }

    /// One line per tool, slowest first.
    pub fn report(&self) -> String {
        let mut rows: Vec<_> = self.by_tool.iter().collect();
        rows.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then(a.0.cmp(b.0)));
        rows.iter()
            .map(|(tool, (total, count))| {
                format!(
                    "{:>10.3}s  {:>5}x  {}",
                    total.as_secs_f64(),
                    count,
                    tool
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Runs tools as real subprocesses.
#[derive(Debug, Default)]
pub struct SystemRunner {
    verbose: bool,
    timings: Option<Timings>,
}

impl SystemRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Echo each command line to stderr before running it.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_timings(mut self, enabled: bool) -> Self {
        self.timings = enabled.then(Timings::default);
        self
    }

    fn announce(&self, cmd: &ProcessBuilder) {
        if self.verbose {
            match cmd.get_cwd() {
                Some(dir) => eprintln!("({}) [{}]", cmd.display_command(), dir.display()),
                None => eprintln!("({})", cmd.display_command()),
            }
        }
        tracing::debug!("exec {}", cmd.display_command());
    }

    fn timed<T>(&mut self, cmd: &ProcessBuilder, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let start = Instant::now();
        let result = f();
        if let Some(timings) = &mut self.timings {
            timings.record(&cmd.program_name(), start.elapsed());
        }
        result
    }
}

impl CommandRunner for SystemRunner {
    fn run(&mut self, cmd: &ProcessBuilder) -> Result<()> {
        self.announce(cmd);
        let status = self.timed(cmd, || cmd.status())?;
        if !status.success() {
            return Err(cmd.failure(""));
        }
        Ok(())
    }

    fn output(&mut self, cmd: &ProcessBuilder, merge_stderr: bool) -> Result<String> {
        self.announce(cmd);
        let output = self.timed(cmd, || cmd.exec())?;
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success() {
            return Err(cmd.failure(&stderr));
        }
        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        if merge_stderr {
            text.push_str(&stderr);
        }
        Ok(text)
    }

    fn timings(&self) -> Option<&Timings> {
        self.timings.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_builder() {
        let output = ProcessBuilder::new("echo").arg("hello").exec().unwrap();

        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.trim() == "hello" || stdout.contains("hello"));
    }

    #[test]
    fn test_display_command() {
        let pb = ProcessBuilder::new("go").args(["tool", "compile", "-o", "a.o", "a.go"]);

        assert_eq!(pb.display_command(), "go tool compile -o a.o a.go");
    }

    #[cfg(unix)]
    #[test]
    fn test_stdin_is_fed() {
        let mut runner = SystemRunner::new();
        let big = "x".repeat(1 << 20);
        let out = runner
            .output(&ProcessBuilder::new("cat").stdin(big.clone()), false)
            .unwrap();
        assert_eq!(out.len(), big.len());
    }

    #[cfg(unix)]
    #[test]
    fn test_failure_names_command_and_directory() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut runner = SystemRunner::new();
        let err = runner
            .run(&ProcessBuilder::new("false").cwd(tmp.path()))
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with("command \"false\" run in directory"));
        assert!(msg.ends_with("returned an error"));
    }

    #[test]
    fn test_unknown_program() {
        let mut runner = SystemRunner::new();
        let err = runner
            .run(&ProcessBuilder::new("definitely-not-a-real-tool-xyz"))
            .unwrap_err();
        assert!(err.to_string().contains("failed to lookup executable"));
    }

    #[test]
    fn test_timings_report() {
        let mut timings = Timings::default();
        timings.record("compile", Duration::from_millis(300));
        timings.record("compile", Duration::from_millis(200));
        timings.record("link", Duration::from_millis(900));
        let report = timings.report();
        let lines: Vec<&str> = report.lines().collect();
        assert!(lines[0].ends_with("link"));
        assert!(lines[1].contains("2x"));
    }

    #[test]
    fn test_from_argv() {
        let pb = ProcessBuilder::from_argv(&["make".to_string(), "install".to_string()]).unwrap();
        assert_eq!(pb.get_program(), Path::new("make"));
        assert_eq!(pb.get_args(), &["install".to_string()]);
        assert!(ProcessBuilder::from_argv(&[]).is_err());
    }
}
