//! Toolchain abstraction for the Go compilers Moor drives.
//!
//! This module provides a unified interface for generating compile, archive,
//! link and format commands across toolchains (gc, gccgo).
//!
//! Program names come from the `[toolchain]` section of the tool
//! configuration, falling back to each toolchain's defaults.

use std::path::PathBuf;

use anyhow::{bail, Result};
use semver::Version;

use crate::util::config::ToolchainSettings;
use crate::util::process::ProcessBuilder;

mod gc;
mod gccgo;

pub use gc::GcToolchain;
pub use gccgo::GccgoToolchain;

/// Extensions of compilation units recognised on disk regardless of toolchain.
const KNOWN_UNIT_EXTENSIONS: &[&str] = &[".o", ".5", ".6", ".8"];

/// A command to execute, with program, arguments, and environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// The program to run (e.g., "go", "gccgo")
    pub program: PathBuf,
    /// Command arguments
    pub args: Vec<String>,
    /// Environment variables to set
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    /// Create a new command spec.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        CommandSpec {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    /// Command spec from a configured prefix such as `["go", "tool", "compile"]`.
    pub fn from_prefix(prefix: &[String]) -> Self {
        let mut parts = prefix.iter();
        let program = parts.next().map(String::as_str).unwrap_or_default();
        CommandSpec::new(program).args(parts.cloned())
    }

    /// Add an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments.
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(|a| a.into()));
        self
    }

    /// Add an environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Convert into a runnable process.
    pub fn into_process(self) -> ProcessBuilder {
        let mut pb = ProcessBuilder::new(&self.program).args(&self.args);
        for (key, value) in &self.env {
            pb = pb.env(key, value);
        }
        pb
    }
}

/// Input for a compile step.
#[derive(Debug, Clone)]
pub struct CompileInput {
    /// Output compilation unit
    pub output: PathBuf,
    /// Directories searched for imported packages
    pub include_dirs: Vec<PathBuf>,
    /// Sources of the package, compiled together
    pub sources: Vec<PathBuf>,
}

/// Input for an archive step (creating a static library).
#[derive(Debug, Clone)]
pub struct ArchiveInput {
    /// Output archive file
    pub output: PathBuf,
    /// Compilation units to archive
    pub units: Vec<PathBuf>,
}

/// Input for a link step.
#[derive(Debug, Clone)]
pub struct LinkInput {
    /// Output executable
    pub output: PathBuf,
    /// Library search paths
    pub lib_dirs: Vec<PathBuf>,
    /// Libraries reached through imports, for toolchains that link them by path
    pub libs: Vec<PathBuf>,
    /// Runtime search path for dynamic libraries
    pub rpath: Option<String>,
    /// Compilation units of the executable itself
    pub units: Vec<PathBuf>,
}

/// The family of a toolchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolchainKind {
    Gc,
    Gccgo,
}

impl ToolchainKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gc" | "go" => Some(ToolchainKind::Gc),
            "gccgo" => Some(ToolchainKind::Gccgo),
            _ => None,
        }
    }

    /// Get the kind name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolchainKind::Gc => "gc",
            ToolchainKind::Gccgo => "gccgo",
        }
    }
}

/// Trait for toolchain implementations.
///
/// Each toolchain knows how to generate commands for its specific compiler.
pub trait Toolchain: Send + Sync {
    fn kind(&self) -> ToolchainKind;

    /// Generate a compile command.
    fn compile_command(&self, input: &CompileInput) -> CommandSpec;

    /// Generate an archive command (create static library).
    fn archive_command(&self, input: &ArchiveInput) -> CommandSpec;

    /// Generate a link command for an executable.
    fn link_command(&self, input: &LinkInput) -> CommandSpec;

    /// Generate a formatter command that rewrites `paths` in place.
    fn format_command(&self, paths: &[PathBuf], list: bool) -> CommandSpec;

    /// Command printing the toolchain version.
    fn version_command(&self) -> CommandSpec;

    /// Extract the version from the output of [`Toolchain::version_command`].
    fn parse_version(&self, output: &str) -> Option<Version>;

    /// Make command used for Makefile escape hatches.
    fn make_command(&self) -> CommandSpec;

    /// Get the compilation unit extension.
    fn unit_extension(&self) -> &str;

    /// The compiler locates imported packages itself.
    fn resolves_imports(&self) -> bool {
        false
    }

    /// Imports without a dot in their first element are provided by the toolchain.
    fn implicit_std(&self) -> bool;

    /// Whether `install` is supported.
    fn supports_install(&self) -> bool {
        true
    }

    /// Whether a file name on disk is a compilation unit.
    fn is_unit_file(&self, name: &str) -> bool {
        name.ends_with(self.unit_extension())
            || KNOWN_UNIT_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
    }

    /// Arguments passed to a test binary.
    fn test_args(&self, test_pattern: Option<&str>, bench_pattern: Option<&str>) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(pattern) = test_pattern {
            args.push(format!("-test.run={}", pattern));
        }
        if let Some(pattern) = bench_pattern {
            args.push(format!("-test.bench={}", pattern));
        }
        args
    }

    /// By-products that escape hatches leave among the sources.
    fn is_generated_source(&self, name: &str) -> bool {
        name.starts_with("_cgo_") || name.ends_with(".cgo1.go") || name == "_testmain.go"
    }
}

/// Program prefixes shared by the built-in toolchains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommands {
    pub compiler: Vec<String>,
    pub archiver: Vec<String>,
    pub linker: Vec<String>,
    pub formatter: Vec<String>,
    pub make: Vec<String>,
    pub version: Vec<String>,
}

impl ToolCommands {
    /// Override defaults with whatever `settings` configures.
    fn configured(mut self, settings: &ToolchainSettings) -> Self {
        let pick = |configured: &Option<Vec<String>>, default: &mut Vec<String>| {
            if let Some(prefix) = configured.as_ref().filter(|p| !p.is_empty()) {
                *default = prefix.clone();
            }
        };
        pick(&settings.compiler, &mut self.compiler);
        pick(&settings.archiver, &mut self.archiver);
        pick(&settings.linker, &mut self.linker);
        pick(&settings.formatter, &mut self.formatter);
        pick(&settings.make, &mut self.make);
        self
    }
}

fn strings(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

fn path_args(paths: &[PathBuf]) -> impl Iterator<Item = String> + '_ {
    paths.iter().map(|p| p.to_string_lossy().into_owned())
}

/// Build the toolchain selected by configuration, or by `override_kind`.
pub fn from_config(
    settings: &ToolchainSettings,
    override_kind: Option<&str>,
) -> Result<Box<dyn Toolchain>> {
    let requested = override_kind.or(settings.kind.as_deref()).unwrap_or("gc");
    let Some(kind) = ToolchainKind::parse(requested) else {
        bail!("unknown toolchain `{}` (expected `gc` or `gccgo`)", requested);
    };

    let unit_extension = settings
        .unit_extension
        .as_deref()
        .filter(|ext| !ext.is_empty())
        .map(|ext| {
            if ext.starts_with('.') {
                ext.to_string()
            } else {
                format!(".{}", ext)
            }
        });
    // gc ships its standard library outside the install root.
    let implicit_std = settings.implicit_std.unwrap_or(kind == ToolchainKind::Gc);

    tracing::debug!("using toolchain {}", kind.as_str());
    Ok(match kind {
        ToolchainKind::Gc => Box::new(GcToolchain {
            tools: GcToolchain::default_tools().configured(settings),
            unit_extension: unit_extension.unwrap_or_else(|| ".o".to_string()),
            implicit_std,
        }),
        ToolchainKind::Gccgo => Box::new(GccgoToolchain {
            tools: GccgoToolchain::default_tools().configured(settings),
            unit_extension: unit_extension.unwrap_or_else(|| ".o".to_string()),
            implicit_std,
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_defaults_to_gc() {
        let tc = from_config(&ToolchainSettings::default(), None).unwrap();
        assert_eq!(tc.kind(), ToolchainKind::Gc);
        assert_eq!(tc.unit_extension(), ".o");
        assert!(!tc.resolves_imports());
        assert!(tc.implicit_std());
    }

    #[test]
    fn test_implicit_std_can_be_disabled() {
        let settings = ToolchainSettings {
            implicit_std: Some(false),
            ..Default::default()
        };
        assert!(!from_config(&settings, None).unwrap().implicit_std());
        let gccgo = from_config(&ToolchainSettings::default(), Some("gccgo")).unwrap();
        assert!(!gccgo.implicit_std());
    }

    #[test]
    fn test_override_and_unknown_kind() {
        let settings = ToolchainSettings {
            kind: Some("gc".to_string()),
            unit_extension: Some("6".to_string()),
            ..Default::default()
        };
        let tc = from_config(&settings, Some("gccgo")).unwrap();
        assert_eq!(tc.kind(), ToolchainKind::Gccgo);
        assert_eq!(tc.unit_extension(), ".6");
        assert!(tc.resolves_imports());

        assert!(from_config(&settings, Some("tcc")).is_err());
    }

    #[test]
    fn test_unit_files_and_generated_sources() {
        let tc = from_config(&ToolchainSettings::default(), None).unwrap();
        assert!(tc.is_unit_file("x.o"));
        assert!(tc.is_unit_file("x.8"));
        assert!(!tc.is_unit_file("x.a"));

        assert!(tc.is_generated_source("_cgo_defun.go"));
        assert!(tc.is_generated_source("term.cgo1.go"));
        assert!(tc.is_generated_source("_testmain.go"));
        assert!(!tc.is_generated_source("term.go"));
    }

    #[test]
    fn test_configured_prefixes() {
        let settings = ToolchainSettings {
            compiler: Some(vec!["/opt/go/bin/go".into(), "tool".into(), "compile".into()]),
            make: Some(vec!["gmake".into()]),
            formatter: Some(Vec::new()),
            ..Default::default()
        };
        let tc = from_config(&settings, None).unwrap();
        let cmd = tc.compile_command(&CompileInput {
            output: PathBuf::from("_obj/a.o"),
            include_dirs: Vec::new(),
            sources: vec![PathBuf::from("a.go")],
        });
        assert_eq!(cmd.program, PathBuf::from("/opt/go/bin/go"));
        assert_eq!(cmd.args, vec!["tool", "compile", "-o", "_obj/a.o", "a.go"]);
        assert_eq!(tc.make_command().program, PathBuf::from("gmake"));
        // Empty prefixes keep the default.
        assert_eq!(tc.format_command(&[], false).program, PathBuf::from("gofmt"));
    }

    #[test]
    fn test_test_args() {
        let tc = from_config(&ToolchainSettings::default(), None).unwrap();
        assert_eq!(
            tc.test_args(Some("^$"), Some(".")),
            vec!["-test.run=^$", "-test.bench=."]
        );
        assert!(tc.test_args(None, None).is_empty());
    }
}
