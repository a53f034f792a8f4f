//! The GCC Go frontend.

use std::path::PathBuf;

use semver::Version;

use crate::util::version::find_version;

use super::{
    path_args, strings, ArchiveInput, CommandSpec, CompileInput, LinkInput, ToolCommands,
    Toolchain, ToolchainKind,
};

/// gccgo finds imports itself and links libraries by path.
#[derive(Debug, Clone)]
pub struct GccgoToolchain {
    pub tools: ToolCommands,
    pub unit_extension: String,
    pub implicit_std: bool,
}

impl GccgoToolchain {
    pub fn default_tools() -> ToolCommands {
        ToolCommands {
            compiler: strings(&["gccgo"]),
            archiver: strings(&["ar"]),
            linker: strings(&["gccgo"]),
            formatter: strings(&["gofmt"]),
            make: strings(&["make"]),
            version: strings(&["gccgo", "--version"]),
        }
    }
}

impl Toolchain for GccgoToolchain {
    fn kind(&self) -> ToolchainKind {
        ToolchainKind::Gccgo
    }

    fn compile_command(&self, input: &CompileInput) -> CommandSpec {
        let mut cmd = CommandSpec::from_prefix(&self.tools.compiler)
            .arg("-c")
            .arg("-o")
            .arg(input.output.to_string_lossy());
        for dir in &input.include_dirs {
            cmd = cmd.arg("-I").arg(dir.to_string_lossy());
        }
        cmd.args(path_args(&input.sources))
    }

    fn archive_command(&self, input: &ArchiveInput) -> CommandSpec {
        CommandSpec::from_prefix(&self.tools.archiver)
            .arg("rcs")
            .arg(input.output.to_string_lossy())
            .args(path_args(&input.units))
    }

    fn link_command(&self, input: &LinkInput) -> CommandSpec {
        let mut cmd = CommandSpec::from_prefix(&self.tools.linker)
            .arg("-o")
            .arg(input.output.to_string_lossy())
            .args(path_args(&input.units))
            .args(path_args(&input.libs));
        if let Some(rpath) = &input.rpath {
            cmd = cmd.arg(format!("-Wl,-rpath,{}", rpath));
        }
        cmd
    }

    fn format_command(&self, paths: &[PathBuf], list: bool) -> CommandSpec {
        let mut cmd = CommandSpec::from_prefix(&self.tools.formatter);
        if list {
            cmd = cmd.arg("-l");
        }
        cmd.arg("-w").args(path_args(paths))
    }

    fn version_command(&self) -> CommandSpec {
        CommandSpec::from_prefix(&self.tools.version)
    }

    fn parse_version(&self, output: &str) -> Option<Version> {
        find_version(output, "(GCC)")
    }

    fn make_command(&self) -> CommandSpec {
        CommandSpec::from_prefix(&self.tools.make)
    }

    fn unit_extension(&self) -> &str {
        &self.unit_extension
    }

    fn resolves_imports(&self) -> bool {
        true
    }

    fn implicit_std(&self) -> bool {
        self.implicit_std
    }

    fn supports_install(&self) -> bool {
        false
    }
}
