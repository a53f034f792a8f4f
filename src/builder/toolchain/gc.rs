//! The standard `go tool` toolchain.

use std::path::PathBuf;

use semver::Version;

use crate::util::version::find_version;

use super::{
    path_args, strings, ArchiveInput, CommandSpec, CompileInput, LinkInput, ToolCommands,
    Toolchain, ToolchainKind,
};

/// `go tool compile` / `go tool pack` / `go tool link`.
#[derive(Debug, Clone)]
pub struct GcToolchain {
    pub tools: ToolCommands,
    pub unit_extension: String,
    pub implicit_std: bool,
}

impl GcToolchain {
    pub fn default_tools() -> ToolCommands {
        ToolCommands {
            compiler: strings(&["go", "tool", "compile"]),
            archiver: strings(&["go", "tool", "pack"]),
            linker: strings(&["go", "tool", "link"]),
            formatter: strings(&["gofmt"]),
            make: strings(&["make"]),
            version: strings(&["go", "version"]),
        }
    }
}

impl Toolchain for GcToolchain {
    fn kind(&self) -> ToolchainKind {
        ToolchainKind::Gc
    }

    fn compile_command(&self, input: &CompileInput) -> CommandSpec {
        let mut cmd = CommandSpec::from_prefix(&self.tools.compiler)
            .arg("-o")
            .arg(input.output.to_string_lossy());
        for dir in &input.include_dirs {
            cmd = cmd.arg("-I").arg(dir.to_string_lossy());
        }
        cmd.args(path_args(&input.sources))
    }

    fn archive_command(&self, input: &ArchiveInput) -> CommandSpec {
        CommandSpec::from_prefix(&self.tools.archiver)
            .arg("grc")
            .arg(input.output.to_string_lossy())
            .args(path_args(&input.units))
    }

    fn link_command(&self, input: &LinkInput) -> CommandSpec {
        let mut cmd = CommandSpec::from_prefix(&self.tools.linker)
            .arg("-o")
            .arg(input.output.to_string_lossy());
        for dir in &input.lib_dirs {
            cmd = cmd.arg("-L").arg(dir.to_string_lossy());
        }
        if let Some(rpath) = &input.rpath {
            cmd = cmd.arg("-r").arg(rpath);
        }
        cmd.args(path_args(&input.units))
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
        find_version(output, "go version go")
    }

    fn make_command(&self) -> CommandSpec {
        CommandSpec::from_prefix(&self.tools.make)
    }

    fn unit_extension(&self) -> &str {
        &self.unit_extension
    }

    fn implicit_std(&self) -> bool {
        self.implicit_std
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gc() -> GcToolchain {
        GcToolchain {
            tools: GcToolchain::default_tools(),
            unit_extension: ".o".to_string(),
            implicit_std: false,
        }
    }

    #[test]
    fn test_compile_command() {
        let cmd = gc().compile_command(&CompileInput {
            output: PathBuf::from("lib/_obj/lib.o"),
            include_dirs: vec![PathBuf::from("dep/_obj")],
            sources: vec![PathBuf::from("lib/a.go"), PathBuf::from("lib/b.go")],
        });
        assert_eq!(cmd.program, PathBuf::from("go"));
        assert_eq!(
            cmd.args,
            vec![
                "tool", "compile", "-o", "lib/_obj/lib.o", "-I", "dep/_obj", "lib/a.go", "lib/b.go"
            ]
        );
    }

    #[test]
    fn test_archive_command() {
        let cmd = gc().archive_command(&ArchiveInput {
            output: PathBuf::from("_obj/x.a"),
            units: vec![PathBuf::from("_obj/x.o")],
        });
        assert_eq!(cmd.args, vec!["tool", "pack", "grc", "_obj/x.a", "_obj/x.o"]);
    }

    #[test]
    fn test_link_command_with_rpath() {
        let cmd = gc().link_command(&LinkInput {
            output: PathBuf::from("a.out"),
            lib_dirs: vec![PathBuf::from("lib/_obj")],
            libs: vec![PathBuf::from("lib/_obj/lib.a")],
            rpath: Some("/w/lib:/pkg".to_string()),
            units: vec![PathBuf::from("_obj/main.o")],
        });
        assert_eq!(
            cmd.args,
            vec![
                "tool", "link", "-o", "a.out", "-L", "lib/_obj", "-r", "/w/lib:/pkg", "_obj/main.o"
            ]
        );
    }

    #[test]
    fn test_parse_version() {
        assert_eq!(
            gc().parse_version("go version go1.22.1 linux/amd64"),
            Some(Version::new(1, 22, 1))
        );
    }
}
