//! What a Makefile escape hatch declares about itself.

/// Target used to print the variables of a Makefile fed on stdin.
pub const PRINT_VARS_TARGET: &str = "__printMakefileVars";

const CMD_MARKER: &str = "Make.cmd";
const PKG_MARKER: &str = "Make.pkg";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MakefileKind {
    Cmd,
    Pkg,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MakefileContents {
    pub kind: MakefileKind,
    /// `TARG`: executable name or package import path.
    pub target: String,
    /// Go sources the Makefile compiles, with CGO rewrites undone.
    pub go_files: Vec<String>,
    pub cgo: bool,
}

/// The Makefile text with a rule appended that echoes `TARG`, `GOFILES`
/// and `CGOFILES`, one per line.
pub fn print_vars_script(makefile_text: &str) -> String {
    format!(
        "{}\n\n{}:\n\t@echo $(TARG)\n\t@echo $(GOFILES)\n\t@echo $(CGOFILES)\n",
        makefile_text, PRINT_VARS_TARGET
    )
}

impl MakefileContents {
    /// Interpret the output of the print-vars rule.
    pub fn from_output(makefile_text: &str, output: &str) -> Result<Self, String> {
        let lines: Vec<&str> = output.split('\n').collect();
        if lines.len() < 3 {
            return Err("failed to extract needed variables".to_string());
        }

        let target = lines[0].trim().to_string();
        let mut go_files: Vec<String> = lines[1].split_whitespace().map(String::from).collect();
        let mut cgo_files = lines[2].trim();

        if target.is_empty() {
            go_files.clear();
            cgo_files = "";
        }

        let cgo = !cgo_files.is_empty();
        if cgo {
            // The included Make.pkg rewrites GOFILES for cgo; restore the originals.
            go_files = go_files
                .into_iter()
                .filter(|f| !f.starts_with("_cgo_"))
                .map(|f| match f.strip_suffix(".cgo1.go") {
                    Some(stem) => format!("{}.go", stem),
                    None => f,
                })
                .collect();
        }

        let is_cmd = makefile_text.contains(CMD_MARKER);
        let is_pkg = makefile_text.contains(PKG_MARKER);
        let kind = match (is_cmd, is_pkg) {
            (true, false) => MakefileKind::Cmd,
            (false, true) => MakefileKind::Pkg,
            (true, true) => {
                return Err(format!(
                    "the makefile contains both '{}' and '{}'",
                    CMD_MARKER, PKG_MARKER
                ))
            }
            (false, false) => MakefileKind::Unknown,
        };

        Ok(MakefileContents {
            kind,
            target,
            go_files,
            cgo,
        })
    }

    /// File name of the dynamic library a cgo package Makefile produces.
    pub fn dyn_library_name(&self) -> Option<String> {
        if self.kind == MakefileKind::Pkg && self.cgo && !self.target.is_empty() {
            Some(format!("cgo_{}.so", self.target.replace('/', "_")))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PKG_MAKEFILE: &str = "include $(GOROOT)/src/Make.inc\nTARG=sys/term\ninclude $(GOROOT)/src/Make.pkg\n";

    #[test]
    fn test_pkg_with_cgo_rewrites() {
        let out = "sys/term\n_cgo_gotypes.go term.cgo1.go util.go\nterm.go\n";
        let contents = MakefileContents::from_output(PKG_MAKEFILE, out).unwrap();
        assert_eq!(contents.kind, MakefileKind::Pkg);
        assert_eq!(contents.target, "sys/term");
        assert_eq!(contents.go_files, vec!["term.go", "util.go"]);
        assert!(contents.cgo);
        assert_eq!(contents.dyn_library_name().unwrap(), "cgo_sys_term.so");
    }

    #[test]
    fn test_cmd_without_cgo() {
        let text = "TARG=tool\nGOFILES=main.go\ninclude $(GOROOT)/src/Make.cmd\n";
        let contents = MakefileContents::from_output(text, "tool\nmain.go\n\n").unwrap();
        assert_eq!(contents.kind, MakefileKind::Cmd);
        assert_eq!(contents.go_files, vec!["main.go"]);
        assert!(contents.dyn_library_name().is_none());
    }

    #[test]
    fn test_both_markers_rejected() {
        let text = "include Make.cmd\ninclude Make.pkg\n";
        assert!(MakefileContents::from_output(text, "x\n\n\n").is_err());
    }

    #[test]
    fn test_empty_target_ignores_files() {
        let contents = MakefileContents::from_output("all:\n", "\na.go\nb.go\n").unwrap();
        assert_eq!(contents.kind, MakefileKind::Unknown);
        assert!(contents.go_files.is_empty());
        assert!(!contents.cgo);
    }

    #[test]
    fn test_script_appends_rule() {
        let script = print_vars_script("TARG=x\n");
        assert!(script.starts_with("TARG=x\n"));
        assert!(script.contains("__printMakefileVars:\n\t@echo $(TARG)"));
    }
}
