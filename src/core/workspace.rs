//! Project-wide facts gathered from every `moor.toml` in the tree.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Component, Path, PathBuf};

use semver::Version;

use crate::core::entry::join_rel;
use crate::core::errors::ConfigError;
use crate::core::manifest::{DirManifest, RemoteSection};
use crate::core::TEST_EXE_NAME;
use crate::sources::remote::{RemotePackage, Repository, RepositoryKind};
use crate::util::parse_version_flexible;

/// Something `moor install` puts into place and `moor uninstall` removes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallDirective {
    /// Copy a package's library under the library install root.
    Package { import_path: String },
    /// Link an executable into the executable install directory.
    Executable { path: PathBuf },
    /// Copy a directory tree `src` into `<library root>/<dst>`.
    Dir { src: PathBuf, dst: PathBuf },
}

impl InstallDirective {
    fn key(&self) -> String {
        match self {
            InstallDirective::Package { import_path } => format!("package:{}", import_path),
            InstallDirective::Executable { path } | InstallDirective::Dir { src: path, .. } => {
                format!("path:{}", path.display())
            }
        }
    }
}

/// Facts declared by configuration files, keyed by root-relative paths.
#[derive(Debug, Default)]
pub struct Workspace {
    executables: BTreeMap<PathBuf, Vec<PathBuf>>,
    source_to_exe: HashMap<PathBuf, PathBuf>,
    ignored_dirs: BTreeSet<PathBuf>,
    no_fmt: BTreeSet<PathBuf>,
    installs: Vec<InstallDirective>,
    install_keys: BTreeSet<String>,
    remotes: Vec<RemotePackage>,
    remote_by_import: HashMap<String, usize>,
    min_toolchain_version: Option<Version>,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record everything `manifest` (found in directory `dir`) declares.
    pub fn apply(&mut self, dir: &Path, manifest: &DirManifest) -> Result<(), ConfigError> {
        if let Some(package) = &manifest.package {
            if package.trim().is_empty() {
                return Err(ConfigError::EmptyPackage);
            }
        }
        if let Some(version) = &manifest.min_toolchain_version {
            self.require_toolchain_version(version)?;
        }
        for ignored in &manifest.ignore {
            self.ignore_dir(dir, ignored)?;
        }
        for file in &manifest.no_fmt {
            self.disable_fmt(dir, file)?;
        }
        for (name, sources) in &manifest.executables {
            self.declare_executable(dir, name, sources)?;
        }

        if manifest.install.package {
            let package = manifest
                .package
                .as_deref()
                .ok_or_else(|| ConfigError::NoPackageToInstall(dir.display().to_string()))?;
            self.add_install(InstallDirective::Package {
                import_path: package.trim().to_string(),
            })?;
        }
        for exe in &manifest.install.executables {
            self.install_executable(dir, exe)?;
        }
        for entry in &manifest.install.dirs {
            let src = join_rel(dir, clean_and_check_path(&entry.src)?);
            let dst = clean_and_check_path(&entry.dst)?;
            self.add_install(InstallDirective::Dir { src, dst })?;
        }

        for remote in &manifest.remotes {
            self.declare_remote(remote)?;
        }
        Ok(())
    }

    pub fn declare_executable(
        &mut self,
        dir: &Path,
        name: &str,
        sources: &[String],
    ) -> Result<(), ConfigError> {
        let rel = clean_and_check_path(name)?;
        if rel.file_name().is_some_and(|f| f == TEST_EXE_NAME) {
            return Err(ConfigError::ReservedExecutable(name.to_string()));
        }
        let exe = join_rel(dir, rel);
        if self.executables.contains_key(&exe) {
            return Err(ConfigError::DuplicateExecutable(exe.display().to_string()));
        }

        let sources: Vec<&String> = sources.iter().filter(|s| !s.trim().is_empty()).collect();
        if sources.is_empty() {
            return Err(ConfigError::EmptySources(exe.display().to_string()));
        }

        let mut paths = Vec::with_capacity(sources.len());
        for source in sources {
            let path = join_rel(dir, clean_and_check_path(source)?);
            if self.source_to_exe.contains_key(&path) || paths.contains(&path) {
                return Err(ConfigError::SharedSource(path.display().to_string()));
            }
            paths.push(path);
        }

        tracing::debug!("(read config) exe \"{}\" <-- {:?}", exe.display(), paths);
        for path in &paths {
            self.source_to_exe.insert(path.clone(), exe.clone());
        }
        self.executables.insert(exe, paths);
        Ok(())
    }

    pub fn ignore_dir(&mut self, dir: &Path, rel: &str) -> Result<(), ConfigError> {
        let path = join_rel(dir, clean_and_check_path(rel)?);
        tracing::debug!("(read config) ignore dir \"{}\"", path.display());
        self.ignored_dirs.insert(path);
        Ok(())
    }

    pub fn disable_fmt(&mut self, dir: &Path, rel: &str) -> Result<(), ConfigError> {
        let path = join_rel(dir, clean_and_check_path(rel)?);
        if !self.no_fmt.insert(path.clone()) {
            return Err(ConfigError::DuplicateNoFmt(path.display().to_string()));
        }
        Ok(())
    }

    pub fn require_toolchain_version(&mut self, version: &str) -> Result<(), ConfigError> {
        let required = parse_version_flexible(version)
            .ok_or_else(|| ConfigError::InvalidVersion(version.to_string()))?;
        if self
            .min_toolchain_version
            .as_ref()
            .map_or(true, |current| required > *current)
        {
            self.min_toolchain_version = Some(required);
        }
        Ok(())
    }

    pub fn install_executable(&mut self, dir: &Path, rel: &str) -> Result<(), ConfigError> {
        let rel = clean_and_check_path(rel)?;
        if rel.file_name().is_some_and(|f| f == TEST_EXE_NAME) {
            return Err(ConfigError::InstallTestExecutable(rel.display().to_string()));
        }
        self.add_install(InstallDirective::Executable {
            path: join_rel(dir, rel),
        })
    }

    fn add_install(&mut self, directive: InstallDirective) -> Result<(), ConfigError> {
        let key = directive.key();
        if !self.install_keys.insert(key) {
            let what = match &directive {
                InstallDirective::Package { import_path } => format!("package \"{}\"", import_path),
                InstallDirective::Executable { path } | InstallDirective::Dir { src: path, .. } => {
                    path.display().to_string()
                }
            };
            return Err(ConfigError::DuplicateInstall(what));
        }
        tracing::debug!("(read config) install {:?}", directive);
        self.installs.push(directive);
        Ok(())
    }

    /// Declare a remote package. Identical redeclarations are accepted.
    pub fn declare_remote(&mut self, section: &RemoteSection) -> Result<(), ConfigError> {
        let repo_path = section.repository.trim().to_string();

        let imports: Vec<String> = section
            .imports
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if imports.is_empty() {
            return Err(ConfigError::EmptyImports(repo_path));
        }
        let mut seen = BTreeSet::new();
        for import in &imports {
            if !seen.insert(import.as_str()) {
                return Err(ConfigError::DuplicateImport {
                    repository: repo_path,
                    import: import.clone(),
                });
            }
        }

        let kind = RepositoryKind::parse(&section.kind).ok_or_else(|| {
            ConfigError::InvalidRepositoryKind {
                repository: repo_path.clone(),
                kind: section.kind.clone(),
            }
        })?;
        let repository = Repository::new(kind, &repo_path)?;

        if section.install.is_empty() {
            return Err(ConfigError::EmptyInstallCommand(repo_path));
        }

        let existing = self
            .remotes
            .iter()
            .position(|r| r.repository.path() == repository.path());
        if let Some(index) = existing {
            let previous = &self.remotes[index];
            if previous.repository.kind() != kind {
                return Err(ConfigError::RedefinedRepositoryKind(repo_path));
            }
            if previous.install_cmd != section.install {
                return Err(ConfigError::RedefinedInstallCommand(repo_path));
            }
        }
        for import in &imports {
            if let Some(&other) = self.remote_by_import.get(import) {
                if Some(other) != existing {
                    return Err(ConfigError::ConflictingRemoteImport(import.clone()));
                }
            }
        }

        tracing::debug!("(read config) remote package {:?} {} \"{}\"", imports, kind, repo_path);
        let index = match existing {
            Some(index) => index,
            None => {
                self.remotes.push(RemotePackage {
                    import_paths: Vec::new(),
                    repository,
                    install_cmd: section.install.clone(),
                });
                self.remotes.len() - 1
            }
        };
        for import in imports {
            if !self.remote_by_import.contains_key(&import) {
                self.remote_by_import.insert(import.clone(), index);
                self.remotes[index].import_paths.push(import);
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Executable declared for `source`, if any.
    pub fn executable_for(&self, source: &Path) -> Option<&Path> {
        self.source_to_exe.get(source).map(PathBuf::as_path)
    }

    pub fn executables(&self) -> &BTreeMap<PathBuf, Vec<PathBuf>> {
        &self.executables
    }

    pub fn is_ignored(&self, dir: &Path) -> bool {
        self.ignored_dirs.contains(dir)
    }

    pub fn is_fmt_disabled(&self, file: &Path) -> bool {
        self.no_fmt.contains(file)
    }

    pub fn installs(&self) -> &[InstallDirective] {
        &self.installs
    }

    pub fn remotes(&self) -> &[RemotePackage] {
        &self.remotes
    }

    pub fn min_toolchain_version(&self) -> Option<&Version> {
        self.min_toolchain_version.as_ref()
    }
}

/// Lexically clean `path`: drop `.` components and fold `x/..` pairs.
pub fn clean_path(path: &Path) -> PathBuf {
    let mut out: Vec<Component> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    out.iter().collect()
}

/// Clean a config-supplied path, rejecting anything that is not a plain
/// relative path inside the directory.
pub fn clean_and_check_path(path: &str) -> Result<PathBuf, ConfigError> {
    let path = path.trim();
    if path.is_empty() {
        return Err(ConfigError::EmptyPath);
    }
    let raw = Path::new(path);
    if raw.is_absolute() || path.starts_with('/') {
        return Err(ConfigError::AbsolutePath(path.to_string()));
    }
    let cleaned = clean_path(raw);
    if cleaned.starts_with("..") {
        return Err(ConfigError::ParentPath(path.to_string()));
    }
    if cleaned.as_os_str().is_empty() {
        return Err(ConfigError::EmptyPath);
    }
    Ok(cleaned)
}

/// Check a `sources` allowlist entry: a file directly in the directory.
pub fn check_source_name(name: &str) -> Result<String, ConfigError> {
    let cleaned = clean_and_check_path(name)?;
    if cleaned.components().count() != 1 {
        return Err(ConfigError::NestedSource(name.trim().to_string()));
    }
    Ok(cleaned.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(imports: &[&str], kind: &str, repo: &str, install: &[&str]) -> RemoteSection {
        RemoteSection {
            imports: imports.iter().map(|s| s.to_string()).collect(),
            kind: kind.to_string(),
            repository: repo.to_string(),
            install: install.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_clean_and_check_path() {
        assert_eq!(clean_and_check_path("./a/b/../c").unwrap(), PathBuf::from("a/c"));
        assert_eq!(clean_and_check_path(""), Err(ConfigError::EmptyPath));
        assert!(matches!(
            clean_and_check_path("/etc"),
            Err(ConfigError::AbsolutePath(_))
        ));
        assert!(matches!(
            clean_and_check_path("a/../../b"),
            Err(ConfigError::ParentPath(_))
        ));
        assert_eq!(clean_and_check_path("a/.."), Err(ConfigError::EmptyPath));
    }

    #[test]
    fn test_executable_mappings() {
        let mut ws = Workspace::new();
        ws.declare_executable(
            Path::new("cmd"),
            "bin/tool",
            &["main.go".to_string(), "flags.go".to_string()],
        )
        .unwrap();

        assert_eq!(
            ws.executable_for(Path::new("cmd/main.go")),
            Some(Path::new("cmd/bin/tool"))
        );

        let err = ws
            .declare_executable(Path::new("cmd"), "other", &["main.go".to_string()])
            .unwrap_err();
        assert_eq!(err, ConfigError::SharedSource("cmd/main.go".to_string()));

        let err = ws
            .declare_executable(Path::new("cmd"), "bin/tool", &["x.go".to_string()])
            .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateExecutable(_)));

        let err = ws
            .declare_executable(Path::new("."), "package-test", &["t.go".to_string()])
            .unwrap_err();
        assert!(matches!(err, ConfigError::ReservedExecutable(_)));

        let err = ws.declare_executable(Path::new("."), "empty", &[]).unwrap_err();
        assert!(matches!(err, ConfigError::EmptySources(_)));
    }

    #[test]
    fn test_remote_redefinition() {
        let mut ws = Workspace::new();
        let first = remote(&["github.com/u/p"], "github", "u/p", &["make", "install"]);
        ws.declare_remote(&first).unwrap();

        // Identical redefinition is a no-op.
        ws.declare_remote(&first).unwrap();
        assert_eq!(ws.remotes().len(), 1);
        assert_eq!(ws.remotes()[0].import_paths, vec!["github.com/u/p"]);

        let err = ws
            .declare_remote(&remote(&["github.com/u/p"], "bitbucket", "u/p", &["make", "install"]))
            .unwrap_err();
        assert_eq!(err, ConfigError::RedefinedRepositoryKind("u/p".to_string()));

        let err = ws
            .declare_remote(&remote(&["github.com/u/p"], "github", "u/p", &["make"]))
            .unwrap_err();
        assert_eq!(err, ConfigError::RedefinedInstallCommand("u/p".to_string()));

        let err = ws
            .declare_remote(&remote(&["github.com/u/p"], "github", "u/q", &["make"]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::ConflictingRemoteImport("github.com/u/p".to_string())
        );
    }

    #[test]
    fn test_remote_validation() {
        let mut ws = Workspace::new();
        assert!(matches!(
            ws.declare_remote(&remote(&[], "github", "u/p", &["make"])),
            Err(ConfigError::EmptyImports(_))
        ));
        assert!(matches!(
            ws.declare_remote(&remote(&["a", "a"], "github", "u/p", &["make"])),
            Err(ConfigError::DuplicateImport { .. })
        ));
        assert!(matches!(
            ws.declare_remote(&remote(&["a"], "svn", "u/p", &["make"])),
            Err(ConfigError::InvalidRepositoryKind { .. })
        ));
        assert!(matches!(
            ws.declare_remote(&remote(&["a"], "github", "u/p.git", &["make"])),
            Err(ConfigError::InvalidRepositoryPath { .. })
        ));
        assert!(matches!(
            ws.declare_remote(&remote(&["a"], "github", "u/p", &[])),
            Err(ConfigError::EmptyInstallCommand(_))
        ));
    }

    #[test]
    fn test_install_directives() {
        let mut ws = Workspace::new();
        let manifest = DirManifest::parse(
            r#"
package = "lib/arch"
[install]
package = true
executables = ["tool"]
dirs = [{ src = "data", dst = "share/arch" }]
"#,
        )
        .unwrap();
        ws.apply(Path::new("lib"), &manifest).unwrap();

        assert_eq!(
            ws.installs(),
            &[
                InstallDirective::Package {
                    import_path: "lib/arch".to_string()
                },
                InstallDirective::Executable {
                    path: PathBuf::from("lib/tool")
                },
                InstallDirective::Dir {
                    src: PathBuf::from("lib/data"),
                    dst: PathBuf::from("share/arch")
                },
            ]
        );

        let err = ws.apply(Path::new("lib"), &manifest).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateInstall(_)));
    }

    #[test]
    fn test_install_dir_destination_stays_under_lib_root() {
        for dst in ["/tmp/outside", "../../escape", "share/../../up"] {
            let mut ws = Workspace::new();
            let manifest = DirManifest::parse(&format!(
                "[install]\ndirs = [{{ src = \"data\", dst = \"{}\" }}]\n",
                dst
            ))
            .unwrap();
            let err = ws.apply(Path::new(""), &manifest).unwrap_err();
            assert!(
                matches!(err, ConfigError::AbsolutePath(_) | ConfigError::ParentPath(_)),
                "{}: {:?}",
                dst,
                err
            );
            assert!(ws.installs().is_empty());
        }

        let mut ws = Workspace::new();
        let manifest =
            DirManifest::parse("[install]\ndirs = [{ src = \"data\", dst = \"./share//x/../y\" }]\n")
                .unwrap();
        ws.apply(Path::new(""), &manifest).unwrap();
        assert_eq!(
            ws.installs(),
            &[InstallDirective::Dir {
                src: PathBuf::from("data"),
                dst: PathBuf::from("share/y")
            }]
        );
    }

    #[test]
    fn test_source_names_are_plain_files() {
        assert_eq!(check_source_name("./a.go").unwrap(), "a.go");
        assert_eq!(
            check_source_name("sub/a.go"),
            Err(ConfigError::NestedSource("sub/a.go".to_string()))
        );
        assert_eq!(check_source_name("x/../a.go").unwrap(), "a.go");
        assert!(matches!(
            check_source_name("../a.go"),
            Err(ConfigError::ParentPath(_))
        ));
    }

    #[test]
    fn test_install_package_requires_target() {
        let mut ws = Workspace::new();
        let manifest = DirManifest::parse("[install]\npackage = true\n").unwrap();
        assert!(matches!(
            ws.apply(Path::new("x"), &manifest),
            Err(ConfigError::NoPackageToInstall(_))
        ));
    }

    #[test]
    fn test_min_version_keeps_highest() {
        let mut ws = Workspace::new();
        ws.require_toolchain_version("1.20").unwrap();
        ws.require_toolchain_version("1.18.2").unwrap();
        assert_eq!(ws.min_toolchain_version().unwrap(), &Version::new(1, 20, 0));
        assert!(ws.require_toolchain_version("latest").is_err());
    }

    #[test]
    fn test_duplicate_no_fmt() {
        let mut ws = Workspace::new();
        ws.disable_fmt(Path::new("."), "gen.go").unwrap();
        assert!(ws.is_fmt_disabled(Path::new("gen.go")));
        assert!(ws.disable_fmt(Path::new("."), "./gen.go").is_err());
    }
}
