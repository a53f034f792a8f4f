//! Error types raised while inferring and building the object graph.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the object graph, the inference engine and the scheduler.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("circular dependency involving \"{}\"", .path.display())]
    CircularDependency { path: PathBuf },

    #[error("file \"{}\" is expected to be a {expected}", .path.display())]
    KindMismatch { path: PathBuf, expected: &'static str },

    #[error("directory \"{}\" contains Go files but no {config} file specifying the target package", .dir.display())]
    MissingTargetPackage { dir: PathBuf, config: &'static str },

    #[error("directory \"{}\" has subdirectories but neither a {config} file nor a Makefile", .dir.display())]
    MissingProjectConfig { dir: PathBuf, config: &'static str },

    #[error("the package to be tested cannot be \"main\" (directory \"{}\")", .dir.display())]
    TestOfEntryPackage { dir: PathBuf },

    #[error("unable to build \"{}\": missing source files {}", .path.display(), .missing.join(", "))]
    MissingSources { path: PathBuf, missing: Vec<String> },

    #[error("failed to build \"{}\": the file was not created", .path.display())]
    ArtifactMissing { path: PathBuf },

    #[error("no rule to build \"{}\"", .path.display())]
    NoRecipe { path: PathBuf },

    #[error("source file \"{}\" does not exist", .path.display())]
    UnknownSource { path: PathBuf },

    #[error("failed to parse \"{}\": {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("some tests have failed")]
    TestsFailed,
}

impl GraphError {
    /// Path of the node this error refers to, when there is one.
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            GraphError::CircularDependency { path }
            | GraphError::KindMismatch { path, .. }
            | GraphError::MissingSources { path, .. }
            | GraphError::ArtifactMissing { path }
            | GraphError::NoRecipe { path }
            | GraphError::UnknownSource { path }
            | GraphError::Parse { path, .. } => Some(path),
            GraphError::MissingTargetPackage { dir, .. }
            | GraphError::MissingProjectConfig { dir, .. }
            | GraphError::TestOfEntryPackage { dir } => Some(dir),
            GraphError::TestsFailed => None,
        }
    }
}

/// Errors in `moor.toml` files and in the facts they declare.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("the target package cannot be an empty string")]
    EmptyPackage,

    #[error("empty path")]
    EmptyPath,

    #[error("path \"{0}\" is not a relative path")]
    AbsolutePath(String),

    #[error("path \"{0}\" is referring the parent directory")]
    ParentPath(String),

    #[error("executables named \"{0}\" are used for tests")]
    ReservedExecutable(String),

    #[error("duplicate executable \"{0}\"")]
    DuplicateExecutable(String),

    #[error("executable \"{0}\": empty list of sources")]
    EmptySources(String),

    #[error("cannot associate file \"{0}\" with more than one executable")]
    SharedSource(String),

    #[error("source \"{0}\" is not a file of this directory")]
    NestedSource(String),

    #[error("fmt already disabled: \"{0}\"")]
    DuplicateNoFmt(String),

    #[error("invalid toolchain version \"{0}\"")]
    InvalidVersion(String),

    #[error("insufficient toolchain version: {found}, minimum required version is {required}")]
    InsufficientVersion { found: String, required: String },

    #[error("directory \"{0}\": no target package has been defined")]
    NoPackageToInstall(String),

    #[error("duplicate installation of \"{0}\"")]
    DuplicateInstall(String),

    #[error("cannot install: executables named \"{0}\" are used for tests")]
    InstallTestExecutable(String),

    #[error("repository \"{0}\": empty list of import paths")]
    EmptyImports(String),

    #[error("repository \"{repository}\": duplicate import path \"{import}\"")]
    DuplicateImport { repository: String, import: String },

    #[error("repository \"{repository}\": \"{kind}\" is not a valid repository type")]
    InvalidRepositoryKind { repository: String, kind: String },

    #[error("invalid {kind} repository path \"{path}\" ({hint})")]
    InvalidRepositoryPath {
        kind: &'static str,
        path: String,
        hint: String,
    },

    #[error("repository \"{0}\": empty installation command")]
    EmptyInstallCommand(String),

    #[error("repository \"{0}\" redefined with a different repository type")]
    RedefinedRepositoryKind(String),

    #[error("repository \"{0}\" redefined with a different installation command")]
    RedefinedInstallCommand(String),

    #[error("import path \"{0}\" maps to multiple distinct repositories")]
    ConflictingRemoteImport(String),

    #[error("import path \"{import}\" maps to library \"{library}\", there is no need to define a remote package")]
    RedundantRemote { import: String, library: String },
}
