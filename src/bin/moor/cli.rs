//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

/// Moor - a convention-based incremental build tool for Go source trees
#[derive(Parser)]
#[command(name = "moor")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flags accepted by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Print the commands being run
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print debugging information
    #[arg(long, global = true)]
    pub debug: bool,

    /// Print how long each external tool took
    #[arg(long, global = true)]
    pub timings: bool,

    /// Toolchain to build with (gc or gccgo)
    #[arg(long, global = true, value_name = "KIND")]
    pub toolchain: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the libraries, executables, tests and remote dependencies
    Info(InfoArgs),

    /// Build all libraries and executables
    Make,

    /// Build all test binaries
    MakeTests,

    /// Build and run the tests
    Test(TestArgs),

    /// Build and run the benchmarks
    Benchmark(BenchmarkArgs),

    /// Remove build products
    Clean,

    /// Install the declared libraries, executables and directories
    Install,

    /// Remove what `moor install` installed
    Uninstall,

    /// Fetch and install remote packages
    InstallDeps,

    /// Reformat all source files
    Fmt,

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct InfoArgs {
    /// Print the inventory as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct TestArgs {
    /// Only run tests matching this regular expression
    pub pattern: Option<String>,
}

#[derive(Args)]
pub struct BenchmarkArgs {
    /// Only run benchmarks matching this regular expression
    pub pattern: Option<String>,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}
