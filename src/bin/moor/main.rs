//! Moor CLI - a convention-based incremental build tool for Go source trees

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.global.debug {
        EnvFilter::new("moor=debug")
    } else {
        EnvFilter::new("moor=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let global = &cli.global;
    match cli.command {
        Commands::Info(args) => commands::info::execute(args, global),
        Commands::Make => commands::make::execute(global),
        Commands::MakeTests => commands::make::execute_tests(global),
        Commands::Test(args) => commands::test::execute(args, global),
        Commands::Benchmark(args) => commands::test::execute_benchmarks(args, global),
        Commands::Clean => commands::clean::execute(global),
        Commands::Install => commands::install::execute(global),
        Commands::Uninstall => commands::install::execute_uninstall(global),
        Commands::InstallDeps => commands::install::execute_deps(global),
        Commands::Fmt => commands::fmt::execute(global),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}
