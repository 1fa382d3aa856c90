// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use surgeon::{
    config::Config,
    path::{default_config_path, fork_dir},
    Registry, Surgeon,
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::{fs::write, path::PathBuf, process::exit};
use tracing::{debug, error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Surgically modify your forks.
///
/// Reads `.surgeon.yaml` at the top-level of the fork, clones the upstream
/// repository it names into a temporary directory, and applies each listed
/// codemod to that clone in order. Files the fork is missing, and files the
/// codemods changed, are then copied into the fork. Nothing in the fork is
/// ever deleted.
///
/// Codemods are cumulative, so their order matters. Review the result before
/// committing it.
#[derive(Debug, Clone, Parser)]
#[command(
    about,
    long_about,
    override_usage = "\n  surgeon [options]\n  surgeon [options] <command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Path to configuration file [default: <fork>/.surgeon.yaml].
    #[arg(short, long, value_name = "path", global = true)]
    pub config_file: Option<PathBuf>,

    /// Path to fork [default: current directory].
    #[arg(short = 'C', long, value_name = "path", global = true)]
    pub fork: Option<PathBuf>,

    /// Logging level when RUST_LOG is not set [debug|info|warn|error].
    #[arg(long, value_name = "level", default_value = "info", global = true)]
    pub log_level: String,

    /// Stage and commit copied files with message.
    #[arg(long, value_name = "message")]
    pub commit: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    fn run(self) -> Result<()> {
        let fork = match &self.fork {
            Some(path) => path.clone(),
            None => fork_dir()?,
        };
        let config_file = self
            .config_file
            .clone()
            .unwrap_or_else(|| default_config_path(&fork));

        match self.command {
            Some(Command::Init(opts)) => run_init(opts, config_file),
            Some(Command::Codemod(CodemodCommand::List)) => run_codemod_list(),
            Some(Command::Codemod(CodemodCommand::Describe(opts))) => run_codemod_describe(opts),
            None => run_operate(fork, config_file, self.commit),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Write template configuration file into fork.
    #[command(override_usage = "surgeon init [options]")]
    Init(InitOptions),

    /// Inspect available codemods.
    #[command(subcommand)]
    Codemod(CodemodCommand),
}

#[derive(Debug, Clone, Subcommand)]
enum CodemodCommand {
    /// List available codemods.
    #[command(override_usage = "surgeon codemod list")]
    List,

    /// Show usage of a codemod.
    #[command(override_usage = "surgeon codemod describe <name>")]
    Describe(DescribeOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct InitOptions {
    /// Overwrite existing configuration file.
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct DescribeOptions {
    /// Name of codemod to describe.
    #[arg(required = true, value_name = "name")]
    pub name: String,
}

fn main() {
    let cli = Cli::parse();

    let layer = fmt::layer().compact().with_target(false).without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = cli.run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn run_operate(fork: PathBuf, config_file: PathBuf, commit: Option<String>) -> Result<()> {
    let config = Config::load(&config_file)?;
    debug!(
        "upstream {:?} with modsdir {:?} from {:?}",
        config.upstream,
        config.modsdir,
        config_file.display()
    );

    let surgeon = Surgeon::open(&fork, config)?;
    let result = surgeon.operate(commit.as_deref())?;
    for path in result.copied() {
        println!("{}", path.display());
    }
    info!(
        "operation complete: {} copied, {} ignored, {} already current",
        result.copy_count(),
        result.ignored.len(),
        result.unchanged.len()
    );

    Ok(())
}

fn run_init(opts: InitOptions, config_file: PathBuf) -> Result<()> {
    if config_file.exists() && !opts.force {
        bail!(
            "configuration file {:?} already exists, use --force to overwrite it",
            config_file.display()
        );
    }

    let template = Config::template();
    write(&config_file, template.to_string())
        .with_context(|| format!("failed to write {:?}", config_file.display()))?;
    info!("wrote template configuration to {:?}", config_file.display());

    Ok(())
}

fn run_codemod_list() -> Result<()> {
    let registry = Registry::with_builtins();
    let width = registry.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
    for (name, codemod) in registry.iter() {
        println!("{name:<width$}  {}", codemod.description());
    }

    Ok(())
}

fn run_codemod_describe(opts: DescribeOptions) -> Result<()> {
    let registry = Registry::with_builtins();
    let codemod = registry.resolve(&opts.name)?;
    println!("{}", codemod.usage());

    Ok(())
}
