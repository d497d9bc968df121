mod cmd;
mod listener;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cmd::{ProjectArgs, cmd_build, cmd_validate};
use output::OutputFormat;

/// steppack - build and package step functions into deployable bundles
#[derive(Parser)]
#[command(name = "steppack")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build every step bundle and router, then validate the result
  Build {
    #[command(flatten)]
    project: ProjectArgs,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },

  /// Validate step definitions without building
  Validate {
    #[command(flatten)]
    project: ProjectArgs,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let success = match cli.command {
    Commands::Build { project, output } => cmd_build(&project, output, cli.verbose)?,
    Commands::Validate { project, output } => cmd_validate(&project, output)?,
  };

  if !success {
    std::process::exit(1);
  }
  Ok(())
}
