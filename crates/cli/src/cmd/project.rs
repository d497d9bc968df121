//! Loading a project: build configuration plus the step definitions file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use serde::Deserialize;
use tracing::debug;

use steppack_lib::build::Builder;
use steppack_lib::config::{BuildConfig, Limits};
use steppack_lib::step::{Step, StreamConfig};

/// Limits file picked up from the project directory when `--config` is not given.
pub const DEFAULT_LIMITS_FILE: &str = "steppack.json";

#[derive(Args, Debug, Clone)]
pub struct ProjectArgs {
  /// Project directory (default: current directory)
  #[arg(short, long)]
  pub project: Option<PathBuf>,

  /// Step definitions file, relative to the project directory
  #[arg(short, long, default_value = "steps.json")]
  pub steps: PathBuf,

  /// JSON file overriding validation limits
  #[arg(short, long)]
  pub config: Option<PathBuf>,

  /// Output directory, relative to the project directory
  #[arg(short, long)]
  pub dist: Option<PathBuf>,

  /// Maximum number of steps built concurrently
  #[arg(long)]
  pub parallelism: Option<usize>,

  /// Time limit for one Python dependency scan (e.g. "30s")
  #[arg(long, value_parser = humantime::parse_duration)]
  pub scan_timeout: Option<Duration>,

  /// Time limit for one Node bundler run (e.g. "2m")
  #[arg(long, value_parser = humantime::parse_duration)]
  pub bundle_timeout: Option<Duration>,
}

/// Contents of the steps file: either a bare array of steps or an object
/// with `steps` and optional `streams`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StepsFile {
  List(Vec<Step>),
  Project {
    steps: Vec<Step>,
    #[serde(default)]
    streams: Vec<StreamConfig>,
  },
}

impl StepsFile {
  fn into_parts(self) -> (Vec<Step>, Vec<StreamConfig>) {
    match self {
      StepsFile::List(steps) => (steps, Vec::new()),
      StepsFile::Project { steps, streams } => (steps, streams),
    }
  }
}

pub struct Project {
  pub config: BuildConfig,
  pub steps: Vec<Step>,
  pub streams: Vec<StreamConfig>,
}

impl Project {
  pub fn load(args: &ProjectArgs) -> Result<Self> {
    let project_dir = match &args.project {
      Some(dir) => dir.clone(),
      None => std::env::current_dir().context("Failed to read current directory")?,
    };
    let project_dir = dunce::canonicalize(&project_dir)
      .with_context(|| format!("Project directory not found: {}", project_dir.display()))?;

    let config = resolve_config(&project_dir, args)?;

    let steps_path = project_dir.join(&args.steps);
    let content = std::fs::read_to_string(&steps_path)
      .with_context(|| format!("Failed to read steps file {}", steps_path.display()))?;
    let file: StepsFile = serde_json::from_str(&content)
      .with_context(|| format!("Failed to parse steps file {}", steps_path.display()))?;
    let (steps, streams) = file.into_parts();
    debug!(steps = steps.len(), streams = streams.len(), path = %steps_path.display(), "loaded steps");

    Ok(Self { config, steps, streams })
  }

  /// Register every step and stream with `builder`.
  pub fn register(self, builder: &mut Builder) -> Result<()> {
    for step in self.steps {
      let name = step.name.clone();
      builder
        .add_step(step)
        .with_context(|| format!("Invalid step '{}'", name))?;
    }
    for stream in self.streams {
      builder.register_stream(stream);
    }
    Ok(())
  }
}

fn resolve_config(project_dir: &Path, args: &ProjectArgs) -> Result<BuildConfig> {
  let mut config = BuildConfig::from_env(project_dir)?;

  let limits_path = match &args.config {
    Some(path) => Some(path.clone()),
    None => Some(project_dir.join(DEFAULT_LIMITS_FILE)).filter(|p| p.is_file()),
  };
  if let Some(path) = limits_path {
    config = config.with_limits(Limits::load(&path)?);
  }

  if let Some(dist) = &args.dist {
    config = config.with_dist_dir(project_dir.join(dist));
  }
  if let Some(parallelism) = args.parallelism {
    config = config.with_parallelism(parallelism);
  }
  if let Some(timeout) = args.scan_timeout {
    config.python.scan_timeout = timeout;
  }
  if let Some(timeout) = args.bundle_timeout {
    config.node.bundle_timeout = timeout;
  }

  Ok(config)
}
