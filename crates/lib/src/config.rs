//! Build configuration.
//!
//! [`BuildConfig`] carries every path and tunable the engine reads. Defaults
//! are derived from the project directory; [`BuildConfig::from_env`] applies
//! `STEPPACK_*` overrides on top, and [`Limits`] can be loaded from a JSON file
//! where any omitted field keeps its default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::{
  BYTES_PER_MB, DEFAULT_BUNDLE_TIMEOUT_SECS, DEFAULT_SCAN_TIMEOUT_SECS, MAX_PARALLELISM, RAM_MAX_MB, RAM_MIN_MB,
  ROUTER_MAX_MB, STEP_MAX_MB, STEP_NAME_MAX_LENGTH, TIMEOUT_MAX_SECS, TIMEOUT_MIN_SECS,
};

pub const ENV_DIST_DIR: &str = "STEPPACK_DIST_DIR";
pub const ENV_PARALLELISM: &str = "STEPPACK_PARALLELISM";
pub const ENV_PYTHON_SITE_PACKAGES: &str = "STEPPACK_PYTHON_SITE_PACKAGES";
pub const ENV_PYTHON_INTERPRETER: &str = "STEPPACK_PYTHON";
pub const ENV_CSHARP_RUNTIME: &str = "STEPPACK_CSHARP_RUNTIME";
pub const ENV_NODE_BUNDLER: &str = "STEPPACK_NODE_BUNDLER";

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config {}: {source}", path.display())]
  Read { path: PathBuf, source: std::io::Error },

  #[error("failed to parse config {}: {source}", path.display())]
  Parse { path: PathBuf, source: serde_json::Error },

  #[error("invalid value for {var}: {value:?}")]
  InvalidValue { var: String, value: String },
}

/// Size and resource limits enforced by the validators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Limits {
  pub step_max_mb: u64,
  pub router_max_mb: u64,
  pub step_name_max_length: usize,
  pub ram_min_mb: u32,
  pub ram_max_mb: u32,
  pub timeout_min_secs: u32,
  pub timeout_max_secs: u32,
}

impl Default for Limits {
  fn default() -> Self {
    Self {
      step_max_mb: STEP_MAX_MB,
      router_max_mb: ROUTER_MAX_MB,
      step_name_max_length: STEP_NAME_MAX_LENGTH,
      ram_min_mb: RAM_MIN_MB,
      ram_max_mb: RAM_MAX_MB,
      timeout_min_secs: TIMEOUT_MIN_SECS,
      timeout_max_secs: TIMEOUT_MAX_SECS,
    }
  }
}

impl Limits {
  /// Saturates, so an oversized limit means no limit rather than a wrapped one.
  pub fn step_max_bytes(&self) -> u64 {
    self.step_max_mb.saturating_mul(BYTES_PER_MB)
  }

  pub fn router_max_bytes(&self) -> u64 {
    self.router_max_mb.saturating_mul(BYTES_PER_MB)
  }

  /// Load limits from a JSON file. Missing fields keep their defaults.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }
}

#[derive(Debug, Clone)]
pub struct PythonConfig {
  /// Pre-populated site-packages that dependencies are copied from.
  pub site_packages_dir: PathBuf,
  /// Interpreter used to run the dependency scanner.
  pub interpreter: String,
  pub scan_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct CSharpConfig {
  /// Prebuilt self-contained runtime copied into every C# bundle.
  pub runtime_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
  pub bundler_program: String,
  pub bundle_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct BuildConfig {
  pub project_dir: PathBuf,
  pub dist_dir: PathBuf,
  /// Maximum number of steps built concurrently.
  pub parallelism: usize,
  pub limits: Limits,
  pub python: PythonConfig,
  pub csharp: CSharpConfig,
  pub node: NodeConfig,
}

impl BuildConfig {
  pub fn new(project_dir: impl Into<PathBuf>) -> Self {
    let project_dir = project_dir.into();
    let tool_dir = project_dir.join(".steppack");
    Self {
      dist_dir: project_dir.join("dist"),
      parallelism: default_parallelism(),
      limits: Limits::default(),
      python: PythonConfig {
        site_packages_dir: tool_dir.join("lambda-site-packages"),
        interpreter: "python3".to_string(),
        scan_timeout: Duration::from_secs(DEFAULT_SCAN_TIMEOUT_SECS),
      },
      csharp: CSharpConfig {
        runtime_dir: tool_dir.join("dotnet-runtime"),
      },
      node: NodeConfig {
        bundler_program: "esbuild".to_string(),
        bundle_timeout: Duration::from_secs(DEFAULT_BUNDLE_TIMEOUT_SECS),
      },
      project_dir,
    }
  }

  /// Defaults for `project_dir` with `STEPPACK_*` environment overrides applied.
  pub fn from_env(project_dir: impl Into<PathBuf>) -> Result<Self, ConfigError> {
    let mut config = Self::new(project_dir);

    if let Some(dist) = env_var(ENV_DIST_DIR) {
      config.dist_dir = config.project_dir.join(dist);
    }
    if let Some(value) = env_var(ENV_PARALLELISM) {
      let parallelism = value
        .parse::<usize>()
        .ok()
        .filter(|p| *p > 0)
        .ok_or_else(|| ConfigError::InvalidValue {
          var: ENV_PARALLELISM.to_string(),
          value: value.clone(),
        })?;
      config.parallelism = parallelism;
    }
    if let Some(dir) = env_var(ENV_PYTHON_SITE_PACKAGES) {
      config.python.site_packages_dir = config.project_dir.join(dir);
    }
    if let Some(interpreter) = env_var(ENV_PYTHON_INTERPRETER) {
      config.python.interpreter = interpreter;
    }
    if let Some(dir) = env_var(ENV_CSHARP_RUNTIME) {
      config.csharp.runtime_dir = config.project_dir.join(dir);
    }
    if let Some(program) = env_var(ENV_NODE_BUNDLER) {
      config.node.bundler_program = program;
    }

    Ok(config)
  }

  pub fn with_dist_dir(mut self, dist_dir: impl Into<PathBuf>) -> Self {
    self.dist_dir = dist_dir.into();
    self
  }

  pub fn with_parallelism(mut self, parallelism: usize) -> Self {
    self.parallelism = parallelism.max(1);
    self
  }

  pub fn with_limits(mut self, limits: Limits) -> Self {
    self.limits = limits;
    self
  }

  pub fn with_site_packages(mut self, dir: impl Into<PathBuf>) -> Self {
    self.python.site_packages_dir = dir.into();
    self
  }

  pub fn with_csharp_runtime(mut self, dir: impl Into<PathBuf>) -> Self {
    self.csharp.runtime_dir = dir.into();
    self
  }
}

fn env_var(name: &str) -> Option<String> {
  std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn default_parallelism() -> usize {
  std::thread::available_parallelism()
    .map(|p| p.get())
    .unwrap_or(4)
    .min(MAX_PARALLELISM)
}

#[cfg(test)]
mod tests {
  use super::*;
  use serial_test::serial;
  use tempfile::TempDir;

  const ALL_VARS: [&str; 6] = [
    ENV_DIST_DIR,
    ENV_PARALLELISM,
    ENV_PYTHON_SITE_PACKAGES,
    ENV_PYTHON_INTERPRETER,
    ENV_CSHARP_RUNTIME,
    ENV_NODE_BUNDLER,
  ];

  #[test]
  fn defaults_are_relative_to_project() {
    let config = BuildConfig::new("/project");
    assert_eq!(config.dist_dir, PathBuf::from("/project/dist"));
    assert_eq!(
      config.python.site_packages_dir,
      PathBuf::from("/project/.steppack/lambda-site-packages")
    );
    assert_eq!(config.csharp.runtime_dir, PathBuf::from("/project/.steppack/dotnet-runtime"));
    assert!(config.parallelism >= 1 && config.parallelism <= MAX_PARALLELISM);
    assert_eq!(config.limits, Limits::default());
  }

  #[test]
  #[serial]
  fn env_overrides_apply() {
    temp_env::with_vars(
      [
        (ENV_DIST_DIR, Some("out")),
        (ENV_PARALLELISM, Some("2")),
        (ENV_PYTHON_SITE_PACKAGES, Some("vendor/site-packages")),
        (ENV_PYTHON_INTERPRETER, Some("python3.12")),
        (ENV_CSHARP_RUNTIME, Some("runtime")),
        (ENV_NODE_BUNDLER, Some("/opt/esbuild")),
      ],
      || {
        let config = BuildConfig::from_env("/project").unwrap();
        assert_eq!(config.dist_dir, PathBuf::from("/project/out"));
        assert_eq!(config.parallelism, 2);
        assert_eq!(config.python.site_packages_dir, PathBuf::from("/project/vendor/site-packages"));
        assert_eq!(config.python.interpreter, "python3.12");
        assert_eq!(config.csharp.runtime_dir, PathBuf::from("/project/runtime"));
        assert_eq!(config.node.bundler_program, "/opt/esbuild");
      },
    );
  }

  #[test]
  #[serial]
  fn empty_env_values_are_ignored() {
    let vars: Vec<(&str, Option<&str>)> = ALL_VARS.iter().map(|v| (*v, Some(""))).collect();
    temp_env::with_vars(vars, || {
      let config = BuildConfig::from_env("/project").unwrap();
      assert_eq!(config.dist_dir, PathBuf::from("/project/dist"));
    });
  }

  #[test]
  #[serial]
  fn invalid_parallelism_is_rejected() {
    temp_env::with_var(ENV_PARALLELISM, Some("zero"), || {
      let err = BuildConfig::from_env("/project").unwrap_err();
      assert!(matches!(err, ConfigError::InvalidValue { .. }));
    });
    temp_env::with_var(ENV_PARALLELISM, Some("0"), || {
      assert!(BuildConfig::from_env("/project").is_err());
    });
  }

  #[test]
  fn partial_limits_keep_defaults() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("steppack.json");
    std::fs::write(&path, r#"{ "stepMaxMb": 100, "ramMaxMb": 4096 }"#).unwrap();

    let limits = Limits::load(&path).unwrap();
    assert_eq!(limits.step_max_mb, 100);
    assert_eq!(limits.ram_max_mb, 4096);
    assert_eq!(limits.router_max_mb, ROUTER_MAX_MB);
    assert_eq!(limits.step_name_max_length, STEP_NAME_MAX_LENGTH);
    assert_eq!(limits.step_max_bytes(), 100 * BYTES_PER_MB);
  }

  #[test]
  fn huge_limits_saturate() {
    let limits: Limits = serde_json::from_str(r#"{ "stepMaxMb": 18000000000000, "routerMaxMb": 18000000000000 }"#).unwrap();
    assert_eq!(limits.step_max_bytes(), u64::MAX);
    assert_eq!(limits.router_max_bytes(), u64::MAX);
  }

  #[test]
  fn malformed_limits_file_reports_path() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("steppack.json");
    std::fs::write(&path, "{ not json").unwrap();

    let err = Limits::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert!(err.to_string().contains("steppack.json"));
  }
}
