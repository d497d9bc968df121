//! Types shared by the orchestrator and the language backends.

use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::archive::{ArchiveError, ArchiveResult};
use crate::bundle::BundleError;
use crate::config::BuildConfig;
use crate::scan::ScanError;
use crate::step::{BuildStepConfig, Language};
use crate::util::hash::HashError;

/// Errors that can occur while packaging steps.
#[derive(Debug, Error)]
pub enum BuildError {
  #[error("archive error: {0}")]
  Archive(#[from] ArchiveError),

  #[error("dependency scan failed: {0}")]
  Scan(#[from] ScanError),

  #[error("bundling failed: {0}")]
  Bundle(#[from] BundleError),

  #[error("no builder registered for language {0}")]
  NoBuilder(Language),

  /// A prerequisite shared by every step of a language is absent.
  #[error("{language} runtime not found at {}", path.display())]
  RuntimeMissing { language: Language, path: PathBuf },

  #[error("api step {0} has no api configuration")]
  MissingApiConfig(String),

  #[error("failed to write build manifest: {0}")]
  Manifest(#[from] serde_json::Error),

  #[error(transparent)]
  Hash(#[from] HashError),

  #[error("io error: {0}")]
  Io(#[from] io::Error),

  #[error("build task failed: {0}")]
  Task(String),
}

impl BuildError {
  /// Fatal errors abort the whole build; everything else fails a single step.
  pub fn is_fatal(&self) -> bool {
    matches!(self, BuildError::RuntimeMissing { .. })
  }
}

/// A single route served by a language router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteEntry {
  /// Uppercased HTTP method.
  pub method: String,
  pub path: String,
  pub step: String,
  pub entrypoint: String,
}

impl RouteEntry {
  pub fn from_step(step: &BuildStepConfig) -> Result<Self, BuildError> {
    let api = step
      .config
      .api
      .as_ref()
      .ok_or_else(|| BuildError::MissingApiConfig(step.name().to_string()))?;
    Ok(Self {
      method: api.method.to_uppercase(),
      path: api.path.clone(),
      step: step.name().to_string(),
      entrypoint: step.entrypoint_path.clone(),
    })
  }

  /// Key used by every router template: `"<METHOD> <path>"`.
  pub fn key(&self) -> String {
    format!("{} {}", self.method, self.path)
  }
}

/// Outcome of packaging every API step of one language into a router bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterBuildResult {
  pub language: Language,
  /// Relative to the dist directory.
  pub bundle_path: String,
  /// Router entry file inside the bundle.
  pub entrypoint_path: String,
  pub routes: Vec<RouteEntry>,
  pub archive: ArchiveResult,
}

/// Packages steps of a single language.
#[async_trait]
pub trait StepBuilder: Send + Sync {
  /// Package one non-API step into `<dist>/<step.bundle_path>`.
  async fn build(&self, config: &BuildConfig, step: &BuildStepConfig) -> Result<ArchiveResult, BuildError>;

  /// Package every API step of this language into one router bundle.
  async fn build_api_steps(
    &self,
    config: &BuildConfig,
    steps: &[BuildStepConfig],
  ) -> Result<RouterBuildResult, BuildError>;
}

/// Run synchronous archive work off the async executor.
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T, BuildError>
where
  F: FnOnce() -> Result<T, BuildError> + Send + 'static,
  T: Send + 'static,
{
  tokio::task::spawn_blocking(f)
    .await
    .map_err(|e| BuildError::Task(e.to_string()))?
}

/// Build route entries for `steps`, in the order given.
pub(crate) fn route_entries(steps: &[BuildStepConfig]) -> Result<Vec<RouteEntry>, BuildError> {
  steps.iter().map(RouteEntry::from_step).collect()
}
