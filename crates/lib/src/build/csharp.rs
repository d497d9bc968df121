//! C# packaging.
//!
//! Steps are shipped as source next to a prebuilt self-contained runtime,
//! which is copied under `runtime/` in every bundle. The runtime is shared by
//! all C# steps, so its absence fails the whole build.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::info;

use super::types::{BuildError, RouterBuildResult, StepBuilder, route_entries, run_blocking};
use crate::archive::{ArchiveResult, ArchiveSource, Archiver};
use crate::config::BuildConfig;
use crate::step::{BuildStepConfig, Language};

pub const RUNTIME_DIR: &str = "runtime";
pub const ROUTES_FILE: &str = "routes.json";

#[derive(Debug, Default, Clone, Copy)]
pub struct CSharpBuilder;

impl CSharpBuilder {
  pub fn new() -> Self {
    Self
  }
}

fn ensure_runtime(config: &BuildConfig) -> Result<PathBuf, BuildError> {
  let runtime = config.csharp.runtime_dir.clone();
  if !runtime.is_dir() {
    return Err(BuildError::RuntimeMissing {
      language: Language::CSharp,
      path: runtime,
    });
  }
  Ok(runtime)
}

#[async_trait]
impl StepBuilder for CSharpBuilder {
  async fn build(&self, config: &BuildConfig, step: &BuildStepConfig) -> Result<ArchiveResult, BuildError> {
    info!(step = %step.name(), "building csharp step");
    let runtime = ensure_runtime(config)?;

    let output = config.dist_dir.join(&step.bundle_path);
    let source = step.file_path.clone();
    let entrypoint = step.entrypoint_path.clone();

    run_blocking(move || {
      let mut archiver = Archiver::create(output)?;
      archiver.append(ArchiveSource::File(source), &entrypoint)?;
      archiver.append_directory(&runtime, RUNTIME_DIR)?;
      Ok(archiver.finalize()?)
    })
    .await
  }

  async fn build_api_steps(
    &self,
    config: &BuildConfig,
    steps: &[BuildStepConfig],
  ) -> Result<RouterBuildResult, BuildError> {
    info!(steps = steps.len(), "building csharp router");
    let runtime = ensure_runtime(config)?;

    let routes = route_entries(steps)?;
    let manifest = serde_json::to_string_pretty(&routes)?;
    let sources: Vec<(PathBuf, String)> = steps
      .iter()
      .map(|step| (step.file_path.clone(), step.entrypoint_path.clone()))
      .collect();

    let bundle_path = Language::CSharp.router_bundle_path();
    let output = config.dist_dir.join(&bundle_path);

    let archive = run_blocking(move || {
      let mut archiver = Archiver::create(output)?;
      archiver.append(manifest, ROUTES_FILE)?;
      for (path, archive_path) in sources {
        archiver.append(ArchiveSource::File(path), &archive_path)?;
      }
      archiver.append_directory(&runtime, RUNTIME_DIR)?;
      Ok(archiver.finalize()?)
    })
    .await?;

    Ok(RouterBuildResult {
      language: Language::CSharp,
      bundle_path,
      entrypoint_path: ROUTES_FILE.to_string(),
      routes,
      archive,
    })
  }
}
