//! Ruby packaging: step sources plus gems vendored by Bundler.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use super::types::{BuildError, RouterBuildResult, StepBuilder, route_entries, run_blocking};
use crate::archive::{ArchiveResult, ArchiveSource, Archiver};
use crate::config::BuildConfig;
use crate::step::{BuildStepConfig, Language};
use crate::templates::{IMPORTS_MARKER, ROUTER_PATHS_MARKER, RUBY_ROUTER, render_template};

pub const VENDOR_DIR: &str = "vendor/bundle";
pub const ROUTER_ENTRYPOINT: &str = "router.rb";
const GEMFILES: [&str; 2] = ["Gemfile", "Gemfile.lock"];

#[derive(Debug, Default, Clone, Copy)]
pub struct RubyBuilder;

impl RubyBuilder {
  pub fn new() -> Self {
    Self
  }
}

/// Vendored gems and Gemfiles shared by every Ruby bundle.
fn append_dependencies(archiver: &mut Archiver, project_dir: &Path) -> Result<(), BuildError> {
  archiver.append_directory(&project_dir.join(VENDOR_DIR), VENDOR_DIR)?;
  for name in GEMFILES {
    let path = project_dir.join(name);
    if path.is_file() {
      archiver.append(ArchiveSource::File(path), name)?;
    }
  }
  Ok(())
}

/// Ruby string literal for `value`.
fn rb_string(value: &str) -> String {
  format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

#[async_trait]
impl StepBuilder for RubyBuilder {
  async fn build(&self, config: &BuildConfig, step: &BuildStepConfig) -> Result<ArchiveResult, BuildError> {
    info!(step = %step.name(), "building ruby step");

    let output = config.dist_dir.join(&step.bundle_path);
    let project_dir = config.project_dir.clone();
    let source = step.file_path.clone();
    let entrypoint = step.entrypoint_path.clone();

    run_blocking(move || {
      let mut archiver = Archiver::create(output)?;
      archiver.append(ArchiveSource::File(source), &entrypoint)?;
      append_dependencies(&mut archiver, &project_dir)?;
      Ok(archiver.finalize()?)
    })
    .await
  }

  async fn build_api_steps(
    &self,
    config: &BuildConfig,
    steps: &[BuildStepConfig],
  ) -> Result<RouterBuildResult, BuildError> {
    info!(steps = steps.len(), "building ruby router");

    let routes = route_entries(steps)?;
    let mut imports = Vec::with_capacity(steps.len());
    let mut router_paths = Vec::with_capacity(steps.len());
    for (index, (step, route)) in steps.iter().zip(&routes).enumerate() {
      imports.push(format!("STEP_{index} = load_step({})", rb_string(&step.entrypoint_path)));
      router_paths.push(format!("{} => STEP_{index},", rb_string(&route.key())));
    }
    let router = render_template(
      RUBY_ROUTER,
      &[(IMPORTS_MARKER, imports), (ROUTER_PATHS_MARKER, router_paths)],
    );

    let sources: Vec<(PathBuf, String)> = steps
      .iter()
      .map(|step| (step.file_path.clone(), step.entrypoint_path.clone()))
      .collect();
    let project_dir = config.project_dir.clone();
    let bundle_path = Language::Ruby.router_bundle_path();
    let output = config.dist_dir.join(&bundle_path);

    let archive = run_blocking(move || {
      let mut archiver = Archiver::create(output)?;
      archiver.append(router, ROUTER_ENTRYPOINT)?;
      for (path, archive_path) in sources {
        archiver.append(ArchiveSource::File(path), &archive_path)?;
      }
      append_dependencies(&mut archiver, &project_dir)?;
      Ok(archiver.finalize()?)
    })
    .await?;

    Ok(RouterBuildResult {
      language: Language::Ruby,
      bundle_path,
      entrypoint_path: ROUTER_ENTRYPOINT.to_string(),
      routes,
      archive,
    })
  }
}
