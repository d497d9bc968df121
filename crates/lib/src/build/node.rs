//! Node packaging.
//!
//! Every Node bundle is a single `index.js` produced by the module bundler,
//! so nothing from `node_modules` has to be copied.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::types::{BuildError, RouterBuildResult, StepBuilder, route_entries, run_blocking};
use crate::archive::{ArchiveResult, ArchiveSource, Archiver};
use crate::bundle::ModuleBundler;
use crate::config::BuildConfig;
use crate::step::{BuildStepConfig, Language};
use crate::templates::{IMPORTS_MARKER, NODE_ROUTER, ROUTER_PATHS_MARKER, render_template};

pub const BUNDLE_ENTRYPOINT: &str = "index.js";
const ROUTER_SOURCE: &str = "router.js";

pub struct NodeBuilder {
  bundler: Arc<dyn ModuleBundler>,
}

impl NodeBuilder {
  pub fn new(bundler: Arc<dyn ModuleBundler>) -> Self {
    Self { bundler }
  }
}

/// Bundle `entry` into a scratch directory and archive the result as `index.js`.
async fn bundle_and_archive(
  bundler: &dyn ModuleBundler,
  entry: &std::path::Path,
  output: std::path::PathBuf,
) -> Result<ArchiveResult, BuildError> {
  let scratch = tempfile::tempdir()?;
  let bundled = scratch.path().join(BUNDLE_ENTRYPOINT);
  bundler.bundle(entry, &bundled).await?;

  let result = run_blocking(move || {
    let mut archiver = Archiver::create(output)?;
    archiver.append(ArchiveSource::File(bundled), BUNDLE_ENTRYPOINT)?;
    Ok(archiver.finalize()?)
  })
  .await;

  drop(scratch);
  result
}

/// JavaScript string literal for `value`.
fn js_string(value: &str) -> String {
  serde_json::Value::String(value.to_string()).to_string()
}

#[async_trait]
impl StepBuilder for NodeBuilder {
  async fn build(&self, config: &BuildConfig, step: &BuildStepConfig) -> Result<ArchiveResult, BuildError> {
    info!(step = %step.name(), "building node step");
    let output = config.dist_dir.join(&step.bundle_path);
    bundle_and_archive(self.bundler.as_ref(), &step.file_path, output).await
  }

  async fn build_api_steps(
    &self,
    config: &BuildConfig,
    steps: &[BuildStepConfig],
  ) -> Result<RouterBuildResult, BuildError> {
    info!(steps = steps.len(), "building node router");

    let routes = route_entries(steps)?;
    let mut imports = Vec::with_capacity(steps.len());
    let mut router_paths = Vec::with_capacity(steps.len());
    for (index, (step, route)) in steps.iter().zip(&routes).enumerate() {
      let source = step.file_path.to_string_lossy();
      imports.push(format!("const step_{index} = require({});", js_string(&source)));
      router_paths.push(format!("{}: step_{index}.handler,", js_string(&route.key())));
    }

    let router = render_template(
      NODE_ROUTER,
      &[(IMPORTS_MARKER, imports), (ROUTER_PATHS_MARKER, router_paths)],
    );

    let scratch = tempfile::tempdir()?;
    let entry = scratch.path().join(ROUTER_SOURCE);
    tokio::fs::write(&entry, router).await?;

    let bundle_path = Language::Node.router_bundle_path();
    let output = config.dist_dir.join(&bundle_path);
    let archive = bundle_and_archive(self.bundler.as_ref(), &entry, output).await?;

    Ok(RouterBuildResult {
      language: Language::Node,
      bundle_path,
      entrypoint_path: BUNDLE_ENTRYPOINT.to_string(),
      routes,
      archive,
    })
  }
}
