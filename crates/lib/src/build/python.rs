//! Python packaging.
//!
//! Each step bundle holds the step module, the project files it imports and
//! every third-party package the scanner reports, copied from the configured
//! site-packages. Files named `*.step.py` are stored as `*_step.py`. The
//! router loads each step by its archive path, so file names need not be
//! valid module names.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::types::{BuildError, RouterBuildResult, StepBuilder, route_entries, run_blocking};
use crate::archive::{ArchiveResult, ArchiveSource, Archiver};
use crate::config::BuildConfig;
use crate::deps::python::add_package;
use crate::scan::{DependencyScanner, ScanResult};
use crate::step::{BuildStepConfig, Language};
use crate::templates::{IMPORTS_MARKER, PYTHON_ROUTER, ROUTER_PATHS_MARKER, render_template};

/// Packages the generated router needs at runtime regardless of what steps import.
pub const ROUTER_BASELINE_PACKAGES: &[&str] = &["mangum", "starlette", "anyio", "sniffio", "idna", "typing_extensions"];

pub const ROUTER_ENTRYPOINT: &str = "router.py";

pub struct PythonBuilder {
  scanner: Arc<dyn DependencyScanner>,
}

impl PythonBuilder {
  pub fn new(scanner: Arc<dyn DependencyScanner>) -> Self {
    Self { scanner }
  }
}

/// `steps/a.step.py` -> `steps/a_step.py`.
pub fn normalize_archive_path(path: &str) -> String {
  match path.strip_suffix(".step.py") {
    Some(stem) => format!("{stem}_step.py"),
    None => path.to_string(),
  }
}

/// Python string literal for `value`. JSON escapes are valid Python escapes.
fn py_string(value: &str) -> String {
  serde_json::Value::String(value.to_string()).to_string()
}

/// One step's source files, keyed by archive path.
fn step_sources(config: &BuildConfig, step: &BuildStepConfig, scan: &ScanResult) -> Vec<(PathBuf, String)> {
  let mut sources = vec![(step.file_path.clone(), normalize_archive_path(&step.entrypoint_path))];
  sources.extend(
    scan
      .files
      .iter()
      .map(|file| (config.project_dir.join(file), normalize_archive_path(file))),
  );
  sources
}

#[async_trait]
impl StepBuilder for PythonBuilder {
  async fn build(&self, config: &BuildConfig, step: &BuildStepConfig) -> Result<ArchiveResult, BuildError> {
    info!(step = %step.name(), "building python step");

    let scan = self.scanner.scan(&config.project_dir, &step.file_path).await?;
    debug!(step = %step.name(), packages = ?scan.packages, files = scan.files.len(), "python dependencies");

    let output = config.dist_dir.join(&step.bundle_path);
    let sources = step_sources(config, step, &scan);
    let site_packages = config.python.site_packages_dir.clone();

    run_blocking(move || {
      let mut archiver = Archiver::create(output)?;
      for (path, archive_path) in sources {
        archiver.append(ArchiveSource::File(path), &archive_path)?;
      }
      for package in &scan.packages {
        add_package(&mut archiver, &site_packages, package)?;
      }
      Ok(archiver.finalize()?)
    })
    .await
  }

  async fn build_api_steps(
    &self,
    config: &BuildConfig,
    steps: &[BuildStepConfig],
  ) -> Result<RouterBuildResult, BuildError> {
    info!(steps = steps.len(), "building python router");

    let routes = route_entries(steps)?;
    let mut packages: BTreeSet<String> = ROUTER_BASELINE_PACKAGES.iter().map(|p| p.to_string()).collect();
    let mut sources = Vec::new();
    let mut imports = Vec::with_capacity(steps.len());
    let mut router_paths = Vec::with_capacity(steps.len());

    for (index, (step, route)) in steps.iter().zip(&routes).enumerate() {
      let scan = self.scanner.scan(&config.project_dir, &step.file_path).await?;
      packages.extend(scan.packages.iter().cloned());
      sources.extend(step_sources(config, step, &scan));

      let archive_path = normalize_archive_path(&step.entrypoint_path);
      imports.push(format!("handler_{index} = _load({}).handler", py_string(&archive_path)));
      router_paths.push(format!("{}: handler_{index},", py_string(&route.key())));
    }

    let router = render_template(
      PYTHON_ROUTER,
      &[(IMPORTS_MARKER, imports), (ROUTER_PATHS_MARKER, router_paths)],
    );

    let bundle_path = Language::Python.router_bundle_path();
    let output = config.dist_dir.join(&bundle_path);
    let site_packages = config.python.site_packages_dir.clone();

    let archive = run_blocking(move || {
      let mut archiver = Archiver::create(output)?;
      archiver.append(router, ROUTER_ENTRYPOINT)?;
      for (path, archive_path) in sources {
        archiver.append(ArchiveSource::File(path), &archive_path)?;
      }
      for package in &packages {
        add_package(&mut archiver, &site_packages, package)?;
      }
      Ok(archiver.finalize()?)
    })
    .await?;

    Ok(RouterBuildResult {
      language: Language::Python,
      bundle_path,
      entrypoint_path: ROUTER_ENTRYPOINT.to_string(),
      routes,
      archive,
    })
  }
}
