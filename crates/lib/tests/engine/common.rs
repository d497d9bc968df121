//! Shared fixtures: a temporary project and in-process collaborators.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use steppack_lib::build::{BuildError, Builder};
use steppack_lib::build::csharp::CSharpBuilder;
use steppack_lib::build::node::NodeBuilder;
use steppack_lib::build::python::PythonBuilder;
use steppack_lib::build::ruby::RubyBuilder;
use steppack_lib::bundle::{BundleError, ModuleBundler};
use steppack_lib::config::BuildConfig;
use steppack_lib::listener::BuildListener;
use steppack_lib::scan::{DependencyScanner, ScanError, ScanResult};
use steppack_lib::step::{BuildStepConfig, Language};
use steppack_lib::validate::ValidationError;
use tempfile::TempDir;

/// Scanner answering from a table keyed by step file name.
#[derive(Default)]
pub struct TableScanner(pub HashMap<String, ScanResult>);

impl TableScanner {
  pub fn with(mut self, file_name: &str, packages: &[&str], files: &[&str]) -> Self {
    self.0.insert(
      file_name.to_string(),
      ScanResult {
        packages: packages.iter().map(|p| p.to_string()).collect(),
        files: files.iter().map(|f| f.to_string()).collect(),
      },
    );
    self
  }
}

#[async_trait]
impl DependencyScanner for TableScanner {
  async fn scan(&self, _project_dir: &Path, step_path: &Path) -> Result<ScanResult, ScanError> {
    let name = step_path
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_default();
    Ok(self.0.get(&name).cloned().unwrap_or_default())
  }
}

/// Bundler that copies the entry file unchanged.
pub struct CopyBundler;

#[async_trait]
impl ModuleBundler for CopyBundler {
  async fn bundle(&self, entry: &Path, out_file: &Path) -> Result<(), BundleError> {
    fs::copy(entry, out_file).map_err(|source| BundleError::Spawn {
      program: "copy".into(),
      source,
    })?;
    Ok(())
  }
}

/// A throwaway project directory.
pub struct TestProject {
  pub temp: TempDir,
}

impl TestProject {
  pub fn new() -> Self {
    let project = Self {
      temp: TempDir::new().unwrap(),
    };
    fs::create_dir_all(project.site_packages()).unwrap();
    project
  }

  pub fn root(&self) -> &Path {
    self.temp.path()
  }

  pub fn dist(&self) -> PathBuf {
    self.root().join("dist")
  }

  pub fn site_packages(&self) -> PathBuf {
    self.root().join("site-packages")
  }

  pub fn write(&self, relative: &str, content: &str) -> PathBuf {
    let path = self.root().join(relative);
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
  }

  pub fn config(&self) -> BuildConfig {
    BuildConfig::new(self.root())
      .with_site_packages(self.site_packages())
      .with_csharp_runtime(self.root().join("runtime"))
      .with_parallelism(2)
  }

  /// A builder with every language backend wired to in-process collaborators.
  pub fn builder(&self, scanner: TableScanner) -> Builder {
    self.builder_with_config(self.config(), scanner)
  }

  pub fn builder_with_config(&self, config: BuildConfig, scanner: TableScanner) -> Builder {
    let mut builder = Builder::new(config);
    builder.register_builder(Language::Node, Arc::new(NodeBuilder::new(Arc::new(CopyBundler))));
    builder.register_builder(Language::Python, Arc::new(PythonBuilder::new(Arc::new(scanner))));
    builder.register_builder(Language::CSharp, Arc::new(CSharpBuilder::new()));
    builder.register_builder(Language::Ruby, Arc::new(RubyBuilder::new()));
    builder
  }
}

/// Sorted entry names of a zip file.
pub fn zip_entries(path: &Path) -> Vec<String> {
  let archive = zip::ZipArchive::new(fs::File::open(path).unwrap()).unwrap();
  let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
  names.sort();
  names
}

/// Counts listener callbacks.
#[derive(Default)]
pub struct CountingListener {
  pub started: AtomicUsize,
  pub ended: AtomicUsize,
  pub failed: AtomicUsize,
  pub warnings: AtomicUsize,
  pub error_batches: AtomicUsize,
}

impl CountingListener {
  pub fn count(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
  }
}

impl BuildListener for CountingListener {
  fn on_build_start(&self, _step: &BuildStepConfig) {
    self.started.fetch_add(1, Ordering::SeqCst);
  }

  fn on_build_end(&self, _step: &BuildStepConfig, _size: u64) {
    self.ended.fetch_add(1, Ordering::SeqCst);
  }

  fn on_build_error(&self, _step: &BuildStepConfig, _error: &BuildError) {
    self.failed.fetch_add(1, Ordering::SeqCst);
  }

  fn on_build_warning(&self, _warning: &ValidationError) {
    self.warnings.fetch_add(1, Ordering::SeqCst);
  }

  fn on_build_errors(&self, _errors: &[ValidationError]) {
    self.error_batches.fetch_add(1, Ordering::SeqCst);
  }
}
