//! Fixtures shared by unit tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::archive::{ArchiveResult, Archiver};
use crate::build::{BuildError, Builder, RouteEntry, RouterBuildResult, StepBuilder};
use crate::config::BuildConfig;
use crate::listener::BuildListener;
use crate::step::{BuildStepConfig, Step};
use crate::validate::ValidationError;

pub const PROJECT_DIR: &str = "/project";

/// A builder for `/project` with `steps` registered and no backends.
pub fn builder_with(steps: Vec<Step>) -> Builder {
  let mut builder = Builder::new(BuildConfig::new(PROJECT_DIR));
  for step in steps {
    builder.add_step(step).unwrap();
  }
  builder
}

/// Backend that reports a fixed uncompressed size without real packaging.
///
/// A bundle file is only written when the project directory exists, so
/// registry-only tests can use a fictional project path.
#[derive(Default)]
pub struct FakeBuilder {
  size: u64,
  delay: Duration,
  fail_on: Option<String>,
  pub step_calls: AtomicUsize,
  pub router_calls: AtomicUsize,
  in_flight: AtomicUsize,
  pub max_in_flight: AtomicUsize,
}

impl FakeBuilder {
  pub fn sized(size: u64) -> Self {
    Self {
      size,
      ..Default::default()
    }
  }

  pub fn with_delay(mut self, millis: u64) -> Self {
    self.delay = Duration::from_millis(millis);
    self
  }

  pub fn failing_on(mut self, step: &str) -> Self {
    self.fail_on = Some(step.to_string());
    self
  }

  fn package(&self, config: &BuildConfig, bundle_path: &str) -> Result<ArchiveResult, BuildError> {
    if !config.project_dir.is_dir() {
      return Ok(ArchiveResult {
        compressed_size: self.size,
        uncompressed_size: self.size,
      });
    }
    let mut archiver = Archiver::create(config.dist_dir.join(bundle_path))?;
    archiver.append(vec![0u8; self.size as usize], "payload")?;
    let result = archiver.finalize()?;
    Ok(result)
  }
}

#[async_trait]
impl StepBuilder for FakeBuilder {
  async fn build(&self, config: &BuildConfig, step: &BuildStepConfig) -> Result<ArchiveResult, BuildError> {
    self.step_calls.fetch_add(1, Ordering::SeqCst);
    let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    self.max_in_flight.fetch_max(now, Ordering::SeqCst);
    tokio::time::sleep(self.delay).await;
    self.in_flight.fetch_sub(1, Ordering::SeqCst);

    if self.fail_on.as_deref() == Some(step.name()) {
      return Err(BuildError::Task(format!("{} failed", step.name())));
    }
    self.package(config, &step.bundle_path)
  }

  async fn build_api_steps(
    &self,
    config: &BuildConfig,
    steps: &[BuildStepConfig],
  ) -> Result<RouterBuildResult, BuildError> {
    self.router_calls.fetch_add(1, Ordering::SeqCst);
    let language = steps[0].language;
    let bundle_path = language.router_bundle_path();
    let archive = self.package(config, &bundle_path)?;
    let routes = steps.iter().map(RouteEntry::from_step).collect::<Result<_, _>>()?;
    Ok(RouterBuildResult {
      language,
      bundle_path,
      entrypoint_path: "router".to_string(),
      routes,
      archive,
    })
  }
}

/// Listener that records every callback for later assertions.
#[derive(Default)]
pub struct RecordingListener {
  pub started: Mutex<Vec<String>>,
  pub ended: Mutex<Vec<(String, u64)>>,
  pub errored: Mutex<Vec<String>>,
  pub warnings: Mutex<Vec<ValidationError>>,
  pub error_batches: AtomicUsize,
}

impl RecordingListener {
  /// Names of steps that finished, sorted.
  pub fn ended(&self) -> Vec<String> {
    let mut names: Vec<String> = self.ended.lock().unwrap().iter().map(|(n, _)| n.clone()).collect();
    names.sort();
    names
  }

  pub fn errored(&self) -> Vec<String> {
    let mut names = self.errored.lock().unwrap().clone();
    names.sort();
    names
  }
}

impl BuildListener for RecordingListener {
  fn on_build_start(&self, step: &BuildStepConfig) {
    self.started.lock().unwrap().push(step.name().to_string());
  }

  fn on_build_end(&self, step: &BuildStepConfig, size: u64) {
    self.ended.lock().unwrap().push((step.name().to_string(), size));
  }

  fn on_build_error(&self, step: &BuildStepConfig, _error: &BuildError) {
    self.errored.lock().unwrap().push(step.name().to_string());
  }

  fn on_build_warning(&self, warning: &ValidationError) {
    self.warnings.lock().unwrap().push(warning.clone());
  }

  fn on_build_errors(&self, _errors: &[ValidationError]) {
    self.error_batches.fetch_add(1, Ordering::SeqCst);
  }
}
