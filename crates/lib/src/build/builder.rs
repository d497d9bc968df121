//! The build orchestrator.
//!
//! A [`Builder`] owns the step registry for one build invocation, dispatches
//! each step to the backend registered for its language, and is the single
//! writer of the size maps the validators read. Non-API steps are built in a
//! bounded worker pool; API steps are packaged into one router per language.

use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::csharp::CSharpBuilder;
use super::node::NodeBuilder;
use super::python::PythonBuilder;
use super::ruby::RubyBuilder;
use super::types::{BuildError, RouterBuildResult, StepBuilder};
use crate::archive::ArchiveResult;
use crate::bundle::CommandBundler;
use crate::config::BuildConfig;
use crate::listener::BuildListener;
use crate::manifest::BuildManifest;
use crate::scan::ProcessScanner;
use crate::step::{BuildStepConfig, Language, Step, StepError, StreamConfig};
use crate::validate::{ValidationError, ValidationOutcome, validate_steps_config};

/// A step whose bundle could not be produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepFailure {
  pub step: String,
  pub file_path: PathBuf,
  pub error: String,
}

impl StepFailure {
  fn new(step: &BuildStepConfig, error: &BuildError) -> Self {
    Self {
      step: step.name().to_string(),
      file_path: step.file_path.clone(),
      error: error.to_string(),
    }
  }
}

/// Result of a full build invocation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildOutcome {
  /// False if any validation error or per-step build failure occurred.
  pub success: bool,
  pub errors: Vec<ValidationError>,
  pub warnings: Vec<ValidationError>,
  pub failures: Vec<StepFailure>,
  pub manifest_path: PathBuf,
}

pub struct Builder {
  config: Arc<BuildConfig>,
  builders: HashMap<Language, Arc<dyn StepBuilder>>,
  steps: BTreeMap<PathBuf, BuildStepConfig>,
  streams: BTreeMap<PathBuf, StreamConfig>,
  routers: BTreeMap<Language, RouterBuildResult>,
  step_compressed_sizes: BTreeMap<PathBuf, u64>,
  step_uncompressed_sizes: BTreeMap<PathBuf, u64>,
  router_compressed_sizes: BTreeMap<Language, u64>,
  router_uncompressed_sizes: BTreeMap<Language, u64>,
}

impl Builder {
  /// A builder with no language backends registered.
  pub fn new(config: BuildConfig) -> Self {
    Self {
      config: Arc::new(config),
      builders: HashMap::new(),
      steps: BTreeMap::new(),
      streams: BTreeMap::new(),
      routers: BTreeMap::new(),
      step_compressed_sizes: BTreeMap::new(),
      step_uncompressed_sizes: BTreeMap::new(),
      router_compressed_sizes: BTreeMap::new(),
      router_uncompressed_sizes: BTreeMap::new(),
    }
  }

  /// A builder with the process-backed Node, Python, C# and Ruby backends.
  pub fn with_default_builders(config: BuildConfig) -> io::Result<Self> {
    let scanner = Arc::new(ProcessScanner::from_config(&config.python)?);
    let bundler = Arc::new(CommandBundler::from_config(&config.node));

    let mut builder = Self::new(config);
    builder.register_builder(Language::Node, Arc::new(NodeBuilder::new(bundler)));
    builder.register_builder(Language::Python, Arc::new(PythonBuilder::new(scanner)));
    builder.register_builder(Language::CSharp, Arc::new(CSharpBuilder::new()));
    builder.register_builder(Language::Ruby, Arc::new(RubyBuilder::new()));
    Ok(builder)
  }

  pub fn register_builder(&mut self, language: Language, builder: Arc<dyn StepBuilder>) {
    self.builders.insert(language, builder);
  }

  /// Insert or replace the step registered at the same file path.
  pub fn register_step(&mut self, step: BuildStepConfig) {
    debug!(step = %step.name(), path = %step.file_path.display(), "registering step");
    self.steps.insert(step.file_path.clone(), step);
  }

  /// Resolve `step` against the project directory and register it.
  pub fn add_step(&mut self, step: Step) -> Result<(), StepError> {
    let config = BuildStepConfig::new(&self.config.project_dir, step)?;
    self.register_step(config);
    Ok(())
  }

  pub fn register_stream(&mut self, stream: StreamConfig) {
    let path = if stream.file_path.is_absolute() {
      stream.file_path.clone()
    } else {
      self.config.project_dir.join(&stream.file_path)
    };
    self.streams.insert(path, stream);
  }

  pub fn record_step_size(&mut self, file_path: &Path, compressed: u64, uncompressed: u64) {
    self.step_compressed_sizes.insert(file_path.to_path_buf(), compressed);
    self.step_uncompressed_sizes.insert(file_path.to_path_buf(), uncompressed);
  }

  pub fn record_router_size(&mut self, language: Language, compressed: u64, uncompressed: u64) {
    self.router_compressed_sizes.insert(language, compressed);
    self.router_uncompressed_sizes.insert(language, uncompressed);
  }

  pub fn config(&self) -> &BuildConfig {
    &self.config
  }

  pub fn steps(&self) -> &BTreeMap<PathBuf, BuildStepConfig> {
    &self.steps
  }

  pub fn streams(&self) -> &BTreeMap<PathBuf, StreamConfig> {
    &self.streams
  }

  pub fn routers(&self) -> &BTreeMap<Language, RouterBuildResult> {
    &self.routers
  }

  pub fn step_compressed_sizes(&self) -> &BTreeMap<PathBuf, u64> {
    &self.step_compressed_sizes
  }

  pub fn step_uncompressed_sizes(&self) -> &BTreeMap<PathBuf, u64> {
    &self.step_uncompressed_sizes
  }

  pub fn router_compressed_sizes(&self) -> &BTreeMap<Language, u64> {
    &self.router_compressed_sizes
  }

  pub fn router_uncompressed_sizes(&self) -> &BTreeMap<Language, u64> {
    &self.router_uncompressed_sizes
  }

  fn builder_for(&self, language: Language) -> Result<Arc<dyn StepBuilder>, BuildError> {
    self
      .builders
      .get(&language)
      .cloned()
      .ok_or(BuildError::NoBuilder(language))
  }

  /// Build a single step and record its sizes.
  pub async fn build_step(&mut self, step: &BuildStepConfig) -> Result<ArchiveResult, BuildError> {
    let builder = self.builder_for(step.language)?;
    let result = builder.build(&self.config, step).await?;
    self.record_step_size(&step.file_path, result.compressed_size, result.uncompressed_size);
    Ok(result)
  }

  /// Build every non-API step with at most `config.parallelism` builds in flight.
  ///
  /// Per-step failures are reported to the listener and returned; a fatal
  /// error aborts the remaining builds and is returned as `Err`.
  pub async fn build_steps(&mut self, listener: &dyn BuildListener) -> Result<Vec<StepFailure>, BuildError> {
    let semaphore = Arc::new(Semaphore::new(self.config.parallelism.max(1)));
    let mut join_set = JoinSet::new();
    let mut outstanding: BTreeMap<PathBuf, BuildStepConfig> = BTreeMap::new();
    let mut failures = Vec::new();

    let pending: Vec<BuildStepConfig> = self.steps.values().filter(|s| !s.is_api()).cloned().collect();
    info!(steps = pending.len(), parallelism = self.config.parallelism, "building steps");

    for step in pending {
      listener.on_build_start(&step);

      let builder = match self.builder_for(step.language) {
        Ok(builder) => builder,
        Err(e) => {
          warn!(step = %step.name(), error = %e, "step skipped");
          listener.on_build_error(&step, &e);
          failures.push(StepFailure::new(&step, &e));
          continue;
        }
      };

      outstanding.insert(step.file_path.clone(), step.clone());
      let config = self.config.clone();
      let semaphore = semaphore.clone();

      join_set.spawn(async move {
        let result = match semaphore.acquire().await {
          Ok(_permit) => builder.build(&config, &step).await,
          Err(e) => Err(BuildError::Task(e.to_string())),
        };
        (step, result)
      });
    }

    while let Some(joined) = join_set.join_next().await {
      let (step, result) = match joined {
        Ok(output) => output,
        Err(e) if e.is_cancelled() => continue,
        Err(e) => {
          error!(error = %e, "build task panicked");
          continue;
        }
      };
      outstanding.remove(&step.file_path);

      match result {
        Ok(archive) => {
          debug!(
            step = %step.name(),
            compressed = archive.compressed_size,
            uncompressed = archive.uncompressed_size,
            "step built"
          );
          self.record_step_size(&step.file_path, archive.compressed_size, archive.uncompressed_size);
          listener.on_build_end(&step, archive.compressed_size);
        }
        Err(e) if e.is_fatal() => {
          error!(step = %step.name(), error = %e, "fatal build error, aborting");
          join_set.abort_all();
          listener.on_build_error(&step, &e);
          return Err(e);
        }
        Err(e) => {
          warn!(step = %step.name(), error = %e, "step build failed");
          listener.on_build_error(&step, &e);
          failures.push(StepFailure::new(&step, &e));
        }
      }
    }

    // Tasks that panicked never reported back.
    for step in outstanding.into_values() {
      let e = BuildError::Task("build task panicked".to_string());
      listener.on_build_error(&step, &e);
      failures.push(StepFailure::new(&step, &e));
    }

    Ok(failures)
  }

  /// Package the API steps among `steps` into one router per language.
  pub async fn build_api_steps(
    &mut self,
    steps: &[BuildStepConfig],
    listener: &dyn BuildListener,
  ) -> Result<Vec<StepFailure>, BuildError> {
    let mut by_language: BTreeMap<Language, Vec<BuildStepConfig>> = BTreeMap::new();
    for step in steps.iter().filter(|s| s.is_api()) {
      by_language.entry(step.language).or_default().push(step.clone());
    }

    let mut failures = Vec::new();
    for (language, group) in by_language {
      info!(language = %language, steps = group.len(), "building api router");
      for step in &group {
        listener.on_build_start(step);
      }

      let result = match self.builder_for(language) {
        Ok(builder) => builder.build_api_steps(&self.config, &group).await,
        Err(e) => Err(e),
      };

      match result {
        Ok(router) => {
          self.record_router_size(language, router.archive.compressed_size, router.archive.uncompressed_size);
          for step in &group {
            listener.on_build_end(step, router.archive.compressed_size);
          }
          self.routers.insert(language, router);
        }
        Err(e) if e.is_fatal() => {
          error!(language = %language, error = %e, "fatal router build error, aborting");
          for step in &group {
            listener.on_build_error(step, &e);
          }
          return Err(e);
        }
        Err(e) => {
          warn!(language = %language, error = %e, "router build failed");
          for step in &group {
            listener.on_build_error(step, &e);
            failures.push(StepFailure::new(step, &e));
          }
        }
      }
    }

    Ok(failures)
  }

  /// Run every validator over the current registry and size maps.
  pub fn validate(&self) -> ValidationOutcome {
    validate_steps_config(self)
  }

  /// Full build: every step and router, then the manifest, then validation.
  pub async fn build(&mut self, listener: &dyn BuildListener) -> Result<BuildOutcome, BuildError> {
    tokio::fs::create_dir_all(&self.config.dist_dir).await?;

    let mut failures = self.build_steps(listener).await?;
    let api_steps: Vec<BuildStepConfig> = self.steps.values().filter(|s| s.is_api()).cloned().collect();
    failures.extend(self.build_api_steps(&api_steps, listener).await?);

    let manifest = BuildManifest::from_builder(self)?;
    let manifest_path = manifest.write(&self.config.dist_dir)?;

    let validation = self.validate();
    for warning in &validation.warnings {
      listener.on_build_warning(warning);
    }
    if !validation.errors.is_empty() {
      listener.on_build_errors(&validation.errors);
    }

    let success = validation.success && failures.is_empty();
    info!(
      success,
      errors = validation.errors.len(),
      warnings = validation.warnings.len(),
      failures = failures.len(),
      "build finished"
    );

    Ok(BuildOutcome {
      success,
      errors: validation.errors,
      warnings: validation.warnings,
      failures,
      manifest_path,
    })
  }
}
