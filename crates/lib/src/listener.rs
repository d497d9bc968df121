//! Build progress callbacks.

use crate::build::BuildError;
use crate::step::BuildStepConfig;
use crate::validate::ValidationError;

/// Receives progress notifications from the [`Builder`](crate::build::Builder).
///
/// Every method has a no-op default, so implementors only override what they
/// report. Callbacks are invoked from the orchestrating task, never concurrently.
pub trait BuildListener: Send + Sync {
  fn on_build_start(&self, _step: &BuildStepConfig) {}

  /// `size` is the compressed bundle size in bytes.
  fn on_build_end(&self, _step: &BuildStepConfig, _size: u64) {}

  fn on_build_error(&self, _step: &BuildStepConfig, _error: &BuildError) {}

  fn on_build_warning(&self, _warning: &ValidationError) {}

  fn on_build_errors(&self, _errors: &[ValidationError]) {}
}

/// Listener that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl BuildListener for NoopListener {}
