//! Post-build validation.
//!
//! Validators are plain functions over a [`Builder`]: they read the step
//! registry and the recorded bundle sizes and return errors and warnings.
//! The pipeline always runs all of them, in a fixed order, and only then
//! decides success, so one invocation surfaces every problem at once.

mod api;
mod cron;
mod infrastructure;
mod names;
mod size;

use serde::{Deserialize, Serialize};

use crate::build::Builder;

pub use cron::{CronError, validate_cron_expression};

/// A single validation finding. Whether it blocks the build depends on the
/// list it is reported in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
  /// Path of the offending file, relative to the project directory.
  pub relative_path: String,
  pub message: String,
  /// Name of the step, when the finding concerns one.
  pub step: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
  pub errors: Vec<ValidationError>,
  pub warnings: Vec<ValidationError>,
}

impl ValidationReport {
  pub fn error(&mut self, relative_path: impl Into<String>, step: impl Into<String>, message: impl Into<String>) {
    self.errors.push(ValidationError {
      relative_path: relative_path.into(),
      message: message.into(),
      step: step.into(),
    });
  }

  pub fn warning(&mut self, relative_path: impl Into<String>, step: impl Into<String>, message: impl Into<String>) {
    self.warnings.push(ValidationError {
      relative_path: relative_path.into(),
      message: message.into(),
      step: step.into(),
    });
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationOutcome {
  pub success: bool,
  pub errors: Vec<ValidationError>,
  pub warnings: Vec<ValidationError>,
}

pub type Validator = fn(&Builder) -> ValidationReport;

/// Every validator, in the order their findings are reported.
pub const VALIDATORS: &[(&str, Validator)] = &[
  ("duplicate-step-names", names::validate_duplicate_names),
  ("step-name-length", names::validate_name_length),
  ("api-endpoint-conflicts", api::validate_api_endpoints),
  ("cron-expressions", cron::validate_cron_steps),
  ("infrastructure", infrastructure::validate_infrastructure),
  ("step-bundle-size", size::validate_step_sizes),
  ("router-bundle-size", size::validate_router_sizes),
];

/// Run every validator and merge their findings in order.
pub fn validate_steps_config(builder: &Builder) -> ValidationOutcome {
  let mut errors = Vec::new();
  let mut warnings = Vec::new();

  for (name, validator) in VALIDATORS {
    let report = validator(builder);
    tracing::debug!(
      validator = name,
      errors = report.errors.len(),
      warnings = report.warnings.len(),
      "validator finished"
    );
    errors.extend(report.errors);
    warnings.extend(report.warnings);
  }

  ValidationOutcome {
    success: errors.is_empty(),
    errors,
    warnings,
  }
}
