//! Implementation of the `steppack validate` command.
//!
//! Runs the validators over the step definitions without building anything,
//! so size limits are not checked.

use anyhow::Result;

use steppack_lib::build::Builder;

use super::project::{Project, ProjectArgs};
use crate::output::{OutputFormat, print_error, print_findings, print_json, print_success};

pub fn cmd_validate(args: &ProjectArgs, format: OutputFormat) -> Result<bool> {
  let project = Project::load(args)?;
  let mut builder = Builder::new(project.config.clone());
  project.register(&mut builder)?;

  let outcome = builder.validate();

  if format.is_json() {
    print_json(&outcome)?;
    return Ok(outcome.success);
  }

  print_findings(&outcome.errors, &outcome.warnings);
  if outcome.success {
    print_success(&format!(
      "{} step(s) valid ({} warning(s))",
      builder.steps().len(),
      outcome.warnings.len()
    ));
  } else {
    print_error(&format!("Validation failed with {} error(s)", outcome.errors.len()));
  }

  Ok(outcome.success)
}
