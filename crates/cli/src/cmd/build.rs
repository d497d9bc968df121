//! Implementation of the `steppack build` command.

use std::time::Instant;

use anyhow::{Context, Result};

use steppack_lib::build::Builder;
use steppack_lib::listener::{BuildListener, NoopListener};

use super::project::{Project, ProjectArgs};
use crate::listener::ConsoleListener;
use crate::output::{
  OutputFormat, format_bytes, format_duration, print_error, print_info, print_json, print_stat, print_success,
};

/// Build every step and router of the project, write the manifest and
/// validate the result. Returns whether the build succeeded.
pub fn cmd_build(args: &ProjectArgs, format: OutputFormat, verbose: bool) -> Result<bool> {
  let project = Project::load(args)?;
  let project_dir = project.config.project_dir.clone();

  let mut builder =
    Builder::with_default_builders(project.config.clone()).context("Failed to initialize language builders")?;
  project.register(&mut builder)?;

  if !format.is_json() {
    print_info(&format!(
      "Building {} step(s) in {}",
      builder.steps().len(),
      project_dir.display()
    ));
  }

  let console = ConsoleListener::new(verbose);
  let listener: &dyn BuildListener = if format.is_json() { &NoopListener } else { &console };

  let started = Instant::now();
  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let outcome = rt.block_on(builder.build(listener)).context("Build failed")?;

  if format.is_json() {
    print_json(&outcome)?;
    return Ok(outcome.success);
  }

  let total: u64 = builder.step_compressed_sizes().values().sum::<u64>()
    + builder.router_compressed_sizes().values().sum::<u64>();

  println!();
  print_stat("Steps", &builder.step_compressed_sizes().len().to_string());
  print_stat("Routers", &builder.routers().len().to_string());
  print_stat("Total size", &format_bytes(total));
  print_stat("Manifest", &outcome.manifest_path.display().to_string());
  print_stat("Duration", &format_duration(started.elapsed()));
  println!();

  if outcome.success {
    print_success("Build succeeded");
  } else {
    print_error(&format!(
      "Build failed: {} validation error(s), {} failed step(s)",
      outcome.errors.len(),
      outcome.failures.len()
    ));
  }

  Ok(outcome.success)
}
