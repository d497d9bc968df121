use super::ValidationReport;
use crate::build::Builder;
use crate::consts::BYTES_PER_MB;

fn to_mb(bytes: u64) -> f64 {
  bytes as f64 / BYTES_PER_MB as f64
}

/// Uncompressed step bundles must fit the deployment limit. Steps without a
/// recorded size (failed or not built) are skipped.
pub fn validate_step_sizes(builder: &Builder) -> ValidationReport {
  let mut report = ValidationReport::default();
  let limits = &builder.config().limits;
  let max = limits.step_max_bytes();

  for (path, size) in builder.step_uncompressed_sizes() {
    if *size <= max {
      continue;
    }
    let Some(step) = builder.steps().get(path) else {
      continue;
    };
    report.error(
      &step.entrypoint_path,
      step.name(),
      format!(
        "Step bundle is {:.2}MB, exceeding the maximum of {}MB",
        to_mb(*size),
        limits.step_max_mb
      ),
    );
  }

  report
}

pub fn validate_router_sizes(builder: &Builder) -> ValidationReport {
  let mut report = ValidationReport::default();
  let limits = &builder.config().limits;
  let max = limits.router_max_bytes();

  for (language, size) in builder.router_uncompressed_sizes() {
    if *size <= max {
      continue;
    }
    report.error(
      language.router_bundle_path(),
      format!("router-{language}"),
      format!(
        "Router bundle for {language} is {:.2}MB, exceeding the maximum of {}MB",
        to_mb(*size),
        limits.router_max_mb
      ),
    );
  }

  report
}
