use std::collections::HashMap;

use super::ValidationReport;
use crate::build::Builder;

/// Two API steps may not serve the same method and path. Methods compare
/// case-insensitively; the same path under different methods is fine.
pub fn validate_api_endpoints(builder: &Builder) -> ValidationReport {
  let mut report = ValidationReport::default();
  let mut seen: HashMap<(String, String), &str> = HashMap::new();

  for step in builder.steps().values().filter(|s| s.is_api()) {
    let Some(api) = step.config.api.as_ref() else {
      report.error(&step.entrypoint_path, step.name(), "API step is missing its api configuration");
      continue;
    };

    let method = api.method.to_uppercase();
    let key = (method.clone(), api.path.clone());
    match seen.get(&key) {
      Some(first) => report.error(
        &step.entrypoint_path,
        step.name(),
        format!(
          "Endpoint conflict: {method} {} is defined in both {first} and {}",
          api.path, step.entrypoint_path
        ),
      ),
      None => {
        seen.insert(key, &step.entrypoint_path);
      }
    }
  }

  report
}
