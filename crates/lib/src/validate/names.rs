use std::collections::BTreeMap;

use super::ValidationReport;
use crate::build::Builder;
use crate::step::BuildStepConfig;

/// One error per name shared by more than one step, attributed to the first file.
pub fn validate_duplicate_names(builder: &Builder) -> ValidationReport {
  let mut report = ValidationReport::default();

  let mut order: Vec<&str> = Vec::new();
  let mut by_name: BTreeMap<&str, Vec<&BuildStepConfig>> = BTreeMap::new();
  for step in builder.steps().values() {
    let entry = by_name.entry(step.name()).or_default();
    if entry.is_empty() {
      order.push(step.name());
    }
    entry.push(step);
  }

  for name in order {
    let steps = &by_name[name];
    if steps.len() < 2 {
      continue;
    }
    let files: Vec<&str> = steps.iter().map(|s| s.entrypoint_path.as_str()).collect();
    report.error(
      &steps[0].entrypoint_path,
      name,
      format!("Duplicate step names: '{name}' is defined in {}", files.join(", ")),
    );
  }

  report
}

pub fn validate_name_length(builder: &Builder) -> ValidationReport {
  let mut report = ValidationReport::default();
  let max = builder.config().limits.step_name_max_length;

  for step in builder.steps().values() {
    let length = step.name().chars().count();
    if length > max {
      report.error(
        &step.entrypoint_path,
        step.name(),
        format!(
          "Step name '{}' exceeds the maximum length of {max} characters (got {length})",
          step.name()
        ),
      );
    }
  }

  report
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::step::Step;
  use crate::util::testutil::builder_with;

  #[test]
  fn one_error_per_duplicated_name() {
    let builder = builder_with(vec![
      Step::event("dup", "steps/c.step.py", &["t"]),
      Step::event("dup", "steps/a.step.py", &["t"]),
      Step::event("dup", "steps/b.step.py", &["t"]),
      Step::event("unique", "steps/d.step.py", &["t"]),
    ]);

    let report = validate_duplicate_names(&builder);
    assert_eq!(report.errors.len(), 1);
    let error = &report.errors[0];
    assert_eq!(error.relative_path, "steps/a.step.py");
    assert_eq!(error.step, "dup");
    assert_eq!(
      error.message,
      "Duplicate step names: 'dup' is defined in steps/a.step.py, steps/b.step.py, steps/c.step.py"
    );
  }

  #[test]
  fn each_duplicated_name_is_reported() {
    let builder = builder_with(vec![
      Step::event("x", "a.step.py", &["t"]),
      Step::event("y", "b.step.py", &["t"]),
      Step::event("x", "c.step.py", &["t"]),
      Step::event("y", "d.step.py", &["t"]),
    ]);
    let report = validate_duplicate_names(&builder);
    let steps: Vec<&str> = report.errors.iter().map(|e| e.step.as_str()).collect();
    assert_eq!(steps, vec!["x", "y"]);
  }

  #[test]
  fn name_length_boundary() {
    let at_limit = "a".repeat(40);
    let over_limit = "b".repeat(41);
    let builder = builder_with(vec![
      Step::event(&at_limit, "a.step.py", &["t"]),
      Step::event(&over_limit, "b.step.py", &["t"]),
    ]);

    let report = validate_name_length(&builder);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].step, over_limit);
    assert!(report.errors[0].message.contains("(got 41)"));
  }

  #[test]
  fn name_length_counts_characters() {
    let name = "é".repeat(40);
    let builder = builder_with(vec![Step::event(&name, "a.step.py", &["t"])]);
    assert!(validate_name_length(&builder).errors.is_empty());
  }
}
