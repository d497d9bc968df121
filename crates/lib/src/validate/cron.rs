//! Standard five-field cron expressions.
//!
//! Fields are minute, hour, day of month, month and day of week. Each field
//! is a comma-separated list of `*`, `n` or `a-b`, optionally followed by
//! `/step`. Months and weekdays also accept three-letter names, and the two
//! day fields accept `?`.

use thiserror::Error;

use super::ValidationReport;
use crate::build::Builder;
use crate::step::StepType;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CronError {
  #[error("expected 5 fields, found {0}")]
  FieldCount(usize),

  #[error("{field} field is empty")]
  Empty { field: &'static str },

  #[error("invalid {field} value '{value}'")]
  InvalidValue { field: &'static str, value: String },

  #[error("{field} value {value} is out of range {min}-{max}")]
  OutOfRange {
    field: &'static str,
    value: u32,
    min: u32,
    max: u32,
  },

  #[error("invalid {field} range {start}-{end}")]
  InvalidRange { field: &'static str, start: u32, end: u32 },

  #[error("invalid {field} step '{value}'")]
  InvalidStep { field: &'static str, value: String },
}

struct FieldSpec {
  name: &'static str,
  min: u32,
  max: u32,
  names: &'static [&'static str],
  allows_question_mark: bool,
}

const MONTH_NAMES: &[&str] = &[
  "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];
const DAY_NAMES: &[&str] = &["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

const FIELDS: [FieldSpec; 5] = [
  FieldSpec {
    name: "minute",
    min: 0,
    max: 59,
    names: &[],
    allows_question_mark: false,
  },
  FieldSpec {
    name: "hour",
    min: 0,
    max: 23,
    names: &[],
    allows_question_mark: false,
  },
  FieldSpec {
    name: "day-of-month",
    min: 1,
    max: 31,
    names: &[],
    allows_question_mark: true,
  },
  FieldSpec {
    name: "month",
    min: 1,
    max: 12,
    names: MONTH_NAMES,
    allows_question_mark: false,
  },
  FieldSpec {
    name: "day-of-week",
    min: 0,
    max: 7,
    names: DAY_NAMES,
    allows_question_mark: true,
  },
];

impl FieldSpec {
  fn value(&self, raw: &str) -> Result<u32, CronError> {
    let upper = raw.to_ascii_uppercase();
    if let Some(index) = self.names.iter().position(|n| *n == upper) {
      return Ok(self.min + index as u32);
    }

    let value: u32 = raw
      .parse()
      .ok()
      .filter(|_| raw.bytes().all(|b| b.is_ascii_digit()))
      .ok_or_else(|| CronError::InvalidValue {
        field: self.name,
        value: raw.to_string(),
      })?;

    if value < self.min || value > self.max {
      return Err(CronError::OutOfRange {
        field: self.name,
        value,
        min: self.min,
        max: self.max,
      });
    }
    Ok(value)
  }

  fn validate_item(&self, item: &str) -> Result<(), CronError> {
    let (base, step) = match item.split_once('/') {
      Some((base, step)) => (base, Some(step)),
      None => (item, None),
    };

    if let Some(step) = step {
      let valid = !step.is_empty()
        && step.bytes().all(|b| b.is_ascii_digit())
        && step.parse::<u32>().is_ok_and(|s| s > 0);
      if !valid {
        return Err(CronError::InvalidStep {
          field: self.name,
          value: step.to_string(),
        });
      }
    }

    match base {
      "" => Err(CronError::Empty { field: self.name }),
      "*" => Ok(()),
      "?" if self.allows_question_mark && step.is_none() => Ok(()),
      _ => match base.split_once('-') {
        Some((start, end)) => {
          let start = self.value(start)?;
          let end = self.value(end)?;
          if start > end {
            return Err(CronError::InvalidRange {
              field: self.name,
              start,
              end,
            });
          }
          Ok(())
        }
        None => self.value(base).map(|_| ()),
      },
    }
  }

  fn validate(&self, field: &str) -> Result<(), CronError> {
    field.split(',').try_for_each(|item| self.validate_item(item))
  }
}

pub fn validate_cron_expression(expression: &str) -> Result<(), CronError> {
  let fields: Vec<&str> = expression.split_whitespace().collect();
  if fields.len() != FIELDS.len() {
    return Err(CronError::FieldCount(fields.len()));
  }
  FIELDS.iter().zip(fields).try_for_each(|(spec, field)| spec.validate(field))
}

pub fn validate_cron_steps(builder: &Builder) -> ValidationReport {
  let mut report = ValidationReport::default();

  for step in builder.steps().values().filter(|s| s.step_type() == StepType::Cron) {
    match step.config.cron.as_deref() {
      None => report.error(&step.entrypoint_path, step.name(), "Cron step is missing a cron expression"),
      Some(expression) => {
        if let Err(e) = validate_cron_expression(expression) {
          report.error(
            &step.entrypoint_path,
            step.name(),
            format!("Invalid cron expression \"{expression}\": {e}"),
          );
        }
      }
    }
  }

  report
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::step::Step;
  use crate::util::testutil::builder_with;

  mod expressions {
    use super::*;

    #[test]
    fn accepts_common_schedules() {
      for expr in [
        "* * * * *",
        "0 0 * * *",
        "*/15 * * * *",
        "0 9-17 * * MON-FRI",
        "30 2 1,15 * ?",
        "0 0 ? JAN,jul SUN",
        "5-55/10 */2 1-31/3 1-12 0-7",
        "  0   12 * * 7 ",
      ] {
        assert!(validate_cron_expression(expr).is_ok(), "{expr} should be valid");
      }
    }

    #[test]
    fn rejects_wrong_field_count() {
      assert_eq!(validate_cron_expression("* * * *"), Err(CronError::FieldCount(4)));
      assert_eq!(validate_cron_expression("0 0 * * * *"), Err(CronError::FieldCount(6)));
      assert_eq!(validate_cron_expression(""), Err(CronError::FieldCount(0)));
    }

    #[test]
    fn rejects_out_of_range_values() {
      assert!(matches!(
        validate_cron_expression("60 * * * *"),
        Err(CronError::OutOfRange { field: "minute", value: 60, .. })
      ));
      assert!(validate_cron_expression("* 24 * * *").is_err());
      assert!(validate_cron_expression("* * 0 * *").is_err());
      assert!(validate_cron_expression("* * * 13 *").is_err());
      assert!(validate_cron_expression("* * * * 8").is_err());
    }

    #[test]
    fn rejects_malformed_items() {
      assert!(validate_cron_expression("*/0 * * * *").is_err());
      assert!(validate_cron_expression("*/ * * * *").is_err());
      assert!(validate_cron_expression("1,,2 * * * *").is_err());
      assert!(validate_cron_expression("10-5 * * * *").is_err());
      assert!(validate_cron_expression("? * * * *").is_err());
      assert!(validate_cron_expression("* * * FOO *").is_err());
      assert!(validate_cron_expression("+5 * * * *").is_err());
      assert!(validate_cron_expression("a b c d e").is_err());
    }
  }

  #[test]
  fn reports_invalid_and_missing_expressions() {
    let mut missing = Step::cron("missing", "steps/m.step.ts", "");
    missing.cron = None;
    let builder = builder_with(vec![
      Step::cron("bad", "steps/b.step.ts", "61 * * * *"),
      Step::cron("good", "steps/g.step.ts", "0 * * * *"),
      missing,
    ]);

    let report = validate_cron_steps(&builder);
    assert_eq!(report.errors.len(), 2);
    assert_eq!(report.errors[0].step, "bad");
    assert!(
      report.errors[0]
        .message
        .starts_with("Invalid cron expression \"61 * * * *\"")
    );
    assert_eq!(report.errors[1].message, "Cron step is missing a cron expression");
  }
}
