//! Validation driven by real bundle sizes and configured limits.

use steppack_lib::config::Limits;
use steppack_lib::step::Step;

use super::common::{CountingListener, TableScanner, TestProject};

const TWO_MB: usize = 2 * 1024 * 1024;

fn tight_limits() -> Limits {
  Limits {
    step_max_mb: 1,
    router_max_mb: 1,
    ..Limits::default()
  }
}

#[tokio::test]
async fn oversized_bundles_are_errors() {
  let project = TestProject::new();
  project.write("steps/heavy.step.rb", "def handler(i, c); end\n");
  project.write("vendor/bundle/blob.bin", &"0".repeat(TWO_MB));
  project.write("steps/light.step.ts", "export const handler = () => {}\n");
  project.write("steps/big_api.step.py", &format!("# {}\n", "x".repeat(TWO_MB)));

  let config = project.config().with_limits(tight_limits());
  let mut builder = project.builder_with_config(config, TableScanner::default());
  builder.add_step(Step::event("heavy", "steps/heavy.step.rb", &["t"])).unwrap();
  builder.add_step(Step::event("light", "steps/light.step.ts", &["t"])).unwrap();
  builder
    .add_step(Step::api("big-api", "steps/big_api.step.py", "GET", "/big"))
    .unwrap();

  let outcome = builder.build(&CountingListener::default()).await.unwrap();

  assert!(!outcome.success);
  assert_eq!(outcome.errors.len(), 2);
  assert_eq!(outcome.errors[0].step, "heavy");
  assert!(outcome.errors[0].message.starts_with("Step bundle is 2.00MB"));
  assert!(outcome.errors[0].message.ends_with("exceeding the maximum of 1MB"));
  assert_eq!(outcome.errors[1].relative_path, "router-python.zip");
  assert!(outcome.errors[1].message.contains("exceeding the maximum of 1MB"));
}

#[tokio::test]
async fn default_limits_accept_the_same_bundles() {
  let project = TestProject::new();
  project.write("steps/heavy.step.rb", "def handler(i, c); end\n");
  project.write("vendor/bundle/blob.bin", &"0".repeat(TWO_MB));

  let mut builder = project.builder(TableScanner::default());
  builder.add_step(Step::event("heavy", "steps/heavy.step.rb", &["t"])).unwrap();

  let outcome = builder.build(&CountingListener::default()).await.unwrap();
  assert!(outcome.success, "{:?}", outcome.errors);
}

#[tokio::test]
async fn validate_without_build_checks_configuration_only() {
  let project = TestProject::new();
  let mut builder = project.builder(TableScanner::default());
  builder
    .add_step(Step::cron("tick", "steps/tick.step.py", "*/0 * * * *"))
    .unwrap();
  builder
    .add_step(Step::event("tick", "steps/other.step.py", &["t"]))
    .unwrap();

  let outcome = builder.validate();
  assert!(!outcome.success);
  let messages: Vec<&str> = outcome.errors.iter().map(|e| e.message.as_str()).collect();
  assert_eq!(messages.len(), 2);
  assert!(messages[0].starts_with("Duplicate step names"));
  assert!(messages[1].starts_with("Invalid cron expression \"*/0 * * * *\""));
  assert!(!project.dist().exists());
}
