//! Full builds over a temporary project.

use steppack_lib::build::BuildError;
use steppack_lib::manifest::BuildManifest;
use steppack_lib::step::{InfrastructureConfig, Language, Step, StreamConfig};

use super::common::{CountingListener, TableScanner, TestProject, zip_entries};

fn sample_project() -> TestProject {
  let project = TestProject::new();
  project.write("steps/orders/process.step.py", "from lib.util import fmt\nimport yaml\n");
  project.write("steps/lib/util.py", "def fmt(x): return x\n");
  project.write("site-packages/yaml/__init__.py", "");
  project.write("site-packages/yaml/__pycache__/x.pyc", "junk");
  project.write("steps/nightly.step.ts", "export const handler = async () => {}\n");
  project.write("steps/users/list.step.py", "async def handler(req, ctx): return {}\n");
  project.write("steps/users/index.step.py", "async def handler(req, ctx): return {}\n");
  project
}

fn sample_scanner() -> TableScanner {
  TableScanner::default().with("process.step.py", &["pyyaml"], &["steps/lib/util.py"])
}

fn sample_steps() -> Vec<Step> {
  vec![
    Step::event("process-order", "steps/orders/process.step.py", &["order.created"])
      .with_infrastructure(InfrastructureConfig::default().with_handler(64, 30)),
    Step::cron("nightly", "steps/nightly.step.ts", "0 0 * * *"),
    Step::api("list-users", "steps/users/list.step.py", "GET", "/users"),
    Step::api("index-users", "steps/users/index.step.py", "get", "/users"),
  ]
}

#[tokio::test]
async fn full_build_packages_everything_then_reports_all_errors() {
  let project = sample_project();
  let mut builder = project.builder(sample_scanner());
  for step in sample_steps() {
    builder.add_step(step).unwrap();
  }

  let listener = CountingListener::default();
  let outcome = builder.build(&listener).await.unwrap();

  assert!(!outcome.success);
  assert!(outcome.failures.is_empty());
  assert_eq!(outcome.errors.len(), 2);
  assert!(outcome.errors[0].message.starts_with("Endpoint conflict: GET /users"));
  assert_eq!(outcome.errors[0].step, "list-users");
  assert_eq!(outcome.errors[1].message, "RAM must be at least 128 MB");
  assert_eq!(outcome.errors[1].relative_path, "steps/orders/process.step.py");
  assert!(outcome.warnings.is_empty());

  assert_eq!(CountingListener::count(&listener.started), 4);
  assert_eq!(CountingListener::count(&listener.ended), 4);
  assert_eq!(CountingListener::count(&listener.failed), 0);
  assert_eq!(CountingListener::count(&listener.error_batches), 1);

  assert_eq!(
    zip_entries(&project.dist().join("python/steps/orders/process.step.zip")),
    vec!["steps/lib/util.py", "steps/orders/process_step.py", "yaml/__init__.py"]
  );
  assert_eq!(
    zip_entries(&project.dist().join("node/steps/nightly.step.zip")),
    vec!["index.js"]
  );

  let router = zip_entries(&project.dist().join("router-python.zip"));
  assert!(router.contains(&"router.py".to_string()));
  assert!(router.contains(&"steps/users/list_step.py".to_string()));
  assert!(router.contains(&"steps/users/index_step.py".to_string()));
  assert!(!project.dist().join("python/steps/users/list.step.zip").exists());

  let manifest = BuildManifest::load(&outcome.manifest_path).unwrap();
  assert_eq!(manifest.steps.len(), 2);
  assert_eq!(manifest.routers.len(), 1);
  assert_eq!(manifest.routers[0].language, Language::Python);
  assert_eq!(manifest.routers[0].routes.len(), 2);
}

#[tokio::test]
async fn validation_after_build_is_idempotent() {
  let project = sample_project();
  let mut builder = project.builder(sample_scanner());
  for step in sample_steps() {
    builder.add_step(step).unwrap();
  }

  let outcome = builder.build(&CountingListener::default()).await.unwrap();
  let again = builder.validate();
  assert_eq!(again.errors, outcome.errors);
  assert_eq!(again.warnings, outcome.warnings);
  assert_eq!(builder.validate(), again);
}

#[tokio::test]
async fn clean_project_succeeds() {
  let project = TestProject::new();
  project.write("steps/greet.step.rb", "def handler(input, ctx); end\n");
  project.write("steps/hello.step.ts", "export const handler = async () => ({ body: 'hi' })\n");
  project.write("vendor/bundle/ruby/3.3.0/gems/rack/rack.rb", "module Rack; end\n");

  let mut builder = project.builder(TableScanner::default());
  builder
    .add_step(Step::event("greet", "steps/greet.step.rb", &["user.created"]))
    .unwrap();
  builder
    .add_step(Step::api("hello", "steps/hello.step.ts", "GET", "/hello"))
    .unwrap();
  builder.register_stream(StreamConfig {
    name: "greetings".into(),
    file_path: "streams/greetings.stream.ts".into(),
  });

  let outcome = builder.build(&CountingListener::default()).await.unwrap();

  assert!(outcome.success, "{:?}", outcome.errors);
  assert_eq!(
    zip_entries(&project.dist().join("ruby/steps/greet.step.zip")),
    vec!["steps/greet.step.rb", "vendor/bundle/ruby/3.3.0/gems/rack/rack.rb"]
  );
  assert_eq!(zip_entries(&project.dist().join("router-node.zip")), vec!["index.js"]);

  let manifest = BuildManifest::load(&outcome.manifest_path).unwrap();
  assert_eq!(manifest.streams.len(), 1);
  assert_eq!(manifest.steps[0].sha256.0.len(), 64);
}

#[tokio::test]
async fn missing_csharp_runtime_aborts_the_build() {
  let project = TestProject::new();
  project.write("steps/Charge.step.cs", "class Charge {}");
  project.write("steps/notify.step.ts", "export const handler = () => {}\n");

  let mut builder = project.builder(TableScanner::default());
  builder
    .add_step(Step::event("charge", "steps/Charge.step.cs", &["payment"]))
    .unwrap();
  builder
    .add_step(Step::event("notify", "steps/notify.step.ts", &["payment"]))
    .unwrap();

  let err = builder.build(&CountingListener::default()).await.unwrap_err();
  assert!(matches!(err, BuildError::RuntimeMissing { language: Language::CSharp, .. }));
  assert!(!project.dist().join("steppack.manifest.json").exists());
}

#[tokio::test]
async fn failed_step_is_reported_and_left_out_of_manifest() {
  let project = TestProject::new();
  project.write("steps/ok.step.ts", "export const handler = () => {}\n");

  let mut builder = project.builder(TableScanner::default());
  builder.add_step(Step::event("ok", "steps/ok.step.ts", &["t"])).unwrap();
  // Source file is never written, so packaging fails.
  builder
    .add_step(Step::event("gone", "steps/gone.step.rb", &["t"]))
    .unwrap();

  let listener = CountingListener::default();
  let outcome = builder.build(&listener).await.unwrap();

  assert!(!outcome.success);
  assert!(outcome.errors.is_empty());
  assert_eq!(outcome.failures.len(), 1);
  assert_eq!(outcome.failures[0].step, "gone");
  assert_eq!(CountingListener::count(&listener.failed), 1);

  let manifest = BuildManifest::load(&outcome.manifest_path).unwrap();
  let names: Vec<&str> = manifest.steps.iter().map(|s| s.name.as_str()).collect();
  assert_eq!(names, vec!["ok"]);
}
