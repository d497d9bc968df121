use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StepError {
  #[error("unsupported step language for {}", path.display())]
  UnsupportedLanguage { path: PathBuf },

  #[error("step file {} is outside the project directory {}", path.display(), project_dir.display())]
  OutsideProject { path: PathBuf, project_dir: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepType {
  Api,
  Event,
  Cron,
}

impl fmt::Display for StepType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      StepType::Api => write!(f, "api"),
      StepType::Event => write!(f, "event"),
      StepType::Cron => write!(f, "cron"),
    }
  }
}

/// Language runtime a step is written for, derived from its file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
  Node,
  Python,
  CSharp,
  Ruby,
}

impl Language {
  pub const ALL: [Language; 4] = [Language::Node, Language::Python, Language::CSharp, Language::Ruby];

  pub fn from_path(path: &Path) -> Option<Self> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
      "js" | "ts" | "mjs" | "cjs" | "mts" | "cts" => Some(Language::Node),
      "py" => Some(Language::Python),
      "cs" => Some(Language::CSharp),
      "rb" => Some(Language::Ruby),
      _ => None,
    }
  }

  /// Tag used in dist paths and router bundle names.
  pub fn tag(self) -> &'static str {
    match self {
      Language::Node => "node",
      Language::Python => "python",
      Language::CSharp => "csharp",
      Language::Ruby => "ruby",
    }
  }

  /// Bundle path of the shared API router, relative to the dist directory.
  pub fn router_bundle_path(self) -> String {
    format!("router-{}.zip", self.tag())
  }
}

impl fmt::Display for Language {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.tag())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
  pub method: String,
  pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerConfig {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub ram: Option<u32>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub timeout: Option<u32>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub cpu: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueType {
  #[default]
  Standard,
  Fifo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueConfig {
  #[serde(rename = "type", default)]
  pub queue_type: QueueType,
  /// Signed so that negative values from the parser reach the validator.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub max_retries: Option<i64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub visibility_timeout: Option<u32>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub message_group_id: Option<String>,
}

/// Resource sizing and queueing policy. Only applied to event steps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InfrastructureConfig {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub handler: Option<HandlerConfig>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub queue: Option<QueueConfig>,
}

impl InfrastructureConfig {
  pub fn with_handler(mut self, ram: u32, timeout: u32) -> Self {
    self.handler = Some(HandlerConfig {
      ram: Some(ram),
      timeout: Some(timeout),
      cpu: None,
    });
    self
  }

  pub fn with_queue(mut self, queue: QueueConfig) -> Self {
    self.queue = Some(queue);
    self
  }
}

/// A parsed step definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
  pub name: String,
  #[serde(rename = "type")]
  pub step_type: StepType,
  pub file_path: PathBuf,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub api: Option<ApiConfig>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub cron: Option<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub subscribes: Vec<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub emits: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub input_schema: Option<serde_json::Value>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub infrastructure: Option<InfrastructureConfig>,
}

impl Step {
  fn new(name: &str, step_type: StepType, file_path: impl Into<PathBuf>) -> Self {
    Self {
      name: name.to_string(),
      step_type,
      file_path: file_path.into(),
      api: None,
      cron: None,
      subscribes: Vec::new(),
      emits: Vec::new(),
      input_schema: None,
      infrastructure: None,
    }
  }

  pub fn api(name: &str, file_path: impl Into<PathBuf>, method: &str, path: &str) -> Self {
    let mut step = Self::new(name, StepType::Api, file_path);
    step.api = Some(ApiConfig {
      method: method.to_string(),
      path: path.to_string(),
    });
    step
  }

  pub fn event(name: &str, file_path: impl Into<PathBuf>, subscribes: &[&str]) -> Self {
    let mut step = Self::new(name, StepType::Event, file_path);
    step.subscribes = subscribes.iter().map(|s| s.to_string()).collect();
    step
  }

  pub fn cron(name: &str, file_path: impl Into<PathBuf>, expression: &str) -> Self {
    let mut step = Self::new(name, StepType::Cron, file_path);
    step.cron = Some(expression.to_string());
    step
  }

  pub fn with_infrastructure(mut self, infrastructure: InfrastructureConfig) -> Self {
    self.infrastructure = Some(infrastructure);
    self
  }

  pub fn with_input_schema(mut self, schema: serde_json::Value) -> Self {
    self.input_schema = Some(schema);
    self
  }

  pub fn language(&self) -> Option<Language> {
    Language::from_path(&self.file_path)
  }
}

/// A step together with the paths the build engine needs to package it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildStepConfig {
  pub language: Language,
  /// Path of the step source relative to the project directory, `/`-separated.
  pub entrypoint_path: String,
  /// Path of the step bundle relative to the dist directory.
  pub bundle_path: String,
  /// Absolute path of the step source.
  pub file_path: PathBuf,
  pub config: Step,
}

impl BuildStepConfig {
  pub fn new(project_dir: &Path, step: Step) -> Result<Self, StepError> {
    let file_path = if step.file_path.is_absolute() {
      step.file_path.clone()
    } else {
      project_dir.join(&step.file_path)
    };

    let language = Language::from_path(&file_path).ok_or_else(|| StepError::UnsupportedLanguage {
      path: file_path.clone(),
    })?;

    let relative = file_path
      .strip_prefix(project_dir)
      .map_err(|_| StepError::OutsideProject {
        path: file_path.clone(),
        project_dir: project_dir.to_path_buf(),
      })?;
    let entrypoint_path = to_archive_path(relative);
    let bundle_path = format!("{}/{}.zip", language.tag(), strip_extension(&entrypoint_path));

    Ok(Self {
      language,
      entrypoint_path,
      bundle_path,
      file_path,
      config: step,
    })
  }

  pub fn name(&self) -> &str {
    &self.config.name
  }

  pub fn step_type(&self) -> StepType {
    self.config.step_type
  }

  pub fn is_api(&self) -> bool {
    self.config.step_type == StepType::Api
  }
}

/// A stream definition file. Streams are listed in the manifest but not bundled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamConfig {
  pub name: String,
  pub file_path: PathBuf,
}

/// Join path components with `/` regardless of platform.
pub fn to_archive_path(path: &Path) -> String {
  path
    .components()
    .filter_map(|c| match c {
      Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
      _ => None,
    })
    .collect::<Vec<_>>()
    .join("/")
}

/// Drop the last extension of a `/`-separated path (`steps/a.step.ts` -> `steps/a.step`).
pub fn strip_extension(path: &str) -> &str {
  let file_start = path.rfind('/').map(|i| i + 1).unwrap_or(0);
  match path[file_start..].rfind('.') {
    Some(0) | None => path,
    Some(dot) => &path[..file_start + dot],
  }
}
