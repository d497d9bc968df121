//! Python dependency discovery.
//!
//! The engine only needs to know which third-party packages and which
//! project files a step imports. [`DependencyScanner`] is the seam; the
//! default [`ProcessScanner`] runs an embedded import scanner under the
//! configured interpreter and reads its JSON report from stdout.

use std::io::{self, Write};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tempfile::TempPath;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use crate::config::PythonConfig;
use crate::templates::PYTHON_SCANNER;

#[derive(Debug, Error)]
pub enum ScanError {
  #[error("failed to spawn dependency scanner `{program}`: {source}")]
  Spawn { program: String, source: io::Error },

  #[error("dependency scanner timed out after {0:?}")]
  Timeout(Duration),

  #[error("dependency scanner exited with code {code:?}: {stderr}")]
  Failed { code: Option<i32>, stderr: String },

  #[error("invalid dependency scanner output: {0}")]
  InvalidOutput(#[from] serde_json::Error),

  #[error("io error: {0}")]
  Io(#[from] io::Error),
}

/// What a step imports: third-party package names and project-relative files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
  #[serde(default)]
  pub packages: Vec<String>,
  #[serde(default)]
  pub files: Vec<String>,
}

#[async_trait]
pub trait DependencyScanner: Send + Sync {
  async fn scan(&self, project_dir: &Path, step_path: &Path) -> Result<ScanResult, ScanError>;
}

/// Runs the embedded import scanner as a subprocess, one per scan.
pub struct ProcessScanner {
  interpreter: String,
  script: TempPath,
  timeout: Duration,
}

impl ProcessScanner {
  /// Write the scanner script to a temporary file that lives as long as the scanner.
  pub fn new(interpreter: impl Into<String>, timeout: Duration) -> io::Result<Self> {
    let mut file = tempfile::Builder::new()
      .prefix("steppack-scan-")
      .suffix(".py")
      .tempfile()?;
    file.write_all(PYTHON_SCANNER.as_bytes())?;
    file.flush()?;

    Ok(Self {
      interpreter: interpreter.into(),
      script: file.into_temp_path(),
      timeout,
    })
  }

  pub fn from_config(config: &PythonConfig) -> io::Result<Self> {
    Self::new(config.interpreter.clone(), config.scan_timeout)
  }
}

#[async_trait]
impl DependencyScanner for ProcessScanner {
  async fn scan(&self, project_dir: &Path, step_path: &Path) -> Result<ScanResult, ScanError> {
    debug!(step = %step_path.display(), interpreter = %self.interpreter, "scanning python imports");

    let mut command = Command::new(&self.interpreter);
    command
      .arg(&*self.script)
      .arg(project_dir)
      .arg(step_path)
      .current_dir(project_dir)
      .stdin(Stdio::null())
      .kill_on_drop(true);

    let child = command.output();
    let output = match tokio::time::timeout(self.timeout, child).await {
      Ok(result) => result.map_err(|source| ScanError::Spawn {
        program: self.interpreter.clone(),
        source,
      })?,
      Err(_) => return Err(ScanError::Timeout(self.timeout)),
    };

    if !output.status.success() {
      return Err(ScanError::Failed {
        code: output.status.code(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
      });
    }

    let result: ScanResult = serde_json::from_slice(&output.stdout)?;
    debug!(
      step = %step_path.display(),
      packages = result.packages.len(),
      files = result.files.len(),
      "scan complete"
    );
    Ok(result)
  }
}
