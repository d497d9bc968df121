//! JavaScript/TypeScript module bundling.
//!
//! Node steps are shipped as a single self-contained `index.js`. The
//! [`ModuleBundler`] trait hides how that file is produced; the default
//! [`CommandBundler`] shells out to an esbuild-compatible program.

use std::io;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use crate::config::NodeConfig;

#[derive(Debug, Error)]
pub enum BundleError {
  #[error("failed to spawn bundler `{program}`: {source}")]
  Spawn { program: String, source: io::Error },

  #[error("bundling {} timed out after {timeout:?}", entry.display())]
  Timeout { entry: std::path::PathBuf, timeout: Duration },

  #[error("bundling {} failed with exit code {code:?}: {stderr}", entry.display())]
  Failed {
    entry: std::path::PathBuf,
    code: Option<i32>,
    stderr: String,
  },

  #[error("bundler produced no output at {}", path.display())]
  MissingOutput { path: std::path::PathBuf },
}

#[async_trait]
pub trait ModuleBundler: Send + Sync {
  /// Bundle `entry` and everything it imports into `out_file`.
  async fn bundle(&self, entry: &Path, out_file: &Path) -> Result<(), BundleError>;
}

/// Runs an esbuild-compatible CLI for each bundle.
#[derive(Debug, Clone)]
pub struct CommandBundler {
  program: String,
  timeout: Duration,
}

impl CommandBundler {
  pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
    Self {
      program: program.into(),
      timeout,
    }
  }

  pub fn from_config(config: &NodeConfig) -> Self {
    Self::new(config.bundler_program.clone(), config.bundle_timeout)
  }
}

#[async_trait]
impl ModuleBundler for CommandBundler {
  async fn bundle(&self, entry: &Path, out_file: &Path) -> Result<(), BundleError> {
    debug!(entry = %entry.display(), out = %out_file.display(), program = %self.program, "bundling module");

    let mut command = Command::new(&self.program);
    command
      .arg(entry)
      .arg("--bundle")
      .arg("--platform=node")
      .arg("--format=cjs")
      .arg("--target=node20")
      .arg(format!("--outfile={}", out_file.display()))
      .stdin(Stdio::null())
      .kill_on_drop(true);
    if let Some(dir) = entry.parent() {
      command.current_dir(dir);
    }

    let output = match tokio::time::timeout(self.timeout, command.output()).await {
      Ok(result) => result.map_err(|source| BundleError::Spawn {
        program: self.program.clone(),
        source,
      })?,
      Err(_) => {
        return Err(BundleError::Timeout {
          entry: entry.to_path_buf(),
          timeout: self.timeout,
        });
      }
    };

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
      return Err(BundleError::Failed {
        entry: entry.to_path_buf(),
        code: output.status.code(),
        stderr,
      });
    }

    if !out_file.is_file() {
      return Err(BundleError::MissingOutput {
        path: out_file.to_path_buf(),
      });
    }

    Ok(())
  }
}
