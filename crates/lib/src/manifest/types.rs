//! Manifest types.
//!
//! The manifest lists built steps, language routers and registered streams.
//! Steps whose build failed have no recorded size and are left out.
//!
//! # Example
//!
//! ```json
//! {
//!   "steps": [
//!     {
//!       "name": "process-order",
//!       "type": "event",
//!       "language": "python",
//!       "entrypointPath": "steps/process.step.py",
//!       "bundlePath": "python/steps/process.step.zip",
//!       "compressedSize": 1234,
//!       "uncompressedSize": 5678,
//!       "sha256": "b94d27b9..."
//!     }
//!   ],
//!   "routers": [],
//!   "streams": []
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::build::{BuildError, Builder, RouteEntry};
use crate::consts::MANIFEST_FILENAME;
use crate::step::{Language, StepType, StreamConfig};
use crate::util::hash::{ContentHash, hash_file};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestStep {
  pub name: String,
  #[serde(rename = "type")]
  pub step_type: StepType,
  pub language: Language,
  pub entrypoint_path: String,
  pub bundle_path: String,
  pub compressed_size: u64,
  pub uncompressed_size: u64,
  pub sha256: ContentHash,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestRouter {
  pub language: Language,
  pub bundle_path: String,
  pub entrypoint_path: String,
  pub routes: Vec<RouteEntry>,
  pub compressed_size: u64,
  pub uncompressed_size: u64,
  pub sha256: ContentHash,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildManifest {
  pub steps: Vec<ManifestStep>,
  pub routers: Vec<ManifestRouter>,
  pub streams: Vec<StreamConfig>,
}

impl BuildManifest {
  /// Collect every bundle recorded by `builder`, hashing each from the dist directory.
  pub fn from_builder(builder: &Builder) -> Result<Self, BuildError> {
    let dist_dir = &builder.config().dist_dir;
    let mut manifest = BuildManifest::default();

    for (path, step) in builder.steps() {
      let (Some(compressed), Some(uncompressed)) = (
        builder.step_compressed_sizes().get(path),
        builder.step_uncompressed_sizes().get(path),
      ) else {
        continue;
      };
      manifest.steps.push(ManifestStep {
        name: step.name().to_string(),
        step_type: step.step_type(),
        language: step.language,
        entrypoint_path: step.entrypoint_path.clone(),
        bundle_path: step.bundle_path.clone(),
        compressed_size: *compressed,
        uncompressed_size: *uncompressed,
        sha256: hash_file(&dist_dir.join(&step.bundle_path))?,
      });
    }

    for (language, router) in builder.routers() {
      manifest.routers.push(ManifestRouter {
        language: *language,
        bundle_path: router.bundle_path.clone(),
        entrypoint_path: router.entrypoint_path.clone(),
        routes: router.routes.clone(),
        compressed_size: router.archive.compressed_size,
        uncompressed_size: router.archive.uncompressed_size,
        sha256: hash_file(&dist_dir.join(&router.bundle_path))?,
      });
    }

    manifest.streams = builder.streams().values().cloned().collect();
    Ok(manifest)
  }

  /// Write the manifest into `dist_dir` atomically. Returns the manifest path.
  pub fn write(&self, dist_dir: &Path) -> Result<PathBuf, BuildError> {
    fs::create_dir_all(dist_dir)?;
    let path = dist_dir.join(MANIFEST_FILENAME);
    let temp_path = dist_dir.join(format!("{MANIFEST_FILENAME}.tmp"));

    let content = serde_json::to_string_pretty(self)?;
    fs::write(&temp_path, content)?;
    fs::rename(&temp_path, &path)?;

    debug!(path = %path.display(), steps = self.steps.len(), routers = self.routers.len(), "manifest written");
    Ok(path)
  }

  pub fn load(path: &Path) -> Result<Self, BuildError> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
  }
}
