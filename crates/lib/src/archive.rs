//! Streaming zip writer with size accounting.
//!
//! An [`Archiver`] writes deflate-compressed entries (level 9) straight to
//! its output file and keeps a running tally of the uncompressed bytes it was
//! handed. [`Archiver::finalize`] closes the zip and reports both sizes; it is
//! the only point at which the compressed size is known.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::step::to_archive_path;

const COMPRESSION_LEVEL: i64 = 9;

#[derive(Debug, Error)]
pub enum ArchiveError {
  #[error("failed to create archive {}: {source}", path.display())]
  Create { path: PathBuf, source: io::Error },

  #[error("failed to read {}: {source}", path.display())]
  Read { path: PathBuf, source: io::Error },

  #[error("failed to walk directory {}: {source}", path.display())]
  Walk { path: PathBuf, source: walkdir::Error },

  #[error("zip error: {0}")]
  Zip(#[from] zip::result::ZipError),

  #[error("io error: {0}")]
  Io(#[from] io::Error),
}

/// Sizes of a finished archive, in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveResult {
  pub compressed_size: u64,
  pub uncompressed_size: u64,
}

/// Content accepted by [`Archiver::append`].
#[derive(Debug, Clone)]
pub enum ArchiveSource {
  Text(String),
  Bytes(Vec<u8>),
  /// Streamed from disk; sized with a filesystem stat.
  File(PathBuf),
}

impl From<&str> for ArchiveSource {
  fn from(value: &str) -> Self {
    ArchiveSource::Text(value.to_string())
  }
}

impl From<String> for ArchiveSource {
  fn from(value: String) -> Self {
    ArchiveSource::Text(value)
  }
}

impl From<Vec<u8>> for ArchiveSource {
  fn from(value: Vec<u8>) -> Self {
    ArchiveSource::Bytes(value)
  }
}

impl From<&[u8]> for ArchiveSource {
  fn from(value: &[u8]) -> Self {
    ArchiveSource::Bytes(value.to_vec())
  }
}

pub struct Archiver {
  output_path: PathBuf,
  writer: ZipWriter<File>,
  options: SimpleFileOptions,
  uncompressed_size: u64,
  entries: HashSet<String>,
}

impl Archiver {
  /// Create the output file (and its parent directories) and start a zip stream.
  pub fn create(output_path: impl Into<PathBuf>) -> Result<Self, ArchiveError> {
    let output_path = output_path.into();
    if let Some(parent) = output_path.parent() {
      fs::create_dir_all(parent).map_err(|source| ArchiveError::Create {
        path: output_path.clone(),
        source,
      })?;
    }
    let file = File::create(&output_path).map_err(|source| ArchiveError::Create {
      path: output_path.clone(),
      source,
    })?;

    debug!(path = %output_path.display(), "creating archive");

    Ok(Self {
      output_path,
      writer: ZipWriter::new(file),
      options: SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(COMPRESSION_LEVEL)),
      uncompressed_size: 0,
      entries: HashSet::new(),
    })
  }

  pub fn output_path(&self) -> &Path {
    &self.output_path
  }

  /// Running total of uncompressed bytes appended so far.
  pub fn uncompressed_size(&self) -> u64 {
    self.uncompressed_size
  }

  pub fn contains(&self, archive_path: &str) -> bool {
    self.entries.contains(archive_path)
  }

  /// Append one entry. The first write to an archive path wins; later ones are skipped.
  pub fn append(&mut self, content: impl Into<ArchiveSource>, archive_path: &str) -> Result<(), ArchiveError> {
    if self.contains(archive_path) {
      debug!(entry = archive_path, "skipping duplicate archive entry");
      return Ok(());
    }

    match content.into() {
      ArchiveSource::Text(text) => self.write_bytes(text.as_bytes(), archive_path)?,
      ArchiveSource::Bytes(bytes) => self.write_bytes(&bytes, archive_path)?,
      ArchiveSource::File(path) => {
        let size = fs::metadata(&path)
          .map_err(|source| ArchiveError::Read {
            path: path.clone(),
            source,
          })?
          .len();
        self.write_file(&path, archive_path)?;
        self.uncompressed_size += size;
      }
    }

    self.entries.insert(archive_path.to_string());
    Ok(())
  }

  /// Append every file under `source` at `target`. Missing or non-directory
  /// sources are a no-op.
  pub fn append_directory(&mut self, source: &Path, target: &str) -> Result<(), ArchiveError> {
    self.append_directory_filtered(source, target, |_| true)
  }

  /// Like [`Archiver::append_directory`], but only entries accepted by `filter`
  /// are walked. Rejecting a directory prunes its whole subtree.
  pub fn append_directory_filtered<F>(&mut self, source: &Path, target: &str, filter: F) -> Result<(), ArchiveError>
  where
    F: Fn(&DirEntry) -> bool,
  {
    if !source.is_dir() {
      debug!(path = %source.display(), "directory not found, skipping");
      return Ok(());
    }

    // Walk ahead of writing so the whole directory's size is accounted at once.
    let mut files = Vec::new();
    let mut total = 0u64;
    let walker = WalkDir::new(source)
      .follow_links(true)
      .sort_by_file_name()
      .into_iter()
      .filter_entry(|e| e.depth() == 0 || filter(e));

    for entry in walker {
      let entry = entry.map_err(|source_err| ArchiveError::Walk {
        path: source.to_path_buf(),
        source: source_err,
      })?;
      if !entry.file_type().is_file() {
        continue;
      }

      let relative = entry.path().strip_prefix(source).unwrap_or(entry.path());
      let archive_path = join_archive_path(target, &to_archive_path(relative));
      if self.contains(&archive_path) {
        continue;
      }

      let size = entry
        .metadata()
        .map_err(|source_err| ArchiveError::Walk {
          path: entry.path().to_path_buf(),
          source: source_err,
        })?
        .len();
      total += size;
      files.push((entry.into_path(), archive_path));
    }

    debug!(path = %source.display(), files = files.len(), bytes = total, "appending directory");
    self.uncompressed_size += total;

    for (path, archive_path) in files {
      self.write_file(&path, &archive_path)?;
      self.entries.insert(archive_path);
    }

    Ok(())
  }

  /// Finish the zip stream and report the final sizes.
  pub fn finalize(self) -> Result<ArchiveResult, ArchiveError> {
    let mut file = self.writer.finish()?;
    file.flush()?;
    let compressed_size = file.metadata()?.len();

    debug!(
      path = %self.output_path.display(),
      compressed = compressed_size,
      uncompressed = self.uncompressed_size,
      "archive finalized"
    );

    Ok(ArchiveResult {
      compressed_size,
      uncompressed_size: self.uncompressed_size,
    })
  }

  fn write_bytes(&mut self, bytes: &[u8], archive_path: &str) -> Result<(), ArchiveError> {
    self.writer.start_file(archive_path, self.options)?;
    self.writer.write_all(bytes)?;
    self.uncompressed_size += bytes.len() as u64;
    Ok(())
  }

  fn write_file(&mut self, path: &Path, archive_path: &str) -> Result<(), ArchiveError> {
    let mut file = File::open(path).map_err(|source| ArchiveError::Read {
      path: path.to_path_buf(),
      source,
    })?;

    let options = file_options(self.options, &file);
    self.writer.start_file(archive_path, options)?;
    io::copy(&mut file, &mut self.writer).map_err(|source| ArchiveError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    Ok(())
  }
}

/// Keep the source file's mode so bundled runtimes stay executable.
#[cfg(unix)]
fn file_options(options: SimpleFileOptions, file: &File) -> SimpleFileOptions {
  use std::os::unix::fs::PermissionsExt;

  match file.metadata() {
    Ok(meta) => options.unix_permissions(meta.permissions().mode() & 0o777),
    Err(_) => options,
  }
}

#[cfg(not(unix))]
fn file_options(options: SimpleFileOptions, _file: &File) -> SimpleFileOptions {
  options
}

pub fn join_archive_path(target: &str, relative: &str) -> String {
  let target = target.trim_matches('/');
  if target.is_empty() {
    relative.to_string()
  } else if relative.is_empty() {
    target.to_string()
  } else {
    format!("{target}/{relative}")
  }
}
