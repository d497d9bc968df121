//! Python package resolution against a pre-populated site-packages directory.
//!
//! Distribution names (what the scanner or a requirements file reports) do
//! not always match the importable module on disk. Resolution tries a lookup
//! table of known mismatches first, then an ordered list of pure candidate
//! generators. A package that cannot be found is logged and omitted.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::DirEntry;

use crate::archive::{ArchiveError, ArchiveSource, Archiver};

/// Produces alternative module spellings for a package name.
pub type CandidateGenerator = fn(&str) -> Vec<String>;

/// Tried in order; the first spelling that exists on disk wins.
pub const CANDIDATE_GENERATORS: &[CandidateGenerator] = &[
  as_is,
  hyphen_to_underscore,
  underscore_to_hyphen,
  lowercase,
  strip_python_prefix,
];

/// Distributions whose importable module name differs from the distribution name.
const KNOWN_MODULES: &[(&str, &[&str])] = &[
  ("beautifulsoup4", &["bs4"]),
  ("pyyaml", &["yaml"]),
  ("pillow", &["PIL"]),
  ("python-dateutil", &["dateutil"]),
  ("python-dotenv", &["dotenv"]),
  ("python-multipart", &["multipart", "python_multipart"]),
  ("scikit-learn", &["sklearn"]),
  ("scikit-image", &["skimage"]),
  ("opencv-python", &["cv2"]),
  ("opencv-python-headless", &["cv2"]),
  ("protobuf", &["google"]),
  ("pyjwt", &["jwt"]),
  ("psycopg2-binary", &["psycopg2"]),
  ("pymysql", &["pymysql"]),
  ("websocket-client", &["websocket"]),
  ("attrs", &["attr", "attrs"]),
  ("setuptools", &["setuptools", "pkg_resources"]),
  ("msgpack-python", &["msgpack"]),
  ("google-cloud-storage", &["google"]),
];

/// Directory names never copied out of a package.
const SKIPPED_DIRS: &[&str] = &["__pycache__", "tests", "test", "docs", "doc"];
const SKIPPED_DIR_SUFFIXES: &[&str] = &[".dist-info", ".egg-info"];
const SKIPPED_FILE_SUFFIXES: &[&str] = &[".pyc", ".pyo"];

fn as_is(name: &str) -> Vec<String> {
  vec![name.to_string()]
}

fn hyphen_to_underscore(name: &str) -> Vec<String> {
  vec![name.replace('-', "_")]
}

fn underscore_to_hyphen(name: &str) -> Vec<String> {
  vec![name.replace('_', "-")]
}

fn lowercase(name: &str) -> Vec<String> {
  let lower = name.to_lowercase();
  vec![lower.replace('-', "_"), lower]
}

fn strip_python_prefix(name: &str) -> Vec<String> {
  let lower = name.to_lowercase();
  ["python-", "python_"]
    .iter()
    .filter_map(|prefix| lower.strip_prefix(prefix))
    .flat_map(|rest| [rest.replace('-', "_"), rest.to_string()])
    .collect()
}

/// PEP 503 normalization, used for the lookup table.
fn normalize(name: &str) -> String {
  name.to_lowercase().replace('_', "-").replace('.', "-")
}

pub fn known_modules(package: &str) -> Option<&'static [&'static str]> {
  let normalized = normalize(package);
  KNOWN_MODULES
    .iter()
    .find(|(dist, _)| *dist == normalized)
    .map(|(_, modules)| *modules)
}

/// All candidate module names for `package`, deduplicated, in trial order.
pub fn candidate_names(package: &str) -> Vec<String> {
  let mut names: Vec<String> = Vec::new();
  for generate in CANDIDATE_GENERATORS {
    for name in generate(package) {
      if !name.is_empty() && !names.contains(&name) {
        names.push(name);
      }
    }
  }
  names
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedPackage {
  Directory(PathBuf),
  File(PathBuf),
}

impl ResolvedPackage {
  pub fn path(&self) -> &Path {
    match self {
      ResolvedPackage::Directory(path) | ResolvedPackage::File(path) => path,
    }
  }
}

fn probe(site_packages: &Path, module: &str) -> Option<ResolvedPackage> {
  let dir = site_packages.join(module);
  if dir.is_dir() {
    return Some(ResolvedPackage::Directory(dir));
  }
  let file = site_packages.join(format!("{module}.py"));
  if file.is_file() {
    return Some(ResolvedPackage::File(file));
  }
  None
}

/// Locate `package` inside `site_packages`, as a package directory or a single module file.
pub fn resolve(site_packages: &Path, package: &str) -> Option<ResolvedPackage> {
  if let Some(modules) = known_modules(package)
    && let Some(found) = modules.iter().find_map(|m| probe(site_packages, m))
  {
    debug!(package, path = %found.path().display(), "resolved from lookup table");
    return Some(found);
  }

  if let Some(found) = candidate_names(package).iter().find_map(|m| probe(site_packages, m)) {
    debug!(package, path = %found.path().display(), "resolved python package");
    return Some(found);
  }

  warn!(
    package,
    site_packages = %site_packages.display(),
    "python package not found in site-packages; it will be omitted from the bundle"
  );
  None
}

/// Whether a walked entry belongs in the bundle.
pub fn include_entry(entry: &DirEntry) -> bool {
  let name = entry.file_name().to_string_lossy();
  if entry.file_type().is_dir() {
    !SKIPPED_DIRS.contains(&&*name) && !SKIPPED_DIR_SUFFIXES.iter().any(|s| name.ends_with(s))
  } else {
    !SKIPPED_FILE_SUFFIXES.iter().any(|s| name.ends_with(s))
  }
}

/// Copy `package` into the archive root. Returns false if it could not be resolved.
pub fn add_package(archiver: &mut Archiver, site_packages: &Path, package: &str) -> Result<bool, ArchiveError> {
  let Some(resolved) = resolve(site_packages, package) else {
    return Ok(false);
  };

  let name = resolved
    .path()
    .file_name()
    .map(|n| n.to_string_lossy().into_owned())
    .unwrap_or_else(|| package.to_string());

  match resolved {
    ResolvedPackage::Directory(path) => archiver.append_directory_filtered(&path, &name, include_entry)?,
    ResolvedPackage::File(path) => archiver.append(ArchiveSource::File(path), &name)?,
  }
  Ok(true)
}
