//! Build manifest.
//!
//! After the build phase a manifest describing every bundle that was produced
//! is written next to the bundles, so deployment tooling can pick up paths,
//! sizes and checksums without re-reading the step definitions.

mod types;

pub use types::*;
