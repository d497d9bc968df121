//! Step definitions consumed by the build engine.
//!
//! A [`Step`] is produced by an external step-file parser and arrives here as
//! trusted, shape-validated JSON. The engine wraps each one in a
//! [`BuildStepConfig`] carrying the paths needed to package it.

mod types;

pub use types::*;
