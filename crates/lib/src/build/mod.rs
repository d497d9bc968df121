//! Step packaging.
//!
//! The [`Builder`] orchestrates a build invocation: it registers steps,
//! dispatches each one to the [`StepBuilder`] registered for its language and
//! records bundle sizes for the validators.
//!
//! # Submodules
//!
//! - [`builder`] - Registry, bounded worker pool and size bookkeeping
//! - [`node`], [`python`], [`csharp`], [`ruby`] - Per-language packaging strategies

pub mod builder;
pub mod csharp;
pub mod node;
pub mod python;
pub mod ruby;
mod types;

pub use builder::{BuildOutcome, Builder, StepFailure};
pub use types::*;
