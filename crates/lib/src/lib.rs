//! steppack-lib: build and packaging engine for step functions.
//!
//! This crate turns parsed step definitions into deployable zip bundles:
//! - `Builder`: registers steps, dispatches them to per-language backends and
//!   records bundle sizes
//! - `Archiver`: streaming zip writer with size accounting
//! - `validate`: configuration and size checks run after every build
//! - `deps::python`: maps Python distribution names onto site-packages entries

pub mod archive;
pub mod build;
pub mod bundle;
pub mod config;
pub mod consts;
pub mod deps;
pub mod listener;
pub mod manifest;
pub mod scan;
pub mod step;
pub mod templates;
pub mod util;
pub mod validate;
