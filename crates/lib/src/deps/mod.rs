//! Language-specific dependency resolution.

pub mod python;
