//! End-to-end tests for the build engine.

mod build_tests;
mod common;
mod validation_tests;
