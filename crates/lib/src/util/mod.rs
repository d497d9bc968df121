//! Shared utilities.
//!
//! Bundle hashing and test helpers.

pub mod hash;

#[cfg(test)]
pub mod testutil;
