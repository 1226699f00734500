//! Test utilities for the metadata store and the benchmark.
//!
//! See the modules for all available utilities.

pub mod store;
pub mod tracing;
