//! A synthetic load generator for metadata stores.
//!
//! A benchmark is an ordered list of [`Workload`]s built from a [`Config`]. Each workload
//! synthesizes all of its requests up front from the current contents of the store, then a
//! [`ThreadRunner`] executes them on a fixed pool of worker threads and merges the per-thread
//! [`ThreadStats`] into one [`Report`].
//!
//! Workloads write or read types, artifacts, executions, contexts, events and context edges through
//! the [`MetadataStore`](mlmd_store::MetadataStore) trait. They run one at a time, in
//! configuration order.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod benchmark;
pub mod cli;
pub mod config;
mod error;
pub mod observability;
pub mod runner;
pub mod stats;
pub mod util;
pub mod workload;
pub mod workloads;

pub use crate::benchmark::Benchmark;
pub use crate::config::{Config, WorkloadConfig};
pub use crate::error::{Error, Result};
pub use crate::runner::ThreadRunner;
pub use crate::stats::{OpStats, Report, ThreadStats};
pub use crate::workload::{GeneratedWorkload, Generator, WorkItem, Workload};
