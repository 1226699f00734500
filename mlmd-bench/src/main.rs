//! Runs the benchmark described by a YAML configuration file.
//!
//! ```text
//! mlmd-bench -c config.yaml [--threads 8]
//! ```

fn main() -> anyhow::Result<()> {
    mlmd_bench::cli::execute()
}
