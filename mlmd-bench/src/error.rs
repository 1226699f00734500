use mlmd_store::StoreError;
use thiserror::Error;

/// Errors that can occur while preparing or running a benchmark.
#[derive(Debug, Error)]
pub enum Error {
    /// An error returned by the metadata store.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A request or index that the workload cannot serve.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The store does not hold the data a workload needs, and it cannot be made up.
    #[error("failed precondition: {0}")]
    FailedPrecondition(String),

    /// The benchmark configuration is malformed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An operation was executed on a workload that has not been prepared.
    #[error("workload `{0}` is not set up")]
    NotSetUp(String),

    /// An operation kept failing until the retry limit was reached.
    #[error("operation {index} of `{workload}` failed after {attempts} attempts")]
    RetriesExhausted {
        /// Name of the workload.
        workload: String,
        /// Index of the work item.
        index: usize,
        /// Number of attempts made.
        attempts: u32,
        /// The error of the last attempt.
        #[source]
        source: Box<Error>,
    },

    /// A worker thread could not be started.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// A worker thread panicked.
    #[error("a worker thread of `{0}` panicked")]
    WorkerPanicked(String),

    /// Thread statistics could not be merged.
    #[error("cannot merge statistics: {0}")]
    Stats(String),
}

/// Result type for benchmark operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
