//! Executes the workloads of a benchmark on a fixed pool of worker threads.

use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use mlmd_store::ConnectionConfig;

use crate::benchmark::Benchmark;
use crate::config::ThreadEnvConfig;
use crate::stats::{Report, ThreadStats};
use crate::workload::Workload;
use crate::{Error, Result};

/// Runs workloads one after another, each on `num_threads` worker threads.
///
/// For every workload the runner prepares it on a dedicated connection, splits its operations into
/// one contiguous index range per thread, executes all ranges concurrently with one connection per
/// thread, tears the workload down, and merges the per-thread statistics into a [`Report`].
///
/// With `N` operations and `T` threads, every thread executes `N / T` operations. The remaining
/// `N % T` operations are skipped.
#[derive(Debug)]
pub struct ThreadRunner {
    mlmd_config: ConnectionConfig,
    num_threads: usize,
    max_attempts: Option<u32>,
    show_progress: bool,
}

impl ThreadRunner {
    /// Creates a runner connecting to the store described by `mlmd_config`.
    pub fn new(mlmd_config: ConnectionConfig, thread_env_config: &ThreadEnvConfig) -> Result<Self> {
        if thread_env_config.num_threads == 0 {
            return Err(Error::InvalidConfig("num_threads must be at least 1".into()));
        }
        if thread_env_config.max_attempts == Some(0) {
            return Err(Error::InvalidConfig("max_attempts must be at least 1".into()));
        }

        Ok(Self {
            mlmd_config,
            num_threads: thread_env_config.num_threads,
            max_attempts: thread_env_config.max_attempts,
            show_progress: true,
        })
    }

    /// Enables or disables the progress bar. It is enabled by default.
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Runs all workloads of `benchmark` in order and returns their reports.
    pub fn run(&self, benchmark: &mut Benchmark) -> Result<Vec<Report>> {
        self.run_with(benchmark, |_| {})
    }

    /// Runs all workloads of `benchmark` in order, passing each report to `on_report` as soon as
    /// its workload has finished.
    ///
    /// The first failing workload aborts the run.
    pub fn run_with(
        &self,
        benchmark: &mut Benchmark,
        mut on_report: impl FnMut(&Report),
    ) -> Result<Vec<Report>> {
        let mut reports = Vec::with_capacity(benchmark.len());
        for (workload, num_operations) in benchmark.workloads_mut() {
            let report = self.run_workload(workload.as_mut(), *num_operations)?;
            on_report(&report);
            reports.push(report);
        }
        Ok(reports)
    }

    /// Prepares, executes and tears down a single workload.
    pub fn run_workload(&self, workload: &mut dyn Workload, num_operations: usize) -> Result<Report> {
        let name = workload.name().to_owned();
        tracing::info!(
            workload = %name,
            num_operations,
            num_threads = self.num_threads,
            "running workload"
        );

        {
            let store = mlmd_store::connect(&self.mlmd_config)?;
            workload.prepare(store.as_ref())?;
        }

        let ops_per_thread = num_operations / self.num_threads;
        let skipped = num_operations % self.num_threads;
        if skipped > 0 {
            tracing::warn!(
                workload = %name,
                skipped,
                "operations are not divisible by the number of threads, skipping the remainder"
            );
        }

        let progress = self.progress_bar(&name, (ops_per_thread * self.num_threads) as u64);
        let total_done = AtomicU64::new(0);

        let results = {
            let workload: &dyn Workload = &*workload;
            let progress = &progress;
            let total_done = &total_done;

            thread::scope(|scope| -> Result<Vec<Result<ThreadStats>>> {
                let mut handles = Vec::with_capacity(self.num_threads);
                for worker in 0..self.num_threads {
                    let range = worker * ops_per_thread..(worker + 1) * ops_per_thread;
                    let handle = thread::Builder::new()
                        .name(format!("mlmd-bench-{worker}"))
                        .spawn_scoped(scope, move || {
                            self.run_thread(workload, range, total_done, progress)
                        })?;
                    handles.push(handle);
                }

                Ok(handles
                    .into_iter()
                    .map(|handle| {
                        handle
                            .join()
                            .unwrap_or_else(|_| Err(Error::WorkerPanicked(name.clone())))
                    })
                    .collect())
            })
        };

        progress.finish_and_clear();
        workload.teardown();

        let mut merged = ThreadStats::new();
        for stats in results? {
            merged.merge(&stats?)?;
        }

        let report = merged.report(name);
        tracing::info!(
            workload = %report.name,
            operations = report.operations,
            failures = report.failures,
            elapsed = ?report.elapsed,
            "workload finished"
        );
        Ok(report)
    }

    /// Executes the indices in `range` in order, retrying failed operations.
    fn run_thread(
        &self,
        workload: &dyn Workload,
        range: Range<usize>,
        total_done: &AtomicU64,
        progress: &ProgressBar,
    ) -> Result<ThreadStats> {
        let store = mlmd_store::connect(&self.mlmd_config)?;
        let mut stats = ThreadStats::new();
        stats.start();

        for index in range {
            let mut attempts = 0;
            loop {
                attempts += 1;
                match workload.execute(index, store.as_ref()) {
                    Ok(op) => {
                        let done = total_done.fetch_add(1, Ordering::Relaxed) + 1;
                        stats.update(&op, done);
                        progress.inc(1);
                        break;
                    }
                    Err(error) => {
                        stats.record_failure();
                        if self.max_attempts.is_some_and(|max| attempts >= max) {
                            stats.stop();
                            return Err(Error::RetriesExhausted {
                                workload: workload.name().to_owned(),
                                index,
                                attempts,
                                source: Box::new(error),
                            });
                        }
                        tracing::debug!(
                            error = &error as &dyn std::error::Error,
                            index,
                            attempts,
                            "operation failed, retrying"
                        );
                    }
                }
            }
        }

        stats.stop();
        Ok(stats)
    }

    fn progress_bar(&self, name: &str, len: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let bar = ProgressBar::new(len).with_message(name.to_owned());
        if let Ok(style) = ProgressStyle::with_template("{msg} {wide_bar} {pos}/{len} {elapsed}") {
            bar.set_style(style);
        }
        bar.enable_steady_tick(Duration::from_millis(100));
        bar
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicU32;

    use mlmd_store::MetadataStore;

    use super::*;
    use crate::stats::OpStats;

    /// Records every executed index and fails the first `failures` attempts of each one.
    #[derive(Debug, Default)]
    struct Recording {
        num_operations: usize,
        failures: u32,
        attempts: Mutex<Vec<u32>>,
        executed: Mutex<HashSet<usize>>,
        prepared: bool,
        torn_down: AtomicU32,
    }

    impl Recording {
        fn new(num_operations: usize, failures: u32) -> Self {
            Self {
                num_operations,
                failures,
                attempts: Mutex::new(vec![0; num_operations]),
                ..Default::default()
            }
        }
    }

    impl Workload for Recording {
        fn name(&self) -> &str {
            "recording"
        }

        fn num_operations(&self) -> usize {
            self.num_operations
        }

        fn prepare(&mut self, _store: &dyn MetadataStore) -> Result<()> {
            self.prepared = true;
            Ok(())
        }

        fn execute(&self, index: usize, _store: &dyn MetadataStore) -> Result<OpStats> {
            let attempt = {
                let mut attempts = self.attempts.lock().unwrap();
                attempts[index] += 1;
                attempts[index]
            };
            if attempt <= self.failures {
                return Err(Error::InvalidArgument("flaky".into()));
            }
            assert!(self.executed.lock().unwrap().insert(index));
            Ok(OpStats {
                elapsed: Duration::from_micros(1),
                transferred_bytes: 10,
            })
        }

        fn teardown(&mut self) {
            self.prepared = false;
            self.torn_down.fetch_add(1, Ordering::Relaxed);
        }

        fn num_work_items(&self) -> usize {
            if self.prepared { self.num_operations } else { 0 }
        }
    }

    fn runner(num_threads: usize, max_attempts: Option<u32>) -> ThreadRunner {
        let config = ThreadEnvConfig {
            num_threads,
            max_attempts,
        };
        ThreadRunner::new(ConnectionConfig::FakeDatabase, &config)
            .unwrap()
            .with_progress(false)
    }

    #[test]
    fn rejects_zero_threads() {
        let config = ThreadEnvConfig {
            num_threads: 0,
            max_attempts: None,
        };
        let err = ThreadRunner::new(ConnectionConfig::FakeDatabase, &config).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn partitions_operations() {
        for (num_operations, num_threads) in [(100, 4), (10, 3), (7, 7), (2, 5), (1, 1)] {
            let mut workload = Recording::new(num_operations, 0);
            let report = runner(num_threads, Some(1))
                .run_workload(&mut workload, num_operations)
                .unwrap();

            let expected = num_threads * (num_operations / num_threads);
            let executed = workload.executed.lock().unwrap();
            assert_eq!(executed.len(), expected);
            assert!(executed.iter().all(|&index| index < expected));
            assert_eq!(report.operations, expected as u64);
            assert_eq!(report.bytes, 10 * expected as u64);
            assert_eq!(workload.torn_down.load(Ordering::Relaxed), 1);
        }
    }

    #[test]
    fn retries_failed_operations() {
        let mut workload = Recording::new(12, 2);
        let report = runner(3, Some(3))
            .run_workload(&mut workload, 12)
            .unwrap();

        assert_eq!(report.operations, 12);
        assert_eq!(report.failures, 24);
        assert_eq!(workload.executed.lock().unwrap().len(), 12);
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let mut workload = Recording::new(4, 5);
        let err = runner(2, Some(5))
            .run_workload(&mut workload, 4)
            .unwrap_err();

        let Error::RetriesExhausted {
            workload: name,
            attempts,
            ..
        } = err
        else {
            panic!("expected exhausted retries, got {err:?}");
        };
        assert_eq!(name, "recording");
        assert_eq!(attempts, 5);
        assert_eq!(workload.torn_down.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn runs_benchmark_in_order() {
        let workloads: Vec<Box<dyn Workload>> = vec![
            Box::new(Recording::new(6, 0)),
            Box::new(Recording::new(4, 1)),
            Box::new(Recording::new(0, 0)),
        ];
        let mut benchmark = Benchmark::from_workloads(workloads);
        assert_eq!(benchmark.len(), 3);

        let mut seen = Vec::new();
        let reports = runner(2, Some(2))
            .run_with(&mut benchmark, |report| seen.push(report.operations))
            .unwrap();

        let summary: Vec<_> = reports
            .iter()
            .map(|report| (report.operations, report.failures))
            .collect();
        assert_eq!(summary, [(6, 0), (4, 4), (0, 0)]);
        assert_eq!(seen, [6, 4, 0]);
        for (workload, _) in benchmark.workloads() {
            assert_eq!(workload.num_work_items(), 0);
        }
    }

    #[test]
    fn unbounded_retries() {
        let mut workload = Recording::new(2, 50);
        let report = runner(1, None).run_workload(&mut workload, 2).unwrap();

        assert_eq!(report.operations, 2);
        assert_eq!(report.failures, 100);
    }
}
