//! Per-operation and per-thread statistics, and the merged report of a workload.

use std::fmt;
use std::time::{Duration, Instant};

use bytesize::ByteSize;
use sketches_ddsketch::DDSketch;
use yansi::Paint;

use crate::{Error, Result};

/// Completed-operation count at which the first progress event is logged.
const FIRST_PROGRESS_REPORT: u64 = 100;

/// Outcome of one successfully executed work item.
///
/// Failed operations do not produce `OpStats`; they surface as an error from
/// [`Workload::execute`](crate::Workload::execute) and are counted with
/// [`ThreadStats::record_failure`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct OpStats {
    /// Time spent in the store call.
    pub elapsed: Duration,
    /// Estimated number of bytes moved by the operation.
    pub transferred_bytes: u64,
}

/// Running aggregate of the operations executed by one worker thread.
///
/// Every thread owns its stats exclusively. After all threads have joined, their stats are folded
/// into one with [`merge`](Self::merge), which is associative and commutative.
pub struct ThreadStats {
    start: Option<Instant>,
    finish: Option<Instant>,
    done: u64,
    failures: u64,
    bytes: u64,
    latency: Duration,
    latencies: DDSketch,
    next_report: u64,
}

impl ThreadStats {
    /// Creates empty stats without timestamps.
    pub fn new() -> Self {
        Self {
            start: None,
            finish: None,
            done: 0,
            failures: 0,
            bytes: 0,
            latency: Duration::ZERO,
            latencies: DDSketch::default(),
            next_report: FIRST_PROGRESS_REPORT,
        }
    }

    /// Records the current time as the start timestamp.
    pub fn start(&mut self) {
        self.start_at(Instant::now());
    }

    /// Records `instant` as the start timestamp.
    pub fn start_at(&mut self, instant: Instant) {
        self.start = Some(instant);
    }

    /// Accumulates one successful operation.
    ///
    /// `total_done` is the number of operations completed by all threads of the run so far. It only
    /// drives progress events.
    pub fn update(&mut self, op: &OpStats, total_done: u64) {
        self.done += 1;
        self.bytes += op.transferred_bytes;
        self.latency += op.elapsed;
        self.latencies.add(op.elapsed.as_secs_f64());

        if total_done >= self.next_report {
            while self.next_report <= total_done {
                self.next_report += report_interval(self.next_report);
            }
            tracing::debug!(total_done, "operations completed");
        }
    }

    /// Counts one failed attempt.
    pub fn record_failure(&mut self) {
        self.failures += 1;
    }

    /// Records the current time as the finish timestamp.
    pub fn stop(&mut self) {
        self.stop_at(Instant::now());
    }

    /// Records `instant` as the finish timestamp.
    pub fn stop_at(&mut self, instant: Instant) {
        self.finish = Some(instant);
    }

    /// Folds `other` into `self`.
    ///
    /// Counts, bytes and latencies are summed. The merged time span starts at the earliest start
    /// and ends at the latest finish.
    pub fn merge(&mut self, other: &ThreadStats) -> Result<()> {
        self.latencies
            .merge(&other.latencies)
            .map_err(|err| Error::Stats(format!("{err:?}")))?;

        self.done += other.done;
        self.failures += other.failures;
        self.bytes += other.bytes;
        self.latency += other.latency;
        self.start = earliest(self.start, other.start);
        self.finish = latest(self.finish, other.finish);
        Ok(())
    }

    /// Number of successful operations.
    pub fn done(&self) -> u64 {
        self.done
    }

    /// Number of failed attempts.
    pub fn failures(&self) -> u64 {
        self.failures
    }

    /// Total estimated bytes transferred.
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Cumulative latency of all successful operations.
    pub fn latency(&self) -> Duration {
        self.latency
    }

    /// The start timestamp, if recorded.
    pub fn started(&self) -> Option<Instant> {
        self.start
    }

    /// The finish timestamp, if recorded.
    pub fn finished(&self) -> Option<Instant> {
        self.finish
    }

    /// Wall-clock time between start and finish.
    pub fn elapsed(&self) -> Duration {
        match (self.start, self.finish) {
            (Some(start), Some(finish)) => finish.saturating_duration_since(start),
            _ => Duration::ZERO,
        }
    }

    /// Computes the report of the workload called `name` from these stats.
    pub fn report(&self, name: impl Into<String>) -> Report {
        let quantile = |q: f64| {
            self.latencies
                .quantile(q)
                .ok()
                .flatten()
                .map(Duration::from_secs_f64)
        };

        Report {
            name: name.into(),
            operations: self.done,
            failures: self.failures,
            bytes: self.bytes,
            elapsed: self.elapsed(),
            total_latency: self.latency,
            p50: quantile(0.5),
            p90: quantile(0.9),
            p99: quantile(0.99),
        }
    }
}

impl Default for ThreadStats {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ThreadStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadStats")
            .field("start", &self.start)
            .field("finish", &self.finish)
            .field("done", &self.done)
            .field("failures", &self.failures)
            .field("bytes", &self.bytes)
            .field("latency", &self.latency)
            .finish_non_exhaustive()
    }
}

/// Progress events get sparser as the run grows.
fn report_interval(next_report: u64) -> u64 {
    match next_report {
        ..1_000 => 100,
        ..5_000 => 500,
        ..10_000 => 1_000,
        ..50_000 => 5_000,
        ..100_000 => 10_000,
        ..500_000 => 50_000,
        _ => 100_000,
    }
}

fn earliest(a: Option<Instant>, b: Option<Instant>) -> Option<Instant> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn latest(a: Option<Instant>, b: Option<Instant>) -> Option<Instant> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

/// The merged result of one workload.
#[derive(Clone, Debug, PartialEq)]
pub struct Report {
    /// Name of the workload.
    pub name: String,
    /// Number of successful operations.
    pub operations: u64,
    /// Number of failed attempts.
    pub failures: u64,
    /// Total estimated bytes transferred.
    pub bytes: u64,
    /// Wall-clock time from the earliest thread start to the latest thread finish.
    pub elapsed: Duration,
    /// Sum of the latencies of all successful operations.
    pub total_latency: Duration,
    /// Median latency.
    pub p50: Option<Duration>,
    /// 90th percentile latency.
    pub p90: Option<Duration>,
    /// 99th percentile latency.
    pub p99: Option<Duration>,
}

impl Report {
    /// Successful operations per second of wall-clock time.
    pub fn ops_per_second(&self) -> f64 {
        per_second(self.operations, self.elapsed)
    }

    /// Bytes per second of wall-clock time.
    pub fn bytes_per_second(&self) -> f64 {
        per_second(self.bytes, self.elapsed)
    }

    /// Average latency of a successful operation.
    pub fn average_latency(&self) -> Option<Duration> {
        if self.operations == 0 {
            return None;
        }
        Some(self.total_latency.div_f64(self.operations as f64))
    }

    /// Average latency in microseconds, or `0.0` without operations.
    pub fn micros_per_op(&self) -> f64 {
        if self.operations == 0 {
            return 0.0;
        }
        self.total_latency.as_secs_f64() * 1e6 / self.operations as f64
    }
}

fn per_second(count: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 { count as f64 / secs } else { 0.0 }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({} ops",
            "## Workload".bold(),
            self.name.bold().blue(),
            self.operations.bold()
        )?;
        if self.failures > 0 {
            write!(
                f,
                ", {}",
                format!("{} FAILURES", self.failures).bold().red()
            )?;
        }
        writeln!(f, ", {:.2?})", self.elapsed)?;

        let throughput = ByteSize::b(self.bytes_per_second() as u64);
        writeln!(
            f,
            "  {:>11.3} micros/op; {:.2} operations/s; {:.2}/s ({} total)",
            self.micros_per_op().bold(),
            self.ops_per_second().bold(),
            throughput.bold(),
            ByteSize::b(self.bytes),
        )?;

        if let (Some(p50), Some(p90), Some(p99)) = (self.p50, self.p90, self.p99) {
            let avg = self.average_latency().unwrap_or_default();
            write!(
                f,
                "  avg: {:.2?}; p50: {p50:.2?}; p90: {p90:.2?}; p99: {p99:.2?}",
                avg.bold()
            )?;
        }
        Ok(())
    }
}
