//! Running statistics for completed jobs.
//!
//! Processors report every executed segment and every completion directly to the
//! [`StatsAggregator`]. Each job class has its own lock, so completions of different classes
//! never contend, and per-processor busy time lives in its own slot. End-of-run figures
//! (throughput, utilization) are pure functions of a [`StatsSnapshot`] and the elapsed time.

use crate::class::{ClassTable, JobClass};
use crate::job::{Job, JobId, ProcessorId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Throughput is reported as completions per this many time units.
pub const THROUGHPUT_SCALE_UNITS: f64 = 100.0;

/// Min / max / total / online mean of a stream of non-negative observations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Accumulator {
    pub min: f64,
    pub max: f64,
    pub total: f64,
    pub average: f64,
    pub count: u64,
}

impl Default for Accumulator {
    fn default() -> Self {
        Self {
            min: f64::INFINITY,
            max: 0.0,
            total: 0.0,
            average: 0.0,
            count: 0,
        }
    }
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one observation in.
    ///
    /// The mean is updated incrementally as `(avg * (n - 1) + x) / n` rather than derived from
    /// `total`, so it may differ from `total / count` by floating-point rounding. Rounding never
    /// pushes it outside `[min, max]`.
    pub fn record(&mut self, x: f64) {
        if !x.is_finite() {
            tracing::warn!(value = x, "ignoring non-finite observation");
            return;
        }
        self.count += 1;
        let n = self.count as f64;
        self.min = self.min.min(x);
        self.max = self.max.max(x);
        self.total += x;
        self.average = (self.average * (n - 1.0) + x) / n;
        self.average = self.average.clamp(self.min, self.max);
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Everything tracked for one job class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassStats {
    pub wait: Accumulator,
    pub service: Accumulator,
    pub completions: u64,
}

/// One execution segment, as recorded in the optional segment log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentRecord {
    pub job: JobId,
    pub class: JobClass,
    pub processor: ProcessorId,
    pub units: u64,
    pub penalized: bool,
    pub completed: bool,
    #[serde(with = "duration_micros")]
    pub started_at: Duration,
    #[serde(with = "duration_micros")]
    pub ended_at: Duration,
}

impl SegmentRecord {
    pub fn duration(&self) -> Duration {
        self.ended_at.saturating_sub(self.started_at)
    }
}

pub struct StatsAggregator {
    classes: ClassTable<Mutex<ClassStats>>,
    busy: Vec<Mutex<Duration>>,
    segments: Option<Mutex<Vec<SegmentRecord>>>,
    unit: Duration,
}

impl StatsAggregator {
    /// Observations are stored in multiples of `unit`.
    pub fn new(processors: usize, unit: Duration, keep_segments: bool) -> Self {
        Self {
            classes: ClassTable::from_fn(|_| Mutex::new(ClassStats::default())),
            busy: (0..processors).map(|_| Mutex::new(Duration::ZERO)).collect(),
            segments: keep_segments.then(|| Mutex::new(Vec::new())),
            unit,
        }
    }

    fn to_units(&self, duration: Duration) -> f64 {
        duration.as_secs_f64() / self.unit.as_secs_f64()
    }

    /// Credit an executed segment to the processor that ran it.
    pub fn record_segment(&self, record: SegmentRecord) {
        if let Some(slot) = self.busy.get(record.processor) {
            *slot.lock() += record.duration();
        }
        if let Some(log) = &self.segments {
            log.lock().push(record);
        }
    }

    /// Fold a completed job into its class statistics. Incomplete jobs are ignored.
    pub fn record_completion(&self, job: &Job) {
        let Some(wait) = job.wait_time() else {
            tracing::warn!(job = job.id, "completion reported for unfinished job");
            return;
        };
        let wait = self.to_units(wait);
        let service = self.to_units(job.service_time());

        let mut stats = self.classes[job.class].lock();
        stats.wait.record(wait);
        stats.service.record(service);
        stats.completions += 1;
    }

    pub fn class_stats(&self, class: JobClass) -> ClassStats {
        *self.classes[class].lock()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            classes: ClassTable::from_fn(|class| self.class_stats(class)),
            processor_busy: self.busy.iter().map(|slot| *slot.lock()).collect(),
            unit: self.unit,
        }
    }

    pub fn take_segments(&self) -> Option<Vec<SegmentRecord>> {
        self.segments
            .as_ref()
            .map(|log| std::mem::take(&mut *log.lock()))
    }
}

/// Read-only copy of the accumulators at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub classes: ClassTable<ClassStats>,
    #[serde(with = "duration_micros_vec")]
    pub processor_busy: Vec<Duration>,
    #[serde(with = "duration_micros")]
    pub unit: Duration,
}

impl StatsSnapshot {
    fn elapsed_units(&self, elapsed: Duration) -> f64 {
        elapsed.as_secs_f64() / self.unit.as_secs_f64()
    }

    /// Completions of `class` per [`THROUGHPUT_SCALE_UNITS`] time units.
    pub fn throughput(&self, class: JobClass, elapsed: Duration) -> f64 {
        let units = self.elapsed_units(elapsed);
        if units <= 0.0 {
            return 0.0;
        }
        self.classes[class].completions as f64 / units * THROUGHPUT_SCALE_UNITS
    }

    pub fn total_throughput(&self, elapsed: Duration) -> f64 {
        JobClass::ALL
            .iter()
            .map(|&class| self.throughput(class, elapsed))
            .sum()
    }

    /// Fraction of `elapsed` that `processor` spent executing jobs.
    pub fn utilization(&self, processor: ProcessorId, elapsed: Duration) -> f64 {
        if elapsed.is_zero() {
            return 0.0;
        }
        self.processor_busy
            .get(processor)
            .map(|busy| busy.as_secs_f64() / elapsed.as_secs_f64())
            .unwrap_or(0.0)
    }

    pub fn utilization_percent(&self, processor: ProcessorId, elapsed: Duration) -> f64 {
        self.utilization(processor, elapsed) * 100.0
    }

    pub fn total_completions(&self) -> u64 {
        self.classes.iter().map(|(_, stats)| stats.completions).sum()
    }
}

mod duration_micros {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(duration.as_secs_f64() * 1_000_000.0)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let micros = f64::deserialize(deserializer)?;
        Ok(Duration::from_secs_f64(micros.max(0.0) / 1_000_000.0))
    }
}

mod duration_micros_vec {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(durations: &[Duration], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(durations.iter().map(|d| d.as_secs_f64() * 1_000_000.0))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let micros: Vec<f64> = Vec::deserialize(deserializer)?;
        Ok(micros
            .into_iter()
            .map(|m| Duration::from_secs_f64(m.max(0.0) / 1_000_000.0))
            .collect())
    }
}
