//! The unit of synthetic work that travels from a generator, through the bounded queue, to a
//! processor.

use crate::class::JobClass;
use std::time::Duration;

pub type JobId = u64;
pub type ProcessorId = usize;

/// One job and its lifecycle timestamps.
///
/// Timestamps are offsets from the simulation clock's epoch. `serviced_at` is re-stamped at the
/// start of every execution segment, while `serviced_for` accumulates the executing time of all
/// segments so multi-segment jobs keep an exact service total.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: JobId,
    pub class: JobClass,
    pub generated_at: Duration,
    pub serviced_at: Option<Duration>,
    pub completed_at: Option<Duration>,
    /// Nominal service length in time units.
    pub service_units: u64,
    /// Units still owed; never negative and never executed once zero.
    pub remaining_units: u64,
    pub last_processor: Option<ProcessorId>,
    pub segments: u32,
    pub serviced_for: Duration,
}

impl Job {
    pub fn new(id: JobId, class: JobClass, service_units: u64, generated_at: Duration) -> Job {
        Job {
            id,
            class,
            generated_at,
            serviced_at: None,
            completed_at: None,
            service_units,
            remaining_units: service_units,
            last_processor: None,
            segments: 0,
            serviced_for: Duration::ZERO,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }

    /// Whether running on `processor` means migrating away from the processor that last ran it.
    pub fn migrates_to(&self, processor: ProcessorId) -> bool {
        matches!(self.last_processor, Some(last) if last != processor)
    }

    /// Stamp the start of an execution segment on `processor`.
    pub fn begin_segment(&mut self, processor: ProcessorId, now: Duration) {
        self.last_processor = Some(processor);
        self.serviced_at = Some(now);
    }

    /// Account for `units` executed in the segment that began at `serviced_at`.
    pub fn end_segment(&mut self, units: u64, now: Duration) {
        let started = self.serviced_at.unwrap_or(now);
        self.serviced_for += now.saturating_sub(started);
        self.remaining_units = self.remaining_units.saturating_sub(units);
        self.segments += 1;
        if self.remaining_units == 0 {
            self.completed_at = Some(now);
        }
    }

    /// Total executing time across all segments.
    pub fn service_time(&self) -> Duration {
        self.serviced_for
    }

    /// Time in the system not spent executing; `None` until the job completes.
    pub fn wait_time(&self) -> Option<Duration> {
        let completed = self.completed_at?;
        Some(
            completed
                .saturating_sub(self.generated_at)
                .saturating_sub(self.serviced_for),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn single_segment_completes_job() {
        let mut job = Job::new(7, JobClass::Short, 5, ms(10));
        assert!(!job.is_complete());

        job.begin_segment(0, ms(12));
        job.end_segment(5, ms(17));

        assert!(job.is_complete());
        assert_eq!(job.remaining_units, 0);
        assert_eq!(job.segments, 1);
        assert_eq!(job.service_time(), ms(5));
        assert_eq!(job.wait_time(), Some(ms(2)));
    }

    #[test]
    fn partial_segments_accumulate_service() {
        let mut job = Job::new(1, JobClass::Long, 10, ms(0));
        job.begin_segment(0, ms(1));
        job.end_segment(8, ms(9));
        assert_eq!(job.remaining_units, 2);
        assert!(job.completed_at.is_none());
        assert_eq!(job.wait_time(), None);

        job.begin_segment(1, ms(20));
        job.end_segment(2, ms(22));
        assert_eq!(job.service_time(), ms(10));
        assert_eq!(job.wait_time(), Some(ms(12)));
        assert!(job.completed_at >= job.serviced_at);
        assert!(job.serviced_at.unwrap() >= job.generated_at);
    }

    #[test]
    fn migration_needs_a_previous_processor() {
        let mut job = Job::new(1, JobClass::Long, 10, ms(0));
        assert!(!job.migrates_to(0));
        job.begin_segment(0, ms(0));
        assert!(!job.migrates_to(0));
        assert!(job.migrates_to(1));
    }
}
