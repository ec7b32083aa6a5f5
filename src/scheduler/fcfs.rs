//! First-come first-served: every job runs to completion in one segment.

use super::{SchedulingPolicy, SegmentPlan};
use crate::job::{Job, ProcessorId};

#[derive(Debug, Clone, Copy, Default)]
pub struct Fcfs;

impl SchedulingPolicy for Fcfs {
    fn name(&self) -> &'static str {
        "fcfs"
    }

    fn plan(&self, job: &Job, _processor: ProcessorId) -> SegmentPlan {
        SegmentPlan {
            penalty_units: 0,
            run_units: job.remaining_units,
        }
    }
}
