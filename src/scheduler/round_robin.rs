//! Preemptive round-robin with a fixed timeslice and an optional processor-affinity penalty.
//!
//! A job owing more than one timeslice runs for exactly `timeslice` units and goes back to the
//! tail of the queue; the final segment runs for whatever is left. When the affinity penalty is
//! enabled, resuming a job on a processor other than the one that last ran it costs a fixed delay
//! before the segment starts. The penalty never changes which processor picks the job up.

use super::{SchedulingPolicy, SegmentPlan};
use crate::error::ConfigError;
use crate::job::{Job, ProcessorId};

pub const DEFAULT_TIMESLICE: u64 = 8;
pub const DEFAULT_AFFINITY_PENALTY: u64 = 1;

#[derive(Debug, Clone, Copy)]
pub struct RoundRobin {
    timeslice: u64,
    affinity_penalty: Option<u64>,
}

impl RoundRobin {
    /// A zero timeslice could never make progress and is rejected.
    pub fn new(timeslice: u64) -> Result<Self, ConfigError> {
        if timeslice == 0 {
            return Err(ConfigError::ZeroTimeslice);
        }
        Ok(Self {
            timeslice,
            affinity_penalty: None,
        })
    }

    pub fn with_affinity_penalty(mut self, units: u64) -> Self {
        self.affinity_penalty = Some(units);
        self
    }

    pub fn timeslice(&self) -> u64 {
        self.timeslice
    }

    /// Number of segments a job of `service_units` needs: `ceil(service / timeslice)`.
    pub fn segments_for(&self, service_units: u64) -> u64 {
        service_units.div_ceil(self.timeslice)
    }
}

impl Default for RoundRobin {
    fn default() -> Self {
        Self {
            timeslice: DEFAULT_TIMESLICE,
            affinity_penalty: None,
        }
    }
}

impl SchedulingPolicy for RoundRobin {
    fn name(&self) -> &'static str {
        "round-robin"
    }

    fn plan(&self, job: &Job, processor: ProcessorId) -> SegmentPlan {
        let penalty_units = match self.affinity_penalty {
            Some(units) if job.migrates_to(processor) => units,
            _ => 0,
        };
        SegmentPlan {
            penalty_units,
            run_units: job.remaining_units.min(self.timeslice),
        }
    }
}
