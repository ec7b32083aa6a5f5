//! Scheduling disciplines and the processor actor that applies them.
//!
//! A policy only decides how long the next segment of a job runs and whether a migration
//! penalty is due; the [`Processor`] actor owns the claim / execute / requeue-or-complete cycle,
//! so both disciplines share the queue protocol and the statistics path unchanged.

pub mod fcfs;
pub mod processor;
pub mod round_robin;

use crate::error::ConfigError;
use crate::job::{Job, ProcessorId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub use fcfs::Fcfs;
pub use processor::{Processor, Step};
pub use round_robin::RoundRobin;

/// What a processor does with the job it has just taken off the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentPlan {
    /// Units of delay paid before the segment starts.
    pub penalty_units: u64,
    /// Units of service granted in this segment; never more than the job still owes.
    pub run_units: u64,
}

pub trait SchedulingPolicy: Send + Sync {
    fn name(&self) -> &'static str;

    fn plan(&self, job: &Job, processor: ProcessorId) -> SegmentPlan;
}

/// Selector for the available disciplines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyKind {
    #[default]
    Fcfs,
    RoundRobin,
}

impl PolicyKind {
    /// Instantiate the policy; `timeslice` and the affinity settings only affect round-robin.
    pub fn build(
        self,
        timeslice: u64,
        affinity: bool,
        penalty_units: u64,
    ) -> Result<Arc<dyn SchedulingPolicy>, ConfigError> {
        Ok(match self {
            PolicyKind::Fcfs => Arc::new(Fcfs),
            PolicyKind::RoundRobin => {
                let rr = RoundRobin::new(timeslice)?;
                Arc::new(if affinity {
                    rr.with_affinity_penalty(penalty_units)
                } else {
                    rr
                })
            }
        })
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyKind::Fcfs => f.write_str("fcfs"),
            PolicyKind::RoundRobin => f.write_str("round-robin"),
        }
    }
}
