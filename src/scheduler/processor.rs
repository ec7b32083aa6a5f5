//! Virtual processor actor.
//!
//! Each processor repeatedly claims the head job, executes one segment as planned by the
//! scheduling policy, and then either completes the job (statistics, slot released) or puts it
//! back at the tail of the queue. Every processor competes for the same shared queue, so a job
//! may run on different processors across its segments.

use crate::context::RunContext;
use crate::error::AcquireError;
use crate::job::{JobId, ProcessorId};
use crate::stats::SegmentRecord;
use std::sync::Arc;

/// Outcome of one claim-and-execute cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// The job still owes service and was appended to the tail of the queue.
    Preempted(JobId),
    Completed(JobId),
}

pub struct Processor {
    id: ProcessorId,
    ctx: Arc<RunContext>,
}

impl Processor {
    pub fn new(id: ProcessorId, ctx: Arc<RunContext>) -> Self {
        Self { id, ctx }
    }

    pub fn id(&self) -> ProcessorId {
        self.id
    }

    /// Claim the next runnable job and execute one segment of it.
    ///
    /// Blocks while the queue is empty. Fails with `Closed` once every job has completed and with
    /// `Cancelled` when the run is stopped; a job interrupted mid-segment goes back to the tail
    /// with its remaining service unchanged.
    pub fn step(&self) -> Result<Step, AcquireError> {
        let ctx = &self.ctx;
        let claim = ctx.queue.claim(&ctx.cancel)?;
        let (mut job, held) = ctx.queue.dequeue_head(claim);
        tracing::debug!(
            processor = self.id,
            job = job.id,
            class = %job.class,
            at = ?ctx.clock.now(),
            "C{}",
            job.id
        );

        let plan = ctx.policy.plan(&job, self.id);
        if plan.penalty_units > 0 {
            tracing::trace!(
                processor = self.id,
                job = job.id,
                from = ?job.last_processor,
                "migration penalty"
            );
            if ctx.clock.sleep_units(plan.penalty_units, &ctx.cancel).is_err() {
                held.requeue(job);
                return Err(AcquireError::Cancelled);
            }
        }

        let resume_point = (job.serviced_at, job.last_processor);
        let started_at = ctx.clock.now();
        job.begin_segment(self.id, started_at);
        if ctx.clock.sleep_units(plan.run_units, &ctx.cancel).is_err() {
            (job.serviced_at, job.last_processor) = resume_point;
            held.requeue(job);
            return Err(AcquireError::Cancelled);
        }
        let ended_at = ctx.clock.now();
        job.end_segment(plan.run_units, ended_at);

        ctx.stats.record_segment(SegmentRecord {
            job: job.id,
            class: job.class,
            processor: self.id,
            units: plan.run_units,
            penalized: plan.penalty_units > 0,
            completed: job.is_complete(),
            started_at,
            ended_at,
        });

        if job.is_complete() {
            ctx.stats.record_completion(&job);
            held.release();
            ctx.job_completed(&job, self.id);
            Ok(Step::Completed(job.id))
        } else {
            let id = job.id;
            held.requeue(job);
            Ok(Step::Preempted(id))
        }
    }

    /// Run until the queue is closed and drained or the run is cancelled.
    ///
    /// Returns the number of segments executed.
    pub fn run(self) -> u64 {
        let mut segments = 0;
        loop {
            match self.step() {
                Ok(_) => segments += 1,
                Err(AcquireError::Closed) => break,
                Err(AcquireError::Cancelled) => {
                    tracing::debug!(processor = self.id, "processor cancelled");
                    break;
                }
            }
        }
        tracing::debug!(processor = self.id, segments, "processor finished");
        segments
    }
}
