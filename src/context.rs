//! Run-wide state shared by every generator and processor.
//!
//! Each mutable field carries the minimal synchronisation it needs: atomics for the job quota,
//! the id counter, and the completion count; the queue and the statistics aggregator manage
//! their own locks.

use crate::cancel::CancelToken;
use crate::class::{ClassTable, JobClass};
use crate::clock::Clock;
use crate::job::{Job, JobId, ProcessorId};
use crate::queue::BoundedJobQueue;
use crate::scheduler::SchedulingPolicy;
use crate::stats::StatsAggregator;
use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Progress notifications for observers such as a progress bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SimEvent {
    Generated {
        job: JobId,
        class: JobClass,
        at: Duration,
    },
    /// `at` is the completion time; the other stamps describe the job's final segment.
    Completed {
        job: JobId,
        class: JobClass,
        processor: ProcessorId,
        generated_at: Duration,
        serviced_at: Duration,
        at: Duration,
        remaining_units: u64,
    },
}

pub struct RunContext {
    pub(crate) queue: BoundedJobQueue,
    pub(crate) stats: StatsAggregator,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) policy: Arc<dyn SchedulingPolicy>,
    pub(crate) cancel: CancelToken,
    pub(crate) service_units: ClassTable<u64>,
    quota: AtomicU64,
    next_id: AtomicU64,
    completed: AtomicU64,
    total_jobs: u64,
    events: Option<Sender<SimEvent>>,
}

impl RunContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        capacity: usize,
        processors: usize,
        total_jobs: u64,
        service_units: ClassTable<u64>,
        policy: Arc<dyn SchedulingPolicy>,
        clock: Arc<dyn Clock>,
        keep_segments: bool,
    ) -> Self {
        let unit = clock.unit();
        let ctx = Self {
            queue: BoundedJobQueue::new(capacity),
            stats: StatsAggregator::new(processors, unit, keep_segments),
            clock,
            policy,
            cancel: CancelToken::new(),
            service_units,
            quota: AtomicU64::new(total_jobs),
            next_id: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            total_jobs,
            events: None,
        };
        if total_jobs == 0 {
            ctx.queue.close();
        }
        ctx
    }

    pub fn with_events(mut self, events: Sender<SimEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn queue(&self) -> &BoundedJobQueue {
        &self.queue
    }

    pub fn stats(&self) -> &StatsAggregator {
        &self.stats
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn policy(&self) -> &dyn SchedulingPolicy {
        self.policy.as_ref()
    }

    /// Atomically take one job from the quota; `false` once it is exhausted.
    pub fn claim_quota(&self) -> bool {
        self.quota
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }

    pub fn remaining_quota(&self) -> u64 {
        self.quota.load(Ordering::SeqCst)
    }

    pub fn next_job_id(&self) -> JobId {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Build a job of `class` stamped with the current time.
    pub fn new_job(&self, class: JobClass) -> Job {
        Job::new(
            self.next_job_id(),
            class,
            self.service_units[class],
            self.clock.now(),
        )
    }

    pub fn completed_jobs(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn total_jobs(&self) -> u64 {
        self.total_jobs
    }

    /// Count a finished job; the last one closes the queue so idle processors drain and exit.
    pub(crate) fn job_completed(&self, job: &Job, processor: ProcessorId) {
        let done = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        self.emit(SimEvent::Completed {
            job: job.id,
            class: job.class,
            processor,
            generated_at: job.generated_at,
            serviced_at: job.serviced_at.unwrap_or_default(),
            at: job.completed_at.unwrap_or_default(),
            remaining_units: job.remaining_units,
        });
        if done >= self.total_jobs {
            tracing::debug!(completed = done, "all jobs completed, closing queue");
            self.queue.close();
        }
    }

    pub(crate) fn emit(&self, event: SimEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }

    /// Stop every actor at its next suspension point.
    pub fn cancel(&self) {
        self.cancel.cancel();
        self.queue.wake_all();
    }
}
