//! Bounded FIFO buffer between generators and processors.
//!
//! Occupancy is governed by two semaphores (`slots_free` starts at the capacity, `slots_filled`
//! at zero) while a separate mutex protects the sequence itself. Permits are handed out as typed
//! tokens: a job can only be enqueued with a [`FreeSlot`] and only dequeued with a
//! [`FilledSlot`], so a capacity violation cannot be expressed by callers.
//!
//! A dequeued job keeps its place against the capacity through a [`HeldSlot`] until the
//! processor either requeues it (the slot becomes *filled* again) or releases it because the job
//! has left the system (the slot becomes *free*). Once no permit is in flight,
//! `free + filled + held == capacity`. The number of held slots is kept under the same lock as
//! the job sequence, so [`BoundedJobQueue::occupancy`] always sees `queued + held <= capacity`.

use crate::cancel::CancelToken;
use crate::error::AcquireError;
use crate::job::Job;
use crate::semaphore::{Permit, Semaphore};
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Jobs currently in the system, read under one lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occupancy {
    /// Jobs waiting in the buffer.
    pub queued: usize,
    /// Jobs taken off the buffer and still running on a processor.
    pub held: usize,
}

impl Occupancy {
    pub fn in_system(&self) -> usize {
        self.queued + self.held
    }
}

struct Slots {
    jobs: VecDeque<Job>,
    held: usize,
}

pub struct BoundedJobQueue {
    slots: Mutex<Slots>,
    capacity: usize,
    slots_free: Semaphore,
    slots_filled: Semaphore,
}

/// Permission to append one job.
#[must_use]
pub struct FreeSlot<'q>(Permit<'q>);

/// Permission to remove the head job.
#[must_use]
pub struct FilledSlot<'q>(Permit<'q>);

/// Capacity still occupied by a job that a processor is running.
#[must_use = "a held slot must be requeued or released"]
pub struct HeldSlot<'q> {
    queue: &'q BoundedJobQueue,
}

impl BoundedJobQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Mutex::new(Slots {
                jobs: VecDeque::with_capacity(capacity),
                held: 0,
            }),
            capacity,
            slots_free: Semaphore::new(capacity),
            slots_filled: Semaphore::new(0),
        }
    }

    /// Block until the buffer has room for one more job.
    pub fn reserve_slot(&self, cancel: &CancelToken) -> Result<FreeSlot<'_>, AcquireError> {
        self.slots_free.acquire(cancel).map(FreeSlot)
    }

    /// Block until a runnable job is queued.
    pub fn claim(&self, cancel: &CancelToken) -> Result<FilledSlot<'_>, AcquireError> {
        self.slots_filled.acquire(cancel).map(FilledSlot)
    }

    /// Append `job` at the tail and publish it to processors.
    pub fn enqueue(&self, job: Job, slot: FreeSlot<'_>) {
        debug_assert!(slot.0.belongs_to(&self.slots_free));
        {
            let mut slots = self.slots.lock();
            debug_assert!(slots.jobs.len() + slots.held < self.capacity);
            slots.jobs.push_back(job);
        }
        slot.0.forget();
        self.slots_filled.release();
    }

    /// Remove and return the head job; its capacity stays held until the returned
    /// [`HeldSlot`] is requeued or released.
    pub fn dequeue_head(&self, slot: FilledSlot<'_>) -> (Job, HeldSlot<'_>) {
        debug_assert!(slot.0.belongs_to(&self.slots_filled));
        let job = {
            let mut slots = self.slots.lock();
            let job = slots.jobs.pop_front();
            if job.is_some() {
                slots.held += 1;
            }
            job
        };
        slot.0.forget();
        match job {
            Some(job) => (job, HeldSlot { queue: self }),
            // A filled permit always has a queued job behind it.
            None => unreachable!("filled-slot permit held with an empty job queue"),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.lock().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().jobs.is_empty()
    }

    pub fn held_slots(&self) -> usize {
        self.slots.lock().held
    }

    pub fn occupancy(&self) -> Occupancy {
        let slots = self.slots.lock();
        Occupancy {
            queued: slots.jobs.len(),
            held: slots.held,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn free_slots(&self) -> usize {
        self.slots_free.available_permits()
    }

    pub fn filled_slots(&self) -> usize {
        self.slots_filled.available_permits()
    }

    /// Ids of the queued jobs, head first.
    pub fn queued_ids(&self) -> Vec<u64> {
        self.slots.lock().jobs.iter().map(|job| job.id).collect()
    }

    /// No more jobs will be produced: processors drain what is queued, then see `Closed`.
    pub fn close(&self) {
        self.slots_filled.close();
        self.slots_free.close();
    }

    pub fn is_closed(&self) -> bool {
        self.slots_filled.is_closed()
    }

    /// Wake all blocked generators and processors so they observe cancellation.
    pub fn wake_all(&self) {
        self.slots_free.wake_all();
        self.slots_filled.wake_all();
    }
}

impl<'q> HeldSlot<'q> {
    /// Put a preempted job back at the tail; occupancy is unchanged, the job becomes runnable.
    pub fn requeue(self, job: Job) {
        {
            let mut slots = self.queue.slots.lock();
            slots.held -= 1;
            slots.jobs.push_back(job);
        }
        self.queue.slots_filled.release();
    }

    /// The job has left the system; give its capacity back to generators.
    pub fn release(self) {
        self.queue.slots.lock().held -= 1;
        self.queue.slots_free.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::JobClass;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn job(id: u64) -> Job {
        Job::new(id, JobClass::Short, 5, Duration::ZERO)
    }

    #[test]
    fn enqueue_dequeue_is_fifo() {
        let queue = BoundedJobQueue::new(4);
        let cancel = CancelToken::new();
        for id in 0..3 {
            let slot = queue.reserve_slot(&cancel).unwrap();
            queue.enqueue(job(id), slot);
        }
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.free_slots(), 1);
        assert_eq!(queue.filled_slots(), 3);

        for expected in 0..3 {
            let claim = queue.claim(&cancel).unwrap();
            let (job, held) = queue.dequeue_head(claim);
            assert_eq!(job.id, expected);
            held.release();
        }
        assert!(queue.is_empty());
        assert_eq!(queue.free_slots(), 4);
    }

    #[test]
    fn requeue_moves_job_to_tail_without_freeing_capacity() {
        let queue = BoundedJobQueue::new(3);
        let cancel = CancelToken::new();
        for id in 0..3 {
            let slot = queue.reserve_slot(&cancel).unwrap();
            queue.enqueue(job(id), slot);
        }

        let (head, held) = queue.dequeue_head(queue.claim(&cancel).unwrap());
        assert_eq!(queue.held_slots(), 1);
        assert_eq!(
            queue.free_slots() + queue.filled_slots() + queue.held_slots(),
            queue.capacity()
        );
        held.requeue(head);
        assert_eq!(queue.held_slots(), 0);

        assert_eq!(queue.queued_ids(), vec![1, 2, 0]);
        assert_eq!(queue.free_slots(), 0);
        assert_eq!(queue.filled_slots(), 3);
    }

    #[test]
    fn dropped_reservation_returns_capacity() {
        let queue = BoundedJobQueue::new(1);
        let cancel = CancelToken::new();
        {
            let _slot = queue.reserve_slot(&cancel).unwrap();
            assert_eq!(queue.free_slots(), 0);
        }
        assert_eq!(queue.free_slots(), 1);
    }

    #[test]
    fn full_queue_blocks_producer_until_release() {
        let queue = Arc::new(BoundedJobQueue::new(1));
        let cancel = CancelToken::new();
        let slot = queue.reserve_slot(&cancel).unwrap();
        queue.enqueue(job(0), slot);

        let producer_queue = queue.clone();
        let producer_cancel = cancel.clone();
        let producer = thread::spawn(move || {
            let slot = producer_queue.reserve_slot(&producer_cancel).unwrap();
            producer_queue.enqueue(job(1), slot);
        });

        thread::sleep(Duration::from_millis(20));
        assert_eq!(queue.len(), 1);

        let (first, held) = queue.dequeue_head(queue.claim(&cancel).unwrap());
        assert_eq!(first.id, 0);
        held.release();
        producer.join().unwrap();
        assert_eq!(queue.queued_ids(), vec![1]);
        assert!(queue.len() <= queue.capacity());
    }

    #[test]
    fn occupancy_counts_queued_and_running_jobs() {
        let queue = BoundedJobQueue::new(3);
        let cancel = CancelToken::new();
        for id in 0..2 {
            let slot = queue.reserve_slot(&cancel).unwrap();
            queue.enqueue(job(id), slot);
        }
        let (first, held) = queue.dequeue_head(queue.claim(&cancel).unwrap());
        assert_eq!(queue.occupancy(), Occupancy { queued: 1, held: 1 });

        held.release();
        drop(first);
        assert_eq!(queue.occupancy().in_system(), 1);
        assert_eq!(queue.free_slots() + queue.filled_slots(), queue.capacity());
    }

    #[test]
    fn closed_queue_drains_before_reporting_closed() {
        let queue = BoundedJobQueue::new(2);
        let cancel = CancelToken::new();
        let slot = queue.reserve_slot(&cancel).unwrap();
        queue.enqueue(job(0), slot);
        queue.close();

        let (drained, held) = queue.dequeue_head(queue.claim(&cancel).unwrap());
        assert_eq!(drained.id, 0);
        held.release();
        assert!(matches!(queue.claim(&cancel), Err(AcquireError::Closed)));
    }
}
