//! Counting semaphore built on a mutex-guarded counter and a condition variable.
//!
//! `acquire` blocks until a permit is available and hands back an RAII [`Permit`]. Dropping the
//! permit returns it, so an actor that bails out between acquiring and using a permit can never
//! leak capacity. A permit that has been spent on a queue operation is [`Permit::forget`]-ed instead.

use crate::cancel::CancelToken;
use crate::error::AcquireError;
use parking_lot::{Condvar, Mutex};
use std::time::Duration;

/// Upper bound on how long a waiter sleeps before re-checking cancellation on its own.
const CANCEL_CHECK_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug)]
struct State {
    permits: usize,
    closed: bool,
}

#[derive(Debug)]
pub struct Semaphore {
    state: Mutex<State>,
    available: Condvar,
}

impl Semaphore {
    pub fn new(permits: usize) -> Self {
        Self {
            state: Mutex::new(State {
                permits,
                closed: false,
            }),
            available: Condvar::new(),
        }
    }

    /// Take one permit, blocking while none is available.
    ///
    /// Returns [`AcquireError::Cancelled`] once `cancel` is raised, even if permits remain, and
    /// [`AcquireError::Closed`] when the semaphore is closed and fully drained. Wakeups that find
    /// no permit are treated as spurious and simply wait again.
    pub fn acquire(&self, cancel: &CancelToken) -> Result<Permit<'_>, AcquireError> {
        let mut state = self.state.lock();
        loop {
            if cancel.is_cancelled() {
                return Err(AcquireError::Cancelled);
            }
            if state.permits > 0 {
                state.permits -= 1;
                return Ok(Permit { semaphore: self });
            }
            if state.closed {
                return Err(AcquireError::Closed);
            }
            self.available.wait_for(&mut state, CANCEL_CHECK_INTERVAL);
        }
    }

    /// Take a permit only if one is immediately available.
    pub fn try_acquire(&self) -> Option<Permit<'_>> {
        let mut state = self.state.lock();
        if state.permits > 0 {
            state.permits -= 1;
            Some(Permit { semaphore: self })
        } else {
            None
        }
    }

    /// Add one permit and wake at most one waiter.
    pub fn release(&self) {
        {
            let mut state = self.state.lock();
            state.permits += 1;
        }
        self.available.notify_one();
    }

    /// Refuse to block from now on: waiters drain the remaining permits, then get `Closed`.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.available.notify_all();
    }

    /// Wake every waiter so it re-checks cancellation and closure.
    pub fn wake_all(&self) {
        let _state = self.state.lock();
        self.available.notify_all();
    }

    pub fn available_permits(&self) -> usize {
        self.state.lock().permits
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

/// One unit of a [`Semaphore`]'s count held by the caller.
#[derive(Debug)]
#[must_use = "dropping a permit immediately returns it to the semaphore"]
pub struct Permit<'a> {
    semaphore: &'a Semaphore,
}

impl<'a> Permit<'a> {
    /// Consume the permit without returning it to the semaphore.
    pub fn forget(self) {
        std::mem::forget(self);
    }

    pub(crate) fn belongs_to(&self, semaphore: &Semaphore) -> bool {
        std::ptr::eq(self.semaphore, semaphore)
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        self.semaphore.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn acquire_decrements_and_drop_restores() {
        let sem = Semaphore::new(2);
        let cancel = CancelToken::new();

        let a = sem.acquire(&cancel).unwrap();
        let b = sem.acquire(&cancel).unwrap();
        assert_eq!(sem.available_permits(), 0);
        assert!(sem.try_acquire().is_none());

        drop(a);
        assert_eq!(sem.available_permits(), 1);
        b.forget();
        assert_eq!(sem.available_permits(), 1);
    }

    #[test]
    fn release_wakes_a_blocked_waiter() {
        let sem = Arc::new(Semaphore::new(0));
        let cancel = CancelToken::new();

        let waiter_sem = sem.clone();
        let waiter_cancel = cancel.clone();
        let handle = thread::spawn(move || {
            let permit = waiter_sem.acquire(&waiter_cancel).unwrap();
            permit.forget();
        });

        thread::sleep(Duration::from_millis(20));
        sem.release();
        handle.join().unwrap();
        assert_eq!(sem.available_permits(), 0);
    }

    #[test]
    fn cancellation_unblocks_without_taking_a_permit() {
        let sem = Arc::new(Semaphore::new(0));
        let cancel = CancelToken::new();

        let waiter_sem = sem.clone();
        let waiter_cancel = cancel.clone();
        let handle = thread::spawn(move || waiter_sem.acquire(&waiter_cancel).map(Permit::forget));

        thread::sleep(Duration::from_millis(20));
        cancel.cancel();
        sem.wake_all();

        assert_eq!(handle.join().unwrap(), Err(AcquireError::Cancelled));
        sem.release();
        assert_eq!(sem.available_permits(), 1);
    }

    #[test]
    fn closed_semaphore_drains_then_reports_closed() {
        let sem = Semaphore::new(1);
        let cancel = CancelToken::new();
        sem.close();

        let permit = sem.acquire(&cancel).unwrap();
        permit.forget();
        assert_eq!(sem.acquire(&cancel).unwrap_err(), AcquireError::Closed);
        assert!(sem.is_closed());
    }

    #[test]
    fn close_wakes_blocked_waiters() {
        let sem = Arc::new(Semaphore::new(0));
        let cancel = CancelToken::new();
        let mut handles = Vec::new();
        for _ in 0..3 {
            let sem = sem.clone();
            let cancel = cancel.clone();
            handles.push(thread::spawn(move || {
                let start = Instant::now();
                let result = sem.acquire(&cancel).map(Permit::forget);
                (result, start.elapsed())
            }));
        }

        thread::sleep(Duration::from_millis(20));
        sem.close();
        for handle in handles {
            let (result, elapsed) = handle.join().unwrap();
            assert_eq!(result, Err(AcquireError::Closed));
            assert!(elapsed < Duration::from_secs(5));
        }
    }

    #[test]
    fn count_never_goes_negative_under_contention() {
        let sem = Arc::new(Semaphore::new(3));
        let cancel = CancelToken::new();
        let inside = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let sem = sem.clone();
                let cancel = cancel.clone();
                let inside = inside.clone();
                let peak = peak.clone();
                thread::spawn(move || {
                    for _ in 0..50 {
                        let _permit = sem.acquire(&cancel).unwrap();
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        thread::yield_now();
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(sem.available_permits(), 3);
    }
}
