//! Thread spawning and optional core pinning for simulation actors.
use crate::error::SimError;
use std::thread::{self, JoinHandle};

/// Spawn a named actor thread.
pub fn spawn_actor<T, F>(name: String, f: F) -> Result<JoinHandle<T>, SimError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    thread::Builder::new()
        .name(name.clone())
        .spawn(f)
        .map_err(|source| SimError::Spawn { name, source })
}

/// Join an actor thread, turning a panic into an error naming the thread.
pub fn join_actor<T>(handle: JoinHandle<T>) -> Result<T, SimError> {
    let name = handle
        .thread()
        .name()
        .unwrap_or("unnamed")
        .to_string();
    handle.join().map_err(|_| SimError::ActorPanicked(name))
}

/// Attempt to pin the current thread to a specific core when supported.
///
/// Restricts the calling thread to one CPU core, so each virtual processor maps onto a real
/// core and its utilization figures are not skewed by the host migrating threads.
///
/// # Platform Support
/// - **Linux**: Uses `pthread_setaffinity_np` to pin the thread to `core_id`
/// - **Other platforms**: No-op (thread pinning not available or requires different APIs)
///
/// # Arguments
/// * `core_id` - CPU core ID to pin the thread to (0-indexed, below `CPU_SETSIZE`)
///
/// # Returns
/// `true` if the thread is now pinned, `false` if the core is out of range, the request was
/// refused, or the platform has no support.
///
/// # Note
/// On Linux, thread pinning may require appropriate capabilities. A refused request is logged
/// and the thread keeps running unpinned.
pub fn pin_current_thread(core_id: usize) -> bool {
    #[cfg(target_os = "linux")]
    let pinned = unsafe {
        use libc::{cpu_set_t, pthread_self, pthread_setaffinity_np, CPU_SET, CPU_SETSIZE, CPU_ZERO};
        if core_id >= CPU_SETSIZE as usize {
            tracing::warn!(core = core_id, "core id outside the cpu set, not pinning");
            return false;
        }
        let mut set: cpu_set_t = std::mem::zeroed();
        CPU_ZERO(&mut set);
        CPU_SET(core_id, &mut set);
        let rc = pthread_setaffinity_np(pthread_self(), std::mem::size_of::<cpu_set_t>(), &set);
        if rc != 0 {
            tracing::warn!(core = core_id, rc, "failed to pin thread");
        }
        rc == 0
    };
    #[cfg(not(target_os = "linux"))]
    let pinned = {
        let _ = core_id;
        false
    };
    pinned
}
