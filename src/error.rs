//! Error taxonomy for the simulation core.
//!
//! Nothing in the scheduling engine performs I/O, so the only failures are invalid configuration,
//! cooperative cancellation, and a closed queue signalling that no more work will arrive.

use thiserror::Error;

/// The run was asked to stop before the operation could complete.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("simulation cancelled")]
pub struct Cancelled;

/// Why a blocking semaphore acquire returned without a permit.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireError {
    #[error("acquire interrupted by cancellation")]
    Cancelled,

    #[error("semaphore closed with no permits left")]
    Closed,
}

impl From<Cancelled> for AcquireError {
    fn from(_: Cancelled) -> Self {
        AcquireError::Cancelled
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("at least one processor is required")]
    NoProcessors,

    #[error("job class count must be between 1 and {max}, got {got}")]
    JobClassCount { got: usize, max: usize },

    #[error("buffer capacity must be positive")]
    ZeroCapacity,

    #[error("round-robin timeslice must be positive")]
    ZeroTimeslice,

    #[error("time unit must be non-zero")]
    ZeroTimeUnit,

    #[error("service length for {0} jobs must be positive")]
    ZeroServiceLength(&'static str),

    #[error("core list has {cores} entries but {processors} processors were requested")]
    CoreListMismatch { cores: usize, processors: usize },
}

#[derive(Error, Debug)]
pub enum SimError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} thread panicked")]
    ActorPanicked(String),
}

pub type Result<T> = std::result::Result<T, SimError>;
