pub mod cancel;
pub mod class;
pub mod clock;
pub mod context;
pub mod error;
pub mod generator;
pub mod job;
pub mod queue;
pub mod scheduler;
pub mod semaphore;
pub mod simulation;
pub mod stats;
pub mod threading;

// Re-export for easier testing
pub use class::{ClassTable, JobClass};
pub use context::SimEvent;
pub use error::{ConfigError, SimError};
pub use scheduler::PolicyKind;
pub use simulation::{
    start, ClassProfile, ClockKind, Simulation, SimulationConfig, SimulationHandle,
    SimulationReport,
};
