//! Simulation orchestration.
//!
//! This module turns a [`SimulationConfig`] into a shared [`RunContext`], spawns one generator
//! thread per job class and one processor thread per virtual processor, and blocks until every
//! generator has stopped and every queued or running job has completed (or the run is cancelled).

use crate::cancel::CancelToken;
use crate::class::{ClassTable, JobClass};
use crate::clock::{Clock, SystemClock, VirtualClock};
use crate::context::{RunContext, SimEvent};
use crate::error::{ConfigError, Result};
use crate::generator::{Arrival, Generator};
use crate::job::ProcessorId;
use crate::scheduler::round_robin::{DEFAULT_AFFINITY_PENALTY, DEFAULT_TIMESLICE};
use crate::scheduler::{PolicyKind, Processor};
use crate::stats::{SegmentRecord, StatsSnapshot};
use crate::threading::{join_actor, pin_current_thread, spawn_actor};
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Which time source drives the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockKind {
    /// Actors really sleep; elapsed time is wall time.
    #[default]
    System,
    /// Sleeping only advances a counter; runs finish almost instantly.
    Virtual,
}

/// Service length and arrival cadence, in time units, for one job class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassProfile {
    pub service_units: u64,
    pub arrival_units: u64,
}

impl ClassProfile {
    pub const fn default_for(class: JobClass) -> Self {
        match class {
            JobClass::Short => ClassProfile {
                service_units: 5,
                arrival_units: 2,
            },
            JobClass::Long => ClassProfile {
                service_units: 50,
                arrival_units: 5,
            },
        }
    }
}

/// Top-level run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Number of virtual processors (consumer threads).
    pub processors: usize,
    /// Job classes that get a generator, in generator start order.
    pub job_classes: Vec<JobClass>,
    pub policy: PolicyKind,
    /// Round-robin timeslice in time units.
    pub timeslice: u64,
    /// Charge a delay when a round-robin job resumes on a different processor.
    pub affinity: bool,
    pub affinity_penalty: u64,
    /// Jobs generated over the whole run, shared by all generators.
    pub total_jobs: u64,
    /// Bounded buffer capacity.
    pub capacity: usize,
    pub profiles: ClassTable<ClassProfile>,
    pub arrival: Arrival,
    /// Wall-clock length of one time unit.
    pub time_unit: Duration,
    pub clock: ClockKind,
    /// Keep a log of every executed segment in the report.
    pub record_segments: bool,
    /// Pin processor `i` to host core `processor_cores[i]`.
    pub processor_cores: Option<Vec<usize>>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            processors: 2,
            job_classes: JobClass::ALL.to_vec(),
            policy: PolicyKind::default(),
            timeslice: DEFAULT_TIMESLICE,
            affinity: false,
            affinity_penalty: DEFAULT_AFFINITY_PENALTY,
            total_jobs: 50,
            capacity: 10,
            profiles: ClassTable::from_fn(ClassProfile::default_for),
            arrival: Arrival::default(),
            time_unit: Duration::from_millis(1),
            clock: ClockKind::default(),
            record_segments: false,
            processor_cores: None,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.processors == 0 {
            return Err(ConfigError::NoProcessors);
        }
        if self.job_classes.is_empty() || self.job_classes.len() > JobClass::ALL.len() {
            return Err(ConfigError::JobClassCount {
                got: self.job_classes.len(),
                max: JobClass::ALL.len(),
            });
        }
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.policy == PolicyKind::RoundRobin && self.timeslice == 0 {
            return Err(ConfigError::ZeroTimeslice);
        }
        if self.time_unit.is_zero() {
            return Err(ConfigError::ZeroTimeUnit);
        }
        for (class, profile) in self.profiles.iter() {
            if profile.service_units == 0 {
                return Err(ConfigError::ZeroServiceLength(class.label()));
            }
        }
        if let Some(cores) = &self.processor_cores {
            if cores.len() != self.processors {
                return Err(ConfigError::CoreListMismatch {
                    cores: cores.len(),
                    processors: self.processors,
                });
            }
        }
        Ok(())
    }
}

/// Everything the run produced, available once it has finished.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    pub policy: PolicyKind,
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
    pub stats: StatsSnapshot,
    pub generated: u64,
    pub segments_executed: u64,
    pub cancelled: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub segments: Option<Vec<SegmentRecord>>,
}

impl SimulationReport {
    pub fn throughput(&self, class: JobClass) -> f64 {
        self.stats.throughput(class, self.elapsed)
    }

    pub fn total_throughput(&self) -> f64 {
        self.stats.total_throughput(self.elapsed)
    }

    pub fn utilization(&self, processor: ProcessorId) -> f64 {
        self.stats.utilization(processor, self.elapsed)
    }

    pub fn utilization_percent(&self, processor: ProcessorId) -> f64 {
        self.stats.utilization_percent(processor, self.elapsed)
    }

    pub fn completed(&self) -> u64 {
        self.stats.total_completions()
    }
}

/// Cloneable handle for stopping a run from another thread (e.g. a signal handler).
#[derive(Debug, Clone)]
pub struct SimulationHandle {
    cancel: CancelToken,
    running: Arc<Mutex<Weak<RunContext>>>,
}

impl SimulationHandle {
    /// Stop the run and wake every actor blocked on the queue.
    pub fn cancel(&self) {
        self.cancel.cancel();
        if let Some(ctx) = self.running.lock().upgrade() {
            ctx.queue.wake_all();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

pub struct Simulation {
    config: SimulationConfig,
    cancel: CancelToken,
    events: Option<Sender<SimEvent>>,
    running: Arc<Mutex<Weak<RunContext>>>,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            cancel: CancelToken::new(),
            events: None,
            running: Arc::new(Mutex::new(Weak::new())),
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn handle(&self) -> SimulationHandle {
        SimulationHandle {
            cancel: self.cancel.clone(),
            running: self.running.clone(),
        }
    }

    /// Stream generation / completion events to `events` while running.
    pub fn with_events(mut self, events: Sender<SimEvent>) -> Self {
        self.events = Some(events);
        self
    }

    fn build_clock(&self) -> Arc<dyn Clock> {
        match self.config.clock {
            ClockKind::System => Arc::new(SystemClock::new(self.config.time_unit)),
            ClockKind::Virtual => Arc::new(VirtualClock::new(self.config.time_unit)),
        }
    }

    /// Run to completion and return the final statistics.
    pub fn run(self) -> Result<SimulationReport> {
        let config = &self.config;
        let policy = config
            .policy
            .build(config.timeslice, config.affinity, config.affinity_penalty)?;
        let clock = self.build_clock();

        let mut ctx = RunContext::new(
            config.capacity,
            config.processors,
            config.total_jobs,
            config.profiles.map(|_, profile| profile.service_units),
            policy,
            clock.clone(),
            config.record_segments,
        )
        .with_cancel(self.cancel.clone());
        if let Some(events) = self.events.clone() {
            ctx = ctx.with_events(events);
        }
        let ctx = Arc::new(ctx);
        *self.running.lock() = Arc::downgrade(&ctx);
        // A cancel that arrived before the context existed had nothing to wake.
        if self.cancel.is_cancelled() {
            ctx.queue.wake_all();
        }

        tracing::info!(
            policy = %config.policy,
            processors = config.processors,
            classes = config.job_classes.len(),
            total_jobs = config.total_jobs,
            capacity = config.capacity,
            "simulation starting"
        );

        let arrival_units = config.profiles.map(|_, profile| profile.arrival_units);
        let mut generators = Vec::new();
        for generator in
            Generator::for_classes(&config.job_classes, &ctx, config.arrival, &arrival_units)
        {
            let name = format!("Generator-{}", generator.class());
            let handle = spawn_actor(name, move || generator.run());
            generators.push(handle.inspect_err(|_| ctx.cancel())?);
        }

        let mut processors = Vec::new();
        for id in 0..config.processors {
            let processor = Processor::new(id, ctx.clone());
            let core = config.processor_cores.as_ref().map(|cores| cores[id]);
            let handle = spawn_actor(format!("Processor-{id}"), move || {
                if let Some(core) = core {
                    pin_current_thread(core);
                }
                processor.run()
            });
            // Actors already running must not block forever on a half-built run.
            processors.push(handle.inspect_err(|_| ctx.cancel())?);
        }

        let mut generated = 0;
        for handle in generators {
            generated += join_actor(handle)?;
        }
        let mut segments_executed = 0;
        for handle in processors {
            segments_executed += join_actor(handle)?;
        }
        let elapsed = clock.now();

        let cancelled = self.cancel.is_cancelled() && ctx.completed_jobs() < ctx.total_jobs();

        tracing::info!(
            elapsed = ?elapsed,
            generated,
            completed = ctx.completed_jobs(),
            cancelled,
            "simulation finished"
        );

        Ok(SimulationReport {
            policy: config.policy,
            elapsed,
            stats: ctx.stats.snapshot(),
            generated,
            segments_executed,
            cancelled,
            segments: ctx.stats.take_segments(),
        })
    }
}

/// Run one simulation with the given shape and default class profiles, blocking until done.
pub fn start(
    num_processors: usize,
    num_job_classes: usize,
    policy: PolicyKind,
    timeslice: u64,
    affinity: bool,
    total_jobs: u64,
    capacity: usize,
) -> Result<SimulationReport> {
    if num_job_classes > JobClass::ALL.len() {
        return Err(ConfigError::JobClassCount {
            got: num_job_classes,
            max: JobClass::ALL.len(),
        }
        .into());
    }
    let config = SimulationConfig {
        processors: num_processors,
        job_classes: JobClass::ALL.iter().copied().take(num_job_classes).collect(),
        policy,
        timeslice,
        affinity,
        total_jobs,
        capacity,
        ..SimulationConfig::default()
    };
    Simulation::new(config)?.run()
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Ok(Duration::from_secs_f64(secs.max(0.0)))
    }
}
