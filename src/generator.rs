//! Job generators: one producer per job class, issuing jobs at a class-specific cadence until
//! the shared quota runs out.

use crate::class::{ClassTable, JobClass};
use crate::context::{RunContext, SimEvent};
use crate::error::AcquireError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// How the pause between two arrivals of the same class is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Arrival {
    /// Always the configured mean interval.
    #[default]
    Fixed,
    /// Exponentially distributed around the configured mean, from a seeded generator.
    Exponential { seed: u64 },
}

/// Draws inter-arrival intervals (in time units) for one class.
#[derive(Debug)]
pub struct ArrivalSampler {
    mean_units: u64,
    rng: Option<StdRng>,
}

impl ArrivalSampler {
    pub fn new(arrival: Arrival, class: JobClass, mean_units: u64) -> Self {
        let rng = match arrival {
            Arrival::Fixed => None,
            Arrival::Exponential { seed } => {
                Some(StdRng::seed_from_u64(seed.wrapping_add(class.index() as u64)))
            }
        };
        Self { mean_units, rng }
    }

    pub fn next_units(&mut self) -> u64 {
        match &mut self.rng {
            None => self.mean_units,
            Some(rng) => {
                // `gen` yields [0, 1); flip it so ln never sees zero.
                let u: f64 = 1.0 - rng.gen::<f64>();
                (self.mean_units as f64 * -u.ln()).round() as u64
            }
        }
    }
}

/// Producer actor for a single job class.
pub struct Generator {
    class: JobClass,
    ctx: Arc<RunContext>,
    arrivals: ArrivalSampler,
}

impl Generator {
    pub fn new(class: JobClass, ctx: Arc<RunContext>, arrivals: ArrivalSampler) -> Self {
        Self {
            class,
            ctx,
            arrivals,
        }
    }

    /// Build one generator per class listed in `classes`.
    pub fn for_classes(
        classes: &[JobClass],
        ctx: &Arc<RunContext>,
        arrival: Arrival,
        arrival_units: &ClassTable<u64>,
    ) -> Vec<Generator> {
        classes
            .iter()
            .map(|&class| {
                let sampler = ArrivalSampler::new(arrival, class, arrival_units[class]);
                Generator::new(class, ctx.clone(), sampler)
            })
            .collect()
    }

    pub fn class(&self) -> JobClass {
        self.class
    }

    /// Produce jobs until the quota is exhausted or the run is cancelled.
    ///
    /// Returns the number of jobs this generator enqueued.
    pub fn run(mut self) -> u64 {
        let ctx = self.ctx.clone();
        let mut produced = 0;
        while ctx.claim_quota() {
            let slot = match ctx.queue.reserve_slot(&ctx.cancel) {
                Ok(slot) => slot,
                Err(AcquireError::Cancelled) | Err(AcquireError::Closed) => break,
            };
            let job = ctx.new_job(self.class);
            let (id, at) = (job.id, job.generated_at);
            tracing::debug!(
                job = id,
                class = %self.class,
                at = ?at,
                "A{}{}",
                self.class.tag(),
                id
            );
            ctx.queue.enqueue(job, slot);
            ctx.emit(SimEvent::Generated {
                job: id,
                class: self.class,
                at,
            });
            produced += 1;

            let pause = self.arrivals.next_units();
            if ctx.clock.sleep_units(pause, &ctx.cancel).is_err() {
                break;
            }
        }
        tracing::debug!(class = %self.class, produced, "generator finished");
        produced
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::VirtualClock;
    use crate::scheduler::fcfs::Fcfs;
    use std::time::Duration;

    fn context(total_jobs: u64, capacity: usize) -> Arc<RunContext> {
        Arc::new(RunContext::new(
            capacity,
            1,
            total_jobs,
            ClassTable::from_fn(|class| match class {
                JobClass::Short => 5,
                JobClass::Long => 50,
            }),
            Arc::new(Fcfs),
            Arc::new(VirtualClock::new(Duration::from_millis(1))),
            false,
        ))
    }

    #[test]
    fn fixed_arrivals_use_the_mean() {
        let mut sampler = ArrivalSampler::new(Arrival::Fixed, JobClass::Short, 2);
        assert_eq!(sampler.next_units(), 2);
        assert_eq!(sampler.next_units(), 2);
    }

    #[test]
    fn exponential_arrivals_are_reproducible() {
        let draw = || {
            let mut sampler =
                ArrivalSampler::new(Arrival::Exponential { seed: 42 }, JobClass::Long, 5);
            (0..20).map(|_| sampler.next_units()).collect::<Vec<_>>()
        };
        let first = draw();
        assert_eq!(first, draw());
        let mean = first.iter().sum::<u64>() as f64 / first.len() as f64;
        assert!(mean < 25.0, "mean interval {mean} is implausible");
    }

    #[test]
    fn generator_stops_at_quota() {
        let ctx = context(3, 10);
        let generator = Generator::new(
            JobClass::Short,
            ctx.clone(),
            ArrivalSampler::new(Arrival::Fixed, JobClass::Short, 2),
        );
        assert_eq!(generator.run(), 3);
        assert_eq!(ctx.remaining_quota(), 0);
        assert_eq!(ctx.queue().queued_ids(), vec![0, 1, 2]);
        assert_eq!(ctx.queue().filled_slots(), 3);
    }

    #[test]
    fn zero_quota_produces_nothing() {
        let ctx = context(0, 10);
        let generator = Generator::new(
            JobClass::Long,
            ctx.clone(),
            ArrivalSampler::new(Arrival::Fixed, JobClass::Long, 5),
        );
        assert_eq!(generator.run(), 0);
        assert!(ctx.queue().is_empty());
    }

    #[test]
    fn cancelled_generator_returns_its_reservation() {
        let ctx = context(5, 1);
        ctx.cancel();
        let generator = Generator::new(
            JobClass::Short,
            ctx.clone(),
            ArrivalSampler::new(Arrival::Fixed, JobClass::Short, 2),
        );
        assert_eq!(generator.run(), 0);
        assert_eq!(ctx.queue().free_slots(), 1);
    }
}
