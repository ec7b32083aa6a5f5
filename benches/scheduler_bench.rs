use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;
use std::time::Duration;

use os_sched_sim::cancel::CancelToken;
use os_sched_sim::class::{ClassTable, JobClass};
use os_sched_sim::clock::VirtualClock;
use os_sched_sim::context::RunContext;
use os_sched_sim::job::Job;
use os_sched_sim::queue::BoundedJobQueue;
use os_sched_sim::scheduler::{PolicyKind, Processor, RoundRobin, SchedulingPolicy};
use os_sched_sim::semaphore::Semaphore;
use os_sched_sim::stats::Accumulator;
use os_sched_sim::{ClockKind, Simulation, SimulationConfig};

fn bench_semaphore(c: &mut Criterion) {
    let mut group = c.benchmark_group("semaphore");

    group.bench_function("acquire_release", |b| {
        let semaphore = Semaphore::new(1);
        let cancel = CancelToken::new();
        b.iter(|| {
            let permit = semaphore.acquire(black_box(&cancel)).unwrap();
            drop(permit);
        });
    });

    group.bench_function("try_acquire_empty", |b| {
        let semaphore = Semaphore::new(0);
        b.iter(|| black_box(semaphore.try_acquire().is_none()));
    });

    group.finish();
}

fn bench_queue(c: &mut Criterion) {
    let mut group = c.benchmark_group("bounded_queue");

    group.bench_function("enqueue_dequeue_release", |b| {
        let queue = BoundedJobQueue::new(10);
        let cancel = CancelToken::new();
        let job = Job::new(0, JobClass::Short, 5, Duration::ZERO);
        b.iter(|| {
            let slot = queue.reserve_slot(&cancel).unwrap();
            queue.enqueue(black_box(job.clone()), slot);
            let claim = queue.claim(&cancel).unwrap();
            let (job, held) = queue.dequeue_head(claim);
            held.release();
            black_box(job);
        });
    });

    group.bench_function("requeue_round_trip", |b| {
        let queue = BoundedJobQueue::new(10);
        let cancel = CancelToken::new();
        let slot = queue.reserve_slot(&cancel).unwrap();
        queue.enqueue(Job::new(0, JobClass::Long, 50, Duration::ZERO), slot);
        b.iter(|| {
            let claim = queue.claim(&cancel).unwrap();
            let (job, held) = queue.dequeue_head(claim);
            held.requeue(black_box(job));
        });
    });

    group.finish();
}

fn bench_policies(c: &mut Criterion) {
    let mut group = c.benchmark_group("policy");
    let rr = RoundRobin::new(8).unwrap().with_affinity_penalty(1);
    let mut job = Job::new(0, JobClass::Long, 50, Duration::ZERO);
    job.last_processor = Some(0);

    group.bench_function("round_robin_plan", |b| {
        b.iter(|| black_box(rr.plan(black_box(&job), black_box(1))));
    });

    group.finish();
}

fn bench_stats(c: &mut Criterion) {
    let mut group = c.benchmark_group("stats");

    group.bench_function("accumulator_record", |b| {
        let mut acc = Accumulator::new();
        let mut x = 0.0;
        b.iter(|| {
            x += 1.5;
            acc.record(black_box(x));
        });
    });

    group.finish();
}

fn bench_processor(c: &mut Criterion) {
    let mut group = c.benchmark_group("processor");

    group.bench_function("round_robin_long_job", |b| {
        b.iter(|| {
            let ctx = Arc::new(RunContext::new(
                4,
                1,
                1,
                ClassTable::from_fn(|class| match class {
                    JobClass::Short => 5,
                    JobClass::Long => 50,
                }),
                Arc::new(RoundRobin::new(8).unwrap()),
                Arc::new(VirtualClock::new(Duration::from_millis(1))),
                false,
            ));
            let slot = ctx.queue().reserve_slot(ctx.cancel_token()).unwrap();
            ctx.queue().enqueue(ctx.new_job(JobClass::Long), slot);
            black_box(Processor::new(0, ctx).run())
        });
    });

    group.finish();
}

fn bench_simulation(c: &mut Criterion) {
    let mut group = c.benchmark_group("simulation");
    group.sample_size(20);

    for policy in [PolicyKind::Fcfs, PolicyKind::RoundRobin] {
        group.bench_function(format!("virtual_{policy}"), |b| {
            b.iter(|| {
                let config = SimulationConfig {
                    policy,
                    clock: ClockKind::Virtual,
                    total_jobs: 200,
                    ..SimulationConfig::default()
                };
                black_box(Simulation::new(config).unwrap().run().unwrap())
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_semaphore,
    bench_queue,
    bench_policies,
    bench_stats,
    bench_processor,
    bench_simulation
);
criterion_main!(benches);
