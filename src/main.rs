// Simulation binary - runs one scheduler simulation and prints the final statistics
//
// The binary parses the run shape from the command line, starts the simulation on its own thread
// while a progress bar follows generation and completion events, cancels the run on Ctrl+C, and
// prints either a text report or the JSON-serialized report.

use clap::{Parser, ValueEnum};
use crossbeam_channel::unbounded;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use os_sched_sim::generator::Arrival;
use os_sched_sim::threading::{join_actor, spawn_actor};
use os_sched_sim::{
    ClassProfile, ClassTable, ClockKind, ConfigError, JobClass, PolicyKind, SimEvent, Simulation,
    SimulationConfig, SimulationReport,
};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PolicyArg {
    Fcfs,
    #[value(alias = "rr")]
    RoundRobin,
}

impl From<PolicyArg> for PolicyKind {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Fcfs => PolicyKind::Fcfs,
            PolicyArg::RoundRobin => PolicyKind::RoundRobin,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "os-sched-sim")]
#[command(version)]
#[command(about = "Producer/consumer job scheduler simulation (FCFS and round-robin)")]
struct Args {
    /// Scheduling discipline
    #[arg(long, value_enum, default_value = "fcfs")]
    policy: PolicyArg,

    /// Number of virtual processors
    #[arg(long, short = 'p', default_value = "2")]
    processors: usize,

    /// Number of job classes with a generator (1 = short only, 2 = short and long)
    #[arg(long, default_value = "2")]
    job_classes: usize,

    /// Total number of jobs generated across all classes
    #[arg(long, short = 'n', default_value = "50")]
    jobs: u64,

    /// Bounded buffer capacity
    #[arg(long, default_value = "10")]
    capacity: usize,

    /// Round-robin timeslice, in time units
    #[arg(long, default_value = "8")]
    timeslice: u64,

    /// Charge a delay when a round-robin job resumes on a different processor
    #[arg(long)]
    affinity: bool,

    /// Migration delay in time units (with --affinity)
    #[arg(long, default_value = "1")]
    affinity_penalty: u64,

    /// Service length of short jobs, in time units
    #[arg(long, default_value = "5")]
    short_service: u64,

    /// Service length of long jobs, in time units
    #[arg(long, default_value = "50")]
    long_service: u64,

    /// Interval between short job arrivals, in time units
    #[arg(long, default_value = "2")]
    short_arrival: u64,

    /// Interval between long job arrivals, in time units
    #[arg(long, default_value = "5")]
    long_arrival: u64,

    /// Draw arrival intervals from an exponential distribution seeded with this value
    #[arg(long)]
    exponential_seed: Option<u64>,

    /// Wall-clock length of one time unit, in microseconds
    #[arg(long, default_value = "1000")]
    unit_micros: u64,

    /// Advance a virtual clock instead of sleeping
    #[arg(long)]
    virtual_time: bool,

    /// Pin processors to host cores (comma-separated, one per processor)
    #[arg(long, value_delimiter = ',')]
    cores: Option<Vec<usize>>,

    /// Include the per-segment execution trace in the JSON report
    #[arg(long)]
    trace_segments: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Hide the progress bars
    #[arg(long, short = 'q')]
    quiet: bool,
}

impl Args {
    fn to_config(&self) -> SimulationConfig {
        let profiles = ClassTable::from_fn(|class| match class {
            JobClass::Short => ClassProfile {
                service_units: self.short_service,
                arrival_units: self.short_arrival,
            },
            JobClass::Long => ClassProfile {
                service_units: self.long_service,
                arrival_units: self.long_arrival,
            },
        });
        SimulationConfig {
            processors: self.processors,
            job_classes: JobClass::ALL
                .iter()
                .copied()
                .take(self.job_classes)
                .collect(),
            policy: self.policy.into(),
            timeslice: self.timeslice,
            affinity: self.affinity,
            affinity_penalty: self.affinity_penalty,
            total_jobs: self.jobs,
            capacity: self.capacity,
            profiles,
            arrival: match self.exponential_seed {
                Some(seed) => Arrival::Exponential { seed },
                None => Arrival::Fixed,
            },
            time_unit: Duration::from_micros(self.unit_micros),
            clock: if self.virtual_time {
                ClockKind::Virtual
            } else {
                ClockKind::System
            },
            record_segments: self.trace_segments,
            processor_cores: self.cores.clone(),
        }
    }
}

fn progress_bars(total: u64) -> (MultiProgress, ProgressBar, ProgressBar) {
    let style = ProgressStyle::with_template(
        "{prefix:>10} [{bar:40.cyan/blue}] {pos:>5}/{len:5} ({percent:>3.0}%)",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("=>-");

    let multi = MultiProgress::new();
    let generated = multi.add(ProgressBar::new(total));
    generated.set_style(style.clone());
    generated.set_prefix("Generated");
    let completed = multi.add(ProgressBar::new(total));
    completed.set_style(style);
    completed.set_prefix("Completed");
    (multi, generated, completed)
}

fn print_report(report: &SimulationReport, config: &SimulationConfig) {
    println!();
    println!(
        "Policy: {} | processors: {} | jobs: {}/{} completed | elapsed: {:.3}s{}",
        report.policy,
        config.processors,
        report.completed(),
        config.total_jobs,
        report.elapsed.as_secs_f64(),
        if report.cancelled { " (cancelled)" } else { "" }
    );

    println!();
    println!("Processor utilization:");
    for processor in 0..config.processors {
        println!(
            "  Processor {processor}: {:6.2}%",
            report.utilization_percent(processor)
        );
    }

    println!();
    println!("Throughput (jobs per 100 time units):");
    for &class in &config.job_classes {
        println!("  {:<6} {:8.3}", class.label(), report.throughput(class));
    }
    println!("  {:<6} {:8.3}", "total", report.total_throughput());

    println!();
    println!(
        "{:<6} {:>6} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10}",
        "class", "jobs", "wait min", "wait avg", "wait max", "svc min", "svc avg", "svc max"
    );
    for &class in &config.job_classes {
        let stats = &report.stats.classes[class];
        if stats.completions == 0 {
            println!("{:<6} {:>6} {:>10}", class.label(), 0, "-");
            continue;
        }
        println!(
            "{:<6} {:>6} {:>10.2} {:>10.2} {:>10.2} {:>10.2} {:>10.2} {:>10.2}",
            class.label(),
            stats.completions,
            stats.wait.min,
            stats.wait.average,
            stats.wait.max,
            stats.service.min,
            stats.service.average,
            stats.service.max
        );
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if args.job_classes > JobClass::ALL.len() {
        return Err(ConfigError::JobClassCount {
            got: args.job_classes,
            max: JobClass::ALL.len(),
        }
        .into());
    }
    let config = args.to_config();
    let (events_tx, events_rx) = unbounded();
    let simulation = Simulation::new(config.clone())?.with_events(events_tx);

    // Handle Ctrl+C
    let handle = simulation.handle();
    ctrlc::set_handler(move || {
        tracing::warn!("interrupt received, cancelling simulation");
        handle.cancel();
    })?;

    let show_progress = !(args.quiet || args.json);
    let total_jobs = config.total_jobs;
    let progress = spawn_actor("Progress".to_string(), move || {
        let bars = show_progress.then(|| progress_bars(total_jobs));
        // Ends once the simulation drops every sender.
        for event in events_rx {
            if let Some((_, generated, completed)) = &bars {
                match event {
                    SimEvent::Generated { .. } => generated.inc(1),
                    SimEvent::Completed { .. } => completed.inc(1),
                }
            }
        }
        if let Some((_, generated, completed)) = bars {
            generated.finish();
            completed.finish();
        }
    })?;

    let report = simulation.run()?;
    join_actor(progress)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report, &config);
    }
    Ok(())
}
