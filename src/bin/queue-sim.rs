//! Queue Simulation CLI Tool
//!
//! Generates a seeded population of participants, pushes them through the
//! matchmaking pipeline and reports match quality.
//!
//! Usage:
//!   cargo run --bin queue-sim -- --help
//!   cargo run --bin queue-sim -- --players 10000 --matches 1000
//!   cargo run --bin queue-sim -- --scenario mid-heavy --players 100

use anyhow::{anyhow, Result};
use chrono::{TimeZone, Utc};
use clap::{Parser, ValueEnum};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use role_queue::config::MatchmakingConfig;
use role_queue::utils::percentile;
use role_queue::{
    AssignmentKind, FixedClock, InMemoryMatchStore, MatchOutcome, MatchRecord, MatchScheduler,
    Participant, Role,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Consecutive failed attempts tolerated before the run stops
const MAX_FAILURES: usize = 10;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Scenario {
    /// Skill around 1500 with a spread of 400, realistic role mix
    Realistic,
    /// Narrow skill band with most players wanting MID
    MidHeavy,
}

#[derive(Parser)]
#[command(name = "queue-sim")]
#[command(about = "Seeded matchmaking simulation reporting match quality")]
struct Cli {
    /// Participants to generate
    #[arg(short, long, default_value = "10000")]
    players: usize,

    /// Stop after this many matches
    #[arg(short, long, default_value = "1000")]
    matches: usize,

    /// Random seed
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Largest accepted team skill difference
    #[arg(long, default_value = "150")]
    max_skill_difference: i64,

    /// Population shape
    #[arg(long, value_enum, default_value = "realistic")]
    scenario: Scenario,
}

/// Approximately normal sample from the sum of uniforms
fn sample_skill(rng: &mut StdRng, mean: f64, std_dev: f64) -> u32 {
    let sum: f64 = (0..12).map(|_| rng.gen::<f64>()).sum();
    let skill = mean + (sum - 6.0) * std_dev;
    skill.clamp(0.0, 3000.0) as u32
}

fn weighted_role(rng: &mut StdRng) -> Role {
    let roll: f64 = rng.gen();
    if roll < 0.25 {
        Role::Mid
    } else if roll < 0.45 {
        Role::Adc
    } else if roll < 0.65 {
        Role::Top
    } else if roll < 0.82 {
        Role::Jungle
    } else {
        Role::Support
    }
}

fn generate_realistic(rng: &mut StdRng, count: usize) -> Result<Vec<Participant>> {
    (0..count)
        .map(|i| {
            let skill = sample_skill(rng, 1500.0, 400.0);
            let primary = weighted_role(rng);
            let mut secondary = weighted_role(rng);
            while secondary == primary {
                secondary = weighted_role(rng);
            }
            Participant::new(
                format!("player_{:05}", i),
                format!("Player{}", i),
                skill,
                primary,
                secondary,
            )
        })
        .collect()
}

fn generate_mid_heavy(rng: &mut StdRng, count: usize) -> Result<Vec<Participant>> {
    (0..count)
        .map(|i| {
            let roll: f64 = rng.gen();
            let (primary, secondary) = if roll < 0.35 {
                let secondary = match Role::ALL[rng.gen_range(0..4)] {
                    Role::Mid => Role::Support,
                    role => role,
                };
                (Role::Mid, secondary)
            } else if roll < 0.55 {
                (Role::Adc, Role::Support)
            } else if roll < 0.75 {
                (Role::Top, Role::Jungle)
            } else if roll < 0.90 {
                (Role::Jungle, Role::Top)
            } else {
                (Role::Support, Role::Adc)
            };
            Participant::new(
                format!("p{}", i),
                format!("Player{}", i),
                1500 + rng.gen_range(0..200),
                primary,
                secondary,
            )
        })
        .collect()
}

#[derive(Debug, Default)]
struct Report {
    differences: Vec<i64>,
    spreads: Vec<u32>,
    kinds: BTreeMap<&'static str, usize>,
    failures: BTreeMap<&'static str, usize>,
}

impl Report {
    fn record(&mut self, record: &MatchRecord) {
        self.differences.push(record.skill_difference);

        let skills: Vec<u32> = record.assignments().map(|a| a.participant.skill).collect();
        let spread = match (skills.iter().min(), skills.iter().max()) {
            (Some(min), Some(max)) => max - min,
            _ => 0,
        };
        self.spreads.push(spread);

        for assignment in record.assignments() {
            *self.kinds.entry(assignment.kind.as_str()).or_default() += 1;
        }
    }

    fn print(&self, elapsed_ms: u128, remaining: usize) {
        let matches = self.differences.len();
        println!();
        println!("Simulation results");
        println!("══════════════════════════════════════════════════");
        println!("Matches created: {}", matches);
        println!("Players left waiting: {}", remaining);
        println!(
            "Elapsed: {}ms ({:.1} matches/sec)",
            elapsed_ms,
            matches as f64 * 1000.0 / elapsed_ms.max(1) as f64
        );

        if matches == 0 {
            println!("No matches were created");
            return;
        }

        let assigned: usize = self.kinds.values().sum();
        println!();
        println!("Role satisfaction");
        for kind in AssignmentKind::ALL {
            let count = self.kinds.get(kind.as_str()).copied().unwrap_or_default();
            println!(
                "  {:<10} {:>6} ({:>5.1}%)",
                kind.as_str(),
                count,
                count as f64 * 100.0 / assigned as f64
            );
        }

        let mut sorted = self.differences.clone();
        sorted.sort_unstable();
        let avg = sorted.iter().sum::<i64>() as f64 / matches as f64;
        println!();
        println!("Skill difference");
        println!("  Average: {:.1}", avg);
        println!("  Min: {}", sorted[0]);
        println!("  Max: {}", sorted[sorted.len() - 1]);
        for pct in [50.0, 90.0, 95.0, 99.0] {
            println!("  P{}: {}", pct, percentile(&sorted, pct));
        }

        let perfect = sorted.iter().filter(|d| **d <= 20).count();
        let great = sorted.iter().filter(|d| **d > 20 && **d <= 50).count();
        let good = sorted.iter().filter(|d| **d > 50 && **d <= 100).count();
        let fair = matches - perfect - great - good;
        println!(
            "  Quality: perfect {} / great {} / good {} / fair {}",
            perfect, great, good, fair
        );

        let avg_spread =
            self.spreads.iter().map(|s| f64::from(*s)).sum::<f64>() / matches as f64;
        println!();
        println!("Average window spread: {:.1}", avg_spread);

        if !self.failures.is_empty() {
            println!();
            println!("Failed attempts");
            for (reason, count) in &self.failures {
                println!("  {}: {}", reason, count);
            }
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let mut rng = StdRng::seed_from_u64(cli.seed);

    let config = MatchmakingConfig::default().with_max_skill_difference(cli.max_skill_difference);
    let start = Utc
        .with_ymd_and_hms(2024, 1, 1, 12, 0, 0)
        .single()
        .ok_or_else(|| anyhow!("Invalid simulation start time"))?;
    let clock = Arc::new(FixedClock::new(start));
    let scheduler = MatchScheduler::new(config, Arc::new(InMemoryMatchStore::new()), clock)?;

    println!(
        "Generating {} participants ({:?}, seed {})",
        cli.players, cli.scenario, cli.seed
    );
    let participants = match cli.scenario {
        Scenario::Realistic => generate_realistic(&mut rng, cli.players)?,
        Scenario::MidHeavy => generate_mid_heavy(&mut rng, cli.players)?,
    };

    let started = Instant::now();
    for participant in participants {
        scheduler.enqueue(participant)?;
    }
    info!(
        "Enqueued {} participants in {}ms",
        scheduler.queue_size()?,
        started.elapsed().as_millis()
    );

    let required = scheduler.config().players_per_match;
    let mut report = Report::default();
    let mut consecutive_failures = 0;
    let started = Instant::now();

    while report.differences.len() < cli.matches && scheduler.queue_size()? >= required {
        match scheduler.attempt_match()? {
            MatchOutcome::Matched(record) => {
                consecutive_failures = 0;
                report.record(&record);
                if report.differences.len() % 100 == 0 {
                    println!(
                        "  Created {} matches, queue size: {}",
                        report.differences.len(),
                        scheduler.queue_size()?
                    );
                }
            }
            MatchOutcome::Failed(reason) => {
                debug!("Attempt failed: {}", reason);
                *report.failures.entry(reason.label()).or_default() += 1;
                consecutive_failures += 1;
                if consecutive_failures > MAX_FAILURES {
                    println!("  Too many failures, stopping");
                    break;
                }
            }
        }
    }

    report.print(started.elapsed().as_millis(), scheduler.queue_size()?);
    Ok(())
}
