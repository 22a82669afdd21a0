//! ecgsim CLI
//!
//! Run verification scenarios, export rhythm strips, or drive the standard
//! heart against the wall clock.

use clap::Parser;
use ecgsim_core::{
    load_param_changes, AnatomyTable, ConductionGraph, Lead, MonitorConfig, MonitorRuntime, ParamChange, RhythmStepper,
};
use ecgsim_env::{MonitorContext, TokioContext};
use ecgsim_sim::scenarios::ScenarioId;
use ecgsim_sim::{ScenarioResult, ScenarioRunner, SimConfig, SimWorld, StripExport};
use std::time::Duration;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// ecgsim - cardiac conduction simulator
#[derive(Parser, Debug)]
#[command(name = "ecgsim")]
#[command(about = "Simulate cardiac conduction and twelve-lead ECG output", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Scenario to run (sinus_automaticity, collision, wenckebach, ..., all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Number of consecutive seeds to test (for CI mode)
    #[arg(long, default_value = "1")]
    seeds: usize,

    /// Simulated duration in seconds
    #[arg(short, long, default_value = "10")]
    duration: f64,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Run the standard heart and export the strip to this JSON file
    #[arg(long)]
    export: Option<String>,

    /// Monitor configuration JSON file
    #[arg(long)]
    config: Option<String>,

    /// JSON array of parameter changes applied to the standard heart
    #[arg(long)]
    params: Option<String>,

    /// Drive the standard heart against the wall clock for --duration seconds
    #[arg(long)]
    realtime: bool,
}

/// `RUST_LOG` directives when given, otherwise INFO (DEBUG with `--verbose`).
fn log_filter(verbose: bool, directives: Option<&str>) -> EnvFilter {
    let fallback = if verbose { "debug" } else { "info" };
    match directives {
        Some(d) if !d.trim().is_empty() => EnvFilter::try_new(d).unwrap_or_else(|e| {
            eprintln!("Ignoring RUST_LOG ({}), using {}", e, fallback);
            EnvFilter::new(fallback)
        }),
        _ => EnvFilter::new(fallback),
    }
}

/// Logs `err` and exits non-zero.
fn fail(context: &str, err: impl std::fmt::Display) -> ! {
    error!("{}: {}", context, err);
    std::process::exit(1);
}

/// Standard heart on a virtual clock, exported to `path`.
fn run_with_export(seed: u64, duration: f64, monitor: MonitorConfig, changes: &[ParamChange], path: &str) {
    let config = SimConfig {
        seed,
        duration_secs: duration,
        monitor,
    };
    let mut world = SimWorld::standard(config, changes).unwrap_or_else(|e| fail("Invalid anatomy", e));
    world.run();

    let export = StripExport::capture("standard", &world, changes);
    if let Err(e) = export.write_to_file(path) {
        fail("Failed to write export", e);
    }

    info!(
        "Exported {} samples x {} leads to {} (rate={:?}, beats={})",
        export.lead(Lead::II).map_or(0, |s| s.samples.len()),
        export.leads.len(),
        path,
        export.heart_rate,
        export.beats
    );
    if !world.ledger().is_clean() {
        fail("Ledger violations", world.ledger().violations().join("; "));
    }
}

/// Standard heart paced by the wall clock.
fn run_realtime(duration: f64, monitor: MonitorConfig, changes: &[ParamChange]) {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_time()
        .build()
        .unwrap_or_else(|e| fail("Failed to start runtime", e));

    runtime.block_on(async {
        let ctx = TokioContext::shared();
        let mut graph = ConductionGraph::new(&AnatomyTable::standard(), ctx.derive_entropy(0))
            .unwrap_or_else(|e| fail("Invalid anatomy", e));
        graph.apply_changes(changes);

        let mut monitor_runtime = MonitorRuntime::new(ctx, RhythmStepper::new(graph, monitor));
        let seconds = duration.max(0.0).ceil() as u64;
        for second in 1..=seconds {
            monitor_runtime.run_for(Duration::from_secs(1)).await;
            let stepper = monitor_runtime.stepper();
            info!(
                "t={}s | rate={:?} | RR={:.0}ms | beats={} | II={:+.3}mV",
                second,
                stepper.heart_rate(),
                stepper.current_rr_ms(),
                stepper.beat_count(),
                stepper.streams().stream(Lead::II).latest().unwrap_or(0.0)
            );
        }
        debug!("{} frames rendered", monitor_runtime.frame_count());
    });
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let filter = log_filter(args.verbose, std::env::var("RUST_LOG").ok().as_deref());
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    if !args.json {
        info!("ecgsim v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let monitor = match &args.config {
        Some(path) => MonitorConfig::load(path).unwrap_or_else(|e| fail("Failed to load config", e)),
        None => MonitorConfig::default(),
    };
    let changes = match &args.params {
        Some(path) => load_param_changes(path).unwrap_or_else(|e| fail("Failed to load parameter changes", e)),
        None => Vec::new(),
    };

    // Determine base seed
    let base_seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(42)
    } else {
        args.seed
    };

    if args.realtime {
        run_realtime(args.duration, monitor, &changes);
        return;
    }

    if let Some(export_path) = &args.export {
        info!("Running standard heart with export to: {}", export_path);
        run_with_export(base_seed, args.duration, monitor, &changes, export_path);
        return;
    }

    // Parse scenarios
    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        vec![args.scenario.parse().unwrap_or_else(|e: String| {
            let names: Vec<&str> = ScenarioId::all().iter().map(|s| s.name()).collect();
            eprintln!("Error: {}", e);
            eprintln!("Available scenarios: {}, all", names.join(", "));
            std::process::exit(1);
        })]
    };

    // Track results
    let mut all_results: Vec<ScenarioResult> = Vec::new();
    let mut failed_count = 0;

    for seed_offset in 0..args.seeds {
        let seed = base_seed.wrapping_add(seed_offset as u64);
        let runner = ScenarioRunner::new(seed)
            .with_duration(args.duration)
            .with_config(monitor.clone());

        for scenario in &scenarios {
            let result = runner.run(*scenario);

            if !args.json {
                if result.passed {
                    info!("✓ {} (seed={}) PASSED", scenario.name(), seed);
                } else {
                    error!(
                        "✗ {} (seed={}) FAILED: {}",
                        scenario.name(),
                        seed,
                        result.failure_reason.as_deref().unwrap_or("unknown")
                    );
                }
            }

            if !result.passed {
                failed_count += 1;
            }
            all_results.push(result);
        }
    }

    // Summary
    let total = all_results.len();
    let passed = total - failed_count;

    if args.json {
        let summary = serde_json::json!({
            "total": total,
            "passed": passed,
            "failed": failed_count,
            "results": all_results.iter().map(|r| {
                serde_json::json!({
                    "scenario": r.scenario.name(),
                    "seed": r.seed,
                    "passed": r.passed,
                    "steps": r.total_steps,
                    "time_ms": r.final_time_ms,
                    "beats": r.metrics.beats,
                    "heart_rate": r.metrics.heart_rate,
                    "failure_reason": r.failure_reason,
                })
            }).collect::<Vec<_>>(),
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{}", json),
            Err(e) => fail("Failed to encode summary", e),
        }
    } else {
        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        if failed_count == 0 {
            info!("✅ All {} scenario runs passed!", total);
        } else {
            error!("❌ {}/{} scenario runs failed!", failed_count, total);
            for result in all_results.iter().filter(|r| !r.passed) {
                error!(
                    "  - {} seed={}: {}",
                    result.scenario.name(),
                    result.seed,
                    result.failure_reason.as_deref().unwrap_or("unknown")
                );
            }
        }
    }

    // Exit with proper code for CI
    if failed_count > 0 {
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_filter_follows_verbose_flag() {
        assert_eq!(log_filter(false, None).to_string(), "info");
        assert_eq!(log_filter(true, None).to_string(), "debug");
        assert_eq!(log_filter(true, Some("  ")).to_string(), "debug");
    }

    #[test]
    fn test_log_filter_prefers_env_directives() {
        let filter = log_filter(false, Some("ecgsim_core=trace"));
        assert_eq!(filter.to_string(), "ecgsim_core=trace");
    }
}
