//! Bookstore simulator CLI
//!
//! Run the deterministic bookstore simulation and its scenarios.

use bookstore_core::{ActivationOrder, ModelConfig, QuantityPolicy, RestockScope, SimResult};
use bookstore_sim::{ScenarioId, ScenarioResult, ScenarioRunner, SimExport};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Bookstore supply-chain simulation CLI
#[derive(Parser, Debug)]
#[command(name = "bookstore-sim")]
#[command(about = "Run the deterministic bookstore simulation", long_about = None)]
struct Args {
    /// Master seed for determinism (-1 = random)
    #[arg(short, long, default_value = "42", allow_negative_numbers = true)]
    seed: i64,

    /// JSON model config; flags below override its fields
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of customer agents
    #[arg(long)]
    customers: Option<usize>,

    /// Number of employee agents
    #[arg(long)]
    employees: Option<usize>,

    /// Ticks to run
    #[arg(long)]
    steps: Option<u64>,

    /// Stock strictly below this is low
    #[arg(long)]
    threshold: Option<u32>,

    /// Level a restock tops up to
    #[arg(long)]
    target: Option<u32>,

    /// Agent activation order (sequential, shuffled)
    #[arg(long)]
    activation: Option<ActivationOrder>,

    /// Smallest purchase quantity
    #[arg(long)]
    qty_min: Option<u32>,

    /// Largest purchase quantity
    #[arg(long)]
    qty_max: Option<u32>,

    /// Which inventories employees restock (managed, global)
    #[arg(long)]
    restock_scope: Option<RestockScope>,

    /// Scenario to run (baseline, scarce_stock, managed_restock, contended_tick, global_restock, all)
    #[arg(short = 'S', long, default_value = "baseline")]
    scenario: String,

    /// Number of consecutive seeds to test
    #[arg(long, default_value = "1")]
    seeds: usize,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Export the run's events and snapshots to a JSON file
    #[arg(long)]
    export: Option<PathBuf>,
}

impl Args {
    /// Config file (or defaults) with flag overrides applied.
    fn model_config(&self) -> SimResult<ModelConfig> {
        let mut config = match &self.config {
            Some(path) => ModelConfig::from_json_file(path)?,
            None => ModelConfig::default(),
        };

        if let Some(n) = self.customers {
            config.n_customers = n;
        }
        if let Some(n) = self.employees {
            config.n_employees = n;
        }
        if let Some(steps) = self.steps {
            config.steps = steps;
        }
        if let Some(threshold) = self.threshold {
            config.restock_threshold = threshold;
        }
        if let Some(target) = self.target {
            config.restock_target = target;
        }
        if let Some(activation) = self.activation {
            config.activation = activation;
        }
        if let Some(scope) = self.restock_scope {
            config.restock_scope = scope;
        }
        if self.qty_min.is_some() || self.qty_max.is_some() {
            let min = self.qty_min.unwrap_or(1);
            let max = self.qty_max.unwrap_or(min);
            config.quantity = if min == max {
                QuantityPolicy::Fixed(min)
            } else {
                QuantityPolicy::Uniform { min, max }
            };
        }

        config.validate()?;
        Ok(config)
    }
}

fn report(result: &ScenarioResult) {
    if result.passed {
        info!(
            "✓ {} (seed={}) PASSED | ok={} fail={} restocks={}",
            result.scenario.name(),
            result.seed_label(),
            result.summary.purchases_ok,
            result.summary.purchases_failed,
            result.summary.restocks
        );
    } else {
        error!(
            "✗ {} (seed={}) FAILED: {}",
            result.scenario.name(),
            result.seed_label(),
            result.failure_reason.as_deref().unwrap_or("unknown")
        );
    }
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    if !args.json {
        info!("Bookstore Simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let config = match args.model_config() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Parse scenarios
    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        match args.scenario.parse() {
            Ok(scenario) => vec![scenario],
            Err(e) => {
                eprintln!("Error: {}", e);
                let names: Vec<&str> = ScenarioId::all().iter().map(|s| s.name()).collect();
                eprintln!("Available scenarios: {}, all", names.join(", "));
                std::process::exit(1);
            }
        }
    };

    // Handle --export mode
    if let Some(export_path) = &args.export {
        if scenarios.len() > 1 || args.seeds > 1 {
            eprintln!("Error: --export only supports a single scenario and seed");
            std::process::exit(1);
        }

        let runner = ScenarioRunner::new(args.seed).with_config(config);
        let (result, model) = runner.run_traced(scenarios[0]);
        report(&result);

        let export = SimExport::from_run(&result, model.as_ref());
        match export.write_to_file(export_path) {
            Ok(()) => info!(
                "Exported {} events and {} snapshots to {}",
                export.events.len(),
                export.snapshots.len(),
                export_path.display()
            ),
            Err(e) => {
                error!("Failed to write export: {}", e);
                std::process::exit(1);
            }
        }

        if !result.passed {
            std::process::exit(1);
        }
        return;
    }

    // Track results
    let mut all_results: Vec<ScenarioResult> = Vec::new();

    for seed_offset in 0..args.seeds {
        // A negative seed stays negative so every run draws its own
        let seed = if args.seed < 0 {
            args.seed
        } else {
            args.seed.wrapping_add(seed_offset as i64)
        };
        let runner = ScenarioRunner::new(seed).with_config(config.clone());

        for scenario in &scenarios {
            let result = runner.run(*scenario);
            if !args.json {
                report(&result);
            }
            all_results.push(result);
        }
    }

    // Summary
    let total = all_results.len();
    let failed_count = all_results.iter().filter(|r| !r.passed).count();
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
                    "ticks": r.total_ticks,
                    "failure_reason": r.failure_reason,
                    "summary": r.summary,
                })
            }).collect::<Vec<_>>(),
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{}", json),
            Err(e) => error!("Failed to render JSON summary: {}", e),
        }
    } else {
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        if failed_count == 0 {
            info!("All {} scenario runs passed", total);
        } else {
            error!("{}/{} scenario runs failed", failed_count, total);
            for result in all_results.iter().filter(|r| !r.passed) {
                error!(
                    "  - {} seed={}: {}",
                    result.scenario.name(),
                    result.seed_label(),
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
