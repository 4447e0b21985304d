use std::error::Error;
use auction_outcome::auction::AuctionEngine;
use auction_outcome::ids::IdGeneratorUuid;
use auction_outcome::logger::{LogEvent, Logger};
use auction_outcome::metrics::{MetricsEngineCounting, MetricsEngineTrait};
use auction_outcome::random::RandomSourceStd;
use auction_outcome::utils::get_seed;
use auction_outcome::{errln, logln};

/// Function type for scenario entry functions
pub type ScenarioFn = fn(scenario_name: &str, logger: &mut Logger) -> Result<(), Box<dyn Error>>;

/// Entry in the scenario catalog
#[derive(Clone)]
pub struct ScenarioEntry {
    pub short_name: &'static str,
    pub run: ScenarioFn,
}

// Create an inventory collection for scenario entries
inventory::collect!(ScenarioEntry);

/// Get all registered scenarios from the catalog
pub fn get_scenario_catalog() -> Vec<ScenarioEntry> {
    inventory::iter::<ScenarioEntry>
        .into_iter()
        .map(|entry| entry.clone())
        .collect()
}

/// Engine with seeded random sources (offset by the iteration seed) and counting metrics
pub fn seeded_engine(base_seed: u64) -> AuctionEngine {
    AuctionEngine::new(
        RandomSourceStd::new(get_seed(base_seed)),
        RandomSourceStd::new(get_seed(base_seed + 1)),
        IdGeneratorUuid::new(),
        MetricsEngineCounting::new(),
    )
}

/// Counting metrics of an engine built by `seeded_engine`
pub fn counting_metrics(engine: &AuctionEngine) -> Result<&MetricsEngineCounting, Box<dyn Error>> {
    engine.metrics()
        .as_any()
        .downcast_ref::<MetricsEngineCounting>()
        .ok_or_else(|| "engine was not built with counting metrics".into())
}

/// Log one validation and remember it when it failed
pub fn check(passed: bool, msg: String, errors: &mut Vec<String>, logger: &mut Logger) {
    if passed {
        logln!(logger, LogEvent::Scenario, "✓ {}", msg);
    } else {
        errln!(logger, LogEvent::Scenario, "✗ {}", msg);
        errors.push(msg);
    }
}

/// Turn collected validation failures into the scenario result
pub fn finish(scenario_name: &str, errors: Vec<String>) -> Result<(), Box<dyn Error>> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(format!("Scenario '{}' validation failed:\n{}", scenario_name, errors.join("\n")).into())
    }
}

// Scenario modules
pub mod throttle_rates;
pub mod ab_bucket_rate;
pub mod winner_order;
pub mod default_bid_coverage;
pub mod multi_floor;
