/// This scenario checks that the A/B overlay applies to the configured share of traffic.
///
/// For every group size g the overlay should apply to g% of requests, and each applied
/// request must carry the test timeout instead of the live one. A group size of 0 or an
/// unparseable value must never apply.

use std::error::Error;
use auction_outcome::logger::{LogEvent, Logger};
use auction_outcome::logln;
use auction_outcome::partner_config::TEST_TYPE_AUCTION_TIMEOUT;
use auction_outcome::utils::get_seed;
use crate::scenarios::{check, finish, seeded_engine};
use crate::simulation::{run_simulation, AbTestParam, PartnerParam, SimulationStat, TrafficGenerator, TrafficParam};

// Register this scenario in the catalog
inventory::submit!(crate::scenarios::ScenarioEntry {
    short_name: "ab_bucket_rate",
    run,
});

const REQUESTS: usize = 10000;
const TOLERANCE: f64 = 0.02;

/// Run traffic with the given A/B group size through a fresh engine
pub fn simulate_group_size(group_size: &str, requests: usize, logger: &mut Logger) -> Result<SimulationStat, Box<dyn Error>> {
    let mut params = TrafficParam::new(vec![PartnerParam::new("pubmatic"), PartnerParam::new("appnexus")], 1)?;
    params.ab_test = Some(AbTestParam {
        group_size: group_size.to_string(),
        test_type: TEST_TYPE_AUCTION_TIMEOUT,
        ss_timeout_test: "300".to_string(),
    });
    let mut generator = TrafficGenerator::new(params, get_seed(21));
    let mut engine = seeded_engine(22);
    Ok(run_simulation(&mut engine, &mut generator, requests, logger))
}

pub fn run(scenario_name: &str, logger: &mut Logger) -> Result<(), Box<dyn Error>> {
    logln!(logger, LogEvent::Scenario, "=== Scenario: A/B bucket rate over {} requests per group size ===", REQUESTS);

    let mut errors: Vec<String> = Vec::new();
    for group_size in ["0", "25", "60", "90", "100", "abc"] {
        let stat = simulate_group_size(group_size, REQUESTS, logger)?;
        let expected = group_size.parse::<f64>().unwrap_or(0.0) / 100.0;
        let observed = stat.ab_test_rate();
        let passed = if expected == 0.0 || expected == 1.0 {
            observed == expected
        } else {
            (observed - expected).abs() <= TOLERANCE
        };
        check(passed, format!("group size '{}': overlay applied to {:.4} of requests, expected {:.4}",
            group_size, observed, expected), &mut errors, logger);
        check(stat.timeout_overridden == stat.ab_test_applied, format!("group size '{}': test timeout on {} requests, overlay applied on {}",
            group_size, stat.timeout_overridden, stat.ab_test_applied), &mut errors, logger);
    }

    finish(scenario_name, errors)
}
