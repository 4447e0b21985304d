/// This scenario checks placeholder synthesis for multi-floor auctions.
///
/// The primary partner bids at a random subset of the configured floors. Afterwards each
/// configured floor must be represented exactly once for it, either by a real bid or by a
/// placeholder carrying that floor. Other partners keep the one-record-per-impression rule.

use std::error::Error;
use auction_outcome::bid_context::Endpoint;
use auction_outcome::logger::{LogEvent, Logger};
use auction_outcome::logln;
use auction_outcome::utils::get_seed;
use crate::scenarios::{check, finish, seeded_engine};
use crate::simulation::{run_simulation, PartnerParam, TrafficGenerator, TrafficParam};

// Register this scenario in the catalog
inventory::submit!(crate::scenarios::ScenarioEntry {
    short_name: "multi_floor",
    run,
});

const REQUESTS: usize = 3000;

pub fn run(scenario_name: &str, logger: &mut Logger) -> Result<(), Box<dyn Error>> {
    logln!(logger, LogEvent::Scenario, "=== Scenario: multi-floor placeholders over {} requests ===", REQUESTS);

    let partners = vec![
        PartnerParam::new("pubmatic").bid_probability(0.5).failures(0.05, 0.0),
        PartnerParam::new("appnexus").bid_probability(0.6),
        PartnerParam::new("openx").bid_probability(0.3).throttle("80"),
    ];
    let mut params = TrafficParam::new(partners, 2)?;
    params.endpoint = Endpoint::APPLOVIN_MAX;
    params.multi_floors = vec![0.5, 1.0, 2.5];
    let mut generator = TrafficGenerator::new(params, get_seed(51));
    let mut engine = seeded_engine(52);

    let stat = run_simulation(&mut engine, &mut generator, REQUESTS, logger);
    stat.printout(logger);
    for violation in stat.coverage_violations.iter().take(5) {
        logln!(logger, LogEvent::Scenario, "  {}", violation);
    }

    let mut errors: Vec<String> = Vec::new();
    check(stat.coverage_violations.is_empty(), format!("Every configured floor represented once: {} violation(s)",
        stat.coverage_violations.len()), &mut errors, logger);
    check(stat.default_bids > 0 && stat.real_bids > 0, format!("Traffic mixes real bids ({}) and placeholders ({})",
        stat.real_bids, stat.default_bids), &mut errors, logger);

    finish(scenario_name, errors)
}
