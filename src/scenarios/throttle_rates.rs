/// This scenario checks that configured throttle values translate into the expected share of
/// auctions a partner sits out.
///
/// A partner configured with throttle `p` participates with probability p/100, so it is
/// excluded in (100 - p)% of the auctions. "100" must never exclude and "0" must always exclude.

use std::error::Error;
use auction_outcome::logger::{LogEvent, Logger};
use auction_outcome::logln;
use crate::scenarios::{check, counting_metrics, finish, seeded_engine};
use crate::simulation::{run_simulation, PartnerParam, TrafficGenerator, TrafficParam};
use auction_outcome::utils::get_seed;

// Register this scenario in the catalog
inventory::submit!(crate::scenarios::ScenarioEntry {
    short_name: "throttle_rates",
    run,
});

const REQUESTS: usize = 20000;
const TOLERANCE: f64 = 0.015;

pub fn run(scenario_name: &str, logger: &mut Logger) -> Result<(), Box<dyn Error>> {
    logln!(logger, LogEvent::Scenario, "=== Scenario: throttle rates over {} requests ===", REQUESTS);

    let partners = vec![
        PartnerParam::new("pubmatic").throttle("100"),
        PartnerParam::new("appnexus").throttle("70"),
        PartnerParam::new("openx").throttle("30"),
        PartnerParam::new("rubicon").throttle("0"),
    ];
    let params = TrafficParam::new(partners.clone(), 1)?;
    let mut generator = TrafficGenerator::new(params, get_seed(11));
    let mut engine = seeded_engine(12);

    let stat = run_simulation(&mut engine, &mut generator, REQUESTS, logger);
    stat.printout(logger);

    let mut errors: Vec<String> = Vec::new();
    for partner in &partners {
        let configured = partner.throttle.parse::<f64>()?;
        let expected = (100.0 - configured) / 100.0;
        let observed = stat.throttle_rate(partner.bidder_code);
        let passed = if expected == 0.0 || expected == 1.0 {
            observed == expected
        } else {
            (observed - expected).abs() <= TOLERANCE
        };
        check(passed, format!("{} (throttle {}): excluded in {:.4} of auctions, expected {:.4}",
            partner.bidder_code, partner.throttle, observed, expected), &mut errors, logger);
    }

    let metrics = counting_metrics(&engine)?;
    for partner in &partners {
        let recorded = metrics.throttled_count(partner.bidder_code);
        let observed = stat.throttled.get(partner.bidder_code).copied().unwrap_or(0);
        check(recorded == observed, format!("{}: throttle metric {} matches throttled auctions {}",
            partner.bidder_code, recorded, observed), &mut errors, logger);
    }

    check(stat.all_throttled == 0, format!("No request lost every partner: {} all-throttled requests", stat.all_throttled), &mut errors, logger);
    check(stat.coverage_violations.is_empty(), format!("Default bids cover every pair: {} violation(s)", stat.coverage_violations.len()), &mut errors, logger);

    finish(scenario_name, errors)
}
