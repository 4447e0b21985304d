/// This scenario checks that default bids give a complete picture of every request.
///
/// Traffic mixes silent partners, timeouts, adapter errors, unmapped slots and throttling.
/// After processing, each eligible (impression, partner) pair must be represented exactly once
/// and every throttled partner must have one placeholder per impression. Placeholder reasons
/// must line up with the partner error metrics. On the web server-to-server endpoint
/// throttled and unmapped partners are left to seat non-bids and get no placeholders.

use std::error::Error;
use auction_outcome::bid_context::Endpoint;
use auction_outcome::logger::{LogEvent, Logger};
use auction_outcome::logln;
use auction_outcome::reason_codes::{NonBidReason, PartnerError};
use auction_outcome::utils::get_seed;
use crate::scenarios::{check, counting_metrics, finish, seeded_engine};
use crate::simulation::{run_simulation, PartnerParam, TrafficGenerator, TrafficParam};

// Register this scenario in the catalog
inventory::submit!(crate::scenarios::ScenarioEntry {
    short_name: "default_bid_coverage",
    run,
});

const REQUESTS: usize = 5000;

fn partners() -> Vec<PartnerParam> {
    vec![
        PartnerParam::new("pubmatic").bid_probability(0.8).deal_probability(0.1).rev_share(10.0),
        PartnerParam::new("appnexus").bid_probability(0.5).failures(0.2, 0.0),
        PartnerParam::new("openx").bid_probability(0.6).failures(0.0, 0.15).non_mapped_probability(0.2),
        PartnerParam::new("rubicon").bid_probability(0.4).throttle("50"),
    ]
}

pub fn run(scenario_name: &str, logger: &mut Logger) -> Result<(), Box<dyn Error>> {
    logln!(logger, LogEvent::Scenario, "=== Scenario: default bid coverage over {} requests ===", REQUESTS);

    let mut errors: Vec<String> = Vec::new();

    let mut params = TrafficParam::new(partners(), 3)?;
    params.prefer_deals = true;
    let mut generator = TrafficGenerator::new(params, get_seed(41));
    let mut engine = seeded_engine(42);
    let stat = run_simulation(&mut engine, &mut generator, REQUESTS, logger);
    stat.printout(logger);

    for violation in stat.coverage_violations.iter().take(5) {
        logln!(logger, LogEvent::Scenario, "  {}", violation);
    }
    check(stat.coverage_violations.is_empty(), format!("Every eligible pair covered exactly once: {} violation(s)",
        stat.coverage_violations.len()), &mut errors, logger);
    check(stat.warnings == 0, format!("Well-formed traffic raises no warnings: {}", stat.warnings), &mut errors, logger);

    let metrics = counting_metrics(&engine)?;
    let pairs = [
        (NonBidReason::NO_BID_UNKNOWN_ERROR, PartnerError::NO_BID),
        (NonBidReason::ERROR_TIMEOUT, PartnerError::TIMEOUT),
        (NonBidReason::ERROR_GENERAL, PartnerError::UNKNOWN_PREBID_ERROR),
    ];
    for (reason, error) in pairs {
        let placeholders = stat.default_nbr_count(reason);
        let recorded = metrics.partner_error_total(error);
        check(placeholders > 0 && placeholders == recorded, format!("nbr {}: {} placeholders, {} '{}' partner errors recorded",
            reason.code(), placeholders, recorded, error.as_str()), &mut errors, logger);
    }
    check(stat.default_nbr_count(NonBidReason::REQUEST_BLOCKED_PARTNER_THROTTLE) > 0,
        "Throttled partner has placeholders".to_string(), &mut errors, logger);
    check(stat.default_nbr_count(NonBidReason::REQUEST_BLOCKED_SLOT_NOT_MAPPED) > 0,
        "Unmapped partner has placeholders".to_string(), &mut errors, logger);

    logln!(logger, LogEvent::Scenario, "");
    logln!(logger, LogEvent::Scenario, "--- web server-to-server endpoint ---");
    let mut params = TrafficParam::new(partners(), 3)?;
    params.endpoint = Endpoint::WEB_S2S;
    params.return_all_bid_status = true;
    let mut generator = TrafficGenerator::new(params, get_seed(43));
    let mut engine = seeded_engine(44);
    let stat = run_simulation(&mut engine, &mut generator, REQUESTS, logger);
    stat.printout(logger);

    check(stat.coverage_violations.is_empty(), format!("Web S2S: every eligible pair covered exactly once: {} violation(s)",
        stat.coverage_violations.len()), &mut errors, logger);
    let blocked = stat.default_nbr_count(NonBidReason::REQUEST_BLOCKED_PARTNER_THROTTLE)
        + stat.default_nbr_count(NonBidReason::REQUEST_BLOCKED_SLOT_NOT_MAPPED);
    check(blocked == 0, format!("Web S2S: no placeholders for throttled or unmapped partners: {}", blocked), &mut errors, logger);

    finish(scenario_name, errors)
}
