/// This scenario checks that winner resolution does not depend on the order bids arrive in.
///
/// Random bid sets are pushed through the engine in several shuffled orders, with and without
/// deal preference. Every order must produce the same winner and the same reason per losing bid.
/// On top of that:
/// - without deal preference the winner has the highest net eCPM and every loser is "lost to higher bid"
/// - with deal preference and a deal present the winner satisfies its deal tier and every
///   non-deal bid is "lost to deal bid"

use std::collections::BTreeMap;
use std::error::Error;
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use rand_distr::Distribution;
use auction_outcome::auction::AuctionEngine;
use auction_outcome::bid_context::{BidderMeta, ImpressionBidContext, RequestCtx};
use auction_outcome::ids::IdGeneratorSequence;
use auction_outcome::logger::{LogEvent, Logger};
use auction_outcome::logln;
use auction_outcome::metrics::MetricsEngineNone;
use auction_outcome::partner_config::PartnerConfig;
use auction_outcome::random::RandomSourceFixed;
use auction_outcome::reason_codes::NonBidReason;
use auction_outcome::response::{Bid, BidResponse, SeatBid};
use auction_outcome::utils::{get_seed, lognormal_dist};
use crate::scenarios::{check, finish};

// Register this scenario in the catalog
inventory::submit!(crate::scenarios::ScenarioEntry {
    short_name: "winner_order",
    run,
});

const ROUNDS: usize = 500;
const ORDERS_PER_ROUND: usize = 4;

/// Winner id plus the final reason of every bid (None for the winner)
type Outcome = (String, BTreeMap<String, Option<NonBidReason>>);

fn resolve(bids: &[Bid], prefer_deals: bool, logger: &mut Logger) -> Outcome {
    let mut engine = AuctionEngine::new(
        RandomSourceFixed::new(0),
        RandomSourceFixed::new(0),
        IdGeneratorSequence::new("default"),
        MetricsEngineNone::new(),
    );
    let mut ctx = RequestCtx::new("winner-order", PartnerConfig::new());
    ctx.prefer_deals = prefer_deals;
    ctx.send_all_bids = true;
    ctx.imp_bid_ctx.insert("imp1".to_string(), ImpressionBidContext::new().with_bidder("seat", BidderMeta::new("seat")));

    let response = BidResponse {
        seat_bids: vec![SeatBid { seat: "seat".to_string(), bids: bids.to_vec() }],
        ..Default::default()
    };
    engine.process_bid_response(&mut ctx, response, logger);

    let winner = ctx.winning_bids.get("imp1").map(|bid| bid.id.clone()).unwrap_or_default();
    let reasons = ctx.imp_bid_ctx
        .get("imp1")
        .map(|imp_ctx| imp_ctx.bid_ctx.iter().map(|(id, bid_ctx)| (id.clone(), bid_ctx.ext.nbr)).collect())
        .unwrap_or_default();
    (winner, reasons)
}

pub fn run(scenario_name: &str, logger: &mut Logger) -> Result<(), Box<dyn Error>> {
    logln!(logger, LogEvent::Scenario, "=== Scenario: winner order independence over {} bid sets ===", ROUNDS);

    let net_ecpm_dist = lognormal_dist(3.0, 2.0)?;
    let mut rng = StdRng::seed_from_u64(get_seed(31));

    let mut order_mismatches = 0usize;
    let mut price_violations = 0usize;
    let mut deal_violations = 0usize;
    let mut deal_rounds = 0usize;

    for round in 0..ROUNDS {
        let bid_count = rng.gen_range(2..=8);
        let bids: Vec<Bid> = (0..bid_count)
            .map(|i| {
                let net = Distribution::sample(&net_ecpm_dist, &mut rng);
                Bid::new(&format!("bid-{}-{}", round, i), "imp1", net).with_deal(rng.gen_bool(0.3))
            })
            .collect();

        for prefer_deals in [false, true] {
            let expected = resolve(&bids, prefer_deals, logger);
            for _ in 0..ORDERS_PER_ROUND {
                let mut shuffled = bids.clone();
                shuffled.shuffle(&mut rng);
                if resolve(&shuffled, prefer_deals, logger) != expected {
                    order_mismatches += 1;
                }
            }

            let (winner_id, reasons) = &expected;
            let winner = bids.iter().find(|bid| &bid.id == winner_id);
            let any_deal = bids.iter().any(|bid| bid.deal_tier_satisfied);

            if !prefer_deals || !any_deal {
                let max_net = bids.iter().map(|bid| bid.net_ecpm).fold(f64::NEG_INFINITY, f64::max);
                let winner_ok = winner.map(|bid| bid.net_ecpm == max_net).unwrap_or(false);
                let losers_ok = bids.iter()
                    .filter(|bid| &bid.id != winner_id)
                    .all(|bid| reasons.get(&bid.id) == Some(&Some(NonBidReason::LOST_TO_HIGHER_BID)));
                if !winner_ok || !losers_ok {
                    price_violations += 1;
                }
            } else {
                deal_rounds += 1;
                let winner_ok = winner.map(|bid| bid.deal_tier_satisfied).unwrap_or(false);
                let losers_ok = bids.iter()
                    .filter(|bid| !bid.deal_tier_satisfied)
                    .all(|bid| reasons.get(&bid.id) == Some(&Some(NonBidReason::LOST_TO_DEAL_BID)));
                if !winner_ok || !losers_ok {
                    deal_violations += 1;
                }
            }
        }
    }

    let mut errors: Vec<String> = Vec::new();
    check(order_mismatches == 0, format!("Shuffled orders agree with arrival order: {} mismatch(es)", order_mismatches), &mut errors, logger);
    check(price_violations == 0, format!("Highest net eCPM wins, losers lost to higher bid: {} violation(s)", price_violations), &mut errors, logger);
    check(deal_violations == 0, format!("Deals win when preferred, non-deals lost to deal bid: {} violation(s) in {} rounds",
        deal_violations, deal_rounds), &mut errors, logger);

    finish(scenario_name, errors)
}
