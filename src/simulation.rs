/// Synthetic traffic for exercising the engine end to end.
///
/// A `TrafficGenerator` builds requests (partner configuration plus impression contexts) and,
/// once the engine has applied the overlay and throttling, the partner responses: log-normal
/// net revenues, deal flags, timeouts and adapter errors drawn per partner.
/// `run_simulation` drives both through an `AuctionEngine` and collects `SimulationStat`.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::Ordering;
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::{Distribution, LogNormal};
use auction_outcome::auction::AuctionEngine;
use auction_outcome::bid_context::{BidderMeta, Endpoint, ImpressionBidContext, RequestCtx, RequestNoBidReason};
use auction_outcome::logger::{LogEvent, Logger};
use auction_outcome::logln;
use auction_outcome::partner_config::{
    append_test_suffix, PartnerConfig, AB_TEST_ENABLED, BIDDER_CODE, REFRESH_INTERVAL, REVSHARE, SERVER_SIDE_FLAG,
    SS_TIMEOUT, TEST_GROUP_SIZE, TEST_TYPE, THROTTLE, VERSION_LEVEL_CONFIG_ID,
};
use auction_outcome::reason_codes::{NonBidReason, ResponseError, TIMEOUT_ERROR_CODE, UNKNOWN_ERROR_CODE};
use auction_outcome::response::{Bid, BidResponse, SeatBid};
use auction_outcome::utils::{lognormal_dist, parse_float_or_zero, TOTAL_SIMULATED_REQUESTS};

/// Live timeout written at version level for every simulated request
pub const LIVE_SS_TIMEOUT: &str = "500";

/// Behaviour of one simulated demand partner
#[derive(Debug, Clone)]
pub struct PartnerParam {
    pub bidder_code: &'static str,
    /// Configured throttle value ("100" = always participate)
    pub throttle: &'static str,
    /// Chance of bidding on an impression, given the partner answered at all
    pub bid_probability: f64,
    pub deal_probability: f64,
    /// Chance the whole partner call times out (per request)
    pub timeout_probability: f64,
    /// Chance the partner call fails with an unclassified error (per request)
    pub error_probability: f64,
    /// Chance the partner has no slot mapping for an impression
    pub non_mapped_probability: f64,
    /// Revenue share in percent, configured as `rev_share`
    pub rev_share: f64,
}

impl PartnerParam {
    pub fn new(bidder_code: &'static str) -> Self {
        Self {
            bidder_code,
            throttle: "100",
            bid_probability: 0.7,
            deal_probability: 0.0,
            timeout_probability: 0.0,
            error_probability: 0.0,
            non_mapped_probability: 0.0,
            rev_share: 0.0,
        }
    }

    pub fn throttle(mut self, throttle: &'static str) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn bid_probability(mut self, probability: f64) -> Self {
        self.bid_probability = probability;
        self
    }

    pub fn deal_probability(mut self, probability: f64) -> Self {
        self.deal_probability = probability;
        self
    }

    pub fn failures(mut self, timeout_probability: f64, error_probability: f64) -> Self {
        self.timeout_probability = timeout_probability;
        self.error_probability = error_probability;
        self
    }

    pub fn non_mapped_probability(mut self, probability: f64) -> Self {
        self.non_mapped_probability = probability;
        self
    }

    pub fn rev_share(mut self, rev_share: f64) -> Self {
        self.rev_share = rev_share;
        self
    }
}

/// A/B test configured at version level
#[derive(Debug, Clone)]
pub struct AbTestParam {
    pub group_size: String,
    pub test_type: &'static str,
    pub ss_timeout_test: String,
}

/// Shape of the simulated traffic
pub struct TrafficParam {
    pub partners: Vec<PartnerParam>,
    pub impressions_per_request: usize,
    pub net_ecpm_dist: LogNormal<f64>,
    pub ab_test: Option<AbTestParam>,
    pub endpoint: Endpoint,
    /// Floors configured on every impression (multi-floor endpoint only)
    pub multi_floors: Vec<f64>,
    pub prefer_deals: bool,
    pub send_all_bids: bool,
    pub return_all_bid_status: bool,
}

impl TrafficParam {
    pub fn new(partners: Vec<PartnerParam>, impressions_per_request: usize) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            partners,
            impressions_per_request,
            net_ecpm_dist: lognormal_dist(2.0, 1.5)?,
            ab_test: None,
            endpoint: Endpoint::OPENRTB,
            multi_floors: Vec::new(),
            prefer_deals: false,
            send_all_bids: false,
            return_all_bid_status: false,
        })
    }
}

pub struct TrafficGenerator {
    params: TrafficParam,
    rng: StdRng,
}

impl TrafficGenerator {
    pub fn new(params: TrafficParam, seed: u64) -> Self {
        Self { params, rng: StdRng::seed_from_u64(seed) }
    }

    /// Partner configuration shared by every request of this traffic
    pub fn partner_config(&self) -> PartnerConfig {
        let mut config = PartnerConfig::new();
        config.set(VERSION_LEVEL_CONFIG_ID, SS_TIMEOUT, LIVE_SS_TIMEOUT);
        config.set(VERSION_LEVEL_CONFIG_ID, REFRESH_INTERVAL, "30");
        if let Some(ab_test) = &self.params.ab_test {
            config.set(VERSION_LEVEL_CONFIG_ID, AB_TEST_ENABLED, "1");
            config.set(VERSION_LEVEL_CONFIG_ID, &append_test_suffix(TEST_GROUP_SIZE), &ab_test.group_size);
            config.set(VERSION_LEVEL_CONFIG_ID, &append_test_suffix(TEST_TYPE), ab_test.test_type);
            config.set(VERSION_LEVEL_CONFIG_ID, &append_test_suffix(SS_TIMEOUT), &ab_test.ss_timeout_test);
        }
        for (i, partner) in self.params.partners.iter().enumerate() {
            let partner_id = i as i32 + 1;
            config.set(partner_id, SERVER_SIDE_FLAG, "1");
            config.set(partner_id, BIDDER_CODE, partner.bidder_code);
            config.set(partner_id, THROTTLE, partner.throttle);
            config.set(partner_id, REVSHARE, &partner.rev_share.to_string());
        }
        config
    }

    /// Build the request context before the engine touches it
    pub fn new_request(&mut self, request_idx: usize) -> RequestCtx {
        let mut ctx = RequestCtx::new(&format!("pub-{}", request_idx % 7), self.partner_config());
        ctx.endpoint = self.params.endpoint;
        ctx.prefer_deals = self.params.prefer_deals;
        ctx.send_all_bids = self.params.send_all_bids;
        ctx.return_all_bid_status = self.params.return_all_bid_status;

        for imp_idx in 0..self.params.impressions_per_request {
            let imp_id = format!("imp{}", imp_idx + 1);
            let mut imp_ctx = ImpressionBidContext::new();
            for partner in &self.params.partners {
                if self.rng.gen_bool(partner.non_mapped_probability) {
                    imp_ctx = imp_ctx.with_non_mapped(partner.bidder_code);
                } else {
                    imp_ctx = imp_ctx.with_bidder(partner.bidder_code, BidderMeta::new(partner.bidder_code));
                }
            }
            if !self.params.multi_floors.is_empty() {
                ctx.multi_floors.insert(imp_id.clone(), self.params.multi_floors.clone());
            }
            ctx.imp_bid_ctx.insert(imp_id, imp_ctx);
        }
        for partner in &self.params.partners {
            ctx.prebid_bidder_code.insert(partner.bidder_code.to_string(), partner.bidder_code.to_string());
        }
        ctx
    }

    /// Responses of the partners still eligible after overlay and throttling
    pub fn generate_response(&mut self, ctx: &RequestCtx) -> BidResponse {
        let mut response = BidResponse { id: format!("resp-{}", ctx.pub_id), ..Default::default() };

        for (i, partner) in self.params.partners.iter().enumerate() {
            let partner_id = i as i32 + 1;
            let eligible: Vec<&String> = ctx.imp_bid_ctx
                .iter()
                .filter(|(_, imp_ctx)| imp_ctx.bidders.contains_key(partner.bidder_code))
                .map(|(imp_id, _)| imp_id)
                .collect();
            if eligible.is_empty() {
                continue;
            }

            if self.rng.gen_bool(partner.timeout_probability) {
                response.ext.errors.entry(partner.bidder_code.to_string()).or_default()
                    .push(ResponseError::new(TIMEOUT_ERROR_CODE, "context deadline exceeded"));
                continue;
            }
            if self.rng.gen_bool(partner.error_probability) {
                response.ext.errors.entry(partner.bidder_code.to_string()).or_default()
                    .push(ResponseError::new(UNKNOWN_ERROR_CODE, "unexpected status code"));
                continue;
            }

            let rev_share = parse_float_or_zero(ctx.partner_config.get_or_empty(partner_id, REVSHARE));
            let multi_floor = ctx.endpoint == Endpoint::APPLOVIN_MAX && ctx.is_primary_bidder(partner.bidder_code);
            let mut bids = Vec::new();
            for imp_id in eligible {
                if multi_floor {
                    let floors = ctx.multi_floors.get(imp_id).cloned().unwrap_or_default();
                    for floor in floors {
                        if !self.rng.gen_bool(partner.bid_probability) {
                            continue;
                        }
                        let price = Distribution::sample(&self.params.net_ecpm_dist, &mut self.rng).max(floor);
                        let bid_id = format!("{}-{}-{:.2}", partner.bidder_code, imp_id, floor);
                        bids.push(Bid::new(&bid_id, imp_id, price * (1.0 - rev_share / 100.0))
                            .with_ext(&format!("{{\"mbmfv\":{}}}", floor)));
                    }
                    continue;
                }
                if !self.rng.gen_bool(partner.bid_probability) {
                    continue;
                }
                let price = Distribution::sample(&self.params.net_ecpm_dist, &mut self.rng);
                let deal = self.rng.gen_bool(partner.deal_probability);
                let mut bid = Bid::new(&format!("{}-{}", partner.bidder_code, imp_id), imp_id, price * (1.0 - rev_share / 100.0))
                    .with_deal(deal);
                bid.price = price;
                bids.push(bid);
            }
            if !bids.is_empty() {
                response.seat_bids.push(SeatBid { seat: partner.bidder_code.to_string(), bids });
            }
        }
        response
    }
}

/// Aggregated outcome of a simulation
#[derive(Debug, Default)]
pub struct SimulationStat {
    pub requests: u64,
    pub ab_test_applied: u64,
    /// Requests where the version-level timeout was rewritten by the overlay
    pub timeout_overridden: u64,
    pub all_throttled: u64,
    /// bidder -> requests it was throttled in
    pub throttled: BTreeMap<String, u64>,
    pub winners: u64,
    pub real_bids: u64,
    pub default_bids: u64,
    pub warnings: u64,
    /// non-bid reason code -> placeholders carrying it
    pub default_nbr: BTreeMap<i32, u64>,
    pub coverage_violations: Vec<String>,
}

impl SimulationStat {
    pub fn throttle_rate(&self, bidder: &str) -> f64 {
        if self.requests == 0 {
            return 0.0;
        }
        self.throttled.get(bidder).copied().unwrap_or(0) as f64 / self.requests as f64
    }

    pub fn ab_test_rate(&self) -> f64 {
        if self.requests == 0 {
            return 0.0;
        }
        self.ab_test_applied as f64 / self.requests as f64
    }

    pub fn default_nbr_count(&self, reason: NonBidReason) -> u64 {
        self.default_nbr.get(&reason.code()).copied().unwrap_or(0)
    }

    pub fn printout(&self, logger: &mut Logger) {
        logln!(logger, LogEvent::Scenario, "requests: {}, ab test applied: {} ({:.2}%), all throttled: {}",
            self.requests, self.ab_test_applied, self.ab_test_rate() * 100.0, self.all_throttled);
        for (bidder, count) in &self.throttled {
            logln!(logger, LogEvent::Scenario, "  throttled {:<12} {:>7} ({:.2}%)", bidder, count, self.throttle_rate(bidder) * 100.0);
        }
        logln!(logger, LogEvent::Scenario, "winners: {}, real bids: {}, default bids: {}, warnings: {}",
            self.winners, self.real_bids, self.default_bids, self.warnings);
        for (code, count) in &self.default_nbr {
            logln!(logger, LogEvent::Scenario, "  default bids with nbr {:>3}: {}", code, count);
        }
    }
}

/// Run `requests` synthetic requests through the engine
pub fn run_simulation(engine: &mut AuctionEngine, generator: &mut TrafficGenerator, requests: usize, logger: &mut Logger) -> SimulationStat {
    let mut stat = SimulationStat::default();

    for request_idx in 0..requests {
        let mut ctx = generator.new_request(request_idx);
        engine.prepare_request(&mut ctx, logger);

        let eligible: BTreeMap<String, BTreeSet<String>> = ctx.imp_bid_ctx
            .iter()
            .map(|(imp_id, imp_ctx)| (imp_id.clone(), imp_ctx.bidders.keys().cloned().collect()))
            .collect();

        let response = generator.generate_response(&ctx);
        let real_bids = response.bid_count() as u64;
        let response = engine.process_bid_response(&mut ctx, response, logger);

        stat.requests += 1;
        stat.real_bids += real_bids;
        stat.winners += ctx.winning_bids.len() as u64;
        stat.warnings += ctx.warnings.len() as u64;
        if ctx.ab_test_applied {
            stat.ab_test_applied += 1;
        }
        if ctx.partner_config.version_level(SS_TIMEOUT) != LIVE_SS_TIMEOUT {
            stat.timeout_overridden += 1;
        }
        if ctx.request_nbr == Some(RequestNoBidReason::ALL_PARTNERS_THROTTLED) {
            stat.all_throttled += 1;
        }
        for bidder in &ctx.throttle.excluded {
            *stat.throttled.entry(bidder.clone()).or_insert(0) += 1;
        }
        for seats in ctx.default_bids.values() {
            for (seat, bids) in seats {
                stat.default_bids += bids.len() as u64;
                for bid in bids {
                    let nbr = ctx.imp_bid_ctx
                        .get(&bid.imp_id)
                        .and_then(|imp_ctx| imp_ctx.bid_ctx.get(&bid.id))
                        .and_then(|bid_ctx| bid_ctx.ext.nbr);
                    // throttled and unmapped placeholders are not tracked as bids
                    let code = nbr.map(|nbr| nbr.code()).unwrap_or_else(|| {
                        if ctx.throttle.contains(seat) {
                            NonBidReason::REQUEST_BLOCKED_PARTNER_THROTTLE.code()
                        } else {
                            NonBidReason::REQUEST_BLOCKED_SLOT_NOT_MAPPED.code()
                        }
                    });
                    *stat.default_nbr.entry(code).or_insert(0) += 1;
                }
            }
        }

        stat.coverage_violations.extend(check_coverage(&ctx, &eligible, &response));
        TOTAL_SIMULATED_REQUESTS.fetch_add(1, Ordering::Relaxed);
    }

    stat
}

/// Every eligible (impression, partner) pair must be represented by exactly one record:
/// real bids (kept or dropped) or a single placeholder. On the multi-floor endpoint the primary
/// partner instead needs every configured floor represented once.
pub fn check_coverage(ctx: &RequestCtx, eligible: &BTreeMap<String, BTreeSet<String>>, response: &BidResponse) -> Vec<String> {
    let default_ids: BTreeSet<&str> = ctx.default_bids
        .values()
        .flat_map(|seats| seats.values())
        .flat_map(|bids| bids.iter().map(|bid| bid.id.as_str()))
        .collect();

    let mut real: BTreeMap<(String, String), Vec<&Bid>> = BTreeMap::new();
    let kept = response.seat_bids.iter().flat_map(|seat_bid| seat_bid.bids.iter().map(move |bid| (&seat_bid.seat, bid)));
    let dropped = ctx.dropped_bids.iter().flat_map(|(seat, bids)| bids.iter().map(move |bid| (seat, bid)));
    for (seat, bid) in kept.chain(dropped) {
        if !default_ids.contains(bid.id.as_str()) {
            real.entry((bid.imp_id.clone(), seat.clone())).or_default().push(bid);
        }
    }

    let floor_of = |imp_id: &str, bid_id: &str| {
        ctx.imp_bid_ctx
            .get(imp_id)
            .and_then(|imp_ctx| imp_ctx.bid_ctx.get(bid_id))
            .map(|bid_ctx| format!("{:.2}", bid_ctx.ext.multi_floor_value))
            .unwrap_or_default()
    };

    let mut violations = Vec::new();
    for (imp_id, seats) in eligible {
        for seat in seats {
            let real_bids = real.get(&(imp_id.clone(), seat.clone())).map(|bids| bids.as_slice()).unwrap_or(&[]);
            let placeholders = ctx.default_bids
                .get(imp_id)
                .and_then(|seats| seats.get(seat))
                .map(|bids| bids.as_slice())
                .unwrap_or(&[]);

            let floors = ctx.multi_floors.get(imp_id).filter(|floors| !floors.is_empty());
            if let (Endpoint::APPLOVIN_MAX, Some(floors), true) = (ctx.endpoint, floors, ctx.is_primary_bidder(seat)) {
                let mut seen: Vec<String> = real_bids.iter().map(|bid| bid.id.as_str())
                    .chain(placeholders.iter().map(|bid| bid.id.as_str()))
                    .map(|bid_id| floor_of(imp_id, bid_id))
                    .collect();
                seen.sort();
                let mut expected: Vec<String> = floors.iter().map(|floor| format!("{:.2}", floor)).collect();
                expected.sort();
                if seen != expected {
                    violations.push(format!("{} x {}: floors {:?}, expected {:?}", imp_id, seat, seen, expected));
                }
                continue;
            }

            let covered = match (real_bids.len(), placeholders.len()) {
                (0, 1) => true,
                (n, 0) => n > 0,
                _ => false,
            };
            if !covered {
                violations.push(format!("{} x {}: {} real bid(s), {} placeholder(s)", imp_id, seat, real_bids.len(), placeholders.len()));
            }
        }
    }

    if ctx.endpoint != Endpoint::WEB_S2S {
        for bidder in &ctx.throttle.excluded {
            for imp_id in ctx.imp_bid_ctx.keys() {
                let count = ctx.default_bids.get(imp_id).and_then(|seats| seats.get(bidder)).map(|bids| bids.len()).unwrap_or(0);
                if count != 1 {
                    violations.push(format!("{} x {} (throttled): {} placeholder(s)", imp_id, bidder, count));
                }
            }
        }
    }
    violations
}
