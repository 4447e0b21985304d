use crate::bid_context::{BidContext, BidExt, RequestCtx, RequestNoBidReason};
use crate::config_overlay::ConfigOverlay;
use crate::default_bids::{reconcile, DefaultBidSynthesizer};
use crate::ids::{IdGeneratorTrait, IdGeneratorUuid};
use crate::logger::{LogEvent, Logger};
use crate::metrics::{MetricsEngineNone, MetricsEngineTrait};
use crate::partner_config::{REFRESH_INTERVAL, VERSION_LEVEL_CONFIG_ID};
use crate::random::{RandomSourceStd, RandomSourceTrait};
use crate::response::BidResponse;
use crate::seat_non_bids;
use crate::throttle::ThrottleDecider;
use crate::winner::{assign_lost_to_deal_bid, BidRecord, Transition};
use crate::{logln, warnln};

/// Warning attached to a request whose eligible partners were all throttled
pub const ALL_PARTNERS_THROTTLED_WARNING: &str = "All adapters throttled";

/// Runs the outcome-resolution steps of one request in order
pub struct AuctionEngine {
    overlay: ConfigOverlay,
    throttle: ThrottleDecider,
    synthesizer: DefaultBidSynthesizer,
    metrics: Box<dyn MetricsEngineTrait>,
}

impl AuctionEngine {
    /// # Arguments
    /// * `overlay_random` - Source for the A/B bucket draw
    /// * `throttle_random` - Source for the throttle draws
    /// * `id_generator` - Ids for synthesized placeholder bids
    /// * `metrics` - Sink for partner error, no-bid and throttle signals
    pub fn new(
        overlay_random: Box<dyn RandomSourceTrait>,
        throttle_random: Box<dyn RandomSourceTrait>,
        id_generator: Box<dyn IdGeneratorTrait>,
        metrics: Box<dyn MetricsEngineTrait>,
    ) -> Self {
        Self {
            overlay: ConfigOverlay::new(overlay_random),
            throttle: ThrottleDecider::new(throttle_random),
            synthesizer: DefaultBidSynthesizer::new(id_generator),
            metrics,
        }
    }

    /// Seeded engine with uuid placeholder ids and no metrics
    pub fn with_seed(seed: u64) -> Self {
        Self::new(
            RandomSourceStd::new(seed),
            RandomSourceStd::new(seed.wrapping_add(1)),
            IdGeneratorUuid::new(),
            MetricsEngineNone::new(),
        )
    }

    pub fn metrics(&self) -> &dyn MetricsEngineTrait {
        self.metrics.as_ref()
    }

    /// Request start: A/B overlay, then throttling
    ///
    /// Throttled partners are removed from every impression's bidder list; they are assumed
    /// eligible everywhere and later covered by default bids and seat non-bids instead.
    pub fn prepare_request(&mut self, ctx: &mut RequestCtx, logger: &mut Logger) {
        let (merged, applied) = self.overlay.sample(&ctx.partner_config, logger);
        if let Some(merged) = merged {
            ctx.partner_config = merged;
        }
        ctx.ab_test_applied = applied;

        let throttle = self.throttle.decide(&ctx.partner_config, &ctx.throttle, logger);
        for bidder in &throttle.excluded {
            self.metrics.record_partner_throttled(&ctx.pub_id, bidder);
        }
        if throttle.all_excluded {
            ctx.request_nbr = Some(RequestNoBidReason::ALL_PARTNERS_THROTTLED);
            ctx.warnings.push(ALL_PARTNERS_THROTTLED_WARNING.to_string());
            warnln!(logger, LogEvent::Request, "{} (request {})", ALL_PARTNERS_THROTTLED_WARNING, ctx.pub_id);
        }

        for imp_ctx in ctx.imp_bid_ctx.values_mut() {
            imp_ctx.bidders.retain(|seat, meta| {
                !throttle.contains(seat) && !throttle.contains(&meta.prebid_bidder_code)
            });
        }

        logln!(logger, LogEvent::Request, "request {}: ab test {}, {} partner(s) throttled",
            ctx.pub_id, if applied { "applied" } else { "not applied" }, throttle.len());
        ctx.throttle = throttle;
    }

    /// Resolve winners, stamp reasons and fill the gaps of one bid response
    ///
    /// Never fails: bids for unknown impressions are skipped and unreadable bid extensions
    /// are treated as empty, both with a warning on `ctx.warnings`.
    pub fn process_bid_response(&mut self, ctx: &mut RequestCtx, mut response: BidResponse, logger: &mut Logger) -> BidResponse {
        let prefer_deals = ctx.prefer_deals;
        let refresh_interval = ctx.partner_config
            .get(VERSION_LEVEL_CONFIG_ID, REFRESH_INTERVAL)
            .and_then(|value| value.trim().parse::<i64>().ok());

        for seat_bid in &response.seat_bids {
            for bid in &seat_bid.bids {
                let imp_ctx = match ctx.imp_bid_ctx.get_mut(&bid.imp_id) {
                    Some(imp_ctx) => imp_ctx,
                    None => {
                        let warning = format!("impression context not found for bid {} (imp {}, seat {})", bid.id, bid.imp_id, seat_bid.seat);
                        warnln!(logger, LogEvent::Request, "{}", warning);
                        ctx.warnings.push(warning);
                        continue;
                    }
                };

                let mut ext = match bid.ext.as_deref() {
                    Some(raw) => match serde_json::from_str::<BidExt>(raw) {
                        Ok(ext) => ext,
                        Err(e) => {
                            let warning = format!("failed to parse ext of bid {} (seat {}): {}", bid.id, seat_bid.seat, e);
                            warnln!(logger, LogEvent::Request, "{}", warning);
                            ctx.warnings.push(warning);
                            BidExt::default()
                        }
                    },
                    None => BidExt::default(),
                };
                ext.nbr = None;
                ext.net_ecpm = bid.net_ecpm;
                if let Some(refresh_interval) = refresh_interval {
                    ext.refresh_interval = refresh_interval;
                }

                let record = BidRecord::new(&bid.id, bid.net_ecpm, bid.deal_tier_satisfied);
                match ctx.winning_bids.offer(&bid.imp_id, record, prefer_deals, logger) {
                    Transition::FIRST_BID => {}
                    Transition::CANDIDATE_LOST { reason } => ext.nbr = Some(reason),
                    Transition::CANDIDATE_WON { displaced_bid_id, reason } => {
                        if let Some(displaced) = imp_ctx.bid_ctx.get_mut(&displaced_bid_id) {
                            displaced.ext.nbr = Some(reason);
                        }
                    }
                }

                imp_ctx.bid_ctx.insert(bid.id.clone(), BidContext {
                    ext,
                    deal_tier_satisfied: bid.deal_tier_satisfied,
                    net_ecpm: bid.net_ecpm,
                });
            }
        }

        if prefer_deals {
            assign_lost_to_deal_bid(&mut ctx.imp_bid_ctx, &ctx.winning_bids);
        }

        if ctx.winning_bids.is_empty() {
            self.metrics.record_no_bid_response(&ctx.pub_id);
            logln!(logger, LogEvent::Request, "request {}: no winning bid", ctx.pub_id);
        }

        if !ctx.send_all_bids {
            for seat_bid in response.seat_bids.iter_mut() {
                let (kept, dropped): (Vec<_>, Vec<_>) = std::mem::take(&mut seat_bid.bids)
                    .into_iter()
                    .partition(|bid| ctx.winning_bids.is_winning_bid(&bid.imp_id, &bid.id));
                seat_bid.bids = kept;
                if !dropped.is_empty() {
                    ctx.dropped_bids.entry(seat_bid.seat.clone()).or_default().extend(dropped);
                }
            }
            response.seat_bids.retain(|seat_bid| !seat_bid.bids.is_empty());
        }

        let mut defaults = self.synthesizer.synthesize(ctx, &response, self.metrics.as_mut(), logger);
        self.synthesizer.synthesize_for_floors(ctx, &response, &mut defaults, logger);
        ctx.default_bids = defaults.clone();

        ctx.seat_non_bids = seat_non_bids::build(&ctx.imp_bid_ctx, &ctx.throttle);
        if ctx.return_all_bid_status {
            let mut pending = ctx.seat_non_bids.clone();
            seat_non_bids::merge(&mut pending, &mut response.ext.seat_non_bid);
        }

        let default_count: usize = defaults.values().flat_map(|seats| seats.values()).map(|bids| bids.len()).sum();
        let response = reconcile(response, &mut defaults);
        logln!(logger, LogEvent::Request, "request {}: {} winner(s), {} default bid(s), {} warning(s)",
            ctx.pub_id, ctx.winning_bids.len(), default_count, ctx.warnings.len());
        response
    }
}
