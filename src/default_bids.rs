//! Placeholder ("default") bids for every configured partner that produced no usable bid.
//!
//! Synthesis runs after all real bids of the response were seen, in passes:
//! 1. index who responded per impression (real bids and dropped bids)
//! 2. configured partners missing from that index
//! 3. pass-through tag partner: one placeholder per tag that never answered
//! 4. throttled partners, on every impression
//! 5. partners not mapped to a server-side slot
//!
//! Passes 4 and 5 are skipped for the web server-to-server endpoint, whose consumer
//! learns about those partners from seat non-bids instead.

use std::collections::{BTreeMap, BTreeSet};
use crate::bid_context::{
    BidContext, BidExt, DefaultBids, Endpoint, MediaClientConfig, RequestCtx, PASS_THROUGH_TAG_BIDDER_CODE,
};
use crate::ids::IdGeneratorTrait;
use crate::logger::{LogEvent, Logger};
use crate::logln;
use crate::metrics::MetricsEngineTrait;
use crate::partner_config::{REFRESH_INTERVAL, VERSION_LEVEL_CONFIG_ID};
use crate::reason_codes::{from_response_errors, partner_error_from_response_errors, ResponseErrors};
use crate::response::{Bid, BidResponse, SeatBid};
use crate::utils::parse_int_or_zero;

/// Which gap a placeholder stands for
#[derive(Debug, Clone, PartialEq)]
enum Gap {
    NoBid,
    SilentTag(String),
    Throttled,
    NotMapped,
}

pub struct DefaultBidSynthesizer {
    id_generator: Box<dyn IdGeneratorTrait>,
}

impl DefaultBidSynthesizer {
    pub fn new(id_generator: Box<dyn IdGeneratorTrait>) -> Self {
        Self { id_generator }
    }

    /// Build placeholders for every (impression, partner) pair without a real or dropped bid
    ///
    /// No-bid and silent-tag placeholders also get a `BidContext` on their impression so that
    /// downstream logging sees them like real bids, and no-bids are reported to `metrics`.
    pub fn synthesize(
        &mut self,
        ctx: &mut RequestCtx,
        response: &BidResponse,
        metrics: &mut dyn MetricsEngineTrait,
        logger: &mut Logger,
    ) -> DefaultBids {
        let responded = responded_index(ctx, response);
        let is_responded = |imp_id: &str, seat: &str| {
            responded.get(imp_id).map(|seats| seats.contains(seat)).unwrap_or(false)
        };

        let mut gaps: Vec<(String, String, Gap)> = Vec::new();

        for (imp_id, imp_ctx) in &ctx.imp_bid_ctx {
            for (seat, meta) in &imp_ctx.bidders {
                if meta.prebid_bidder_code == PASS_THROUGH_TAG_BIDDER_CODE || is_responded(imp_id, seat) {
                    continue;
                }
                gaps.push((imp_id.clone(), seat.clone(), Gap::NoBid));
            }
        }

        for (imp_id, imp_ctx) in &ctx.imp_bid_ctx {
            for (seat, meta) in &imp_ctx.bidders {
                if meta.prebid_bidder_code != PASS_THROUGH_TAG_BIDDER_CODE {
                    continue;
                }
                for (tag, responded) in &meta.vast_tag_flags {
                    if !responded {
                        gaps.push((imp_id.clone(), seat.clone(), Gap::SilentTag(tag.clone())));
                    }
                }
            }
        }

        if ctx.endpoint != Endpoint::WEB_S2S {
            for bidder in &ctx.throttle.excluded {
                for imp_id in ctx.imp_bid_ctx.keys() {
                    if !is_responded(imp_id, bidder) {
                        gaps.push((imp_id.clone(), bidder.clone(), Gap::Throttled));
                    }
                }
            }
            for (imp_id, imp_ctx) in &ctx.imp_bid_ctx {
                for seat in &imp_ctx.non_mapped {
                    if !is_responded(imp_id, seat) {
                        gaps.push((imp_id.clone(), seat.clone(), Gap::NotMapped));
                    }
                }
            }
        }

        let errors = &response.ext.errors;
        let mut defaults = DefaultBids::new();
        for (imp_id, seat, gap) in gaps {
            let seat_defaults = defaults.entry(imp_id.clone()).or_default();
            // throttled and unmapped partners get exactly one placeholder per impression
            if matches!(gap, Gap::Throttled | Gap::NotMapped) && seat_defaults.contains_key(&seat) {
                continue;
            }

            let mut ext = default_bid_ext(ctx, &imp_id, &seat, errors);
            if let Gap::SilentTag(tag) = &gap {
                ext.vast_tag_id = Some(tag.clone());
            }
            let bid_id = self.id_generator.generate();
            let bid = placeholder_bid(&bid_id, &imp_id, &ext);

            logln!(logger, LogEvent::Auction, "{}: default bid {} for {} ({:?}, nbr {})",
                imp_id, bid_id, seat, gap, ext.nbr.map(|nbr| nbr.code()).unwrap_or(0));

            if matches!(gap, Gap::NoBid | Gap::SilentTag(_)) {
                if let Some(imp_ctx) = ctx.imp_bid_ctx.get_mut(&imp_id) {
                    imp_ctx.bid_ctx.insert(bid_id.clone(), BidContext { ext, ..Default::default() });
                }
            }
            if gap == Gap::NoBid {
                metrics.record_partner_response_error(&ctx.pub_id, &seat, partner_error_from_response_errors(&seat, errors));
            }

            seat_defaults.entry(seat).or_default().push(bid);
        }

        defaults.retain(|_, seats| !seats.is_empty());
        defaults
    }

    /// Multi-floor auctions: one placeholder per configured floor the primary partner did not bid on
    ///
    /// Replaces any placeholders the primary partner already got from `synthesize`. Floors are
    /// used in configured order, skipping floors already present among the partner's bids.
    pub fn synthesize_for_floors(
        &mut self,
        ctx: &mut RequestCtx,
        response: &BidResponse,
        defaults: &mut DefaultBids,
        logger: &mut Logger,
    ) {
        if ctx.endpoint != Endpoint::APPLOVIN_MAX {
            return;
        }

        let mut represented_floors: BTreeSet<String> = BTreeSet::new();
        let mut bid_counts: BTreeMap<(String, String), usize> = BTreeMap::new();
        let real_bids = response.seat_bids.iter().flat_map(|seat_bid| seat_bid.bids.iter().map(move |bid| (&seat_bid.seat, bid)));
        let dropped_bids = ctx.dropped_bids.iter().flat_map(|(seat, bids)| bids.iter().map(move |bid| (seat, bid)));
        for (seat, bid) in real_bids.chain(dropped_bids) {
            if !ctx.is_primary_bidder(seat) {
                continue;
            }
            *bid_counts.entry((bid.imp_id.clone(), seat.clone())).or_insert(0) += 1;
            let floor = ctx.imp_bid_ctx
                .get(&bid.imp_id)
                .and_then(|imp_ctx| imp_ctx.bid_ctx.get(&bid.id))
                .map(|bid_ctx| bid_ctx.ext.multi_floor_value)
                .unwrap_or(0.0);
            if floor > 0.0 {
                represented_floors.insert(floor_key(&bid.imp_id, seat, floor));
            }
        }

        let mut planned: Vec<(String, String, Vec<f64>)> = Vec::new();
        for (imp_id, imp_ctx) in &ctx.imp_bid_ctx {
            let floors = match ctx.multi_floors.get(imp_id) {
                Some(floors) if !floors.is_empty() => floors,
                _ => continue,
            };
            for seat in imp_ctx.bidders.keys() {
                if !ctx.is_primary_bidder(seat) {
                    continue;
                }
                let responded = bid_counts.get(&(imp_id.clone(), seat.clone())).copied().unwrap_or(0);
                let missing = floors.len().saturating_sub(responded);
                let unused: Vec<f64> = floors
                    .iter()
                    .copied()
                    .filter(|floor| !represented_floors.contains(&floor_key(imp_id, seat, *floor)))
                    .take(missing)
                    .collect();
                planned.push((imp_id.clone(), seat.clone(), unused));
            }
        }

        let errors = &response.ext.errors;
        for (imp_id, seat, floors) in planned {
            let seat_defaults = defaults.entry(imp_id.clone()).or_default();
            if let Some(stale) = seat_defaults.remove(&seat) {
                if let Some(imp_ctx) = ctx.imp_bid_ctx.get_mut(&imp_id) {
                    for bid in stale {
                        imp_ctx.bid_ctx.remove(&bid.id);
                    }
                }
            }

            for floor in floors {
                let ext = BidExt {
                    nbr: Some(from_response_errors(&seat, errors)),
                    multi_floor_value: floor,
                    ..Default::default()
                };
                let bid_id = self.id_generator.generate();
                logln!(logger, LogEvent::Auction, "{}: default bid {} for {} at floor {:.2}", imp_id, bid_id, seat, floor);
                seat_defaults.entry(seat.clone()).or_default().push(placeholder_bid(&bid_id, &imp_id, &ext));
                if let Some(imp_ctx) = ctx.imp_bid_ctx.get_mut(&imp_id) {
                    imp_ctx.bid_ctx.insert(bid_id, BidContext { ext, ..Default::default() });
                }
            }
        }

        defaults.retain(|_, seats| !seats.is_empty());
    }
}

/// Impression id -> seats that answered, counting bids that were dropped after responding
fn responded_index(ctx: &RequestCtx, response: &BidResponse) -> BTreeMap<String, BTreeSet<String>> {
    let mut responded: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for seat_bid in &response.seat_bids {
        for bid in &seat_bid.bids {
            responded.entry(bid.imp_id.clone()).or_default().insert(seat_bid.seat.clone());
        }
    }
    for (seat, bids) in &ctx.dropped_bids {
        for bid in bids {
            responded.entry(bid.imp_id.clone()).or_default().insert(seat.clone());
        }
    }
    responded
}

fn floor_key(imp_id: &str, seat: &str, floor: f64) -> String {
    format!("{}-{}-{:.2}", imp_id, seat, floor)
}

/// Extension of a placeholder: reason code plus the presentation settings real bids carry
fn default_bid_ext(ctx: &RequestCtx, imp_id: &str, seat: &str, errors: &ResponseErrors) -> BidExt {
    let mut ext = BidExt {
        nbr: Some(from_response_errors(seat, errors)),
        refresh_interval: parse_int_or_zero(ctx.partner_config.get_or_empty(VERSION_LEVEL_CONFIG_ID, REFRESH_INTERVAL)),
        ..Default::default()
    };
    if let Some(client_config) = ctx.client_config_for_media_type(imp_id, "banner") {
        ext.banner = Some(MediaClientConfig { client_config: Some(client_config) });
    }
    if let Some(client_config) = ctx.client_config_for_media_type(imp_id, "video") {
        ext.video = Some(MediaClientConfig { client_config: Some(client_config) });
    }
    ext
}

fn placeholder_bid(bid_id: &str, imp_id: &str, ext: &BidExt) -> Bid {
    Bid {
        id: bid_id.to_string(),
        imp_id: imp_id.to_string(),
        ext: serde_json::to_string(ext).ok(),
        ..Default::default()
    }
}

/// Append pending placeholders to the matching seats of the response
///
/// Seats missing from the response are created. Every consumed entry is removed from `pending`,
/// so calling this twice never emits a placeholder twice.
pub fn reconcile(mut response: BidResponse, pending: &mut DefaultBids) -> BidResponse {
    for seats in pending.values_mut() {
        for (seat, bids) in std::mem::take(seats) {
            match response.seat_bids.iter_mut().find(|seat_bid| seat_bid.seat == seat) {
                Some(seat_bid) => seat_bid.bids.extend(bids),
                None => response.seat_bids.push(SeatBid { seat, bids }),
            }
        }
    }
    pending.clear();
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bid_context::{BidderMeta, ImpressionBidContext};
    use crate::ids::IdGeneratorSequence;
    use crate::metrics::MetricsEngineCounting;
    use crate::partner_config::PartnerConfig;
    use crate::reason_codes::{NonBidReason, PartnerError, ResponseError, TIMEOUT_ERROR_CODE};
    use crate::response::ResponseExt;
    use serde_json::json;

    fn synthesizer() -> DefaultBidSynthesizer {
        DefaultBidSynthesizer::new(IdGeneratorSequence::new("default"))
    }

    fn ctx_with_bidders(imps: &[&str], bidders: &[&str]) -> RequestCtx {
        let config = PartnerConfig::from_entries(vec![(VERSION_LEVEL_CONFIG_ID, vec![(REFRESH_INTERVAL, "30")])]);
        let mut ctx = RequestCtx::new("5890", config);
        for imp in imps {
            let mut imp_ctx = ImpressionBidContext::new();
            for bidder in bidders {
                imp_ctx = imp_ctx.with_bidder(bidder, BidderMeta::new(bidder));
            }
            ctx.imp_bid_ctx.insert(imp.to_string(), imp_ctx);
            ctx.prebid_bidder_code.extend(bidders.iter().map(|b| (b.to_string(), b.to_string())));
        }
        ctx
    }

    fn response(bids: &[(&str, &str, &str)]) -> BidResponse {
        let mut response = BidResponse { id: "resp".to_string(), ..Default::default() };
        for (seat, bid_id, imp_id) in bids {
            match response.seat_bids.iter_mut().find(|seat_bid| seat_bid.seat == *seat) {
                Some(seat_bid) => seat_bid.bids.push(Bid::new(bid_id, imp_id, 1.0)),
                None => response.seat_bids.push(SeatBid { seat: seat.to_string(), bids: vec![Bid::new(bid_id, imp_id, 1.0)] }),
            }
        }
        response
    }

    fn nbr_of(bid: &Bid) -> Option<NonBidReason> {
        bid.ext.as_deref().and_then(|ext| serde_json::from_str::<BidExt>(ext).ok()).and_then(|ext| ext.nbr)
    }

    #[test]
    fn test_missing_partner_gets_unknown_no_bid() {
        let mut ctx = ctx_with_bidders(&["imp1"], &["pubmatic"]);
        let mut metrics = MetricsEngineCounting::new();
        let mut logger = Logger::new();
        let defaults = synthesizer().synthesize(&mut ctx, &response(&[]), metrics.as_mut(), &mut logger);

        let bids = &defaults["imp1"]["pubmatic"];
        assert_eq!(bids.len(), 1);
        assert_eq!(bids[0].id, "default-1");
        assert_eq!(bids[0].imp_id, "imp1");
        assert_eq!(nbr_of(&bids[0]), Some(NonBidReason::NO_BID_UNKNOWN_ERROR));

        let bid_ctx = &ctx.imp_bid_ctx["imp1"].bid_ctx["default-1"];
        assert_eq!(bid_ctx.ext.nbr, Some(NonBidReason::NO_BID_UNKNOWN_ERROR));
        assert_eq!(bid_ctx.ext.refresh_interval, 30);
        assert_eq!(metrics.partner_error_count("pubmatic", PartnerError::NO_BID), 1);
    }

    #[test]
    fn test_responded_and_dropped_bidders_are_covered() {
        let mut ctx = ctx_with_bidders(&["imp1", "imp2"], &["pubmatic", "appnexus"]);
        ctx.dropped_bids.insert("appnexus".to_string(), vec![Bid::new("dropped", "imp1", 0.5)]);
        let resp = response(&[("pubmatic", "b1", "imp1"), ("pubmatic", "b2", "imp2")]);
        let mut metrics = MetricsEngineCounting::new();
        let mut logger = Logger::new();
        let defaults = synthesizer().synthesize(&mut ctx, &resp, metrics.as_mut(), &mut logger);

        assert!(!defaults.contains_key("imp1"));
        assert_eq!(defaults["imp2"].keys().collect::<Vec<_>>(), vec!["appnexus"]);
    }

    #[test]
    fn test_timeout_error_maps_to_timeout_code() {
        let mut ctx = ctx_with_bidders(&["imp1"], &["appnexus"]);
        let mut resp = response(&[]);
        resp.ext = ResponseExt::default();
        resp.ext.errors.insert("appnexus".to_string(), vec![ResponseError::new(TIMEOUT_ERROR_CODE, "timeout")]);
        let mut metrics = MetricsEngineCounting::new();
        let mut logger = Logger::new();
        let defaults = synthesizer().synthesize(&mut ctx, &resp, metrics.as_mut(), &mut logger);

        assert_eq!(nbr_of(&defaults["imp1"]["appnexus"][0]), Some(NonBidReason::ERROR_TIMEOUT));
        assert_eq!(metrics.partner_error_count("appnexus", PartnerError::TIMEOUT), 1);
    }

    #[test]
    fn test_client_config_carried_when_enabled() {
        let mut ctx = ctx_with_bidders(&["imp1"], &["pubmatic"]);
        ctx.client_config_flag = true;
        if let Some(imp_ctx) = ctx.imp_bid_ctx.get_mut("imp1") {
            imp_ctx.client_config.insert("video".to_string(), json!({"skippable": true}));
        }
        let mut metrics = MetricsEngineCounting::new();
        let mut logger = Logger::new();
        synthesizer().synthesize(&mut ctx, &response(&[]), metrics.as_mut(), &mut logger);

        let ext = &ctx.imp_bid_ctx["imp1"].bid_ctx["default-1"].ext;
        assert_eq!(ext.video, Some(MediaClientConfig { client_config: Some(json!({"skippable": true})) }));
        assert_eq!(ext.banner, None);
    }

    #[test]
    fn test_one_placeholder_per_silent_tag() {
        let mut ctx = ctx_with_bidders(&["imp1"], &[]);
        let mut meta = BidderMeta::new(PASS_THROUGH_TAG_BIDDER_CODE);
        meta.vast_tag_flags.insert("tag-a".to_string(), false);
        meta.vast_tag_flags.insert("tag-b".to_string(), true);
        meta.vast_tag_flags.insert("tag-c".to_string(), false);
        if let Some(imp_ctx) = ctx.imp_bid_ctx.get_mut("imp1") {
            imp_ctx.bidders.insert("vastbidder".to_string(), meta);
        }
        let mut metrics = MetricsEngineCounting::new();
        let mut logger = Logger::new();
        let defaults = synthesizer().synthesize(&mut ctx, &response(&[]), metrics.as_mut(), &mut logger);

        assert_eq!(defaults["imp1"]["vastbidder"].len(), 2);
        let tags: BTreeSet<Option<String>> = ctx.imp_bid_ctx["imp1"].bid_ctx.values().map(|b| b.ext.vast_tag_id.clone()).collect();
        assert_eq!(tags, BTreeSet::from([Some("tag-a".to_string()), Some("tag-c".to_string())]));
        assert_eq!(metrics.total_partner_errors(), 0);
    }

    #[test]
    fn test_throttled_and_non_mapped_on_every_impression() {
        let mut ctx = ctx_with_bidders(&["imp1", "imp2"], &[]);
        ctx.throttle.excluded.insert("openx".to_string());
        if let Some(imp_ctx) = ctx.imp_bid_ctx.get_mut("imp2") {
            imp_ctx.non_mapped.insert("rubicon".to_string());
        }
        let mut metrics = MetricsEngineCounting::new();
        let mut logger = Logger::new();
        let defaults = synthesizer().synthesize(&mut ctx, &response(&[]), metrics.as_mut(), &mut logger);

        assert_eq!(defaults["imp1"]["openx"].len(), 1);
        assert_eq!(defaults["imp2"]["openx"].len(), 1);
        assert_eq!(defaults["imp2"]["rubicon"].len(), 1);
        assert!(!defaults["imp1"].contains_key("rubicon"));
        // not logged as bids
        assert!(ctx.imp_bid_ctx["imp1"].bid_ctx.is_empty());
    }

    #[test]
    fn test_web_s2s_skips_throttled_and_non_mapped() {
        let mut ctx = ctx_with_bidders(&["imp1"], &["pubmatic"]);
        ctx.endpoint = Endpoint::WEB_S2S;
        ctx.throttle.excluded.insert("openx".to_string());
        if let Some(imp_ctx) = ctx.imp_bid_ctx.get_mut("imp1") {
            imp_ctx.non_mapped.insert("rubicon".to_string());
        }
        let mut metrics = MetricsEngineCounting::new();
        let mut logger = Logger::new();
        let defaults = synthesizer().synthesize(&mut ctx, &response(&[]), metrics.as_mut(), &mut logger);

        assert_eq!(defaults["imp1"].keys().collect::<Vec<_>>(), vec!["pubmatic"]);
    }

    #[test]
    fn test_every_configured_pair_covered_exactly_once() {
        let imps = ["imp1", "imp2", "imp3"];
        let bidders = ["pubmatic", "appnexus", "openx", "rubicon"];
        let mut ctx = ctx_with_bidders(&imps, &bidders);
        let resp = response(&[("pubmatic", "b1", "imp1"), ("openx", "b2", "imp1"), ("rubicon", "b3", "imp3")]);
        let mut metrics = MetricsEngineCounting::new();
        let mut logger = Logger::new();
        let defaults = synthesizer().synthesize(&mut ctx, &resp, metrics.as_mut(), &mut logger);

        for imp in imps {
            for bidder in bidders {
                let real = resp.seat(bidder).map(|s| s.bids.iter().filter(|b| b.imp_id == imp).count()).unwrap_or(0);
                let synthesized = defaults.get(imp).and_then(|seats| seats.get(bidder)).map(|b| b.len()).unwrap_or(0);
                assert_eq!(real + synthesized, 1, "{} x {}", imp, bidder);
            }
        }
    }

    fn multi_floor_ctx() -> RequestCtx {
        let mut ctx = ctx_with_bidders(&["imp1"], &["pubmatic", "appnexus"]);
        ctx.endpoint = Endpoint::APPLOVIN_MAX;
        ctx.multi_floors.insert("imp1".to_string(), vec![1.0, 2.5, 4.0]);
        ctx
    }

    fn record_floor(ctx: &mut RequestCtx, bid_id: &str, floor: f64) {
        if let Some(imp_ctx) = ctx.imp_bid_ctx.get_mut("imp1") {
            let ext = BidExt { multi_floor_value: floor, ..Default::default() };
            imp_ctx.bid_ctx.insert(bid_id.to_string(), BidContext { ext, ..Default::default() });
        }
    }

    fn floors_of(ctx: &RequestCtx, bids: &[Bid]) -> Vec<f64> {
        bids.iter().map(|bid| ctx.imp_bid_ctx["imp1"].bid_ctx[&bid.id].ext.multi_floor_value).collect()
    }

    #[test]
    fn test_floors_fill_unused_values_and_replace_earlier_placeholders() {
        let mut ctx = multi_floor_ctx();
        record_floor(&mut ctx, "real", 2.5);
        let resp = response(&[("pubmatic", "real", "imp1")]);

        let mut synthesizer = synthesizer();
        let mut defaults = DefaultBids::new();
        let stale = vec![Bid::new("stale", "imp1", 0.0)];
        defaults.entry("imp1".to_string()).or_default().insert("pubmatic".to_string(), stale);

        let mut logger = Logger::new();
        synthesizer.synthesize_for_floors(&mut ctx, &resp, &mut defaults, &mut logger);

        let bids = &defaults["imp1"]["pubmatic"];
        assert_eq!(floors_of(&ctx, bids), vec![1.0, 4.0]);
        assert!(bids.iter().all(|bid| bid.id != "stale"));
        assert!(!defaults["imp1"].contains_key("appnexus"));
    }

    #[test]
    fn test_floors_fully_covered_adds_nothing() {
        let mut ctx = multi_floor_ctx();
        for (i, floor) in [1.0, 2.5, 4.0].iter().enumerate() {
            record_floor(&mut ctx, &format!("real-{}", i), *floor);
        }
        let resp = response(&[("pubmatic", "real-0", "imp1"), ("pubmatic", "real-1", "imp1"), ("pubmatic", "real-2", "imp1")]);
        let mut defaults = DefaultBids::new();
        let mut logger = Logger::new();
        synthesizer().synthesize_for_floors(&mut ctx, &resp, &mut defaults, &mut logger);
        assert!(defaults.is_empty());
    }

    #[test]
    fn test_floors_only_for_multi_floor_endpoint() {
        let mut ctx = multi_floor_ctx();
        ctx.endpoint = Endpoint::OPENRTB;
        let mut defaults = DefaultBids::new();
        let mut logger = Logger::new();
        synthesizer().synthesize_for_floors(&mut ctx, &response(&[]), &mut defaults, &mut logger);
        assert!(defaults.is_empty());
    }

    #[test]
    fn test_reconcile_appends_and_drains() {
        let resp = response(&[("pubmatic", "b1", "imp1")]);
        let mut pending = DefaultBids::new();
        pending.entry("imp1".to_string()).or_default().insert("openx".to_string(), vec![Bid::new("d1", "imp1", 0.0)]);
        pending.entry("imp2".to_string()).or_default().insert("pubmatic".to_string(), vec![Bid::new("d2", "imp2", 0.0)]);
        pending.entry("imp2".to_string()).or_default().insert("openx".to_string(), vec![Bid::new("d3", "imp2", 0.0)]);

        let resp = reconcile(resp, &mut pending);
        assert!(pending.is_empty());
        assert_eq!(resp.seat_bids.len(), 2);
        let pubmatic: Vec<&str> = resp.seat("pubmatic").map(|s| s.bids.iter().map(|b| b.id.as_str()).collect()).unwrap_or_default();
        assert_eq!(pubmatic, vec!["b1", "d2"]);
        let openx: Vec<&str> = resp.seat("openx").map(|s| s.bids.iter().map(|b| b.id.as_str()).collect()).unwrap_or_default();
        assert_eq!(openx, vec!["d1", "d3"]);

        let again = reconcile(resp.clone(), &mut pending);
        assert_eq!(again, resp);
    }
}
