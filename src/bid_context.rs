//! Per-request state: impression contexts, parsed bid extensions and the request switches
//! that steer winner resolution and default-bid synthesis.

use std::collections::{BTreeMap, BTreeSet};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use crate::partner_config::PartnerConfig;
use crate::reason_codes::NonBidReason;
use crate::response::{Bid, NonBid};
use crate::throttle::ThrottleSet;
use crate::winner::WinningBids;

/// Bidder code of the pass-through tag partner (one placeholder per unanswered tag)
pub const PASS_THROUGH_TAG_BIDDER_CODE: &str = "vastbidder";
/// Bidder codes of the primary partner eligible for multi-floor synthesis
pub const PRIMARY_BIDDER_CODES: [&str; 2] = ["pubmatic", "pubmatic2"];

/// Placeholder bids keyed by impression id, then seat
pub type DefaultBids = BTreeMap<String, BTreeMap<String, Vec<Bid>>>;

/// Entry point the request came in through
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endpoint {
    #[default]
    OPENRTB,
    /// Pass-through aggregation: throttled and unmapped partners are reported via seat non-bids only
    WEB_S2S,
    /// Multi-floor auctions
    APPLOVIN_MAX,
}

/// Request-level reasons for answering without any bid
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestNoBidReason {
    ALL_PARTNERS_THROTTLED,
}

/// Client-side rendering config attached to a media type
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MediaClientConfig {
    #[serde(rename = "clientconfig", default, skip_serializing_if = "Option::is_none")]
    pub client_config: Option<Value>,
}

/// Typed bid extension; fields this engine does not know are preserved in `extra`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BidExt {
    #[serde(rename = "nbr", default, skip_serializing_if = "Option::is_none")]
    pub nbr: Option<NonBidReason>,
    #[serde(rename = "netecpm", default)]
    pub net_ecpm: f64,
    #[serde(rename = "refreshInterval", default, skip_serializing_if = "is_zero_i64")]
    pub refresh_interval: i64,
    #[serde(rename = "vasttagid", default, skip_serializing_if = "Option::is_none")]
    pub vast_tag_id: Option<String>,
    #[serde(rename = "mbmfv", default, skip_serializing_if = "is_zero_f64")]
    pub multi_floor_value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banner: Option<MediaClientConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<MediaClientConfig>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn is_zero_i64(value: &i64) -> bool {
    *value == 0
}

fn is_zero_f64(value: &f64) -> bool {
    *value == 0.0
}

/// What is kept about every bid (real or synthesized) for logging and tracking
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BidContext {
    pub ext: BidExt,
    pub deal_tier_satisfied: bool,
    /// Net price
    pub net_ecpm: f64,
}

/// Partner configured for an impression
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BidderMeta {
    pub prebid_bidder_code: String,
    /// Pass-through tag partner only: tag id -> whether the tag responded
    pub vast_tag_flags: BTreeMap<String, bool>,
}

impl BidderMeta {
    pub fn new(prebid_bidder_code: &str) -> Self {
        Self {
            prebid_bidder_code: prebid_bidder_code.to_string(),
            vast_tag_flags: BTreeMap::new(),
        }
    }
}

/// Everything known about one impression during a request
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ImpressionBidContext {
    /// Eligible partners by seat
    pub bidders: BTreeMap<String, BidderMeta>,
    /// Partners without a server-side slot mapping for this impression
    pub non_mapped: BTreeSet<String>,
    /// Bid id -> bid details, filled while processing responses and synthesizing defaults
    pub bid_ctx: BTreeMap<String, BidContext>,
    /// Ad unit client config by media type ("banner", "video")
    pub client_config: BTreeMap<String, Value>,
}

impl ImpressionBidContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bidder(mut self, seat: &str, meta: BidderMeta) -> Self {
        self.bidders.insert(seat.to_string(), meta);
        self
    }

    pub fn with_non_mapped(mut self, seat: &str) -> Self {
        self.non_mapped.insert(seat.to_string());
        self
    }
}

/// State owned by a single request for its whole lifetime
#[derive(Debug, Clone, Default)]
pub struct RequestCtx {
    pub pub_id: String,
    pub endpoint: Endpoint,
    pub partner_config: PartnerConfig,
    pub imp_bid_ctx: BTreeMap<String, ImpressionBidContext>,
    /// Seat -> prebid bidder code
    pub prebid_bidder_code: BTreeMap<String, String>,
    /// Impression id -> configured floor values (multi-floor auctions)
    pub multi_floors: BTreeMap<String, Vec<f64>>,
    pub prefer_deals: bool,
    pub send_all_bids: bool,
    pub return_all_bid_status: bool,
    pub client_config_flag: bool,

    pub ab_test_applied: bool,
    pub throttle: ThrottleSet,
    pub request_nbr: Option<RequestNoBidReason>,
    pub winning_bids: WinningBids,
    /// Bids that responded but were pruned from the response, by seat
    pub dropped_bids: BTreeMap<String, Vec<Bid>>,
    pub default_bids: DefaultBids,
    pub seat_non_bids: BTreeMap<String, Vec<NonBid>>,
    pub warnings: Vec<String>,
}

impl RequestCtx {
    pub fn new(pub_id: &str, partner_config: PartnerConfig) -> Self {
        Self {
            pub_id: pub_id.to_string(),
            partner_config,
            ..Default::default()
        }
    }

    /// Whether the seat is the primary partner (multi-floor synthesis target)
    pub fn is_primary_bidder(&self, seat: &str) -> bool {
        self.prebid_bidder_code
            .get(seat)
            .map(|code| PRIMARY_BIDDER_CODES.contains(&code.as_str()))
            .unwrap_or(false)
    }

    /// Client config for an impression and media type, only when client configs are enabled
    pub fn client_config_for_media_type(&self, imp_id: &str, media_type: &str) -> Option<Value> {
        if !self.client_config_flag {
            return None;
        }
        self.imp_bid_ctx
            .get(imp_id)
            .and_then(|imp_ctx| imp_ctx.client_config.get(media_type))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bid_ext_parses_known_and_keeps_unknown() {
        let raw = r#"{"nbr":102,"netecpm":4.5,"mbmfv":1.25,"prebid":{"type":"banner"},"dspid":7}"#;
        let ext: BidExt = serde_json::from_str(raw).unwrap();
        assert_eq!(ext.nbr, Some(NonBidReason::LOST_TO_HIGHER_BID));
        assert_eq!(ext.net_ecpm, 4.5);
        assert_eq!(ext.multi_floor_value, 1.25);
        assert_eq!(ext.extra.get("dspid"), Some(&json!(7)));
        assert_eq!(ext.extra.get("prebid"), Some(&json!({"type": "banner"})));
    }

    #[test]
    fn test_bid_ext_serializes_compactly() {
        let ext = BidExt { nbr: Some(NonBidReason::NO_BID_UNKNOWN_ERROR), ..Default::default() };
        let value = serde_json::to_value(&ext).unwrap();
        assert_eq!(value, json!({"nbr": 0, "netecpm": 0.0}));
    }

    #[test]
    fn test_client_config_requires_flag() {
        let mut ctx = RequestCtx::new("5890", PartnerConfig::new());
        let mut imp = ImpressionBidContext::new();
        imp.client_config.insert("banner".to_string(), json!({"enabled": true}));
        ctx.imp_bid_ctx.insert("imp1".to_string(), imp);

        assert_eq!(ctx.client_config_for_media_type("imp1", "banner"), None);
        ctx.client_config_flag = true;
        assert_eq!(ctx.client_config_for_media_type("imp1", "banner"), Some(json!({"enabled": true})));
        assert_eq!(ctx.client_config_for_media_type("imp1", "video"), None);
        assert_eq!(ctx.client_config_for_media_type("imp2", "banner"), None);
    }

    #[test]
    fn test_is_primary_bidder() {
        let mut ctx = RequestCtx::new("5890", PartnerConfig::new());
        ctx.prebid_bidder_code.insert("pubmatic".to_string(), "pubmatic".to_string());
        ctx.prebid_bidder_code.insert("pm_alias".to_string(), "pubmatic2".to_string());
        ctx.prebid_bidder_code.insert("appnexus".to_string(), "appnexus".to_string());
        assert!(ctx.is_primary_bidder("pubmatic"));
        assert!(ctx.is_primary_bidder("pm_alias"));
        assert!(!ctx.is_primary_bidder("appnexus"));
        assert!(!ctx.is_primary_bidder("unknown"));
    }
}
