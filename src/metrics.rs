use std::any::Any;
use std::collections::BTreeMap;
use crate::reason_codes::PartnerError;

/// Sink for the observability signals the engine raises
/// Emission to a real backend happens outside this crate
pub trait MetricsEngineTrait: Any {
    /// A configured partner produced no usable bid for an impression
    fn record_partner_response_error(&mut self, pub_id: &str, bidder: &str, error: PartnerError);

    /// The request ended without any winning bid
    fn record_no_bid_response(&mut self, pub_id: &str);

    /// A partner was throttled out of an auction
    fn record_partner_throttled(&mut self, pub_id: &str, bidder: &str);

    /// Get reference to Any for downcasting
    fn as_any(&self) -> &dyn Any;
}

/// Drops every signal
pub struct MetricsEngineNone;

impl MetricsEngineNone {
    pub fn new() -> Box<Self> {
        Box::new(Self)
    }
}

impl MetricsEngineTrait for MetricsEngineNone {
    fn record_partner_response_error(&mut self, _pub_id: &str, _bidder: &str, _error: PartnerError) {}

    fn record_no_bid_response(&mut self, _pub_id: &str) {}

    fn record_partner_throttled(&mut self, _pub_id: &str, _bidder: &str) {}

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Keeps in-memory counters, used by scenarios and tests
#[derive(Debug, Default)]
pub struct MetricsEngineCounting {
    /// (bidder, error class) -> count
    pub partner_errors: BTreeMap<(String, PartnerError), u64>,
    /// publisher -> requests without a winner
    pub no_bid_responses: BTreeMap<String, u64>,
    /// bidder -> throttled auctions
    pub throttled: BTreeMap<String, u64>,
}

impl MetricsEngineCounting {
    pub fn new() -> Box<Self> {
        Box::new(Self::default())
    }

    pub fn partner_error_count(&self, bidder: &str, error: PartnerError) -> u64 {
        self.partner_errors.get(&(bidder.to_string(), error)).copied().unwrap_or(0)
    }

    /// Count of one error class across bidders
    pub fn partner_error_total(&self, error: PartnerError) -> u64 {
        self.partner_errors.iter().filter(|((_, e), _)| *e == error).map(|(_, count)| count).sum()
    }

    pub fn total_partner_errors(&self) -> u64 {
        self.partner_errors.values().sum()
    }

    pub fn no_bid_count(&self, pub_id: &str) -> u64 {
        self.no_bid_responses.get(pub_id).copied().unwrap_or(0)
    }

    pub fn throttled_count(&self, bidder: &str) -> u64 {
        self.throttled.get(bidder).copied().unwrap_or(0)
    }
}

impl MetricsEngineTrait for MetricsEngineCounting {
    fn record_partner_response_error(&mut self, _pub_id: &str, bidder: &str, error: PartnerError) {
        *self.partner_errors.entry((bidder.to_string(), error)).or_insert(0) += 1;
    }

    fn record_no_bid_response(&mut self, pub_id: &str) {
        *self.no_bid_responses.entry(pub_id.to_string()).or_insert(0) += 1;
    }

    fn record_partner_throttled(&mut self, _pub_id: &str, bidder: &str) {
        *self.throttled.entry(bidder.to_string()).or_insert(0) += 1;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
