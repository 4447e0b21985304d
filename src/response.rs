//! Already-parsed bid response handed over by the exchange, plus the extension fields this
//! engine reads and writes. OpenRTB (de)serialization itself happens outside.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use crate::reason_codes::{NonBidReason, ResponseErrors};

/// A single bid as seen in the response
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Bid {
    pub id: String,
    #[serde(rename = "impid")]
    pub imp_id: String,
    #[serde(default)]
    pub price: f64,
    /// Price after partner revenue share, used for ranking
    #[serde(default, rename = "netecpm")]
    pub net_ecpm: f64,
    #[serde(default, rename = "dealtiersatisfied")]
    pub deal_tier_satisfied: bool,
    /// Raw bid extension JSON, parsed into `BidExt` while processing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<String>,
}

impl Bid {
    pub fn new(id: &str, imp_id: &str, net_ecpm: f64) -> Self {
        Self {
            id: id.to_string(),
            imp_id: imp_id.to_string(),
            price: net_ecpm,
            net_ecpm,
            deal_tier_satisfied: false,
            ext: None,
        }
    }

    pub fn with_deal(mut self, deal_tier_satisfied: bool) -> Self {
        self.deal_tier_satisfied = deal_tier_satisfied;
        self
    }

    pub fn with_ext(mut self, ext: &str) -> Self {
        self.ext = Some(ext.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SeatBid {
    pub seat: String,
    #[serde(default, rename = "bid")]
    pub bids: Vec<Bid>,
}

/// One impression a seat did not bid on, with the reason
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NonBid {
    #[serde(rename = "impid")]
    pub imp_id: String,
    #[serde(rename = "statuscode")]
    pub status_code: NonBidReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeatNonBid {
    pub seat: String,
    #[serde(rename = "nonbid")]
    pub non_bid: Vec<NonBid>,
}

/// Response extension: the fields read/written here, everything else kept in `extra`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResponseExt {
    #[serde(default, skip_serializing_if = "ResponseErrors::is_empty")]
    pub errors: ResponseErrors,
    #[serde(default, rename = "seatnonbid", skip_serializing_if = "Vec::is_empty")]
    pub seat_non_bid: Vec<SeatNonBid>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BidResponse {
    pub id: String,
    #[serde(default, rename = "seatbid")]
    pub seat_bids: Vec<SeatBid>,
    #[serde(default)]
    pub ext: ResponseExt,
}

impl BidResponse {
    /// Find the bids of a seat
    pub fn seat(&self, seat: &str) -> Option<&SeatBid> {
        self.seat_bids.iter().find(|seat_bid| seat_bid.seat == seat)
    }

    /// Total number of bids across seats
    pub fn bid_count(&self) -> usize {
        self.seat_bids.iter().map(|seat_bid| seat_bid.bids.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reason_codes::{ResponseError, TIMEOUT_ERROR_CODE};

    #[test]
    fn test_response_ext_keeps_unknown_fields() {
        let raw = r#"{"errors":{"appnexus":[{"code":1,"message":"timeout"}]},"responsetimemillis":{"appnexus":120}}"#;
        let ext: ResponseExt = serde_json::from_str(raw).unwrap();
        assert_eq!(ext.errors["appnexus"], vec![ResponseError::new(TIMEOUT_ERROR_CODE, "timeout")]);
        assert!(ext.extra.contains_key("responsetimemillis"));

        let written = serde_json::to_value(&ext).unwrap();
        assert_eq!(written["responsetimemillis"]["appnexus"], 120);
    }

    #[test]
    fn test_seat_lookup_and_count() {
        let response = BidResponse {
            id: "resp".to_string(),
            seat_bids: vec![
                SeatBid { seat: "pubmatic".to_string(), bids: vec![Bid::new("b1", "imp1", 1.0), Bid::new("b2", "imp2", 2.0)] },
                SeatBid { seat: "appnexus".to_string(), bids: vec![Bid::new("b3", "imp1", 3.0)] },
            ],
            ext: ResponseExt::default(),
        };
        assert_eq!(response.bid_count(), 3);
        assert_eq!(response.seat("appnexus").map(|s| s.bids.len()), Some(1));
        assert!(response.seat("openx").is_none());
    }
}
