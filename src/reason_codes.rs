use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};

/// Error code a partner adapter reports for a timed out call
pub const TIMEOUT_ERROR_CODE: i32 = 1;
/// Error code for errors the adapter could not classify
pub const UNKNOWN_ERROR_CODE: i32 = 999;

/// Standardized reasons explaining why a partner/impression pair has no winning bid
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NonBidReason {
    NO_BID_UNKNOWN_ERROR,
    ERROR_GENERAL,
    ERROR_TIMEOUT,
    LOST_TO_HIGHER_BID,
    LOST_TO_DEAL_BID,
    REQUEST_BLOCKED_SLOT_NOT_MAPPED,
    REQUEST_BLOCKED_PARTNER_THROTTLE,
}

impl NonBidReason {
    /// Numeric status code as written to the response and logs
    pub fn code(&self) -> i32 {
        match self {
            NonBidReason::NO_BID_UNKNOWN_ERROR => 0,
            NonBidReason::ERROR_GENERAL => 100,
            NonBidReason::ERROR_TIMEOUT => 101,
            NonBidReason::LOST_TO_HIGHER_BID => 102,
            NonBidReason::LOST_TO_DEAL_BID => 103,
            NonBidReason::REQUEST_BLOCKED_SLOT_NOT_MAPPED => 503,
            NonBidReason::REQUEST_BLOCKED_PARTNER_THROTTLE => 504,
        }
    }

    pub fn from_code(code: i32) -> Option<NonBidReason> {
        match code {
            0 => Some(NonBidReason::NO_BID_UNKNOWN_ERROR),
            100 => Some(NonBidReason::ERROR_GENERAL),
            101 => Some(NonBidReason::ERROR_TIMEOUT),
            102 => Some(NonBidReason::LOST_TO_HIGHER_BID),
            103 => Some(NonBidReason::LOST_TO_DEAL_BID),
            503 => Some(NonBidReason::REQUEST_BLOCKED_SLOT_NOT_MAPPED),
            504 => Some(NonBidReason::REQUEST_BLOCKED_PARTNER_THROTTLE),
            _ => None,
        }
    }
}

// Serialized as the bare numeric code
impl Serialize for NonBidReason {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.code())
    }
}

impl<'de> Deserialize<'de> for NonBidReason {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = i32::deserialize(deserializer)?;
        NonBidReason::from_code(code)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown non-bid reason code {}", code)))
    }
}

/// One error recorded by the upstream exchange for a partner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseError {
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

impl ResponseError {
    pub fn new(code: i32, message: &str) -> Self {
        Self { code, message: message.to_string() }
    }
}

/// Errors recorded per bidder for the current response envelope
pub type ResponseErrors = BTreeMap<String, Vec<ResponseError>>;

/// Partner-level error classes reported to metrics
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PartnerError {
    NO_BID,
    TIMEOUT,
    UNKNOWN_PREBID_ERROR,
}

impl PartnerError {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartnerError::NO_BID => "nobid",
            PartnerError::TIMEOUT => "timeout",
            PartnerError::UNKNOWN_PREBID_ERROR => "unknown",
        }
    }
}

/// Map the first recorded error of a bidder to a non-bid reason
///
/// No errors means the partner simply did not bid, a timeout maps to `ERROR_TIMEOUT`,
/// every other error class to `ERROR_GENERAL`.
pub fn from_response_errors(bidder: &str, response_errors: &ResponseErrors) -> NonBidReason {
    match response_errors.get(bidder).and_then(|errors| errors.first()) {
        None => NonBidReason::NO_BID_UNKNOWN_ERROR,
        Some(error) if error.code == TIMEOUT_ERROR_CODE => NonBidReason::ERROR_TIMEOUT,
        Some(_) => NonBidReason::ERROR_GENERAL,
    }
}

/// Classify a bidder's first recorded error for partner error statistics
pub fn partner_error_from_response_errors(bidder: &str, response_errors: &ResponseErrors) -> PartnerError {
    match response_errors.get(bidder).and_then(|errors| errors.first()) {
        Some(error) if error.code == TIMEOUT_ERROR_CODE => PartnerError::TIMEOUT,
        Some(error) if error.code == UNKNOWN_ERROR_CODE => PartnerError::UNKNOWN_PREBID_ERROR,
        _ => PartnerError::NO_BID,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn errors(bidder: &str, codes: &[i32]) -> ResponseErrors {
        let mut response_errors = ResponseErrors::new();
        response_errors.insert(
            bidder.to_string(),
            codes.iter().map(|code| ResponseError::new(*code, "err")).collect(),
        );
        response_errors
    }

    #[test]
    fn test_no_errors_is_unknown_no_bid() {
        assert_eq!(from_response_errors("pubmatic", &ResponseErrors::new()), NonBidReason::NO_BID_UNKNOWN_ERROR);
        assert_eq!(from_response_errors("pubmatic", &errors("pubmatic", &[])), NonBidReason::NO_BID_UNKNOWN_ERROR);
        assert_eq!(from_response_errors("pubmatic", &errors("appnexus", &[TIMEOUT_ERROR_CODE])), NonBidReason::NO_BID_UNKNOWN_ERROR);
    }

    #[test]
    fn test_timeout_and_general() {
        assert_eq!(from_response_errors("pubmatic", &errors("pubmatic", &[TIMEOUT_ERROR_CODE])), NonBidReason::ERROR_TIMEOUT);
        assert_eq!(from_response_errors("pubmatic", &errors("pubmatic", &[UNKNOWN_ERROR_CODE])), NonBidReason::ERROR_GENERAL);
        assert_eq!(from_response_errors("pubmatic", &errors("pubmatic", &[3])), NonBidReason::ERROR_GENERAL);
    }

    #[test]
    fn test_only_first_error_counts() {
        let response_errors = errors("pubmatic", &[3, TIMEOUT_ERROR_CODE]);
        assert_eq!(from_response_errors("pubmatic", &response_errors), NonBidReason::ERROR_GENERAL);
        let response_errors = errors("pubmatic", &[TIMEOUT_ERROR_CODE, 3]);
        assert_eq!(from_response_errors("pubmatic", &response_errors), NonBidReason::ERROR_TIMEOUT);
    }

    #[test]
    fn test_partner_error_classes() {
        assert_eq!(partner_error_from_response_errors("a", &ResponseErrors::new()), PartnerError::NO_BID);
        assert_eq!(partner_error_from_response_errors("a", &errors("a", &[TIMEOUT_ERROR_CODE])), PartnerError::TIMEOUT);
        assert_eq!(partner_error_from_response_errors("a", &errors("a", &[UNKNOWN_ERROR_CODE])), PartnerError::UNKNOWN_PREBID_ERROR);
        assert_eq!(partner_error_from_response_errors("a", &errors("a", &[3])), PartnerError::NO_BID);
    }

    #[test]
    fn test_codes_round_trip_through_json() {
        let json = serde_json::to_string(&NonBidReason::LOST_TO_DEAL_BID).unwrap();
        assert_eq!(json, "103");
        let reason: NonBidReason = serde_json::from_str("504").unwrap();
        assert_eq!(reason, NonBidReason::REQUEST_BLOCKED_PARTNER_THROTTLE);
        assert!(serde_json::from_str::<NonBidReason>("7").is_err());
    }
}
