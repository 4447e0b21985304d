use std::collections::BTreeMap;
use crate::bid_context::ImpressionBidContext;
use crate::reason_codes::NonBidReason;
use crate::response::{NonBid, SeatNonBid};
use crate::throttle::ThrottleSet;

/// Non-bids for throttled and unmapped partners, per seat
///
/// Ordinary no-bids are not reported here, they are covered by default bids.
pub fn build(imp_bid_ctx: &BTreeMap<String, ImpressionBidContext>, throttle: &ThrottleSet) -> BTreeMap<String, Vec<NonBid>> {
    let mut seat_non_bids: BTreeMap<String, Vec<NonBid>> = BTreeMap::new();
    for (imp_id, imp_ctx) in imp_bid_ctx {
        for bidder in &throttle.excluded {
            seat_non_bids.entry(bidder.clone()).or_default().push(NonBid {
                imp_id: imp_id.clone(),
                status_code: NonBidReason::REQUEST_BLOCKED_PARTNER_THROTTLE,
            });
        }
        for bidder in &imp_ctx.non_mapped {
            seat_non_bids.entry(bidder.clone()).or_default().push(NonBid {
                imp_id: imp_id.clone(),
                status_code: NonBidReason::REQUEST_BLOCKED_SLOT_NOT_MAPPED,
            });
        }
    }
    seat_non_bids
}

/// Fold pending non-bids into the response list
/// Seats already listed get the entries appended, the rest become new seats. `pending` ends up empty.
pub fn merge(pending: &mut BTreeMap<String, Vec<NonBid>>, existing: &mut Vec<SeatNonBid>) {
    for seat_non_bid in existing.iter_mut() {
        if let Some(non_bids) = pending.remove(&seat_non_bid.seat) {
            seat_non_bid.non_bid.extend(non_bids);
        }
    }
    for (seat, non_bid) in std::mem::take(pending) {
        existing.push(SeatNonBid { seat, non_bid });
    }
}
