use std::collections::BTreeMap;
use crate::bid_context::ImpressionBidContext;
use crate::logger::{LogEvent, Logger};
use crate::logln;
use crate::reason_codes::NonBidReason;

/// The fields of a bid that take part in winner resolution
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BidRecord {
    pub id: String,
    pub net_ecpm: f64,
    pub deal_tier_satisfied: bool,
    pub nbr: Option<NonBidReason>,
}

impl BidRecord {
    pub fn new(id: &str, net_ecpm: f64, deal_tier_satisfied: bool) -> Self {
        Self {
            id: id.to_string(),
            net_ecpm,
            deal_tier_satisfied,
            nbr: None,
        }
    }
}

/// Returns whether the candidate wins and the reason the loser lost
fn compare(candidate: &BidRecord, incumbent: &BidRecord, prefer_deals: bool) -> (bool, NonBidReason) {
    if prefer_deals && candidate.deal_tier_satisfied != incumbent.deal_tier_satisfied {
        return (candidate.deal_tier_satisfied, NonBidReason::LOST_TO_DEAL_BID);
    }
    // strictly greater unseats, ties stay with the incumbent
    (candidate.net_ecpm > incumbent.net_ecpm, NonBidReason::LOST_TO_HIGHER_BID)
}

/// Compare a newly seen bid against the current winner of its impression
///
/// With `prefer_deals`, a bid satisfying its deal tier beats one that does not.
/// Otherwise the strictly higher net eCPM wins and ties keep the incumbent.
///
/// # Returns
/// `true` if the candidate becomes the winner. The loser of the comparison gets its `nbr` stamped.
pub fn consider_bid(candidate: &mut BidRecord, incumbent: &mut BidRecord, prefer_deals: bool) -> bool {
    let (candidate_wins, reason) = compare(candidate, incumbent, prefer_deals);
    if candidate_wins {
        incumbent.nbr = Some(reason);
    } else {
        candidate.nbr = Some(reason);
    }
    candidate_wins
}

/// Per-impression winner state
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, PartialEq)]
pub enum IncumbentState {
    NO_INCUMBENT,
    HAS_INCUMBENT(BidRecord),
}

/// What happened to the impression state when a bid was offered
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// First bid seen for the impression, it is the winner for now
    FIRST_BID,
    /// The candidate did not unseat the incumbent
    CANDIDATE_LOST { reason: NonBidReason },
    /// The candidate displaced the incumbent, whose recorded context must be stamped with `reason`
    CANDIDATE_WON { displaced_bid_id: String, reason: NonBidReason },
}

/// Current winner per impression
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WinningBids {
    winners: BTreeMap<String, BidRecord>,
}

impl WinningBids {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, imp_id: &str) -> IncumbentState {
        match self.winners.get(imp_id) {
            Some(bid) => IncumbentState::HAS_INCUMBENT(bid.clone()),
            None => IncumbentState::NO_INCUMBENT,
        }
    }

    /// Feed one bid into the impression's state machine
    pub fn offer(&mut self, imp_id: &str, mut candidate: BidRecord, prefer_deals: bool, logger: &mut Logger) -> Transition {
        let state = match self.winners.remove(imp_id) {
            Some(incumbent) => IncumbentState::HAS_INCUMBENT(incumbent),
            None => IncumbentState::NO_INCUMBENT,
        };

        let (winner, transition) = match state {
            IncumbentState::NO_INCUMBENT => {
                logln!(logger, LogEvent::Auction, "{}: first bid {} at {:.4}", imp_id, candidate.id, candidate.net_ecpm);
                (candidate, Transition::FIRST_BID)
            }
            IncumbentState::HAS_INCUMBENT(mut incumbent) => {
                if consider_bid(&mut candidate, &mut incumbent, prefer_deals) {
                    let reason = incumbent.nbr.unwrap_or(NonBidReason::LOST_TO_HIGHER_BID);
                    logln!(logger, LogEvent::Auction, "{}: bid {} ({:.4}) displaces {} ({:.4}), nbr {}",
                        imp_id, candidate.id, candidate.net_ecpm, incumbent.id, incumbent.net_ecpm, reason.code());
                    (candidate, Transition::CANDIDATE_WON { displaced_bid_id: incumbent.id, reason })
                } else {
                    let reason = candidate.nbr.unwrap_or(NonBidReason::LOST_TO_HIGHER_BID);
                    logln!(logger, LogEvent::Auction, "{}: bid {} ({:.4}) loses to {} ({:.4}), nbr {}",
                        imp_id, candidate.id, candidate.net_ecpm, incumbent.id, incumbent.net_ecpm, reason.code());
                    (incumbent, Transition::CANDIDATE_LOST { reason })
                }
            }
        };

        self.winners.insert(imp_id.to_string(), winner);
        transition
    }

    pub fn get(&self, imp_id: &str) -> Option<&BidRecord> {
        self.winners.get(imp_id)
    }

    pub fn is_winning_bid(&self, imp_id: &str, bid_id: &str) -> bool {
        self.winners.get(imp_id).map(|bid| bid.id == bid_id).unwrap_or(false)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BidRecord)> {
        self.winners.iter()
    }

    pub fn len(&self) -> usize {
        self.winners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.winners.is_empty()
    }
}

/// Restamp the non-deal losers of every impression won by a deal bid as lost to a deal bid
/// Runs after all bids were offered when deals are preferred. Impressions without a bid
/// satisfying its deal tier keep the pairwise stamps, and losing deal bids keep "lost to higher bid".
pub fn assign_lost_to_deal_bid(imp_bid_ctx: &mut BTreeMap<String, ImpressionBidContext>, winning_bids: &WinningBids) {
    for (imp_id, imp_ctx) in imp_bid_ctx.iter_mut() {
        let winner = match winning_bids.get(imp_id) {
            Some(winner) if winner.deal_tier_satisfied => winner,
            _ => continue,
        };
        if !imp_ctx.bid_ctx.values().any(|bid_ctx| bid_ctx.deal_tier_satisfied) {
            continue;
        }
        for (bid_id, bid_ctx) in imp_ctx.bid_ctx.iter_mut() {
            if *bid_id == winner.id || bid_ctx.deal_tier_satisfied {
                continue;
            }
            bid_ctx.ext.nbr = Some(NonBidReason::LOST_TO_DEAL_BID);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bid_context::BidContext;

    /// Run every bid through the state machine and return the winner id plus the final reason per loser
    fn resolve(bids: &[BidRecord], prefer_deals: bool) -> (String, BTreeMap<String, NonBidReason>) {
        let mut logger = Logger::new();
        let mut winning_bids = WinningBids::new();
        let mut reasons = BTreeMap::new();
        for bid in bids {
            match winning_bids.offer("imp1", bid.clone(), prefer_deals, &mut logger) {
                Transition::FIRST_BID => {}
                Transition::CANDIDATE_LOST { reason } => {
                    reasons.insert(bid.id.clone(), reason);
                }
                Transition::CANDIDATE_WON { displaced_bid_id, reason } => {
                    reasons.insert(displaced_bid_id, reason);
                }
            }
        }
        let winner = winning_bids.get("imp1").map(|bid| bid.id.clone()).unwrap_or_default();
        (winner, reasons)
    }

    #[test]
    fn test_highest_net_ecpm_wins() {
        let bids = vec![
            BidRecord::new("bid-id-1", 5.0, false),
            BidRecord::new("bid-id-2", 20.0, false),
            BidRecord::new("bid-id-3", 10.0, false),
        ];
        let (winner, reasons) = resolve(&bids, false);
        assert_eq!(winner, "bid-id-2");
        assert_eq!(reasons.get("bid-id-1"), Some(&NonBidReason::LOST_TO_HIGHER_BID));
        assert_eq!(reasons.get("bid-id-3"), Some(&NonBidReason::LOST_TO_HIGHER_BID));
        assert_eq!(reasons.len(), 2);
    }

    #[test]
    fn test_tie_keeps_incumbent() {
        let mut candidate = BidRecord::new("late", 7.0, false);
        let mut incumbent = BidRecord::new("early", 7.0, false);
        assert!(!consider_bid(&mut candidate, &mut incumbent, false));
        assert_eq!(candidate.nbr, Some(NonBidReason::LOST_TO_HIGHER_BID));
        assert_eq!(incumbent.nbr, None);
    }

    #[test]
    fn test_deal_beats_price_only_when_preferred() {
        let mut candidate = BidRecord::new("deal", 1.0, true);
        let mut incumbent = BidRecord::new("open", 9.0, false);
        assert!(consider_bid(&mut candidate, &mut incumbent, true));
        assert_eq!(incumbent.nbr, Some(NonBidReason::LOST_TO_DEAL_BID));

        let mut candidate = BidRecord::new("deal", 1.0, true);
        let mut incumbent = BidRecord::new("open", 9.0, false);
        assert!(!consider_bid(&mut candidate, &mut incumbent, false));
        assert_eq!(candidate.nbr, Some(NonBidReason::LOST_TO_HIGHER_BID));
    }

    #[test]
    fn test_non_deal_candidate_loses_to_deal_incumbent() {
        let mut candidate = BidRecord::new("open", 50.0, false);
        let mut incumbent = BidRecord::new("deal", 2.0, true);
        assert!(!consider_bid(&mut candidate, &mut incumbent, true));
        assert_eq!(candidate.nbr, Some(NonBidReason::LOST_TO_DEAL_BID));
    }

    #[test]
    fn test_both_deals_compare_on_price() {
        let mut candidate = BidRecord::new("deal-hi", 3.0, true);
        let mut incumbent = BidRecord::new("deal-lo", 2.0, true);
        assert!(consider_bid(&mut candidate, &mut incumbent, true));
        assert_eq!(incumbent.nbr, Some(NonBidReason::LOST_TO_HIGHER_BID));
    }

    #[test]
    fn test_winner_is_order_independent() {
        let bids = vec![
            BidRecord::new("a", 4.0, false),
            BidRecord::new("b", 11.0, false),
            BidRecord::new("c", 2.5, false),
            BidRecord::new("d", 8.0, false),
        ];
        let orders: [[usize; 4]; 5] = [[0, 1, 2, 3], [3, 2, 1, 0], [1, 0, 3, 2], [2, 3, 0, 1], [0, 3, 1, 2]];
        let (expected_winner, expected_reasons) = resolve(&bids, false);
        assert_eq!(expected_winner, "b");
        for order in orders {
            let shuffled: Vec<BidRecord> = order.iter().map(|i| bids[*i].clone()).collect();
            let (winner, reasons) = resolve(&shuffled, false);
            assert_eq!(winner, expected_winner, "order {:?}", order);
            assert_eq!(reasons, expected_reasons, "order {:?}", order);
        }
    }

    #[test]
    fn test_no_incumbent_state() {
        let mut logger = Logger::new();
        let mut winning_bids = WinningBids::new();
        assert_eq!(winning_bids.state("imp1"), IncumbentState::NO_INCUMBENT);
        winning_bids.offer("imp1", BidRecord::new("x", 1.0, false), false, &mut logger);
        assert!(matches!(winning_bids.state("imp1"), IncumbentState::HAS_INCUMBENT(ref bid) if bid.id == "x"));
        assert!(winning_bids.is_winning_bid("imp1", "x"));
        assert!(!winning_bids.is_winning_bid("imp1", "y"));
        assert!(!winning_bids.is_winning_bid("imp2", "x"));
    }

    #[test]
    fn test_post_pass_stamps_every_non_deal_loser() {
        // A=10, B=5 without deals, then deal C: pairwise stamping leaves B as lost-to-higher
        let bids = [("A", 10.0, false), ("B", 5.0, false), ("C", 1.0, true), ("D", 0.5, true)];
        let mut logger = Logger::new();
        let mut winning_bids = WinningBids::new();
        let mut imp_ctx = ImpressionBidContext::new();
        for (id, net, deal) in bids {
            let mut bid_ctx = BidContext { net_ecpm: net, deal_tier_satisfied: deal, ..Default::default() };
            match winning_bids.offer("imp1", BidRecord::new(id, net, deal), true, &mut logger) {
                Transition::CANDIDATE_LOST { reason } => bid_ctx.ext.nbr = Some(reason),
                Transition::CANDIDATE_WON { displaced_bid_id, reason } => {
                    if let Some(displaced) = imp_ctx.bid_ctx.get_mut(&displaced_bid_id) {
                        displaced.ext.nbr = Some(reason);
                    }
                }
                Transition::FIRST_BID => {}
            }
            imp_ctx.bid_ctx.insert(id.to_string(), bid_ctx);
        }
        assert_eq!(imp_ctx.bid_ctx["B"].ext.nbr, Some(NonBidReason::LOST_TO_HIGHER_BID));

        let mut imp_bid_ctx = BTreeMap::from([("imp1".to_string(), imp_ctx)]);
        assign_lost_to_deal_bid(&mut imp_bid_ctx, &winning_bids);

        let imp_ctx = &imp_bid_ctx["imp1"];
        assert!(winning_bids.is_winning_bid("imp1", "C"));
        assert_eq!(imp_ctx.bid_ctx["A"].ext.nbr, Some(NonBidReason::LOST_TO_DEAL_BID));
        assert_eq!(imp_ctx.bid_ctx["B"].ext.nbr, Some(NonBidReason::LOST_TO_DEAL_BID));
        assert_eq!(imp_ctx.bid_ctx["C"].ext.nbr, None);
        assert_eq!(imp_ctx.bid_ctx["D"].ext.nbr, Some(NonBidReason::LOST_TO_HIGHER_BID));
    }

    fn offer_all(imp_id: &str, bids: &[(&str, f64, bool)], winning_bids: &mut WinningBids) -> ImpressionBidContext {
        let mut logger = Logger::new();
        let mut imp_ctx = ImpressionBidContext::new();
        for (id, net, deal) in bids {
            let mut bid_ctx = BidContext { net_ecpm: *net, deal_tier_satisfied: *deal, ..Default::default() };
            match winning_bids.offer(imp_id, BidRecord::new(id, *net, *deal), true, &mut logger) {
                Transition::CANDIDATE_LOST { reason } => bid_ctx.ext.nbr = Some(reason),
                Transition::CANDIDATE_WON { displaced_bid_id, reason } => {
                    if let Some(displaced) = imp_ctx.bid_ctx.get_mut(&displaced_bid_id) {
                        displaced.ext.nbr = Some(reason);
                    }
                }
                Transition::FIRST_BID => {}
            }
            imp_ctx.bid_ctx.insert(id.to_string(), bid_ctx);
        }
        imp_ctx
    }

    #[test]
    fn test_post_pass_only_touches_impressions_won_by_deals() {
        let mut winning_bids = WinningBids::new();
        let imp1 = offer_all("imp1", &[("deal1", 1.0, true), ("y1", 5.0, false)], &mut winning_bids);
        let imp2 = offer_all("imp2", &[("x2", 10.0, false), ("y2", 3.0, false)], &mut winning_bids);
        let mut imp_bid_ctx = BTreeMap::from([("imp1".to_string(), imp1), ("imp2".to_string(), imp2)]);

        assign_lost_to_deal_bid(&mut imp_bid_ctx, &winning_bids);

        assert_eq!(imp_bid_ctx["imp1"].bid_ctx["y1"].ext.nbr, Some(NonBidReason::LOST_TO_DEAL_BID));
        assert!(winning_bids.is_winning_bid("imp2", "x2"));
        assert_eq!(imp_bid_ctx["imp2"].bid_ctx["x2"].ext.nbr, None);
        assert_eq!(imp_bid_ctx["imp2"].bid_ctx["y2"].ext.nbr, Some(NonBidReason::LOST_TO_HIGHER_BID));
    }
}
