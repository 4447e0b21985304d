use std::collections::BTreeSet;
use crate::logger::{LogEvent, Logger};
use crate::logln;
use crate::partner_config::{PartnerConfig, PartnerOptions, BIDDER_CODE, SERVER_SIDE_FLAG, THROTTLE};
use crate::random::RandomSourceTrait;
use crate::utils::parse_int_or_zero;

/// Partners (by bidder code) sitting out this auction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThrottleSet {
    pub excluded: BTreeSet<String>,
    /// Every eligible partner was excluded (and there was at least one)
    pub all_excluded: bool,
}

impl ThrottleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, bidder: &str) -> bool {
        self.excluded.contains(bidder)
    }

    pub fn len(&self) -> usize {
        self.excluded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.excluded.is_empty()
    }
}

/// Decides which server-side partners are probabilistically excluded from the auction
pub struct ThrottleDecider {
    random_source: Box<dyn RandomSourceTrait>,
}

impl ThrottleDecider {
    pub fn new(random_source: Box<dyn RandomSourceTrait>) -> Self {
        Self { random_source }
    }

    /// Build the exclusion set for this auction
    ///
    /// Only partners flagged server-side with a non-empty bidder code are eligible.
    /// Partners already present in `prior` stay excluded without a new draw, so repeated
    /// calls with an accumulating set are idempotent.
    pub fn decide(&mut self, configs: &PartnerConfig, prior: &ThrottleSet, logger: &mut Logger) -> ThrottleSet {
        let mut excluded = BTreeSet::new();
        let mut valid_partners = 0usize;

        for (_, options) in configs.partners() {
            if options.get(SERVER_SIDE_FLAG).map(|v| v.as_str()) != Some("1") {
                continue;
            }
            let bidder_code = match options.get(BIDDER_CODE) {
                Some(code) if !code.is_empty() => code,
                _ => continue,
            };
            valid_partners += 1;

            if prior.contains(bidder_code) {
                excluded.insert(bidder_code.clone());
                continue;
            }

            if self.should_throttle(options, logger) {
                logln!(logger, LogEvent::Auction, "partner '{}' throttled", bidder_code);
                excluded.insert(bidder_code.clone());
            }
        }

        let all_excluded = valid_partners != 0 && excluded.len() == valid_partners;
        ThrottleSet { excluded, all_excluded }
    }

    /// Decide for a single partner
    ///
    /// "" and "100" never throttle, "0" (or anything unparseable) always throttles; otherwise
    /// a draw r in [0, 99] throttles unless r >= 100 - percent, i.e. the partner participates
    /// with probability percent/100.
    pub fn should_throttle(&mut self, options: &PartnerOptions, logger: &mut Logger) -> bool {
        let value = options.get(THROTTLE).map(|v| v.as_str()).unwrap_or("");
        if value.is_empty() || value == "100" {
            return false;
        }

        let throttle_percent = parse_int_or_zero(value);
        if throttle_percent <= 0 {
            return true;
        }

        let random_value = self.random_source.next_in_range(0, 99);
        logln!(logger, LogEvent::Auction, "throttle draw {} against {}%", random_value, throttle_percent);
        random_value < 100 - throttle_percent
    }
}
