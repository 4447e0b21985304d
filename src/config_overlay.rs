//! A/B test overlay for the per-request partner configuration.
//!
//! A request lands in the test bucket when a draw in [1, 100] is at most the configured
//! group size. The overlay then works on a private copy of the configuration and replaces
//! live option values with their `_test` counterparts, depending on the test type.

use crate::logger::{LogEvent, Logger};
use crate::logln;
use crate::partner_config::{
    append_test_suffix, PartnerConfig, PartnerOptions, AB_TEST_ENABLED, PARTNER_TEST_ENABLED,
    SERVER_SIDE_FLAG, SS_TIMEOUT, TEST_GROUP_SIZE, TEST_SUFFIX, TEST_TYPE, TEST_TYPE_AUCTION_TIMEOUT,
    TEST_TYPE_CLIENT_VS_SERVER_PATH, TEST_TYPE_PARTNERS, VERSION_LEVEL_CONFIG_ID,
};
use crate::random::RandomSourceTrait;

/// Kind of A/B test configured at version level
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestType {
    AUCTION_TIMEOUT,
    PARTNERS,
    CLIENT_VS_SERVER_PATH,
}

impl TestType {
    /// Parse the configured test type name, None for unknown or empty names
    pub fn parse(value: &str) -> Option<TestType> {
        match value {
            TEST_TYPE_AUCTION_TIMEOUT => Some(TestType::AUCTION_TIMEOUT),
            TEST_TYPE_PARTNERS => Some(TestType::PARTNERS),
            TEST_TYPE_CLIENT_VS_SERVER_PATH => Some(TestType::CLIENT_VS_SERVER_PATH),
            _ => None,
        }
    }
}

/// True only when the version-level A/B flag is the literal "1"
pub fn is_testing_enabled(config: &PartnerConfig) -> bool {
    config.version_level(AB_TEST_ENABLED) == "1"
}

/// Copy every non-empty `<key>_test` value of a partner onto `<key>`
fn copy_all_test_values(options: &mut PartnerOptions) {
    let overrides: Vec<(String, String)> = options
        .iter()
        .filter_map(|(key, value)| {
            let live_key = key.strip_suffix(TEST_SUFFIX)?;
            if live_key.is_empty() || value.is_empty() {
                return None;
            }
            Some((live_key.to_string(), value.clone()))
        })
        .collect();
    for (key, value) in overrides {
        options.insert(key, value);
    }
}

/// Copy the non-empty `<key>_test` value onto `<key>` for the given keys only
fn copy_test_values(options: &mut PartnerOptions, keys: &[&str]) {
    for key in keys {
        let test_value = options.get(&append_test_suffix(key)).cloned().unwrap_or_default();
        if !test_value.is_empty() {
            options.insert(key.to_string(), test_value);
        }
    }
}

/// Rewrites live settings with test settings for the sampled share of traffic
pub struct ConfigOverlay {
    random_source: Box<dyn RandomSourceTrait>,
}

impl ConfigOverlay {
    pub fn new(random_source: Box<dyn RandomSourceTrait>) -> Self {
        Self { random_source }
    }

    /// Decide whether this request belongs to the test bucket and, if so, return the merged copy
    ///
    /// # Returns
    /// `(Some(merged), true)` when the overlay applies, `(None, false)` otherwise.
    /// The input configuration is never modified.
    pub fn sample(&mut self, config: &PartnerConfig, logger: &mut Logger) -> (Option<PartnerConfig>, bool) {
        if !is_testing_enabled(config) {
            return (None, false);
        }

        if !self.apply_test_config(config, logger) {
            return (None, false);
        }

        let merged = Self::merge(config.clone_all());
        logln!(logger, LogEvent::Request, "A/B test config applied (type: '{}')", config.version_level(&append_test_suffix(TEST_TYPE)));
        (Some(merged), true)
    }

    /// Draw against the configured group size; a group size of zero (or malformed) never applies
    fn apply_test_config(&mut self, config: &PartnerConfig, logger: &mut Logger) -> bool {
        let group_size = config.get_int_or_zero(VERSION_LEVEL_CONFIG_ID, &append_test_suffix(TEST_GROUP_SIZE));
        if group_size <= 0 {
            return false;
        }
        let random_value = self.random_source.next_in_range(1, 100);
        logln!(logger, LogEvent::Auction, "A/B draw {} against group size {}", random_value, group_size);
        random_value <= group_size
    }

    /// Apply the test values selected by the configured test type to the given (private) copy
    pub fn merge(mut config: PartnerConfig) -> PartnerConfig {
        let test_type = TestType::parse(config.version_level(&append_test_suffix(TEST_TYPE)));

        match test_type {
            Some(TestType::AUCTION_TIMEOUT) => {
                if let Some(options) = config.partner_mut(VERSION_LEVEL_CONFIG_ID) {
                    copy_test_values(options, &[SS_TIMEOUT]);
                }
            }
            Some(TestType::PARTNERS) => {
                for (partner_id, options) in config.iter_mut() {
                    if *partner_id == VERSION_LEVEL_CONFIG_ID {
                        copy_test_values(options, &[TEST_TYPE, SS_TIMEOUT]);
                        continue;
                    }
                    if options.get(PARTNER_TEST_ENABLED).map(|v| v.as_str()) == Some("1") {
                        copy_all_test_values(options);
                    }
                }
            }
            Some(TestType::CLIENT_VS_SERVER_PATH) => {
                for (partner_id, options) in config.iter_mut() {
                    if *partner_id == VERSION_LEVEL_CONFIG_ID {
                        continue;
                    }
                    if options.get(PARTNER_TEST_ENABLED).map(|v| v.as_str()) == Some("1") {
                        copy_all_test_values(options);
                    }
                    // both arms must diverge on every partner, flagged or not
                    copy_test_values(options, &[SERVER_SIDE_FLAG]);
                }
            }
            None => {}
        }

        config
    }
}
