//! Per-request partner configuration table
//!
//! Maps a partner id to its option-name -> option-value pairs. Values are always strings;
//! numeric and boolean parsing happens in the consuming component and never fails
//! (see `utils::parse_int_or_zero`). The reserved id `VERSION_LEVEL_CONFIG_ID` holds
//! version/request-level settings.

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use crate::utils::parse_int_or_zero;

/// Partner id reserved for version-level settings
pub const VERSION_LEVEL_CONFIG_ID: i32 = -1;

/// Suffix marking an option as the test-bucket override of its live counterpart
pub const TEST_SUFFIX: &str = "_test";

pub const AB_TEST_ENABLED: &str = "abTestEnabled";
pub const TEST_GROUP_SIZE: &str = "testGroupSize";
pub const TEST_TYPE: &str = "testType";
pub const PARTNER_TEST_ENABLED: &str = "testEnabled";
pub const SS_TIMEOUT: &str = "ssTimeout";
pub const SERVER_SIDE_FLAG: &str = "serverSideEnabled";
pub const BIDDER_CODE: &str = "bidderCode";
pub const THROTTLE: &str = "throttle";
pub const REFRESH_INTERVAL: &str = "refreshInterval";
pub const REVSHARE: &str = "rev_share";

pub const TEST_TYPE_AUCTION_TIMEOUT: &str = "Auction Timeout";
pub const TEST_TYPE_PARTNERS: &str = "Partners";
pub const TEST_TYPE_CLIENT_VS_SERVER_PATH: &str = "Client-side vs. Server-side Path";

/// Options of a single partner
pub type PartnerOptions = BTreeMap<String, String>;

/// Append the test suffix to an option name
pub fn append_test_suffix(key: &str) -> String {
    format!("{}{}", key, TEST_SUFFIX)
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartnerConfig {
    partners: BTreeMap<i32, PartnerOptions>,
}

impl PartnerConfig {
    pub fn new() -> Self {
        Self { partners: BTreeMap::new() }
    }

    /// Build a config from (partner id, [(option, value)]) pairs
    pub fn from_entries(entries: Vec<(i32, Vec<(&str, &str)>)>) -> Self {
        let mut config = Self::new();
        for (partner_id, options) in entries {
            for (key, value) in options {
                config.set(partner_id, key, value);
            }
        }
        config
    }

    /// Full two-level copy; mutating the copy never touches the original
    pub fn clone_all(&self) -> Self {
        self.clone()
    }

    pub fn get(&self, partner_id: i32, key: &str) -> Option<&str> {
        self.partners.get(&partner_id).and_then(|options| options.get(key)).map(|v| v.as_str())
    }

    /// Option value or empty string when absent
    pub fn get_or_empty(&self, partner_id: i32, key: &str) -> &str {
        self.get(partner_id, key).unwrap_or("")
    }

    /// Option value parsed as an integer, zero when absent or malformed
    pub fn get_int_or_zero(&self, partner_id: i32, key: &str) -> i64 {
        parse_int_or_zero(self.get_or_empty(partner_id, key))
    }

    pub fn set(&mut self, partner_id: i32, key: &str, value: &str) {
        self.partners
            .entry(partner_id)
            .or_default()
            .insert(key.to_string(), value.to_string());
    }

    pub fn partner(&self, partner_id: i32) -> Option<&PartnerOptions> {
        self.partners.get(&partner_id)
    }

    pub fn partner_mut(&mut self, partner_id: i32) -> Option<&mut PartnerOptions> {
        self.partners.get_mut(&partner_id)
    }

    /// Version-level option value or empty string
    pub fn version_level(&self, key: &str) -> &str {
        self.get_or_empty(VERSION_LEVEL_CONFIG_ID, key)
    }

    /// Iterate all partner entries, the version-level entry included
    pub fn iter(&self) -> impl Iterator<Item = (&i32, &PartnerOptions)> {
        self.partners.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&i32, &mut PartnerOptions)> {
        self.partners.iter_mut()
    }

    /// Iterate partner entries excluding the version-level entry
    pub fn partners(&self) -> impl Iterator<Item = (&i32, &PartnerOptions)> {
        self.partners.iter().filter(|(id, _)| **id != VERSION_LEVEL_CONFIG_ID)
    }

    pub fn len(&self) -> usize {
        self.partners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partners.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> PartnerConfig {
        PartnerConfig::from_entries(vec![
            (VERSION_LEVEL_CONFIG_ID, vec![(AB_TEST_ENABLED, "1"), (SS_TIMEOUT, "250")]),
            (1, vec![(BIDDER_CODE, "pubmatic"), (THROTTLE, "100")]),
        ])
    }

    #[test]
    fn test_append_test_suffix() {
        assert_eq!(append_test_suffix(SS_TIMEOUT), "ssTimeout_test");
        assert_eq!(append_test_suffix(""), "_test");
    }

    #[test]
    fn test_clone_all_is_independent() {
        let original = sample_config();
        let before = original.clone_all();

        let mut copy = original.clone_all();
        copy.set(VERSION_LEVEL_CONFIG_ID, SS_TIMEOUT, "999");
        copy.set(1, THROTTLE, "0");
        copy.set(7, BIDDER_CODE, "appnexus");
        if let Some(options) = copy.partner_mut(1) {
            options.remove(BIDDER_CODE);
        }

        assert_eq!(original, before);
        assert_eq!(original.version_level(SS_TIMEOUT), "250");
        assert_eq!(original.get(1, BIDDER_CODE), Some("pubmatic"));
    }

    #[test]
    fn test_get_int_or_zero() {
        let mut config = sample_config();
        config.set(1, REFRESH_INTERVAL, "thirty");
        assert_eq!(config.get_int_or_zero(VERSION_LEVEL_CONFIG_ID, SS_TIMEOUT), 250);
        assert_eq!(config.get_int_or_zero(1, REFRESH_INTERVAL), 0);
        assert_eq!(config.get_int_or_zero(9, SS_TIMEOUT), 0);
    }

    #[test]
    fn test_partners_skips_version_level() {
        let config = sample_config();
        let ids: Vec<i32> = config.partners().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn test_deserialize_from_json() {
        let config: PartnerConfig = serde_json::from_str(r#"{"-1":{"ssTimeout":"300"},"5":{"bidderCode":"appnexus"}}"#).unwrap();
        assert_eq!(config.version_level(SS_TIMEOUT), "300");
        assert_eq!(config.get(5, BIDDER_CODE), Some("appnexus"));
    }
}
