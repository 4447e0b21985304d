//! Auction outcome resolution for a real-time-bidding request pipeline.
//!
//! Given the already-parsed partner responses of one request, the engine picks one winner per
//! impression, stamps a non-bid reason on every losing or absent bid, synthesizes placeholder
//! bids for partners that never answered and reports throttled or unmapped partners as seat
//! non-bids. Before partners are called it applies the A/B configuration overlay and decides
//! which partners sit out the auction.

pub mod logger;
pub mod utils;
pub mod random;
pub mod ids;
pub mod partner_config;
pub mod config_overlay;
pub mod throttle;
pub mod reason_codes;
pub mod response;
pub mod bid_context;
pub mod winner;
pub mod default_bids;
pub mod seat_non_bids;
pub mod metrics;
pub mod auction;

pub use auction::AuctionEngine;
pub use bid_context::{Endpoint, RequestCtx};
pub use partner_config::PartnerConfig;
