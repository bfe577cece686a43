//! Shared types for the header-bidding pipeline: catalog records, located
//! page instances, auction-ready bid units, page signals, match results,
//! and the wire shapes exchanged with the remote config and match services.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// A banner size in pixels. Serialized as a `[w, h]` pair on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(u32, u32)", into = "(u32, u32)")]
pub struct AdSize {
    pub w: u32,
    pub h: u32,
}

impl AdSize {
    pub const fn new(w: u32, h: u32) -> Self {
        Self { w, h }
    }

    /// Fallback size attached when a placement's sizes are absent or unparseable.
    pub const fn medium_rectangle() -> Self {
        Self { w: 300, h: 250 }
    }
}

impl From<(u32, u32)> for AdSize {
    fn from((w, h): (u32, u32)) -> Self {
        Self { w, h }
    }
}

impl From<AdSize> for (u32, u32) {
    fn from(size: AdSize) -> Self {
        (size.w, size.h)
    }
}

/// A configured ad slot definition, independent of any single page.
/// Edited by the admin surface; read-only to this pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    pub placement_id: String,
    #[serde(default)]
    pub ad_unit_code: String,
    /// Raw sizes as configured: `[[300,250]]`, `["300x250"]`, or absent.
    /// Tolerant parsing happens at bid-unit build time.
    #[serde(default)]
    pub sizes: serde_json::Value,
    #[serde(default)]
    pub base_floor: f64,
    /// 0 means uncapped.
    #[serde(default)]
    pub floor_cap: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub css_selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_tags: Option<String>,
    #[serde(default = "default_true")]
    pub enable_semantic: bool,
    #[serde(default = "default_true")]
    pub active: bool,
}

impl Placement {
    /// Auction code for this placement: the configured ad-unit code,
    /// falling back to the placement id.
    pub fn unit_code(&self) -> &str {
        if self.ad_unit_code.is_empty() {
            &self.placement_id
        } else {
            &self.ad_unit_code
        }
    }
}

/// An enabled demand source and its engine-specific parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidderConfig {
    pub bidder: String,
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

/// Opaque handle back to the page element a placement was located in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotAnchor {
    /// Position of the slot element in document order.
    pub dom_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_id: Option<String>,
}

/// A placement as it actually appears on the current page.
#[derive(Debug, Clone)]
pub struct PageInstance {
    pub placement: Placement,
    pub anchor: SlotAnchor,
    /// Per-element floor override; 0 means "no override".
    pub override_floor: f64,
}

/// Auction-ready representation of a page instance.
///
/// `floor: None` means no floor is submitted and the engine applies its own
/// default — distinct from `Some(0.0)`, an explicit zero floor.
#[derive(Debug, Clone, Serialize)]
pub struct BidUnit {
    pub code: String,
    pub sizes: Vec<AdSize>,
    pub bids: Vec<BidderConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub floor: Option<f64>,
}

/// Device class derived from viewport width.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    Mobile,
    Tablet,
    Desktop,
}

impl DeviceClass {
    pub fn from_viewport_width(width: u32) -> Self {
        if width < 768 {
            Self::Mobile
        } else if width < 1024 {
            Self::Tablet
        } else {
            Self::Desktop
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Heading {
    pub level: u8,
    pub text: String,
}

/// Immutable snapshot of page content and engagement signals, extracted once
/// per page load. Field names follow the match-service wire contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextSignals {
    pub title: String,
    pub description: String,
    pub url: String,
    pub referrer: String,
    pub headings: Vec<Heading>,
    pub body_text: String,
    pub keywords: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub page_type: String,
    pub language: String,
    pub device: DeviceClass,
    pub time_on_page: u64,
    pub scroll_depth: u8,
    pub pointer_detected: bool,
    pub viewport: Viewport,
    pub extracted_at: DateTime<Utc>,
}

/// One candidate creative returned by the match service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchedCreative {
    /// Semantic alignment confidence in `[0, 1]`.
    #[serde(default)]
    pub context_alignment_score: f64,
    #[serde(default)]
    pub suggested_bid_floor: f64,
}

/// Match-service response for a single placement. Transient: consumed
/// immediately to update the placement's floor, never persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchResult {
    #[serde(default)]
    pub placement_id: String,
    #[serde(default)]
    pub matched_creatives: Vec<MatchedCreative>,
}

/// Supply chain declaration (schain) attached to bid requests when configured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplyChain {
    #[serde(default = "default_schain_ver")]
    pub ver: String,
    #[serde(default)]
    pub complete: u8,
    #[serde(default)]
    pub nodes: Vec<SupplyChainNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplyChainNode {
    pub asi: String,
    pub sid: String,
    #[serde(default = "default_hp")]
    pub hp: u8,
}

/// Remote configuration payload: the placement catalog plus global auction
/// and match-service settings. Fetched once per page load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default)]
    pub placements: Vec<Placement>,
    #[serde(default)]
    pub prebid: PrebidSettings,
    #[serde(default)]
    pub pubcontext: PubcontextSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrebidSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Bidder timeout in milliseconds.
    #[serde(default = "default_bidder_timeout_ms")]
    pub timeout: u64,
    #[serde(default = "default_true", rename = "priceFloors")]
    pub price_floors: bool,
    /// Enabled demand sources: bidder id to engine-specific params.
    #[serde(default)]
    pub bidders: BTreeMap<String, serde_json::Value>,
}

impl Default for PrebidSettings {
    fn default() -> Self {
        Self {
            version: None,
            timeout: default_bidder_timeout_ms(),
            price_floors: true,
            bidders: BTreeMap::new(),
        }
    }
}

impl PrebidSettings {
    /// Materialize the enabled bidder set in catalog order.
    pub fn bidder_configs(&self) -> Vec<BidderConfig> {
        self.bidders
            .iter()
            .map(|(bidder, params)| BidderConfig {
                bidder: bidder.clone(),
                params: params.as_object().cloned().unwrap_or_default(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PubcontextSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_match_endpoint")]
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "apiKey")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "supplyChain")]
    pub supply_chain: Option<SupplyChain>,
}

impl Default for PubcontextSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_match_endpoint(),
            api_key: None,
            supply_chain: None,
        }
    }
}

/// A candidate bid handed back by the auction engine for one unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineBid {
    #[serde(default)]
    pub cpm: f64,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    /// Creative markup, written verbatim into the rendering surface.
    #[serde(default)]
    pub ad: String,
    #[serde(default)]
    pub bidder: String,
}

/// Per-unit-code map of candidate bids, as delivered by the engine callback.
pub type BidsBack = HashMap<String, Vec<EngineBid>>;

/// Terminal state of a single unit after the auction settles.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UnitOutcome {
    Rendered { bid: EngineBid },
    NoBid,
}

/// Resolution record for one placement instance in a finished cycle.
#[derive(Debug, Clone, Serialize)]
pub struct UnitResolution {
    pub code: String,
    pub placement_id: String,
    #[serde(flatten)]
    pub outcome: UnitOutcome,
}

/// Delivery lifecycle event emitted through the event sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryEvent {
    pub event_id: Uuid,
    pub event_type: EventType,
    pub placement_id: String,
    pub winning_bid: Option<f64>,
    pub winning_bidder: Option<String>,
    pub detail: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Impression,
    NoFill,
    MatchFailed,
    MatchDeadline,
    InitFailed,
}

fn default_true() -> bool {
    true
}

fn default_schain_ver() -> String {
    "1.0".to_string()
}

fn default_hp() -> u8 {
    1
}

fn default_bidder_timeout_ms() -> u64 {
    crate::config::DEFAULT_BIDDER_TIMEOUT_MS
}

fn default_match_endpoint() -> String {
    crate::config::DEFAULT_MATCH_ENDPOINT.to_string()
}
