//! Integration tests for the full auction cycle: remote config through
//! locate, build, match, floor resolution, bidding, and rendering.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use adagent_auction::{
    AuctionCoordinator, AuctionEngine, CyclePhase, EngineConfig, InlineFrameSurface,
};
use adagent_context::{ContextExtractor, EngagementTracker, PageView};
use adagent_core::config::MatchingConfig;
use adagent_core::event_bus::capture_sink;
use adagent_core::types::{
    BidsBack, BidUnit, EngineBid, EventType, MatchedCreative, MatchResult, Placement,
    PubcontextSettings, RemoteConfig, UnitOutcome, Viewport,
};
use adagent_core::{AdAgentError, AdAgentResult};
use adagent_matching::{ConfigSource, MatchRequest, MatchTransport, StaticConfigSource};

// ─── Test doubles ───────────────────────────────────────────────────────────

/// Engine double: records configuration and registered units, answers with a
/// scripted per-code bid map.
#[derive(Default)]
struct MockEngine {
    scripted: Mutex<BidsBack>,
    configure_calls: AtomicUsize,
    request_calls: AtomicUsize,
    registered: Mutex<Vec<BidUnit>>,
    hold: Option<Arc<Notify>>,
}

impl MockEngine {
    fn with_bids(bids: Vec<(&str, Vec<EngineBid>)>) -> Arc<Self> {
        Arc::new(Self {
            scripted: Mutex::new(
                bids.into_iter().map(|(c, b)| (c.to_string(), b)).collect(),
            ),
            ..Self::default()
        })
    }

    fn holding(notify: Arc<Notify>) -> Arc<Self> {
        Arc::new(Self {
            hold: Some(notify),
            ..Self::default()
        })
    }

    fn registered_units(&self) -> Vec<BidUnit> {
        self.registered.lock().unwrap().clone()
    }

    fn engine_calls(&self) -> usize {
        self.configure_calls.load(Ordering::SeqCst) + self.request_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuctionEngine for MockEngine {
    async fn configure(&self, _config: &EngineConfig) -> AdAgentResult<()> {
        self.configure_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn register_units(&self, units: &[BidUnit]) -> AdAgentResult<()> {
        self.registered.lock().unwrap().extend_from_slice(units);
        Ok(())
    }

    async fn request_bids(&self, _timeout: Duration) -> AdAgentResult<BidsBack> {
        self.request_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(notify) = &self.hold {
            notify.notified().await;
        }
        Ok(self.scripted.lock().unwrap().clone())
    }
}

/// Transport double: per-placement scripted outcome, counting calls.
#[derive(Default)]
struct ScriptedTransport {
    responses: HashMap<String, MatchResult>,
    failing: Vec<String>,
    calls: AtomicUsize,
}

impl ScriptedTransport {
    fn new() -> Self {
        Self::default()
    }

    fn responding(mut self, placement_id: &str, score: f64, floor: f64) -> Self {
        self.responses.insert(
            placement_id.to_string(),
            MatchResult {
                placement_id: placement_id.to_string(),
                matched_creatives: vec![MatchedCreative {
                    context_alignment_score: score,
                    suggested_bid_floor: floor,
                }],
            },
        );
        self
    }

    fn failing(mut self, placement_id: &str) -> Self {
        self.failing.push(placement_id.to_string());
        self
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MatchTransport for ScriptedTransport {
    async fn match_placement(
        &self,
        _settings: &PubcontextSettings,
        request: &MatchRequest,
    ) -> AdAgentResult<MatchResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&request.placement_id) {
            return Err(AdAgentError::Match("scripted failure".into()));
        }
        self.responses
            .get(&request.placement_id)
            .cloned()
            .ok_or_else(|| AdAgentError::Match("no scripted response".into()))
    }
}

// ─── Fixtures ───────────────────────────────────────────────────────────────

fn make_placement(placement_id: &str, base_floor: f64, floor_cap: f64) -> Placement {
    Placement {
        placement_id: placement_id.into(),
        ad_unit_code: String::new(),
        sizes: serde_json::json!(["300x250"]),
        base_floor,
        floor_cap,
        css_selector: None,
        context_tags: None,
        enable_semantic: true,
        active: true,
    }
}

fn make_config(placements: Vec<Placement>, matching_enabled: bool) -> RemoteConfig {
    let mut config = RemoteConfig {
        placements,
        ..RemoteConfig::default()
    };
    config
        .prebid
        .bidders
        .insert("appnexus".into(), serde_json::json!({ "placementId": "123" }));
    config.pubcontext = PubcontextSettings {
        enabled: matching_enabled,
        ..PubcontextSettings::default()
    };
    config
}

fn make_extractor() -> ContextExtractor {
    ContextExtractor::new(Arc::new(EngagementTracker::new(Viewport {
        width: 1440,
        height: 900,
    })))
}

fn make_page(html: &str) -> PageView {
    PageView::new(html, "https://example.com/post", "")
}

fn make_bid(cpm: f64, bidder: &str) -> EngineBid {
    EngineBid {
        cpm,
        width: 300,
        height: 250,
        ad: format!("<div data-bidder=\"{bidder}\"></div>"),
        bidder: bidder.into(),
    }
}

const TWO_SLOT_PAGE: &str = r#"<html><body>
    <article>Ad-supported editorial content.</article>
    <div class="adagent-placement" data-placement-id="header"></div>
    <div class="adagent-placement" data-placement-id="sidebar"></div>
    <div class="adagent-placement" data-placement-id="unknown-slot"></div>
</body></html>"#;

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_zero_located_instances_makes_no_engine_calls() {
        let engine = MockEngine::with_bids(vec![]);
        let source = StaticConfigSource::new(make_config(
            vec![make_placement("header", 0.5, 0.0)],
            false,
        ));
        let coordinator = AuctionCoordinator::new(Arc::new(source), engine.clone());

        let summary = coordinator
            .run(&make_page("<html><body><p>No slots here.</p></body></html>"))
            .await
            .unwrap();

        assert_eq!(summary.phase, CyclePhase::ConfigLoaded);
        assert_eq!(summary.located, 0);
        assert_eq!(engine.engine_calls(), 0);
    }

    #[tokio::test]
    async fn test_config_fetch_failure_is_a_single_clean_error() {
        struct FailingSource;

        #[async_trait]
        impl ConfigSource for FailingSource {
            async fn fetch(&self) -> AdAgentResult<RemoteConfig> {
                Err(AdAgentError::ConfigFetch("backend unreachable".into()))
            }
        }

        let engine = MockEngine::with_bids(vec![]);
        let coordinator = AuctionCoordinator::new(Arc::new(FailingSource), engine.clone());

        let result = coordinator.run(&make_page(TWO_SLOT_PAGE)).await;
        assert!(matches!(result, Err(AdAgentError::ConfigFetch(_))));
        assert_eq!(engine.engine_calls(), 0);

        // The failed cycle released the in-flight guard; a retry is accepted.
        assert!(matches!(
            coordinator.run(&make_page(TWO_SLOT_PAGE)).await,
            Err(AdAgentError::ConfigFetch(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_catalog_short_circuits() {
        let engine = MockEngine::with_bids(vec![]);
        let source = StaticConfigSource::new(RemoteConfig::default());
        let coordinator = AuctionCoordinator::new(Arc::new(source), engine.clone());

        let summary = coordinator.run(&make_page(TWO_SLOT_PAGE)).await.unwrap();

        assert_eq!(summary.phase, CyclePhase::ConfigLoaded);
        assert_eq!(engine.engine_calls(), 0);
    }

    #[tokio::test]
    async fn test_full_cycle_floors_winners_and_reports() {
        let engine = MockEngine::with_bids(vec![
            (
                "header",
                vec![make_bid(1.2, "appnexus"), make_bid(3.5, "rubicon"), make_bid(3.5, "openx")],
            ),
            ("sidebar", vec![]),
        ]);
        let transport = Arc::new(
            ScriptedTransport::new()
                .responding("header", 0.9, 5.0)
                .failing("sidebar"),
        );
        let surface = Arc::new(InlineFrameSurface::new());
        let events = capture_sink();

        let source = StaticConfigSource::new(make_config(
            vec![
                make_placement("header", 0.5, 10.0),
                make_placement("sidebar", 1.0, 0.0),
            ],
            true,
        ));
        let coordinator = AuctionCoordinator::new(Arc::new(source), engine.clone())
            .with_matching(transport.clone(), make_extractor(), MatchingConfig::default())
            .with_surface(surface.clone())
            .with_event_sink(events.clone());

        let summary = coordinator.run(&make_page(TWO_SLOT_PAGE)).await.unwrap();

        assert_eq!(summary.phase, CyclePhase::Resolved);
        // The unknown slot is skipped at locate time.
        assert_eq!(summary.located, 2);
        assert_eq!(transport.call_count(), 2);

        // Matched floor raised header; failed match left sidebar at base.
        let units = engine.registered_units();
        assert_eq!(units[0].floor, Some(5.0));
        assert_eq!(units[1].floor, Some(1.0));
        assert_eq!(units[0].bids.len(), 1);

        // Winner: highest CPM, tie broken to first encountered.
        assert_eq!(summary.rendered_count(), 1);
        assert_eq!(summary.no_bid_count(), 1);
        match &summary.resolutions[0].outcome {
            UnitOutcome::Rendered { bid } => {
                assert_eq!(bid.cpm, 3.5);
                assert_eq!(bid.bidder, "rubicon");
            }
            UnitOutcome::NoBid => panic!("header should have rendered"),
        }

        // Exactly one impression for the rendered unit, one no-fill mark.
        assert_eq!(events.count_type(EventType::Impression), 1);
        assert_eq!(events.count_type(EventType::NoFill), 1);
        let impression = &events.events()[0];
        assert_eq!(impression.placement_id, "header");
        assert_eq!(impression.winning_bid, Some(3.5));
        assert_eq!(impression.winning_bidder.as_deref(), Some("rubicon"));

        let frames = surface.frames();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].creative.contains("rubicon"));
        assert_eq!(surface.no_fills(), vec!["sidebar"]);
    }

    #[tokio::test]
    async fn test_floors_absent_when_disabled() {
        let engine = MockEngine::with_bids(vec![("header", vec![])]);
        let transport = Arc::new(ScriptedTransport::new().responding("header", 0.95, 7.0));

        let mut config = make_config(vec![make_placement("header", 0.5, 0.0)], true);
        config.prebid.price_floors = false;

        let coordinator =
            AuctionCoordinator::new(Arc::new(StaticConfigSource::new(config)), engine.clone())
                .with_matching(transport, make_extractor(), MatchingConfig::default());

        coordinator.run(&make_page(TWO_SLOT_PAGE)).await.unwrap();

        // Matching ran, but no floor is submitted when floors are disabled.
        assert_eq!(engine.registered_units()[0].floor, None);
    }

    #[tokio::test]
    async fn test_disabled_matching_makes_no_match_calls() {
        let engine = MockEngine::with_bids(vec![("header", vec![])]);
        let transport = Arc::new(ScriptedTransport::new().responding("header", 0.9, 9.0));

        let source = StaticConfigSource::new(make_config(
            vec![make_placement("header", 0.5, 0.0)],
            false,
        ));
        let coordinator = AuctionCoordinator::new(Arc::new(source), engine.clone())
            .with_matching(transport.clone(), make_extractor(), MatchingConfig::default());

        coordinator.run(&make_page(TWO_SLOT_PAGE)).await.unwrap();

        assert_eq!(transport.call_count(), 0);
        // Floor falls back to the configured base.
        assert_eq!(engine.registered_units()[0].floor, Some(0.5));
    }

    #[tokio::test]
    async fn test_override_floor_flows_from_slot_attribute() {
        let engine = MockEngine::with_bids(vec![]);
        let source = StaticConfigSource::new(make_config(
            vec![make_placement("header", 2.0, 0.0)],
            false,
        ));
        let coordinator = AuctionCoordinator::new(Arc::new(source), engine.clone());

        let page = make_page(
            r#"<html><body>
            <div class="adagent-placement" data-placement-id="header" data-override-floor="0.25"></div>
            </body></html>"#,
        );
        coordinator.run(&page).await.unwrap();

        // An explicit instance override wins over the catalog default, even
        // when it is lower.
        assert_eq!(engine.registered_units()[0].floor, Some(0.25));
    }

    #[tokio::test]
    async fn test_second_concurrent_cycle_is_rejected() {
        let release = Arc::new(Notify::new());
        let engine = MockEngine::holding(release.clone());
        let source = Arc::new(StaticConfigSource::new(make_config(
            vec![make_placement("header", 0.5, 0.0)],
            false,
        )));

        let coordinator = Arc::new(AuctionCoordinator::new(source, engine));
        let page = make_page(TWO_SLOT_PAGE);

        let first = {
            let coordinator = coordinator.clone();
            let page = page.clone();
            tokio::spawn(async move { coordinator.run(&page).await })
        };

        // Let the first cycle reach the held bid request.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let second = coordinator.run(&page).await;
        assert!(matches!(second, Err(AdAgentError::AuctionInFlight)));

        release.notify_one();
        assert!(first.await.unwrap().is_ok());
    }
}
