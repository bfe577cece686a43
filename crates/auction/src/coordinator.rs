//! Auction coordination — drives one full bid cycle:
//! fetch config → locate placements → build units → semantic matching →
//! floor resolution → bid request → per-unit winner selection → render
//! and impression report.
//!
//! Nothing in the cycle is fatal to the page. Configuration absence
//! short-circuits cleanly, per-placement match failures degrade to the
//! configured floor, and a unit with no demand resolves to no-fill while
//! its siblings render.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use adagent_core::config::MatchingConfig;
use adagent_core::event_bus::{make_event, noop_sink, EventSink};
use adagent_core::types::{
    BidsBack, BidUnit, EngineBid, EventType, MatchResult, PageInstance, RemoteConfig,
    UnitOutcome, UnitResolution,
};
use adagent_core::{AdAgentError, AdAgentResult};
use adagent_context::{ContextExtractor, PageView};
use adagent_matching::{ConfigSource, MatchOrchestrator, MatchTransport};

use crate::builder::build_units;
use crate::engine::{AuctionEngine, EngineConfig};
use crate::floor::resolve_floor;
use crate::locator::locate;
use crate::render::{InlineFrameSurface, RenderSurface};

/// Progress of one auction cycle. Terminal resolution is per-unit, not
/// global: `Resolved` means every unit settled, each to its own outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    ConfigLoaded,
    UnitsBuilt,
    Matching,
    BidsRequested,
    Resolved,
}

/// What a finished (or short-circuited) cycle did.
#[derive(Debug, Clone)]
pub struct CycleSummary {
    pub phase: CyclePhase,
    pub located: usize,
    pub resolutions: Vec<UnitResolution>,
}

impl CycleSummary {
    fn short_circuit(phase: CyclePhase) -> Self {
        Self {
            phase,
            located: 0,
            resolutions: Vec::new(),
        }
    }

    pub fn rendered_count(&self) -> usize {
        self.resolutions
            .iter()
            .filter(|r| matches!(r.outcome, UnitOutcome::Rendered { .. }))
            .count()
    }

    pub fn no_bid_count(&self) -> usize {
        self.resolutions
            .iter()
            .filter(|r| matches!(r.outcome, UnitOutcome::NoBid))
            .count()
    }
}

pub struct AuctionCoordinator {
    config_source: Arc<dyn ConfigSource>,
    engine: Arc<dyn AuctionEngine>,
    transport: Option<Arc<dyn MatchTransport>>,
    extractor: Option<ContextExtractor>,
    surface: Arc<dyn RenderSurface>,
    events: Arc<dyn EventSink>,
    matching: MatchingConfig,
    in_flight: AtomicBool,
}

impl AuctionCoordinator {
    pub fn new(config_source: Arc<dyn ConfigSource>, engine: Arc<dyn AuctionEngine>) -> Self {
        Self {
            config_source,
            engine,
            transport: None,
            extractor: None,
            surface: Arc::new(InlineFrameSurface::new()),
            events: noop_sink(),
            matching: MatchingConfig::default(),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Attach the semantic-matching pipeline: the match transport, the signal
    /// extractor, and the deployment's matching settings.
    pub fn with_matching(
        mut self,
        transport: Arc<dyn MatchTransport>,
        extractor: ContextExtractor,
        matching: MatchingConfig,
    ) -> Self {
        self.transport = Some(transport);
        self.extractor = Some(extractor);
        self.matching = matching;
        self
    }

    pub fn with_surface(mut self, surface: Arc<dyn RenderSurface>) -> Self {
        self.surface = surface;
        self
    }

    /// Attach an event sink for impression reporting.
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = sink;
        self
    }

    /// Run one auction cycle against the page. Single-flight per coordinator:
    /// a second call while one is outstanding is rejected.
    pub async fn run(&self, page: &PageView) -> AdAgentResult<CycleSummary> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return Err(AdAgentError::AuctionInFlight);
        }

        let result = self.run_cycle(page).await;
        self.in_flight.store(false, Ordering::SeqCst);
        result
    }

    async fn run_cycle(&self, page: &PageView) -> AdAgentResult<CycleSummary> {
        let config = self.config_source.fetch().await?;

        if config.placements.is_empty() {
            debug!("no placements configured, nothing to do");
            return Ok(CycleSummary::short_circuit(CyclePhase::ConfigLoaded));
        }
        info!(
            placements = config.placements.len(),
            bidders = config.prebid.bidders.len(),
            "configuration loaded"
        );

        let instances = locate(&page.html, &config.placements);
        if instances.is_empty() {
            debug!("no placement slots located on page");
            return Ok(CycleSummary::short_circuit(CyclePhase::ConfigLoaded));
        }

        let mut units = build_units(&instances, &config.prebid);
        debug!(phase = ?CyclePhase::UnitsBuilt, units = units.len(), "bid units built");

        debug!(phase = ?CyclePhase::Matching, "entering matching phase");
        let match_results = self.run_matching(page, &instances, &config).await;
        if config.prebid.price_floors {
            // Single write per unit, after all relevant match results settle.
            for ((unit, instance), result) in
                units.iter_mut().zip(&instances).zip(&match_results)
            {
                let floor = resolve_floor(
                    instance.placement.base_floor,
                    instance.placement.floor_cap,
                    instance.override_floor,
                    result.as_ref(),
                    self.matching.min_alignment_score,
                );
                debug!(
                    code = %unit.code,
                    floor,
                    matched = result.is_some(),
                    "floor resolved"
                );
                unit.floor = Some(floor);
            }
        }

        self.engine
            .configure(&EngineConfig::new(
                config.prebid.timeout,
                config.pubcontext.supply_chain.clone(),
            ))
            .await?;
        self.engine.register_units(&units).await?;

        let bids_back = self
            .engine
            .request_bids(Duration::from_millis(config.prebid.timeout))
            .await?;
        debug!(
            phase = ?CyclePhase::BidsRequested,
            responding_units = bids_back.len(),
            "bids received"
        );

        let resolutions = self.resolve_units(&units, &instances, &bids_back);
        let summary = CycleSummary {
            phase: CyclePhase::Resolved,
            located: instances.len(),
            resolutions,
        };
        info!(
            located = summary.located,
            rendered = summary.rendered_count(),
            no_bids = summary.no_bid_count(),
            "auction cycle resolved"
        );

        Ok(summary)
    }

    /// Run the semantic-matching fan-out, or skip it entirely when matching
    /// is off for the deployment or the remote config.
    async fn run_matching(
        &self,
        page: &PageView,
        instances: &[PageInstance],
        config: &RemoteConfig,
    ) -> Vec<Option<MatchResult>> {
        let skipped = || (0..instances.len()).map(|_| None).collect();

        if !self.matching.enabled || !config.pubcontext.enabled {
            debug!("semantic matching disabled, skipping");
            return skipped();
        }
        let (Some(transport), Some(extractor)) = (&self.transport, &self.extractor) else {
            debug!("no match transport attached, skipping matching");
            return skipped();
        };

        let signals = extractor.extract(page);
        let orchestrator = MatchOrchestrator::new(
            Arc::clone(transport),
            Duration::from_millis(self.matching.timeout_ms),
        );
        let overrides = page.data.as_ref().map(|data| &data.extra);

        orchestrator
            .match_all(&config.pubcontext, instances, &signals, overrides)
            .await
    }

    fn resolve_units(
        &self,
        units: &[BidUnit],
        instances: &[PageInstance],
        bids_back: &BidsBack,
    ) -> Vec<UnitResolution> {
        let empty = Vec::new();

        units
            .iter()
            .zip(instances)
            .map(|(unit, instance)| {
                let placement_id = instance.placement.placement_id.clone();
                let candidates = bids_back.get(&unit.code).unwrap_or(&empty);

                let Some(winner) = select_winner(candidates) else {
                    debug!(code = %unit.code, "no bids for unit");
                    self.surface.mark_no_fill(&unit.code, &instance.anchor);
                    self.events
                        .emit(make_event(EventType::NoFill, placement_id.clone(), None, None));
                    metrics::counter!("auction.no_fill").increment(1);
                    return UnitResolution {
                        code: unit.code.clone(),
                        placement_id,
                        outcome: UnitOutcome::NoBid,
                    };
                };

                match self.surface.render(&unit.code, &instance.anchor, winner) {
                    Ok(()) => {
                        info!(
                            code = %unit.code,
                            cpm = winner.cpm,
                            bidder = %winner.bidder,
                            "unit rendered"
                        );
                        metrics::counter!("auction.rendered").increment(1);
                        // Exactly one impression per rendered unit.
                        self.events.emit(make_event(
                            EventType::Impression,
                            placement_id.clone(),
                            Some(winner.cpm),
                            Some(winner.bidder.clone()),
                        ));
                        UnitResolution {
                            code: unit.code.clone(),
                            placement_id,
                            outcome: UnitOutcome::Rendered {
                                bid: winner.clone(),
                            },
                        }
                    }
                    Err(e) => {
                        warn!(code = %unit.code, error = %e, "render failed");
                        self.surface.mark_no_fill(&unit.code, &instance.anchor);
                        metrics::counter!("auction.no_fill").increment(1);
                        UnitResolution {
                            code: unit.code.clone(),
                            placement_id,
                            outcome: UnitOutcome::NoBid,
                        }
                    }
                }
            })
            .collect()
    }
}

/// Highest CPM wins; ties break to the first bid encountered at that value.
pub fn select_winner(bids: &[EngineBid]) -> Option<&EngineBid> {
    let mut winner: Option<&EngineBid> = None;
    for bid in bids {
        match winner {
            Some(current) if bid.cpm > current.cpm => winner = Some(bid),
            None => winner = Some(bid),
            _ => {}
        }
    }
    winner
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_bid(cpm: f64, bidder: &str) -> EngineBid {
        EngineBid {
            cpm,
            width: 300,
            height: 250,
            ad: String::new(),
            bidder: bidder.into(),
        }
    }

    #[test]
    fn test_select_winner_highest_cpm() {
        let bids = vec![make_bid(1.2, "a"), make_bid(3.5, "b"), make_bid(2.0, "c")];
        assert_eq!(select_winner(&bids).unwrap().bidder, "b");
    }

    #[test]
    fn test_select_winner_tie_breaks_to_first() {
        let bids = vec![make_bid(1.2, "a"), make_bid(3.5, "b"), make_bid(3.5, "c")];
        let winner = select_winner(&bids).unwrap();
        assert_eq!(winner.cpm, 3.5);
        assert_eq!(winner.bidder, "b");
    }

    #[test]
    fn test_select_winner_empty() {
        assert!(select_winner(&[]).is_none());
    }
}
