//! Auction engine boundary — the external bidding framework wrapped as an
//! awaitable request/response interface.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tracing::debug;

use adagent_core::types::{BidUnit, BidsBack, EngineBid, SupplyChain};
use adagent_core::AdAgentResult;

/// Engine-level configuration applied once per cycle. Granularity, bid
/// caching, and send-all-bids are fixed policy, not configurable per call.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub bidder_timeout_ms: u64,
    pub price_granularity: &'static str,
    pub use_bid_cache: bool,
    pub send_all_bids: bool,
    pub supply_chain: Option<SupplyChain>,
}

impl EngineConfig {
    pub fn new(bidder_timeout_ms: u64, supply_chain: Option<SupplyChain>) -> Self {
        Self {
            bidder_timeout_ms,
            price_granularity: "dense",
            use_bid_cache: true,
            send_all_bids: true,
            supply_chain,
        }
    }
}

/// The external auction engine, treated as a black box: register units, apply
/// a global configuration, request bids, receive a per-code map of candidates.
#[async_trait]
pub trait AuctionEngine: Send + Sync {
    async fn configure(&self, config: &EngineConfig) -> AdAgentResult<()>;
    async fn register_units(&self, units: &[BidUnit]) -> AdAgentResult<()>;
    async fn request_bids(&self, timeout: Duration) -> AdAgentResult<BidsBack>;
}

/// Simulated engine for local harnesses: generates plausible demand for each
/// registered unit. In production the trait is implemented over the real
/// bidding framework's queue.
#[derive(Default)]
pub struct SimulatedEngine {
    units: Mutex<Vec<BidUnit>>,
    config: Mutex<Option<EngineConfig>>,
}

impl SimulatedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine configuration from the most recent `configure` call.
    pub fn last_config(&self) -> Option<EngineConfig> {
        self.config.lock().expect("engine mutex poisoned").clone()
    }
}

#[async_trait]
impl AuctionEngine for SimulatedEngine {
    async fn configure(&self, config: &EngineConfig) -> AdAgentResult<()> {
        debug!(
            timeout_ms = config.bidder_timeout_ms,
            granularity = config.price_granularity,
            schain = config.supply_chain.is_some(),
            "engine configured"
        );
        *self.config.lock().expect("engine mutex poisoned") = Some(config.clone());
        Ok(())
    }

    async fn register_units(&self, units: &[BidUnit]) -> AdAgentResult<()> {
        let mut registered = self.units.lock().expect("engine mutex poisoned");
        registered.extend_from_slice(units);
        debug!(count = registered.len(), "units registered");
        Ok(())
    }

    async fn request_bids(&self, _timeout: Duration) -> AdAgentResult<BidsBack> {
        let units = self.units.lock().expect("engine mutex poisoned").clone();
        let mut rng = rand::thread_rng();
        let mut bids: BidsBack = BidsBack::new();

        for unit in &units {
            // Roughly three quarters of units attract demand.
            if !rng.gen_bool(0.75) {
                bids.insert(unit.code.clone(), Vec::new());
                continue;
            }

            let floor = unit.floor.unwrap_or(0.0);
            let size = unit
                .sizes
                .first()
                .copied()
                .unwrap_or(adagent_core::types::AdSize::medium_rectangle());
            let count = rng.gen_range(1..=3);

            let candidates = (0..count)
                .map(|i| {
                    let bidder = unit
                        .bids
                        .get(i % unit.bids.len().max(1))
                        .map(|b| b.bidder.clone())
                        .unwrap_or_else(|| "house".to_string());
                    let cpm = floor + rng.gen_range(0.05..4.0);
                    EngineBid {
                        cpm: (cpm * 100.0).round() / 100.0,
                        width: size.w,
                        height: size.h,
                        ad: format!("<div class=\"creative\" data-bidder=\"{bidder}\"></div>"),
                        bidder,
                    }
                })
                .collect();

            bids.insert(unit.code.clone(), candidates);
        }

        Ok(bids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adagent_core::types::AdSize;

    fn make_unit(code: &str, floor: Option<f64>) -> BidUnit {
        BidUnit {
            code: code.into(),
            sizes: vec![AdSize::new(300, 250)],
            bids: vec![],
            floor,
        }
    }

    #[tokio::test]
    async fn test_simulated_bids_respect_floor() {
        let engine = SimulatedEngine::new();
        engine
            .configure(&EngineConfig::new(3000, None))
            .await
            .unwrap();

        let applied = engine.last_config().unwrap();
        assert_eq!(applied.price_granularity, "dense");
        assert!(applied.use_bid_cache);
        assert!(applied.send_all_bids);
        engine
            .register_units(&[make_unit("unit-1", Some(2.0))])
            .await
            .unwrap();

        let bids = engine.request_bids(Duration::from_millis(10)).await.unwrap();
        for bid in &bids["unit-1"] {
            assert!(bid.cpm >= 2.0);
            assert_eq!(bid.width, 300);
        }
    }

    #[tokio::test]
    async fn test_no_units_no_bids() {
        let engine = SimulatedEngine::new();
        let bids = engine.request_bids(Duration::from_millis(10)).await.unwrap();
        assert!(bids.is_empty());
    }
}
