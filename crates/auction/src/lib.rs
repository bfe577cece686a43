//! Auction orchestration: placement location, bid-unit construction, floor
//! resolution, and the coordinator that drives the external auction engine
//! through a full bid cycle.

pub mod builder;
pub mod coordinator;
pub mod engine;
pub mod floor;
pub mod locator;
pub mod render;

pub use coordinator::{AuctionCoordinator, CyclePhase, CycleSummary};
pub use engine::{AuctionEngine, EngineConfig, SimulatedEngine};
pub use floor::resolve_floor;
pub use render::{InlineFrameSurface, RenderSurface, RenderedFrame};
