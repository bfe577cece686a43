//! Remote-service integration: the semantic match client, the remote
//! configuration source, the best-effort impression reporter, and the
//! per-placement match orchestration.

pub mod client;
pub mod orchestrator;
pub mod remote;

pub use client::{MatchRequest, MatchTransport, PubcontextClient};
pub use orchestrator::MatchOrchestrator;
pub use remote::{ConfigSource, HttpConfigSource, ReportSink, StaticConfigSource};
