//! Concurrent per-placement match orchestration.
//!
//! One call per located instance, fanned out concurrently, raced against a
//! hard wall-clock deadline. Failures are isolated per placement; once the
//! deadline elapses the orchestrator proceeds with whatever has arrived and
//! late responses are ignored.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, warn};

use adagent_core::types::{ContextSignals, MatchResult, PageInstance, PubcontextSettings};

use crate::client::{MatchRequest, MatchTransport};

pub struct MatchOrchestrator {
    transport: Arc<dyn MatchTransport>,
    deadline: Duration,
}

impl MatchOrchestrator {
    pub fn new(transport: Arc<dyn MatchTransport>, deadline: Duration) -> Self {
        Self { transport, deadline }
    }

    /// Issue one match call per instance and collect results positionally:
    /// `returned[i]` belongs to `instances[i]`, `None` where the call failed,
    /// missed the deadline, or the placement opted out of matching.
    pub async fn match_all(
        &self,
        settings: &PubcontextSettings,
        instances: &[PageInstance],
        signals: &ContextSignals,
        overrides: Option<&serde_json::Map<String, serde_json::Value>>,
    ) -> Vec<Option<MatchResult>> {
        let mut results: Vec<Option<MatchResult>> = (0..instances.len()).map(|_| None).collect();
        if instances.is_empty() {
            return results;
        }

        let settings = Arc::new(settings.clone());
        let context = build_context(signals, overrides);

        let mut tasks = JoinSet::new();
        let mut spawned = 0usize;
        for (idx, instance) in instances.iter().enumerate() {
            if !instance.placement.enable_semantic {
                debug!(
                    placement_id = %instance.placement.placement_id,
                    "placement opted out of semantic matching"
                );
                continue;
            }

            let request = MatchRequest {
                placement_id: instance.placement.placement_id.clone(),
                page_url: signals.url.clone(),
                referrer: signals.referrer.clone(),
                context: serde_json::Value::Object(context.clone()),
            };
            let transport = Arc::clone(&self.transport);
            let settings = Arc::clone(&settings);

            metrics::counter!("match.requests").increment(1);
            tasks.spawn(async move { (idx, transport.match_placement(&settings, &request).await) });
            spawned += 1;
        }

        if spawned == 0 {
            return results;
        }

        let deadline = tokio::time::sleep(self.deadline);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = &mut deadline => {
                    warn!(
                        pending = tasks.len(),
                        budget_ms = self.deadline.as_millis() as u64,
                        "match deadline elapsed, proceeding without late results"
                    );
                    metrics::counter!("match.deadline_expired").increment(1);
                    break;
                }
                next = tasks.join_next() => match next {
                    None => break,
                    Some(Ok((idx, Ok(result)))) => {
                        results[idx] = Some(result);
                    }
                    Some(Ok((idx, Err(e)))) => {
                        debug!(
                            placement_id = %instances[idx].placement.placement_id,
                            error = %e,
                            "match call failed"
                        );
                        metrics::counter!("match.failures").increment(1);
                    }
                    Some(Err(e)) => {
                        debug!(error = %e, "match task failed to join");
                        metrics::counter!("match.failures").increment(1);
                    }
                }
            }
        }

        // In-flight calls are abandoned, not aborted: late responders keep
        // running to completion and their results are dropped.
        tasks.detach_all();

        results
    }
}

/// Match-call context: the signal snapshot merged with any page-supplied
/// override data. Page data wins on key collision.
fn build_context(
    signals: &ContextSignals,
    overrides: Option<&serde_json::Map<String, serde_json::Value>>,
) -> serde_json::Map<String, serde_json::Value> {
    let mut context = match serde_json::to_value(signals) {
        Ok(serde_json::Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    };

    if let Some(overrides) = overrides {
        for (key, value) in overrides {
            context.insert(key.clone(), value.clone());
        }
    }

    context
}
