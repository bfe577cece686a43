//! Delivery event bus — trait for emitting lifecycle events from any module.
//!
//! Modules accept an `Arc<dyn EventSink>` to report impressions and failures.
//! Emission is best-effort by contract: implementations must not let a
//! failed delivery surface back into the auction control flow.

use crate::types::{DeliveryEvent, EventType};
use chrono::Utc;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Trait for emitting delivery events. Implementations route events to the
/// publisher backend's impression endpoint or an analytics pipeline.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: DeliveryEvent);
}

/// No-op sink for tests and deployments without reporting configured.
pub struct NoOpSink;

impl EventSink for NoOpSink {
    fn emit(&self, _event: DeliveryEvent) {}
}

/// In-memory sink that captures events for testing.
#[derive(Default)]
pub struct CaptureSink {
    events: Mutex<Vec<DeliveryEvent>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<DeliveryEvent> {
        self.events.lock().expect("event bus mutex poisoned").clone()
    }

    pub fn count(&self) -> usize {
        self.events.lock().expect("event bus mutex poisoned").len()
    }

    pub fn count_type(&self, event_type: EventType) -> usize {
        self.events
            .lock()
            .expect("event bus mutex poisoned")
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }

    pub fn clear(&self) {
        self.events.lock().expect("event bus mutex poisoned").clear();
    }
}

impl EventSink for CaptureSink {
    fn emit(&self, event: DeliveryEvent) {
        self.events.lock().expect("event bus mutex poisoned").push(event);
    }
}

/// Convenience builder for creating `DeliveryEvent` with minimal boilerplate.
pub fn make_event(
    event_type: EventType,
    placement_id: impl Into<String>,
    winning_bid: Option<f64>,
    winning_bidder: Option<String>,
) -> DeliveryEvent {
    DeliveryEvent {
        event_id: Uuid::new_v4(),
        event_type,
        placement_id: placement_id.into(),
        winning_bid,
        winning_bidder,
        detail: None,
        timestamp: Utc::now(),
    }
}

/// Convenience: create a no-op event bus for modules that don't need it.
pub fn noop_sink() -> Arc<dyn EventSink> {
    Arc::new(NoOpSink)
}

/// Convenience: create a capture sink for tests.
pub fn capture_sink() -> Arc<CaptureSink> {
    Arc::new(CaptureSink::new())
}
