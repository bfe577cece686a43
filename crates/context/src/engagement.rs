//! Engagement tracking — accumulates scroll depth, pointer activity, and
//! dwell time from the moment the tracker is constructed (page load).

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::Instant;

use adagent_core::types::{DeviceClass, Viewport};

/// Accumulates user-engagement signals for the lifetime of a page view.
/// Counters reset only on reconstruction.
#[derive(Debug)]
pub struct EngagementTracker {
    started: Instant,
    viewport: Viewport,
    max_scroll_depth: AtomicU8,
    pointer_seen: AtomicBool,
}

/// Point-in-time engagement readings folded into the signal snapshot.
#[derive(Debug, Clone, Copy)]
pub struct EngagementSnapshot {
    pub device: DeviceClass,
    pub time_on_page: u64,
    pub scroll_depth: u8,
    pub pointer_detected: bool,
    pub viewport: Viewport,
}

impl EngagementTracker {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            started: Instant::now(),
            viewport,
            max_scroll_depth: AtomicU8::new(0),
            pointer_seen: AtomicBool::new(false),
        }
    }

    /// Record a scroll sample. Keeps the running maximum of the percentage
    /// scrolled; a non-scrollable page (scrollable height ≤ viewport) reads 0.
    pub fn record_scroll(&self, scroll_top: u32, scroll_height: u32) {
        let scrollable = scroll_height.saturating_sub(self.viewport.height);
        if scrollable == 0 {
            return;
        }
        let percent = ((scroll_top as f64 / scrollable as f64) * 100.0).round() as u32;
        let percent = percent.min(100) as u8;
        self.max_scroll_depth.fetch_max(percent, Ordering::Relaxed);
    }

    /// Record that any pointer movement was observed. One-shot: stays set.
    pub fn record_pointer(&self) {
        self.pointer_seen.store(true, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> EngagementSnapshot {
        EngagementSnapshot {
            device: DeviceClass::from_viewport_width(self.viewport.width),
            time_on_page: self.started.elapsed().as_millis() as u64,
            scroll_depth: self.max_scroll_depth.load(Ordering::Relaxed),
            pointer_detected: self.pointer_seen.load(Ordering::Relaxed),
            viewport: self.viewport,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desktop_tracker() -> EngagementTracker {
        EngagementTracker::new(Viewport {
            width: 1440,
            height: 900,
        })
    }

    #[test]
    fn test_scroll_depth_running_max() {
        let tracker = desktop_tracker();
        // Page is 2900px tall, 2000px of it scrollable past the viewport.
        tracker.record_scroll(600, 2900);
        tracker.record_scroll(1600, 2900);
        tracker.record_scroll(1000, 2900);

        assert_eq!(tracker.snapshot().scroll_depth, 80);
    }

    #[test]
    fn test_scroll_depth_clamped_to_100() {
        let tracker = desktop_tracker();
        tracker.record_scroll(5000, 2900);
        assert_eq!(tracker.snapshot().scroll_depth, 100);
    }

    #[test]
    fn test_non_scrollable_page_reads_zero() {
        let tracker = desktop_tracker();
        tracker.record_scroll(100, 500);
        assert_eq!(tracker.snapshot().scroll_depth, 0);
    }

    #[test]
    fn test_pointer_one_shot() {
        let tracker = desktop_tracker();
        assert!(!tracker.snapshot().pointer_detected);
        tracker.record_pointer();
        tracker.record_pointer();
        assert!(tracker.snapshot().pointer_detected);
    }

    #[test]
    fn test_device_classes() {
        let mobile = EngagementTracker::new(Viewport { width: 390, height: 844 });
        let tablet = EngagementTracker::new(Viewport { width: 820, height: 1180 });
        assert_eq!(mobile.snapshot().device, DeviceClass::Mobile);
        assert_eq!(tablet.snapshot().device, DeviceClass::Tablet);
        assert_eq!(desktop_tracker().snapshot().device, DeviceClass::Desktop);
    }
}
