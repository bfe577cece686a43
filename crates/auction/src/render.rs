//! Rendering surface — an isolated inline frame per winning creative.

use std::sync::Mutex;

use adagent_core::types::{EngineBid, SlotAnchor};
use adagent_core::AdAgentResult;

/// Where winning creatives land. The coordinator writes the creative markup
/// verbatim; the host shell is responsible for attaching frames to the page.
pub trait RenderSurface: Send + Sync {
    fn render(&self, code: &str, anchor: &SlotAnchor, bid: &EngineBid) -> AdAgentResult<()>;
    fn mark_no_fill(&self, code: &str, anchor: &SlotAnchor);
}

/// One rendered creative, held as an isolated frame: shell dimensions plus
/// the creative markup exactly as the bidder returned it.
#[derive(Debug, Clone)]
pub struct RenderedFrame {
    pub code: String,
    pub anchor: SlotAnchor,
    pub width: u32,
    pub height: u32,
    pub creative: String,
}

impl RenderedFrame {
    /// The frame element the host shell injects at the anchor. The creative
    /// itself is written into the frame's own document, not inlined here.
    pub fn shell(&self) -> String {
        format!(
            r#"<iframe id="ad-frame-{}" width="{}" height="{}" frameborder="0" scrolling="no" style="border:none"></iframe>"#,
            self.code, self.width, self.height
        )
    }
}

/// Collects rendered frames and no-fill marks in memory. Serves both the
/// demo harness (frames are drained and handed to the host) and tests.
#[derive(Default)]
pub struct InlineFrameSurface {
    frames: Mutex<Vec<RenderedFrame>>,
    no_fills: Mutex<Vec<String>>,
}

impl InlineFrameSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> Vec<RenderedFrame> {
        self.frames.lock().expect("surface mutex poisoned").clone()
    }

    pub fn no_fills(&self) -> Vec<String> {
        self.no_fills.lock().expect("surface mutex poisoned").clone()
    }
}

impl RenderSurface for InlineFrameSurface {
    fn render(&self, code: &str, anchor: &SlotAnchor, bid: &EngineBid) -> AdAgentResult<()> {
        self.frames
            .lock()
            .expect("surface mutex poisoned")
            .push(RenderedFrame {
                code: code.to_string(),
                anchor: anchor.clone(),
                width: if bid.width > 0 { bid.width } else { 300 },
                height: if bid.height > 0 { bid.height } else { 250 },
                creative: bid.ad.clone(),
            });
        Ok(())
    }

    fn mark_no_fill(&self, code: &str, _anchor: &SlotAnchor) {
        self.no_fills
            .lock()
            .expect("surface mutex poisoned")
            .push(code.to_string());
    }
}
