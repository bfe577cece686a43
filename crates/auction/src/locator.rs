//! Placement location — matches declared slot elements on the page against
//! the placement catalog.

use scraper::{Html, Selector};
use tracing::debug;

use adagent_core::types::{PageInstance, Placement, SlotAnchor};

/// Slot elements declare themselves with this class and a placement-id
/// data attribute.
pub const SLOT_SELECTOR: &str = r#".adagent-placement[data-placement-id]"#;

/// Optional per-element floor override, parsed as a non-negative decimal.
pub const OVERRIDE_FLOOR_ATTR: &str = "data-override-floor";

/// Scan the page for declared ad slots and resolve each against the catalog.
///
/// Slots with no catalog match and slots whose placement is inactive are
/// skipped. Returns an empty list — never an error — when the page has no
/// slots or the catalog is empty; callers treat empty as "nothing to do".
pub fn locate(html: &str, catalog: &[Placement]) -> Vec<PageInstance> {
    if catalog.is_empty() {
        return Vec::new();
    }

    let Ok(selector) = Selector::parse(SLOT_SELECTOR) else {
        return Vec::new();
    };

    let doc = Html::parse_document(html);
    let mut found = Vec::new();

    for (dom_index, element) in doc.select(&selector).enumerate() {
        let Some(placement_id) = element.value().attr("data-placement-id") else {
            continue;
        };

        let Some(placement) = catalog.iter().find(|p| p.placement_id == placement_id) else {
            debug!(placement_id = %placement_id, "slot has no catalog match, skipping");
            continue;
        };

        if !placement.active {
            debug!(placement_id = %placement_id, "placement inactive, skipping");
            continue;
        }

        let override_floor = element
            .value()
            .attr(OVERRIDE_FLOOR_ATTR)
            .and_then(|raw| raw.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite() && *v >= 0.0)
            .unwrap_or(0.0);

        found.push(PageInstance {
            placement: placement.clone(),
            anchor: SlotAnchor {
                dom_index,
                element_id: element.value().attr("id").map(str::to_string),
            },
            override_floor,
        });
    }

    found
}
