//! Bid-unit construction — turns located page instances and the global
//! bidder configuration into auction-ready units.

use adagent_core::types::{AdSize, BidUnit, PageInstance, PrebidSettings};

/// Parse a placement's configured sizes. Accepts `[w, h]` pairs or `"WxH"`
/// strings; any unparseable entry falls back to 300x250, as does an absent
/// or empty sizes field.
pub fn parse_sizes(raw: &serde_json::Value) -> Vec<AdSize> {
    match raw {
        serde_json::Value::Array(entries) if !entries.is_empty() => {
            entries.iter().map(parse_size_entry).collect()
        }
        _ => vec![AdSize::medium_rectangle()],
    }
}

fn parse_size_entry(entry: &serde_json::Value) -> AdSize {
    match entry {
        serde_json::Value::Array(pair) => {
            let w = pair.first().and_then(|v| v.as_u64());
            let h = pair.get(1).and_then(|v| v.as_u64());
            match (w, h) {
                (Some(w), Some(h)) => AdSize::new(w as u32, h as u32),
                _ => AdSize::medium_rectangle(),
            }
        }
        serde_json::Value::String(s) => {
            let mut parts = s.split('x');
            let w = parts.next().and_then(|p| p.trim().parse::<u32>().ok());
            let h = parts.next().and_then(|p| p.trim().parse::<u32>().ok());
            match (w, h) {
                (Some(w), Some(h)) => AdSize::new(w, h),
                _ => AdSize::medium_rectangle(),
            }
        }
        _ => AdSize::medium_rectangle(),
    }
}

/// Build one bid unit per page instance.
///
/// The full set of globally enabled bidders is attached verbatim to every
/// unit. A floor is attached only when price floors are enabled for the
/// deployment; otherwise the unit carries no floor at all and the engine
/// applies its own default.
pub fn build_units(instances: &[PageInstance], prebid: &PrebidSettings) -> Vec<BidUnit> {
    let bidders = prebid.bidder_configs();

    instances
        .iter()
        .map(|instance| {
            let floor = prebid.price_floors.then(|| {
                if instance.override_floor > 0.0 {
                    instance.override_floor
                } else {
                    instance.placement.base_floor
                }
            });

            BidUnit {
                code: instance.placement.unit_code().to_string(),
                sizes: parse_sizes(&instance.placement.sizes),
                bids: bidders.clone(),
                floor,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use adagent_core::types::{Placement, SlotAnchor};
    use serde_json::json;

    fn make_instance(base_floor: f64, override_floor: f64) -> PageInstance {
        PageInstance {
            placement: Placement {
                placement_id: "header".into(),
                ad_unit_code: "div-header".into(),
                sizes: json!(["728x90"]),
                base_floor,
                floor_cap: 0.0,
                css_selector: None,
                context_tags: None,
                enable_semantic: true,
                active: true,
            },
            anchor: SlotAnchor {
                dom_index: 0,
                element_id: None,
            },
            override_floor,
        }
    }

    fn prebid_with_bidders(price_floors: bool) -> PrebidSettings {
        let mut prebid = PrebidSettings::default();
        prebid.price_floors = price_floors;
        prebid.bidders.insert("appnexus".into(), json!({ "placementId": "123" }));
        prebid.bidders.insert("rubicon".into(), json!({ "accountId": 1001 }));
        prebid
    }

    #[test]
    fn test_parse_sizes_string_form() {
        let sizes = parse_sizes(&json!(["300x250", "728x90"]));
        assert_eq!(sizes, vec![AdSize::new(300, 250), AdSize::new(728, 90)]);
    }

    #[test]
    fn test_parse_sizes_pair_form_unchanged() {
        let sizes = parse_sizes(&json!([[300, 250]]));
        assert_eq!(sizes, vec![AdSize::new(300, 250)]);
    }

    #[test]
    fn test_parse_sizes_fallbacks() {
        assert_eq!(parse_sizes(&json!(null)), vec![AdSize::medium_rectangle()]);
        assert_eq!(parse_sizes(&json!([])), vec![AdSize::medium_rectangle()]);
        assert_eq!(parse_sizes(&json!(42)), vec![AdSize::medium_rectangle()]);
        // Unparseable entries degrade individually.
        assert_eq!(
            parse_sizes(&json!(["banana", [970, 250], 7])),
            vec![
                AdSize::medium_rectangle(),
                AdSize::new(970, 250),
                AdSize::medium_rectangle()
            ]
        );
    }

    #[test]
    fn test_parse_sizes_is_idempotent() {
        let once = parse_sizes(&json!(["300x250", "728x90"]));
        let as_value = serde_json::to_value(&once).unwrap();
        assert_eq!(parse_sizes(&as_value), once);
    }

    #[test]
    fn test_units_carry_full_bidder_set() {
        let units = build_units(&[make_instance(0.5, 0.0)], &prebid_with_bidders(true));
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].code, "div-header");
        assert_eq!(units[0].bids.len(), 2);
        assert_eq!(units[0].bids[0].bidder, "appnexus");
        assert_eq!(units[0].bids[1].bidder, "rubicon");
    }

    #[test]
    fn test_floor_from_base_or_override() {
        let units = build_units(&[make_instance(0.5, 0.0)], &prebid_with_bidders(true));
        assert_eq!(units[0].floor, Some(0.5));

        let units = build_units(&[make_instance(0.5, 1.25)], &prebid_with_bidders(true));
        assert_eq!(units[0].floor, Some(1.25));
    }

    #[test]
    fn test_no_floor_when_price_floors_disabled() {
        let units = build_units(&[make_instance(0.5, 1.25)], &prebid_with_bidders(false));
        assert_eq!(units[0].floor, None);
    }
}
