//! Floor resolution — folds a placement's configured floors and its semantic
//! match results into one bounded value.

use adagent_core::types::MatchResult;

/// Resolve the final floor for one placement.
///
/// The candidate starts at the per-instance override when set (even if it is
/// below the base floor — an explicit instance override wins over the catalog
/// default), otherwise at the base floor. Each matched creative whose
/// alignment score reaches `min_alignment_score` can raise the candidate to
/// its suggested floor. The cap, when nonzero, wins over everything,
/// including the override path.
pub fn resolve_floor(
    base_floor: f64,
    floor_cap: f64,
    override_floor: f64,
    matches: Option<&MatchResult>,
    min_alignment_score: f64,
) -> f64 {
    let mut candidate = if override_floor > 0.0 {
        override_floor
    } else {
        base_floor
    };

    if let Some(result) = matches {
        for creative in &result.matched_creatives {
            if creative.context_alignment_score >= min_alignment_score
                && creative.suggested_bid_floor > candidate
            {
                candidate = creative.suggested_bid_floor;
            }
        }
    }

    if floor_cap > 0.0 && candidate > floor_cap {
        candidate = floor_cap;
    }

    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use adagent_core::types::MatchedCreative;

    fn matches(creatives: &[(f64, f64)]) -> MatchResult {
        MatchResult {
            placement_id: "p-1".into(),
            matched_creatives: creatives
                .iter()
                .map(|&(score, floor)| MatchedCreative {
                    context_alignment_score: score,
                    suggested_bid_floor: floor,
                })
                .collect(),
        }
    }

    #[test]
    fn test_low_score_matches_ignored() {
        let result = matches(&[(0.9, 5.00), (0.5, 20.00)]);
        let floor = resolve_floor(0.50, 10.00, 0.0, Some(&result), 0.8);
        assert_eq!(floor, 5.00);
    }

    #[test]
    fn test_cap_clamps_suggested_floor() {
        let result = matches(&[(0.95, 9.00)]);
        let floor = resolve_floor(0.50, 2.00, 0.0, Some(&result), 0.8);
        assert_eq!(floor, 2.00);
    }

    #[test]
    fn test_no_matches_leaves_base() {
        assert_eq!(resolve_floor(0.50, 10.00, 0.0, None, 0.8), 0.50);
        let below_threshold = matches(&[(0.3, 8.0)]);
        assert_eq!(resolve_floor(0.50, 10.00, 0.0, Some(&below_threshold), 0.8), 0.50);
    }

    #[test]
    fn test_override_seeds_candidate_even_below_base() {
        assert_eq!(resolve_floor(2.00, 0.0, 0.75, None, 0.8), 0.75);
    }

    #[test]
    fn test_override_wins_over_base_as_starting_point() {
        let result = matches(&[(0.9, 1.00)]);
        // Override 3.00 is higher than any suggestion, stays.
        assert_eq!(resolve_floor(0.50, 0.0, 3.00, Some(&result), 0.8), 3.00);
    }

    #[test]
    fn test_cap_wins_over_override() {
        assert_eq!(resolve_floor(0.50, 2.00, 5.00, None, 0.8), 2.00);
    }

    #[test]
    fn test_zero_cap_means_uncapped() {
        let result = matches(&[(0.99, 42.0)]);
        assert_eq!(resolve_floor(0.50, 0.0, 0.0, Some(&result), 0.8), 42.0);
    }

    #[test]
    fn test_score_exactly_at_threshold_counts() {
        let result = matches(&[(0.8, 4.0)]);
        assert_eq!(resolve_floor(0.50, 0.0, 0.0, Some(&result), 0.8), 4.0);
    }
}
