//! TPV attainment → commission multiplier.
//!
//! Brackets are scanned in order; each entry is `(exclusive upper bound of the
//! attainment ratio, multiplier)`. Anything at or above the last bound pays
//! [TOP_MULTIPLIER].

/// Ordered `(upper_bound, multiplier)` brackets. Lower bounds are closed, upper bounds open.
///
/// [0.6, 0.8) and [0.8, 1.0) both pay 0.8. Keep it that way until product confirms otherwise;
/// `plateau_below_goal_is_pinned` guards it.
pub const MULTIPLIER_BRACKETS: [(f64, f64); 8] = [
    (0.4, 0.4),
    (0.6, 0.6),
    (0.8, 0.8),
    (1.0, 0.8),
    (1.2, 1.2),
    (1.4, 1.4),
    (1.6, 1.6),
    (1.8, 1.8),
];

/// Multiplier for an attainment ratio of 1.8 or more.
pub const TOP_MULTIPLIER: f64 = 2.0;

/// Multiplier applied when no TPV goal is set.
pub const NEUTRAL_MULTIPLIER: f64 = 1.0;

/// Map achieved TPV against the monthly goal to a multiplier. A goal of 0 disables scaling.
pub fn multiplier_for(achieved_tpv: f64, goal_tpv: f64) -> f64 {
    if goal_tpv == 0.0 {
        return NEUTRAL_MULTIPLIER;
    }
    let ratio = achieved_tpv / goal_tpv;
    MULTIPLIER_BRACKETS
        .iter()
        .find(|(upper, _)| ratio < *upper)
        .map(|(_, multiplier)| *multiplier)
        .unwrap_or(TOP_MULTIPLIER)
}
