use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::commission::CandidateMix;

/// How qualifying scenarios are ordered; index 0 is the recommendation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingStrategy {
    /// Smallest total TPV first, then fewest clients.
    #[default]
    MinimizeTpv,
    /// Fewest clients first, then smallest total TPV. Favors high-multiplier mixes.
    MinimizeClientCount,
}

impl RankingStrategy {
    /// Accepts the snake_case name or the short CLI aliases `tpv` and `clients`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "tpv" | "minimize_tpv" => Some(Self::MinimizeTpv),
            "clients" | "minimize_client_count" => Some(Self::MinimizeClientCount),
            _ => None,
        }
    }

    pub fn compare(self, left: &ScenarioResult, right: &ScenarioResult) -> Ordering {
        match self {
            Self::MinimizeTpv => left
                .total_tpv
                .total_cmp(&right.total_tpv)
                .then_with(|| left.total_clients.cmp(&right.total_clients)),
            Self::MinimizeClientCount => left
                .total_clients
                .cmp(&right.total_clients)
                .then_with(|| left.total_tpv.total_cmp(&right.total_tpv)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub mix: CandidateMix,
    pub total_tpv: f64,
    pub gross_commission: f64,
    pub final_commission: f64,
    pub multiplier: f64,
    pub total_clients: u32,
}

/// Stable sort: scenarios that tie under `strategy` keep their enumeration order.
pub fn rank_scenarios(scenarios: &mut [ScenarioResult], strategy: RankingStrategy) {
    scenarios.sort_by(|left, right| strategy.compare(left, right));
}
