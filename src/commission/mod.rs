pub mod multiplier;
pub mod offers;

use serde::{Deserialize, Serialize};

pub use multiplier::{multiplier_for, MULTIPLIER_BRACKETS, TOP_MULTIPLIER};
pub use offers::{
    load_offer_table, Aggressiveness, Offer, OfferKey, OfferTable, OfferTableError, Tier,
    REFERENCE_OFFERS,
};

use crate::optimizer::TierCaps;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MixEntry {
    pub tier: Tier,
    pub aggressiveness: Aggressiveness,
    pub count: u32,
}

impl MixEntry {
    pub fn key(&self) -> OfferKey {
        OfferKey::new(self.tier, self.aggressiveness)
    }
}

/// Client count per offer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateMix {
    entries: Vec<MixEntry>,
}

impl CandidateMix {
    pub fn new(entries: Vec<MixEntry>) -> Self {
        Self { entries }
    }

    /// Build a mix over every offer in `table`; `counts` is aligned with table order.
    pub fn from_counts(table: &OfferTable, counts: &[u32]) -> Self {
        let entries = table
            .offers()
            .iter()
            .zip(counts.iter().copied())
            .map(|(offer, count)| MixEntry {
                tier: offer.tier,
                aggressiveness: offer.aggressiveness,
                count,
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[MixEntry] {
        &self.entries
    }

    pub fn count_of(&self, key: OfferKey) -> u32 {
        self.entries
            .iter()
            .filter(|entry| entry.key() == key)
            .map(|entry| entry.count)
            .sum()
    }

    pub fn tier_total(&self, tier: Tier) -> u32 {
        self.entries
            .iter()
            .filter(|entry| entry.tier == tier)
            .map(|entry| entry.count)
            .sum()
    }

    pub fn total_clients(&self) -> u32 {
        self.entries.iter().map(|entry| entry.count).sum()
    }

    /// Entries with at least one client.
    pub fn nonzero(&self) -> impl Iterator<Item = &MixEntry> {
        self.entries.iter().filter(|entry| entry.count > 0)
    }

    pub fn within_caps(&self, caps: &TierCaps) -> bool {
        Tier::ALL
            .into_iter()
            .all(|tier| self.tier_total(tier) <= caps.get(tier))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Evaluation {
    pub total_tpv: f64,
    pub gross_commission: f64,
    pub multiplier: f64,
    pub final_commission: f64,
}

/// Apply the attainment multiplier to already-summed totals.
pub fn finalize(total_tpv: f64, gross_commission: f64, goal_tpv: f64) -> Evaluation {
    let multiplier = multiplier_for(total_tpv, goal_tpv);
    Evaluation {
        total_tpv,
        gross_commission,
        multiplier,
        final_commission: gross_commission * multiplier,
    }
}

/// Evaluate one mix. Entries for offers missing from `table` contribute nothing.
pub fn evaluate(table: &OfferTable, mix: &CandidateMix, goal_tpv: f64) -> Evaluation {
    let mut total_tpv = 0.0;
    let mut gross_commission = 0.0;
    for entry in mix.entries() {
        if let Some(offer) = table.get(entry.key()) {
            let count = f64::from(entry.count);
            total_tpv += count * offer.tpv_per_client;
            gross_commission += count * offer.commission_per_client;
        }
    }
    finalize(total_tpv, gross_commission, goal_tpv)
}
