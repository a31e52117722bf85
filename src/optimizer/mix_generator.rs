//! Candidate space: every client mix whose per-tier totals respect the caps.
//!
//! Rather than walking the per-offer Cartesian product and discarding mixes
//! that break a tier cap, each tier's valid allocations are listed up front
//! and the space is the product over tiers. Candidate `i` is decoded by mixed
//! radix with the last tier varying fastest, which reproduces the filtered
//! per-offer product order when the table lists offers grouped by tier.

use crate::commission::{CandidateMix, OfferTable, Tier};
use crate::optimizer::TierCaps;

/// Upper bound on the allocations listed for a single tier.
pub const MAX_TIER_ALLOCATIONS: usize = 1_000_000;

/// One way to spread up to `cap` clients over a tier's offers, with its totals pre-summed.
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    pub counts: Vec<u32>,
    pub tpv: f64,
    pub commission: f64,
    pub clients: u32,
}

#[derive(Debug, Clone)]
pub struct TierAllocations {
    pub tier: Tier,
    /// Table positions of this tier's offers; `Allocation::counts` is aligned with it.
    pub positions: Vec<usize>,
    pub allocations: Vec<Allocation>,
}

/// Running totals for one candidate, before the multiplier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixTotals {
    pub tpv: f64,
    pub commission: f64,
    pub clients: u32,
}

#[derive(Debug, Clone)]
pub struct MixSpace {
    tiers: Vec<TierAllocations>,
    offer_count: usize,
    len: usize,
}

impl MixSpace {
    /// Build the space for `table` under `caps`. Returns None when a tier would need more than
    /// [MAX_TIER_ALLOCATIONS] allocations or the candidate count does not fit in a `usize`.
    /// Both limits are checked before anything is allocated.
    pub fn new(table: &OfferTable, caps: &TierCaps) -> Option<Self> {
        let mut len: usize = 1;
        for tier in Tier::ALL {
            let offers = table.positions_in(tier).len();
            let count = usize::try_from(allocation_count(offers, caps.get(tier))?).ok()?;
            if count > MAX_TIER_ALLOCATIONS {
                return None;
            }
            len = len.checked_mul(count)?;
        }

        let mut tiers = Vec::with_capacity(Tier::ALL.len());
        for tier in Tier::ALL {
            let positions = table.positions_in(tier);
            if positions.is_empty() {
                continue;
            }
            let allocations = tier_allocations(positions.len(), caps.get(tier))
                .into_iter()
                .map(|counts| {
                    let mut tpv = 0.0;
                    let mut commission = 0.0;
                    for (&position, &count) in positions.iter().zip(&counts) {
                        let offer = &table.offers()[position];
                        tpv += f64::from(count) * offer.tpv_per_client;
                        commission += f64::from(count) * offer.commission_per_client;
                    }
                    Allocation {
                        clients: counts.iter().sum(),
                        counts,
                        tpv,
                        commission,
                    }
                })
                .collect::<Vec<_>>();
            tiers.push(TierAllocations {
                tier,
                positions,
                allocations,
            });
        }
        Some(Self {
            tiers,
            offer_count: table.len(),
            len,
        })
    }

    /// Number of candidates, including the all-zero mix.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn tiers(&self) -> &[TierAllocations] {
        &self.tiers
    }

    /// Pre-multiplier totals for candidate `index`.
    pub fn totals_at(&self, index: usize) -> MixTotals {
        let mut totals = MixTotals {
            tpv: 0.0,
            commission: 0.0,
            clients: 0,
        };
        self.for_each_allocation(index, |_, allocation| {
            totals.tpv += allocation.tpv;
            totals.commission += allocation.commission;
            totals.clients += allocation.clients;
        });
        totals
    }

    /// Materialize candidate `index` as a mix over every offer in `table`.
    pub fn mix_at(&self, table: &OfferTable, index: usize) -> CandidateMix {
        let mut counts = vec![0u32; self.offer_count];
        self.for_each_allocation(index, |tier, allocation| {
            for (&position, &count) in tier.positions.iter().zip(&allocation.counts) {
                counts[position] = count;
            }
        });
        CandidateMix::from_counts(table, &counts)
    }

    fn for_each_allocation<F>(&self, index: usize, mut visit: F)
    where
        F: FnMut(&TierAllocations, &Allocation),
    {
        let mut rest = index;
        for tier in self.tiers.iter().rev() {
            let radix = tier.allocations.len();
            visit(tier, &tier.allocations[rest % radix]);
            rest /= radix;
        }
    }
}

/// All count vectors of length `offers` whose sum is at most `cap`, in lexicographic order.
pub fn tier_allocations(offers: usize, cap: u32) -> Vec<Vec<u32>> {
    let mut out = Vec::new();
    let mut current = Vec::with_capacity(offers);
    extend_allocations(offers, cap, &mut current, &mut out);
    out
}

fn extend_allocations(
    remaining: usize,
    budget: u32,
    current: &mut Vec<u32>,
    out: &mut Vec<Vec<u32>>,
) {
    if remaining == 0 {
        out.push(current.clone());
        return;
    }
    for count in 0..=budget {
        current.push(count);
        extend_allocations(remaining - 1, budget - count, current, out);
        current.pop();
    }
}

/// Number of allocations for `offers` offers sharing `cap`: C(cap + offers, offers).
/// None on `u128` overflow.
pub fn allocation_count(offers: usize, cap: u32) -> Option<u128> {
    let mut count: u128 = 1;
    for k in 1..=offers as u128 {
        count = count.checked_mul(u128::from(cap) + k)? / k;
    }
    Some(count)
}

/// Size of the capped candidate space without building it. None on `u128` overflow.
pub fn candidate_count(table: &OfferTable, caps: &TierCaps) -> Option<u128> {
    Tier::ALL.into_iter().try_fold(1u128, |acc, tier| {
        acc.checked_mul(allocation_count(table.positions_in(tier).len(), caps.get(tier))?)
    })
}

/// Size of the unfiltered per-offer product, `Π (cap + 1)` over offers. Saturates.
pub fn naive_candidate_count(table: &OfferTable, caps: &TierCaps) -> u128 {
    table.offers().iter().fold(1u128, |acc, offer| {
        acc.saturating_mul(u128::from(caps.get(offer.tier)) + 1)
    })
}
