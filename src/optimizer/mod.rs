pub mod mix_generator;
pub mod ranking;

use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::commission::{finalize, OfferTable, Tier};
use crate::optimizer::mix_generator::{candidate_count, naive_candidate_count, MixSpace};
use crate::parallel::{batch_ranges, split_range, Interruption, SearchBudget, WorkerPool};

pub use ranking::{rank_scenarios, RankingStrategy, ScenarioResult};

/// Number of progress-reporting batches per search.
const PROGRESS_BATCH_COUNT: usize = 40;

/// Candidates a worker evaluates between budget checks.
pub const CANCEL_CHECK_INTERVAL: usize = 4096;

/// Maximum client count per tier. Every offer in a tier may use the full cap on its own,
/// but the tier's offers together may not exceed it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierCaps {
    #[serde(rename = "10k", default)]
    pub t1: u32,
    #[serde(rename = "30k", default)]
    pub t2: u32,
    #[serde(rename = "50k", default)]
    pub t3: u32,
    #[serde(rename = "100k", default)]
    pub t4: u32,
}

impl TierCaps {
    /// Caps pre-filled in the simulator form.
    pub const FORM_DEFAULTS: TierCaps = TierCaps::new(3, 3, 2, 1);
    /// Largest caps the presentation layers accept by default.
    pub const DEFAULT_LIMITS: TierCaps = TierCaps::new(10, 10, 5, 5);

    pub const fn new(t1: u32, t2: u32, t3: u32, t4: u32) -> Self {
        Self { t1, t2, t3, t4 }
    }

    pub fn get(&self, tier: Tier) -> u32 {
        match tier {
            Tier::T1 => self.t1,
            Tier::T2 => self.t2,
            Tier::T3 => self.t3,
            Tier::T4 => self.t4,
        }
    }

    pub fn set(&mut self, tier: Tier, cap: u32) {
        match tier {
            Tier::T1 => self.t1 = cap,
            Tier::T2 => self.t2 = cap,
            Tier::T3 => self.t3 = cap,
            Tier::T4 => self.t4 = cap,
        }
    }

    /// Tiers whose cap is above `limits`, as `(tier, cap, limit)`.
    pub fn exceeding(&self, limits: &TierCaps) -> Vec<(Tier, u32, u32)> {
        Tier::ALL
            .into_iter()
            .filter(|&tier| self.get(tier) > limits.get(tier))
            .map(|tier| (tier, self.get(tier), limits.get(tier)))
            .collect()
    }

    /// Each cap lowered to its limit where it is above it.
    pub fn clamped_to(&self, limits: &TierCaps) -> TierCaps {
        let mut clamped = *self;
        for tier in Tier::ALL {
            clamped.set(tier, self.get(tier).min(limits.get(tier)));
        }
        clamped
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchParameters {
    /// Monthly TPV goal; 0 disables the attainment multiplier.
    pub goal_tpv: f64,
    /// Minimum final commission a scenario must reach.
    pub goal_commission: f64,
    pub caps: TierCaps,
    #[serde(default)]
    pub strategy: RankingStrategy,
}

impl SearchParameters {
    pub fn validate(&self) -> Result<(), SearchError> {
        if !self.goal_commission.is_finite() || self.goal_commission <= 0.0 {
            return Err(SearchError::InvalidParameters(format!(
                "goal_commission must be a positive number, got {}",
                self.goal_commission
            )));
        }
        if !self.goal_tpv.is_finite() || self.goal_tpv < 0.0 {
            return Err(SearchError::InvalidParameters(format!(
                "goal_tpv must be zero or a positive number, got {}",
                self.goal_tpv
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SearchError {
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
    #[error("candidate space is too large to enumerate; lower the tier caps")]
    SearchSpaceTooLarge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStatus {
    Complete,
    Cancelled,
    TimedOut,
}

impl From<Interruption> for SearchStatus {
    fn from(interruption: Interruption) -> Self {
        match interruption {
            Interruption::Cancelled => Self::Cancelled,
            Interruption::DeadlineExceeded => Self::TimedOut,
        }
    }
}

/// Ranked survivors plus how much of the candidate space was covered.
/// When `status` is not `Complete`, `scenarios` holds what was found so far, already ranked.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchOutcome {
    pub scenarios: Vec<ScenarioResult>,
    pub status: SearchStatus,
    pub evaluated: usize,
    pub total_candidates: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CandidateEstimate {
    /// Size of the capped candidate space; None when it overflows `u128`.
    pub candidates: Option<u128>,
    /// Size of the unfiltered per-offer product (saturating).
    pub naive_candidates: u128,
}

pub fn estimate_candidates(table: &OfferTable, caps: &TierCaps) -> CandidateEstimate {
    CandidateEstimate {
        candidates: candidate_count(table, caps),
        naive_candidates: naive_candidate_count(table, caps),
    }
}

/// Run a search to completion and return every qualifying scenario, best first.
pub fn search(
    table: &OfferTable,
    params: &SearchParameters,
) -> Result<Vec<ScenarioResult>, SearchError> {
    search_with_budget(table, params, &SearchBudget::unlimited(), |_, _| {})
        .map(|outcome| outcome.scenarios)
}

/// Like [search_with_budget] but on a pool with a fixed worker count.
pub fn search_on_pool(
    pool: &WorkerPool,
    table: &OfferTable,
    params: &SearchParameters,
    budget: &SearchBudget,
) -> Result<SearchOutcome, SearchError> {
    pool.install(|| search_with_budget(table, params, budget, |_, _| {}))
}

/// Search in progress batches, calling `on_progress(done, total)` after each one and
/// stopping early when `budget` runs out.
pub fn search_with_budget<F>(
    table: &OfferTable,
    params: &SearchParameters,
    budget: &SearchBudget,
    mut on_progress: F,
) -> Result<SearchOutcome, SearchError>
where
    F: FnMut(usize, usize),
{
    params.validate()?;
    let space = MixSpace::new(table, &params.caps).ok_or(SearchError::SearchSpaceTooLarge)?;
    let total = space.len();
    let workers = rayon::current_num_threads();
    debug!(
        candidates = total,
        workers,
        strategy = ?params.strategy,
        "starting scenario search"
    );

    let started = Instant::now();
    // Report total immediately so callers can show "0 / total" while the first batch runs.
    on_progress(0, total);

    let mut scenarios = Vec::new();
    let mut evaluated = 0usize;
    let mut status = SearchStatus::Complete;

    for (start, end) in batch_ranges(total, PROGRESS_BATCH_COUNT) {
        let scans: Vec<RangeScan> = split_range(start, end, workers)
            .into_par_iter()
            .map(|(lo, hi)| scan_range(table, &space, params, budget, lo, hi))
            .collect();

        for scan in scans {
            evaluated += scan.evaluated;
            scenarios.extend(scan.survivors);
            if let (SearchStatus::Complete, Some(interruption)) = (status, scan.interrupted) {
                status = interruption.into();
            }
        }
        on_progress(evaluated, total);
        if status != SearchStatus::Complete {
            warn!(?status, evaluated, total, "scenario search stopped early");
            break;
        }
    }

    rank_scenarios(&mut scenarios, params.strategy);
    info!(
        candidates = total,
        evaluated,
        qualifying = scenarios.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "scenario search finished"
    );

    Ok(SearchOutcome {
        scenarios,
        status,
        evaluated,
        total_candidates: total,
    })
}

struct RangeScan {
    survivors: Vec<ScenarioResult>,
    evaluated: usize,
    interrupted: Option<Interruption>,
}

fn scan_range(
    table: &OfferTable,
    space: &MixSpace,
    params: &SearchParameters,
    budget: &SearchBudget,
    start: usize,
    end: usize,
) -> RangeScan {
    let mut survivors = Vec::new();
    for index in start..end {
        let done = index - start;
        if done % CANCEL_CHECK_INTERVAL == 0 {
            if let Some(interruption) = budget.check() {
                return RangeScan {
                    survivors,
                    evaluated: done,
                    interrupted: Some(interruption),
                };
            }
        }

        let totals = space.totals_at(index);
        let evaluation = finalize(totals.tpv, totals.commission, params.goal_tpv);
        if evaluation.final_commission >= params.goal_commission
            && evaluation.final_commission > 0.0
        {
            survivors.push(ScenarioResult {
                mix: space.mix_at(table, index),
                total_tpv: evaluation.total_tpv,
                gross_commission: evaluation.gross_commission,
                final_commission: evaluation.final_commission,
                multiplier: evaluation.multiplier,
                total_clients: totals.clients,
            });
        }
    }
    RangeScan {
        survivors,
        evaluated: end - start,
        interrupted: None,
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;
    use crate::commission::{Aggressiveness, Offer, OfferKey};
    use crate::parallel::CancelToken;

    fn two_offer_t1_table() -> OfferTable {
        OfferTable::from_offers(vec![
            Offer::new(Tier::T1, Aggressiveness::High, 90.0, 10_000.0),
            Offer::new(Tier::T1, Aggressiveness::Low, 50.0, 10_000.0),
        ])
        .expect("valid table")
    }

    fn params(goal_tpv: f64, goal_commission: f64, caps: TierCaps) -> SearchParameters {
        SearchParameters {
            goal_tpv,
            goal_commission,
            caps,
            strategy: RankingStrategy::MinimizeTpv,
        }
    }

    #[test]
    fn small_table_keeps_only_mixes_meeting_goal() {
        let table = two_offer_t1_table();
        let results = search(&table, &params(0.0, 100.0, TierCaps::new(3, 0, 0, 0)))
            .expect("search should run");

        let high = OfferKey::new(Tier::T1, Aggressiveness::High);
        let low = OfferKey::new(Tier::T1, Aggressiveness::Low);
        let shapes: Vec<(u32, u32)> = results
            .iter()
            .map(|r| (r.mix.count_of(high), r.mix.count_of(low)))
            .collect();

        assert_eq!(
            shapes,
            vec![(0, 2), (1, 1), (2, 0), (0, 3), (1, 2), (2, 1), (3, 0)]
        );
        assert!(shapes.contains(&(2, 0)));
        assert!(!shapes.contains(&(0, 1)));
        assert!(!shapes.contains(&(1, 0)));

        let best = &results[0];
        assert_eq!(best.final_commission, 100.0);
        assert_eq!(best.total_tpv, 20_000.0);
        assert_eq!(best.multiplier, 1.0);
    }

    #[test]
    fn zero_caps_return_nothing() {
        let results = search(
            &OfferTable::reference(),
            &params(300_000.0, 1.0, TierCaps::default()),
        )
        .expect("search should run");
        assert!(results.is_empty());
    }

    #[test]
    fn unreachable_goal_is_empty_not_an_error() {
        let results = search(
            &OfferTable::reference(),
            &params(300_000.0, 10_000_000.0, TierCaps::FORM_DEFAULTS),
        )
        .expect("search should run");
        assert!(results.is_empty());
    }

    #[test]
    fn invalid_goals_are_rejected_before_search() {
        let table = OfferTable::reference();
        for (goal_tpv, goal_commission) in [
            (300_000.0, 0.0),
            (300_000.0, -5.0),
            (300_000.0, f64::NAN),
            (-1.0, 500.0),
            (f64::INFINITY, 500.0),
        ] {
            let err = search(&table, &params(goal_tpv, goal_commission, TierCaps::FORM_DEFAULTS))
                .expect_err("invalid goals must be rejected");
            assert!(matches!(err, SearchError::InvalidParameters(_)), "{err}");
        }
    }

    #[test]
    fn oversized_caps_are_rejected() {
        let err = search(
            &OfferTable::reference(),
            &params(1.0, 1.0, TierCaps::new(5_000, 5_000, 5_000, 5_000)),
        )
        .expect_err("space too large");
        assert_eq!(err, SearchError::SearchSpaceTooLarge);
    }

    #[test]
    fn results_meet_goal_and_caps() {
        let caps = TierCaps::new(4, 3, 2, 2);
        let search_params = params(300_000.0, 1_500.0, caps);
        let results = search(&OfferTable::reference(), &search_params).expect("search should run");
        assert!(!results.is_empty());
        for result in &results {
            assert!(result.final_commission >= 1_500.0);
            assert!(result.mix.within_caps(&caps));
            assert_eq!(result.total_clients, result.mix.total_clients());
        }
    }

    #[test]
    fn progress_reaches_total() {
        let mut reports = Vec::new();
        let outcome = search_with_budget(
            &OfferTable::reference(),
            &params(300_000.0, 1_000.0, TierCaps::FORM_DEFAULTS),
            &SearchBudget::unlimited(),
            |done, total| reports.push((done, total)),
        )
        .expect("search should run");

        assert_eq!(outcome.status, SearchStatus::Complete);
        assert_eq!(outcome.evaluated, outcome.total_candidates);
        assert_eq!(reports.first(), Some(&(0, outcome.total_candidates)));
        assert_eq!(
            reports.last(),
            Some(&(outcome.total_candidates, outcome.total_candidates))
        );
        assert!(reports.windows(2).all(|pair| pair[0].0 <= pair[1].0));
    }

    #[test]
    fn cancelled_search_reports_cancellation() {
        let token = CancelToken::new();
        token.cancel();
        let outcome = search_with_budget(
            &OfferTable::reference(),
            &params(300_000.0, 100.0, TierCaps::DEFAULT_LIMITS),
            &SearchBudget::unlimited().with_token(token),
            |_, _| {},
        )
        .expect("cancellation is not an error");

        assert_eq!(outcome.status, SearchStatus::Cancelled);
        assert_eq!(outcome.evaluated, 0);
        assert!(outcome.scenarios.is_empty());
        assert!(outcome.total_candidates > 0);
    }

    #[test]
    fn cancelling_mid_search_keeps_ranked_survivors() {
        let token = CancelToken::new();
        let budget = SearchBudget::unlimited().with_token(token.clone());
        let search_params = SearchParameters {
            strategy: RankingStrategy::MinimizeClientCount,
            ..params(300_000.0, 1_000.0, TierCaps::DEFAULT_LIMITS)
        };
        let outcome = search_with_budget(
            &OfferTable::reference(),
            &search_params,
            &budget,
            |done, _| {
                if done > 0 {
                    token.cancel();
                }
            },
        )
        .expect("cancellation is not an error");

        assert_eq!(outcome.status, SearchStatus::Cancelled);
        assert!(outcome.evaluated > 0);
        assert!(outcome.evaluated < outcome.total_candidates);
        assert!(!outcome.scenarios.is_empty());
        for pair in outcome.scenarios.windows(2) {
            assert_ne!(
                search_params.strategy.compare(&pair[0], &pair[1]),
                std::cmp::Ordering::Greater
            );
            assert!(pair[0].final_commission >= 1_000.0);
        }
    }

    #[test]
    fn expired_deadline_reports_timeout() {
        let outcome = search_with_budget(
            &OfferTable::reference(),
            &params(300_000.0, 100.0, TierCaps::DEFAULT_LIMITS),
            &SearchBudget::unlimited().with_deadline(Instant::now()),
            |_, _| {},
        )
        .expect("timeout is not an error");
        assert_eq!(outcome.status, SearchStatus::TimedOut);
        assert!(outcome.evaluated < outcome.total_candidates);
    }

    #[test]
    fn generous_deadline_completes() {
        let outcome = search_with_budget(
            &OfferTable::reference(),
            &params(300_000.0, 1_000.0, TierCaps::FORM_DEFAULTS),
            &SearchBudget::unlimited().with_timeout(Duration::from_secs(600)),
            |_, _| {},
        )
        .expect("search should run");
        assert_eq!(outcome.status, SearchStatus::Complete);
    }

    #[test]
    fn pool_size_does_not_change_results() {
        let table = OfferTable::reference();
        let search_params = SearchParameters {
            strategy: RankingStrategy::MinimizeClientCount,
            ..params(300_000.0, 1_200.0, TierCaps::new(5, 4, 3, 2))
        };
        let single = search_on_pool(
            &WorkerPool::with_workers(1),
            &table,
            &search_params,
            &SearchBudget::unlimited(),
        )
        .expect("search should run");
        let many = search_on_pool(
            &WorkerPool::with_workers(4),
            &table,
            &search_params,
            &SearchBudget::unlimited(),
        )
        .expect("search should run");
        assert_eq!(single.scenarios, many.scenarios);
    }

    #[test]
    fn caps_above_limits_are_listed() {
        let caps = TierCaps::new(11, 10, 6, 5);
        assert_eq!(
            caps.exceeding(&TierCaps::DEFAULT_LIMITS),
            vec![(Tier::T1, 11, 10), (Tier::T3, 6, 5)]
        );
    }

    #[test]
    fn clamping_lowers_only_caps_above_limits() {
        let limits = TierCaps::new(20, 0, 1, 5);
        let clamped = TierCaps::FORM_DEFAULTS.clamped_to(&limits);
        assert_eq!(clamped, TierCaps::new(3, 0, 1, 1));
        assert!(clamped.exceeding(&limits).is_empty());
    }

    #[test]
    fn estimate_compares_capped_and_naive_spaces() {
        let estimate = estimate_candidates(&OfferTable::reference(), &TierCaps::FORM_DEFAULTS);
        // 10 × 10 × 6 × 3 capped mixes vs 4⁴ × 3² × 2² per-offer combinations.
        assert_eq!(estimate.candidates, Some(1_800));
        assert_eq!(estimate.naive_candidates, 9_216);
    }
}
