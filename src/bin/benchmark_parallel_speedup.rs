//! Run the widest default search once on a single worker and once on all cores,
//! then print timings and speedup.
//!
//! Usage: cargo run --release --bin benchmark_parallel_speedup

use std::time::Instant;

use tiermix::commission::OfferTable;
use tiermix::optimizer::{search_on_pool, RankingStrategy, SearchParameters, TierCaps};
use tiermix::parallel::{SearchBudget, WorkerPool};

fn main() {
    let table = OfferTable::reference();
    let params = SearchParameters {
        goal_tpv: 300_000.0,
        goal_commission: 2_000.0,
        caps: TierCaps::DEFAULT_LIMITS,
        strategy: RankingStrategy::MinimizeTpv,
    };
    let budget = SearchBudget::unlimited();

    let timed = |pool: WorkerPool| {
        let t0 = Instant::now();
        let outcome = search_on_pool(&pool, &table, &params, &budget);
        (outcome, t0.elapsed())
    };

    let (single, elapsed_single) = timed(WorkerPool::with_workers(1));
    let (parallel, elapsed_parallel) = timed(WorkerPool::default());
    let (single, parallel) = match (single, parallel) {
        (Ok(single), Ok(parallel)) => (single, parallel),
        (Err(err), _) | (_, Err(err)) => {
            eprintln!("search failed: {err}");
            std::process::exit(1);
        }
    };

    let candidates = single.total_candidates as f64;
    println!(
        "Search: {} candidates, {} qualifying (caps 10/10/5/5)",
        single.total_candidates,
        single.scenarios.len()
    );
    println!();
    println!(
        "1 worker:    {:.2} ms  ({:.0} candidates/s)",
        elapsed_single.as_secs_f64() * 1000.0,
        candidates / elapsed_single.as_secs_f64()
    );
    println!(
        "{} workers:  {:.2} ms  ({:.0} candidates/s)",
        WorkerPool::default().effective_workers(),
        elapsed_parallel.as_secs_f64() * 1000.0,
        candidates / elapsed_parallel.as_secs_f64()
    );
    println!();
    println!(
        "Speedup:     {:.2}x",
        elapsed_single.as_secs_f64() / elapsed_parallel.as_secs_f64()
    );

    if single.scenarios != parallel.scenarios {
        eprintln!("single-worker and parallel rankings differ");
        std::process::exit(1);
    }
    println!("(Rankings match)");
}
