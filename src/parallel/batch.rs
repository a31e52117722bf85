//! Split a candidate index space into contiguous ranges.
//!
//! The search uses these twice: once for progress batches, and once inside each
//! batch to hand one range to each rayon worker.

/// Split `total` items into up to `num_batches` half-open ranges `[start, end)`.
/// Sizes differ by at most one; the larger ranges come first.
///
/// # Example
/// ```
/// # use tiermix::parallel::batch_ranges;
/// let ranges = batch_ranges(10, 3);
/// assert_eq!(ranges, vec![(0, 4), (4, 7), (7, 10)]);
/// ```
pub fn batch_ranges(total: usize, num_batches: usize) -> Vec<(usize, usize)> {
    if total == 0 || num_batches == 0 {
        return Vec::new();
    }
    let num_batches = num_batches.min(total);
    let base = total / num_batches;
    let remainder = total % num_batches;
    let mut start = 0;
    (0..num_batches)
        .map(|i| {
            let end = start + base + usize::from(i < remainder);
            let range = (start, end);
            start = end;
            range
        })
        .collect()
}

/// Split the sub-range `[start, end)` the same way, returning absolute indices.
pub fn split_range(start: usize, end: usize, parts: usize) -> Vec<(usize, usize)> {
    batch_ranges(end.saturating_sub(start), parts)
        .into_iter()
        .map(|(lo, hi)| (start + lo, start + hi))
        .collect()
}
