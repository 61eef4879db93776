//! Approximate high-percentile estimation.
//!
//! Keeps the largest `ceil((1 - p) * n)` delays in a bounded min-heap; the
//! smallest of those is the estimate. No interpolation is done, so callers
//! should treat the value as an approximation of the true rank statistic.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::Duration;

/// Percentile reported for every window.
pub const REPORTED_PERCENTILE: f64 = 0.9;

/// Slack for float error in `(1 - p) * n`, e.g. `(1 - 0.9) * 100`.
const RANK_EPSILON: f64 = 1e-9;

/// Number of top samples kept for a percentile over `len` samples.
pub fn top_k_size(len: usize, p: f64) -> usize {
    if len == 0 {
        return 0;
    }
    let tail = (1.0 - p.clamp(0.0, 1.0)) * len as f64;
    let k = (tail - RANK_EPSILON).ceil().max(1.0) as usize;
    k.min(len)
}

/// Estimate the `p` percentile (a fraction, e.g. 0.9) of `delays`.
///
/// Returns `None` when there are no samples.
pub fn estimate_high_percentile<I>(mut delays: I, p: f64) -> Option<Duration>
where
    I: ExactSizeIterator<Item = Duration>,
{
    let k = top_k_size(delays.len(), p);
    if k == 0 {
        return None;
    }

    let mut heap: BinaryHeap<Reverse<Duration>> = BinaryHeap::with_capacity(k);
    heap.extend(delays.by_ref().take(k).map(Reverse));

    for delay in delays {
        // Overwriting through PeekMut re-sifts on drop: pop-min then push.
        if let Some(mut smallest) = heap.peek_mut() {
            if delay > smallest.0 {
                *smallest = Reverse(delay);
            }
        }
    }

    heap.peek().map(|Reverse(d)| *d)
}
