use indicatif::{ProgressBar, ProgressStyle};
use itertools::Itertools;
use std::time::Instant;
use tracing::info;

use crate::catalog::{Catalog, SellerIdx};
use crate::matching::channel::WorkChannel;
use crate::matching::types::{Combination, SellerSet};
use crate::runtime;

pub mod coverage;
use coverage::CoverageSet;

// -------------------------------------------------------------------------------------
// Tunables
// -------------------------------------------------------------------------------------

/// Combinations between progress-bar refreshes.
const PROGRESS_STRIDE: u64 = 1 << 12;

/// What the generator saw for one basket size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TierCounts {
    pub cardinality: usize,
    /// Every combination enumerated.
    pub considered: u64,
    /// Combinations that passed the coverage prefilter.
    pub admissible: u64,
}

/// C(n, k), saturating at `u64::MAX`.
pub fn binomial(n: usize, k: usize) -> u64 {
    if k > n {
        return 0;
    }
    let k = k.min(n - k) as u128;
    let n = n as u128;
    let mut acc: u128 = 1;
    for i in 0..k {
        acc = acc * (n - i) / (i + 1);
        if acc > u64::MAX as u128 {
            return u64::MAX;
        }
    }
    acc as u64
}

/// Coverage prefilter: the members together offer every wanted item at least
/// once. Necessary, not sufficient, for a complete basket.
#[inline]
pub fn is_admissible(catalog: &Catalog, members: &[SellerIdx], scratch: &mut CoverageSet) -> bool {
    scratch.clear();
    for &s in members {
        scratch.union_with(&catalog.sellers()[s].coverage);
    }
    scratch.count() == catalog.n_items()
}

fn tier_progress(total: u64, k: usize, show: bool) -> ProgressBar {
    if !show {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::with_template("[{elapsed_precise}] {bar:40} {pos}/{len} baskets {msg}")
        .map(|s| s.progress_chars("=>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb.set_message(format!("k={k}"));
    pb
}

/// Walk every seller combination of size `1..=max_sellers` in lexicographic
/// order and hand the admissible ones to `emit`. Stops early if `emit`
/// returns `false`.
pub fn enumerate_admissible<F>(
    catalog: &Catalog,
    max_sellers: usize,
    progress: bool,
    mut emit: F,
) -> Vec<TierCounts>
where
    F: FnMut(Combination) -> bool,
{
    let n = catalog.n_sellers();
    let mem_budget = runtime::memory_budget_bytes();
    let mut scratch = CoverageSet::empty(catalog.n_items());
    let mut tiers = Vec::with_capacity(max_sellers);

    'tiers: for k in 1..=max_sellers {
        let total = binomial(n, k);
        info!(cardinality = k, combinations = total, "searching");
        let pb = tier_progress(total, k, progress);
        let t0 = Instant::now();

        let mut counts = TierCounts {
            cardinality: k,
            ..TierCounts::default()
        };
        let mut stopped = false;
        for (sequence, members) in (0..n).combinations(k).enumerate() {
            counts.considered += 1;
            if counts.considered % PROGRESS_STRIDE == 0 {
                pb.set_position(counts.considered);
            }
            if !is_admissible(catalog, &members, &mut scratch) {
                continue;
            }
            counts.admissible += 1;
            let combo = Combination {
                cardinality: k,
                sequence: sequence as u64,
                sellers: SellerSet::from_vec(members),
            };
            if !emit(combo) {
                stopped = true;
                break;
            }
        }
        pb.set_position(counts.considered);
        pb.finish_and_clear();

        info!(
            cardinality = k,
            considered = counts.considered,
            admissible = counts.admissible,
            secs = t0.elapsed().as_secs_f64(),
            "enumerated"
        );
        runtime::report_memory(k, mem_budget);
        tiers.push(counts);
        if stopped {
            break 'tiers;
        }
    }
    tiers
}

/// Producer side of a search: push admissible combinations (blocking while
/// the channel is full), then shut the channel down, even on panic.
pub fn feed_channel(
    catalog: &Catalog,
    max_sellers: usize,
    progress: bool,
    channel: &WorkChannel<Combination>,
) -> Vec<TierCounts> {
    let _close = channel.shutdown_guard();
    enumerate_admissible(catalog, max_sellers, progress, |c| channel.push(c).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogBuilder, Condition, ItemKey, RequiredItem};

    /// Three items; S0 offers {0}, S1 offers {1, 2}, S2 offers {0, 1}, S3 offers {2}.
    fn catalog() -> Catalog {
        let mut b = CatalogBuilder::new();
        for p in ["A", "B", "C"] {
            b.add_item(RequiredItem::new(ItemKey::new(p, "0"), 1)).unwrap();
        }
        let offers: [&[usize]; 4] = [&[0], &[1, 2], &[0, 1], &[2]];
        for (s, items) in offers.iter().enumerate() {
            let store = b.add_seller(&format!("S{s}"), &format!("s{s}"));
            for &i in *items {
                b.add_lot(store, i, 1.0, 1, Condition::New).unwrap();
            }
        }
        b.build(1)
    }

    #[test]
    fn binomial_values() {
        assert_eq!(binomial(5, 0), 1);
        assert_eq!(binomial(5, 2), 10);
        assert_eq!(binomial(3, 4), 0);
        assert_eq!(binomial(60, 30), 118_264_581_564_861_424);
        assert_eq!(binomial(200, 100), u64::MAX);
    }

    #[test]
    fn prefilter_keeps_only_covering_combinations() {
        let cat = catalog();
        let mut seen = Vec::new();
        let tiers = enumerate_admissible(&cat, 2, false, |c| {
            seen.push((c.cardinality, c.sequence, c.sellers.to_vec()));
            true
        });
        assert_eq!(
            tiers,
            vec![
                TierCounts { cardinality: 1, considered: 4, admissible: 0 },
                TierCounts { cardinality: 2, considered: 6, admissible: 3 },
            ]
        );
        // lexicographic pairs: 01 02 03 12 13 23
        assert_eq!(
            seen,
            vec![(2, 0, vec![0, 1]), (2, 3, vec![1, 2]), (2, 5, vec![2, 3])]
        );
    }

    #[test]
    fn cardinality_beyond_seller_count_is_empty() {
        let cat = catalog();
        let tiers = enumerate_admissible(&cat, 6, false, |_| true);
        assert_eq!(tiers.len(), 6);
        assert_eq!(tiers[4].considered, 0);
        assert_eq!(tiers[3].considered, 1);
        assert_eq!(tiers[3].admissible, 1);
    }

    #[test]
    fn emit_refusal_stops_enumeration() {
        let cat = catalog();
        let mut n = 0;
        let tiers = enumerate_admissible(&cat, 3, false, |_| {
            n += 1;
            false
        });
        assert_eq!(n, 1);
        assert_eq!(tiers.len(), 2);
    }

    #[test]
    fn feed_channel_shuts_down_after_last_push() {
        let cat = catalog();
        let ch = WorkChannel::bounded(16);
        let tiers = feed_channel(&cat, 3, false, &ch);
        assert!(ch.is_shutdown());
        let queued: u64 = tiers.iter().map(|t| t.admissible).sum();
        let mut drained = 0;
        while ch.pop().is_some() {
            drained += 1;
        }
        assert_eq!(drained, queued);
    }
}
