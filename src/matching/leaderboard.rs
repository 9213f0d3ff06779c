use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::types::{RankKey, ValidatedCandidate};

/// How the per-cardinality admission threshold evolves once `limit` entries
/// have been admitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum WatermarkPolicy {
    /// Threshold is the worst key seen while filling the first `limit` slots
    /// and never moves afterwards. The pool may grow past `limit`.
    #[default]
    Conservative,
    /// Every admission past `limit` evicts the current worst, so the pool stays
    /// at `limit` and the threshold is always its maximum.
    Tightening,
}

/// Max-heap adapter so the worst-ranked candidate sits on top.
struct Worst(ValidatedCandidate);

impl PartialEq for Worst {
    fn eq(&self, other: &Self) -> bool {
        self.0.rank() == other.0.rank()
    }
}
impl Eq for Worst {}
impl PartialOrd for Worst {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Worst {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.rank().cmp(&other.0.rank())
    }
}

enum Pool {
    Conservative {
        entries: Vec<ValidatedCandidate>,
        watermark: Option<RankKey>,
    },
    Tightening(BinaryHeap<Worst>),
}

impl Pool {
    fn new(policy: WatermarkPolicy) -> Self {
        match policy {
            WatermarkPolicy::Conservative => Pool::Conservative {
                entries: Vec::new(),
                watermark: None,
            },
            WatermarkPolicy::Tightening => Pool::Tightening(BinaryHeap::new()),
        }
    }

    fn len(&self) -> usize {
        match self {
            Pool::Conservative { entries, .. } => entries.len(),
            Pool::Tightening(heap) => heap.len(),
        }
    }

    fn watermark(&self) -> Option<RankKey> {
        match self {
            Pool::Conservative { watermark, .. } => *watermark,
            Pool::Tightening(heap) => heap.peek().map(|w| w.0.rank()),
        }
    }

    fn admit(&mut self, cand: ValidatedCandidate, limit: usize) -> bool {
        let key = cand.rank();
        match self {
            Pool::Conservative { entries, watermark } => {
                if entries.len() < limit {
                    if watermark.is_none_or(|w| key > w) {
                        *watermark = Some(key);
                    }
                    entries.push(cand);
                    true
                } else if watermark.is_some_and(|w| key < w) {
                    entries.push(cand);
                    true
                } else {
                    false
                }
            }
            Pool::Tightening(heap) => {
                if heap.len() < limit {
                    heap.push(Worst(cand));
                    return true;
                }
                match heap.peek() {
                    Some(top) if key < top.0.rank() => {
                        heap.pop();
                        heap.push(Worst(cand));
                        true
                    }
                    _ => false,
                }
            }
        }
    }

    fn into_sorted(self) -> Vec<ValidatedCandidate> {
        let mut all: Vec<ValidatedCandidate> = match self {
            Pool::Conservative { entries, .. } => entries,
            Pool::Tightening(heap) => heap.into_iter().map(|w| w.0).collect(),
        };
        all.sort_by_key(|c| c.rank());
        all
    }
}

/// Final, ranked results for one basket size.
#[derive(Debug, Clone)]
pub struct Ranking {
    pub cardinality: usize,
    /// Complete candidates offered to this cardinality.
    pub complete: usize,
    /// Pool size before truncation. Never above `limit` under `Tightening`.
    pub retained: usize,
    /// Cheapest first, at most `limit` long.
    pub entries: Vec<ValidatedCandidate>,
}

struct Slot {
    pool: Pool,
    offered: usize,
}

/// Shared result aggregator: one lock-protected pool per cardinality.
pub struct Leaderboard {
    limit: usize,
    policy: WatermarkPolicy,
    tiers: Vec<Mutex<Slot>>,
}

impl Leaderboard {
    /// Pools for cardinalities `1..=max_cardinality`, each ranked to `limit`.
    pub fn new(max_cardinality: usize, limit: usize, policy: WatermarkPolicy) -> Self {
        Self {
            limit: limit.max(1),
            policy,
            tiers: (0..max_cardinality)
                .map(|_| {
                    Mutex::new(Slot {
                        pool: Pool::new(policy),
                        offered: 0,
                    })
                })
                .collect(),
        }
    }

    fn tier(&self, cardinality: usize) -> Option<MutexGuard<'_, Slot>> {
        let slot = self.tiers.get(cardinality.checked_sub(1)?)?;
        Some(slot.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn policy(&self) -> WatermarkPolicy {
        self.policy
    }

    /// Offer a candidate under its cardinality's watermark. Check and insert
    /// happen under the same lock.
    pub fn admit(&self, cand: ValidatedCandidate) -> bool {
        match self.tier(cand.cardinality) {
            Some(mut slot) => {
                slot.offered += 1;
                slot.pool.admit(cand, self.limit)
            }
            None => false,
        }
    }

    /// Complete candidates offered so far, admitted or not.
    pub fn offered(&self, cardinality: usize) -> usize {
        self.tier(cardinality).map_or(0, |s| s.offered)
    }

    pub fn retained(&self, cardinality: usize) -> usize {
        self.tier(cardinality).map_or(0, |s| s.pool.len())
    }

    pub fn watermark(&self, cardinality: usize) -> Option<RankKey> {
        self.tier(cardinality).and_then(|s| s.pool.watermark())
    }

    /// Sort each pool by rank and keep the best `limit`.
    pub fn into_rankings(self) -> Vec<Ranking> {
        let limit = self.limit;
        self.tiers
            .into_iter()
            .enumerate()
            .map(|(i, slot)| {
                let Slot { pool, offered } =
                    slot.into_inner().unwrap_or_else(PoisonError::into_inner);
                let retained = pool.len();
                let mut entries = pool.into_sorted();
                entries.truncate(limit);
                Ranking {
                    cardinality: i + 1,
                    complete: offered,
                    retained,
                    entries,
                }
            })
            .collect()
    }
}
