use smallvec::SmallVec;
use std::cmp::Ordering;

use crate::catalog::{ItemIdx, LotIdx, SellerIdx};

/// Seller indices of one basket, strictly increasing.
pub type SellerSet = SmallVec<[SellerIdx; 8]>;

/// A basket of sellers queued for exact evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Combination {
    pub cardinality: usize,
    /// Position within the lexicographic enumeration of this cardinality,
    /// counting rejected combinations too.
    pub sequence: u64,
    pub sellers: SellerSet,
}

/// Units taken from one lot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Allocation {
    pub lot: LotIdx,
    pub item: ItemIdx,
    pub seller: SellerIdx,
    pub unit_price: f64,
    pub quantity: u32,
}

impl Allocation {
    #[inline]
    pub fn cost(&self) -> f64 {
        self.unit_price * self.quantity as f64
    }
}

/// What one seller contributes to a basket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SellerSubtotal {
    pub seller: SellerIdx,
    pub cost: f64,
    /// Units bought from this seller.
    pub items: u32,
    /// Distinct lots bought from this seller.
    pub lots: u32,
}

/// A basket that satisfies every wanted item, with its cheapest allocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedCandidate {
    pub cardinality: usize,
    pub sequence: u64,
    pub sellers: SellerSet,
    pub cost: f64,
    /// One entry per member seller, in member order.
    pub subtotals: Vec<SellerSubtotal>,
    /// Grouped by item in catalog order, cheapest lot first within an item.
    pub allocations: Vec<Allocation>,
}

impl ValidatedCandidate {
    #[inline]
    pub fn rank(&self) -> RankKey {
        RankKey {
            cost: self.cost,
            sequence: self.sequence,
        }
    }
}

/// Leaderboard ordering: cheaper first, then earlier in the enumeration.
#[derive(Debug, Clone, Copy)]
pub struct RankKey {
    pub cost: f64,
    pub sequence: u64,
}

impl PartialEq for RankKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for RankKey {}

impl PartialOrd for RankKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RankKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cost
            .total_cmp(&other.cost)
            .then(self.sequence.cmp(&other.sequence))
    }
}

/// Outcome of evaluating one combination.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    Complete(ValidatedCandidate),
    /// `item` could not be filled; `short` units were missing.
    Incomplete { item: ItemIdx, short: u32 },
}

impl Evaluation {
    pub fn is_complete(&self) -> bool {
        matches!(self, Evaluation::Complete(_))
    }

    pub fn into_candidate(self) -> Option<ValidatedCandidate> {
        match self {
            Evaluation::Complete(c) => Some(c),
            Evaluation::Incomplete { .. } => None,
        }
    }
}
