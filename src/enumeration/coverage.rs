// src/enumeration/coverage.rs

use smallvec::SmallVec;

use crate::catalog::{ItemIdx, Lot, LotIdx};

const WORD_BITS: usize = 64;

#[inline(always)]
fn words_for(len: usize) -> usize {
    len.div_ceil(WORD_BITS)
}

/// Mask of the valid bits in the last word of a `len`-bit set.
#[inline(always)]
fn tail_mask(len: usize) -> u64 {
    match len % WORD_BITS {
        0 => u64::MAX,
        r => (1u64 << r) - 1,
    }
}

/// One bit per wanted item, in catalog order. Bit `i` is set iff the owner
/// offers at least one lot of item `i`; it says nothing about quantity.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CoverageSet {
    words: SmallVec<[u64; 4]>,
    len: usize,
}

impl CoverageSet {
    pub fn empty(len: usize) -> Self {
        Self {
            words: SmallVec::from_elem(0, words_for(len)),
            len,
        }
    }

    /// Coverage of a seller from the lots it owns.
    pub fn from_lots(n_items: usize, owned: &[LotIdx], lots: &[Lot]) -> Self {
        let mut set = Self::empty(n_items);
        for &l in owned {
            set.insert(lots[l].item);
        }
        set
    }

    /// Number of items in the universe (not the number set).
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Out-of-universe items are ignored.
    #[inline]
    pub fn insert(&mut self, item: ItemIdx) {
        if item < self.len {
            self.words[item / WORD_BITS] |= 1u64 << (item % WORD_BITS);
        }
    }

    #[inline]
    pub fn contains(&self, item: ItemIdx) -> bool {
        item < self.len && (self.words[item / WORD_BITS] >> (item % WORD_BITS)) & 1 == 1
    }

    #[inline]
    pub fn clear(&mut self) {
        self.words.iter_mut().for_each(|w| *w = 0);
    }

    /// In-place OR. Both sets must share the same universe.
    #[inline]
    pub fn union_with(&mut self, other: &CoverageSet) {
        debug_assert_eq!(self.len, other.len);
        for (dst, src) in self.words.iter_mut().zip(other.words.iter()) {
            *dst |= *src;
        }
    }

    /// Population count, ignoring any bits above `len`.
    pub fn count(&self) -> usize {
        let Some((last, head)) = self.words.split_last() else {
            return 0;
        };
        let head: u32 = head.iter().map(|w| w.count_ones()).sum();
        (head + (last & tail_mask(self.len)).count_ones()) as usize
    }

    /// Every item of the universe is covered.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.count() == self.len
    }

    /// Items not covered, ascending.
    pub fn missing(&self) -> impl Iterator<Item = ItemIdx> + '_ {
        (0..self.len).filter(|&i| !self.contains(i))
    }
}
