use crate::catalog::{Catalog, LotIdx};
use crate::error::EvalError;

use super::types::{Allocation, Combination, Evaluation, SellerSubtotal, ValidatedCandidate};

/// Exact feasibility check and costing for one combination at a time.
///
/// Holds per-worker scratch (lots grouped by item, supplied quantity per item)
/// that is reset, never reallocated, between combinations. The catalog itself
/// is only read.
pub struct Evaluator<'a> {
    catalog: &'a Catalog,
    by_item: Vec<Vec<LotIdx>>,
    supplied: Vec<u64>,
}

impl<'a> Evaluator<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self {
            catalog,
            by_item: vec![Vec::new(); catalog.n_items()],
            supplied: vec![0; catalog.n_items()],
        }
    }

    pub fn evaluate(&mut self, combo: &Combination) -> Result<Evaluation, EvalError> {
        let cat = self.catalog;
        let lots = cat.lots();

        for bucket in &mut self.by_item {
            bucket.clear();
        }
        self.supplied.fill(0);

        // gather member lots per item, in member order then listing order
        for &s in &combo.sellers {
            let seller = cat.sellers().get(s).ok_or(EvalError::UnknownSeller(s))?;
            for &l in &seller.lots {
                let lot = &lots[l];
                self.by_item[lot.item].push(l);
                self.supplied[lot.item] += lot.quantity as u64;
            }
        }

        for (i, item) in cat.items().iter().enumerate() {
            let have = self.supplied[i];
            if have < item.quantity as u64 {
                return Ok(Evaluation::Incomplete {
                    item: i,
                    short: item.quantity - have as u32,
                });
            }
        }

        // cheapest units first; sort_by is stable so equal prices keep gather order
        let mut allocations: Vec<Allocation> = Vec::new();
        for (i, item) in cat.items().iter().enumerate() {
            let bucket = &mut self.by_item[i];
            bucket.sort_by(|&a, &b| lots[a].unit_price.total_cmp(&lots[b].unit_price));

            let mut need = item.quantity;
            for &l in bucket.iter() {
                if need == 0 {
                    break;
                }
                let lot = &lots[l];
                let take = lot.quantity.min(need);
                allocations.push(Allocation {
                    lot: l,
                    item: i,
                    seller: lot.seller,
                    unit_price: lot.unit_price,
                    quantity: take,
                });
                need -= take;
            }
            if need > 0 {
                return Ok(Evaluation::Incomplete {
                    item: i,
                    short: need,
                });
            }
        }

        let mut subtotals: Vec<SellerSubtotal> = combo
            .sellers
            .iter()
            .map(|&seller| SellerSubtotal {
                seller,
                cost: 0.0,
                items: 0,
                lots: 0,
            })
            .collect();
        for a in &allocations {
            let Some(sub) = subtotals.iter_mut().find(|t| t.seller == a.seller) else {
                continue;
            };
            sub.cost += a.cost();
            sub.items = sub
                .items
                .checked_add(a.quantity)
                .ok_or(EvalError::QuantityOverflow(a.item))?;
            sub.lots = sub.lots.saturating_add(1);
        }
        let cost = subtotals.iter().map(|t| t.cost).sum();

        Ok(Evaluation::Complete(ValidatedCandidate {
            cardinality: combo.cardinality,
            sequence: combo.sequence,
            sellers: combo.sellers.clone(),
            cost,
            subtotals,
            allocations,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogBuilder, Condition, ItemKey, RequiredItem};

    fn combo(sellers: &[usize]) -> Combination {
        Combination {
            cardinality: sellers.len(),
            sequence: 0,
            sellers: sellers.iter().copied().collect(),
        }
    }

    /// A needs 3, B needs 1; S1 has A 2@1.00 and B 1@5.00, S2 has A 5@1.50.
    fn two_seller_catalog() -> Catalog {
        let mut b = CatalogBuilder::new();
        let a = b.add_item(RequiredItem::new(ItemKey::new("A", "0"), 3)).unwrap();
        let bb = b.add_item(RequiredItem::new(ItemKey::new("B", "0"), 1)).unwrap();
        let s1 = b.add_seller("S1", "s1");
        let s2 = b.add_seller("S2", "s2");
        b.add_lot(s1, a, 1.00, 2, Condition::New).unwrap();
        b.add_lot(s1, bb, 5.00, 1, Condition::New).unwrap();
        b.add_lot(s2, a, 1.50, 5, Condition::New).unwrap();
        b.build(1)
    }

    #[test]
    fn single_sellers_are_incomplete() {
        let cat = two_seller_catalog();
        let mut ev = Evaluator::new(&cat);
        assert_eq!(
            ev.evaluate(&combo(&[0])).unwrap(),
            Evaluation::Incomplete { item: 0, short: 1 }
        );
        assert_eq!(
            ev.evaluate(&combo(&[1])).unwrap(),
            Evaluation::Incomplete { item: 1, short: 1 }
        );
    }

    #[test]
    fn pair_takes_cheapest_units_first() {
        let cat = two_seller_catalog();
        let mut ev = Evaluator::new(&cat);
        let c = ev.evaluate(&combo(&[0, 1])).unwrap().into_candidate().unwrap();
        assert_eq!(c.cost, 8.5);
        assert_eq!(c.sellers.as_slice(), &[0, 1]);
        assert_eq!(
            c.allocations
                .iter()
                .map(|a| (a.item, a.seller, a.quantity))
                .collect::<Vec<_>>(),
            vec![(0, 0, 2), (0, 1, 1), (1, 0, 1)]
        );
        assert_eq!(c.subtotals[0].cost, 7.0);
        assert_eq!(c.subtotals[0].items, 3);
        assert_eq!(c.subtotals[0].lots, 2);
        assert_eq!(c.subtotals[1].cost, 1.5);
        assert_eq!(c.subtotals[1].items, 1);
        assert_eq!(c.subtotals[1].lots, 1);
    }

    #[test]
    fn scratch_is_reset_between_combinations() {
        let cat = two_seller_catalog();
        let mut ev = Evaluator::new(&cat);
        let first = ev.evaluate(&combo(&[0, 1])).unwrap();
        assert!(!ev.evaluate(&combo(&[1])).unwrap().is_complete());
        assert_eq!(ev.evaluate(&combo(&[0, 1])).unwrap(), first);
    }

    #[test]
    fn unused_member_gets_zero_subtotal() {
        let mut b = CatalogBuilder::new();
        let a = b.add_item(RequiredItem::new(ItemKey::new("A", "0"), 1)).unwrap();
        let s1 = b.add_seller("S1", "s1");
        let s2 = b.add_seller("S2", "s2");
        b.add_lot(s1, a, 1.0, 1, Condition::New).unwrap();
        b.add_lot(s2, a, 2.0, 1, Condition::New).unwrap();
        let cat = b.build(1);

        let c = Evaluator::new(&cat)
            .evaluate(&combo(&[0, 1]))
            .unwrap()
            .into_candidate()
            .unwrap();
        assert_eq!(c.cost, 1.0);
        assert_eq!(c.subtotals[1].cost, 0.0);
        assert_eq!(c.subtotals[1].lots, 0);
    }

    #[test]
    fn equal_prices_keep_member_order() {
        let mut b = CatalogBuilder::new();
        let a = b.add_item(RequiredItem::new(ItemKey::new("A", "0"), 2)).unwrap();
        let s1 = b.add_seller("S1", "s1");
        let s2 = b.add_seller("S2", "s2");
        b.add_lot(s1, a, 1.0, 1, Condition::New).unwrap();
        b.add_lot(s2, a, 1.0, 5, Condition::Used).unwrap();
        let cat = b.build(1);

        let c = Evaluator::new(&cat)
            .evaluate(&combo(&[0, 1]))
            .unwrap()
            .into_candidate()
            .unwrap();
        assert_eq!(c.allocations[0].seller, 0);
        assert_eq!(c.allocations[0].quantity, 1);
        assert_eq!(c.allocations[1].seller, 1);
        assert_eq!(c.allocations[1].quantity, 1);
    }

    #[test]
    fn unknown_seller_is_a_fault() {
        let cat = two_seller_catalog();
        assert_eq!(
            Evaluator::new(&cat).evaluate(&combo(&[0, 9])),
            Err(EvalError::UnknownSeller(9))
        );
    }

    #[test]
    fn item_without_lots_is_never_complete() {
        let mut b = CatalogBuilder::new();
        b.add_item(RequiredItem::new(ItemKey::new("A", "0"), 1)).unwrap();
        let z = b.add_item(RequiredItem::new(ItemKey::new("Z", "0"), 2)).unwrap();
        let s1 = b.add_seller("S1", "s1");
        b.add_lot(s1, 0, 1.0, 1, Condition::New).unwrap();
        let cat = b.build(1);
        assert_eq!(
            Evaluator::new(&cat).evaluate(&combo(&[0])).unwrap(),
            Evaluation::Incomplete { item: z, short: 2 }
        );
    }
}
