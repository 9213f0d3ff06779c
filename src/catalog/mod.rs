use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

use crate::enumeration::coverage::CoverageSet;
use crate::error::CatalogError;

pub mod io;
pub mod prepare;

pub use io::{RawCatalog, RawItem, RawOffer, RawStore, parse_catalog, read_catalog};
pub use prepare::{PrepareConfig, prepare};

// -------------------------------------------------------------------------------------
// Index types
// -------------------------------------------------------------------------------------

/// Position of a wanted item in catalog order (also its coverage bit).
pub type ItemIdx = usize;
/// Position of a seller in the prepared seller list.
pub type SellerIdx = usize;
/// Position of a lot in the catalog-wide lot table.
pub type LotIdx = usize;

// -------------------------------------------------------------------------------------
// Data model
// -------------------------------------------------------------------------------------

/// Stable identity of a wanted item: part number plus colour.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemKey {
    pub part: String,
    pub color: String,
}

impl ItemKey {
    pub fn new(part: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            part: part.into(),
            color: color.into(),
        }
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.part, self.color)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    #[serde(alias = "N", alias = "n")]
    New,
    #[serde(alias = "U", alias = "u")]
    Used,
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Condition::New => "new",
            Condition::Used => "used",
        })
    }
}

/// One line of the want-list.
#[derive(Debug, Clone, PartialEq)]
pub struct RequiredItem {
    pub key: ItemKey,
    pub name: String,
    pub color_name: String,
    pub quantity: u32,
    /// Upper bound on acceptable unit price; `None` means unbounded.
    pub max_price: Option<f64>,
    /// Required condition; `None` accepts any.
    pub condition: Option<Condition>,
    /// Offers seen upstream, before any eligibility filtering.
    pub offered: usize,
    /// Eligible lots, in input order. Filled in by [`CatalogBuilder::build`].
    pub lots: Vec<LotIdx>,
    /// Mean unit price over `lots`, if there are any.
    pub average_price: Option<f64>,
}

impl RequiredItem {
    pub fn new(key: ItemKey, quantity: u32) -> Self {
        Self {
            name: key.part.clone(),
            color_name: key.color.clone(),
            key,
            quantity,
            max_price: None,
            condition: None,
            offered: 0,
            lots: Vec::new(),
            average_price: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>, color_name: impl Into<String>) -> Self {
        self.name = name.into();
        self.color_name = color_name.into();
        self
    }

    pub fn with_max_price(mut self, max_price: f64) -> Self {
        self.max_price = Some(max_price);
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }
}

/// One seller's offer of one wanted item. Never mutated during search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lot {
    pub item: ItemIdx,
    pub seller: SellerIdx,
    pub unit_price: f64,
    pub quantity: u32,
    pub condition: Condition,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Seller {
    /// Store name, as shown to the user.
    pub store: String,
    /// Login handle, used for store links.
    pub login: String,
    pub lots: Vec<LotIdx>,
    pub coverage: CoverageSet,
}

/// Immutable search context: wanted items, their lots and the eligible sellers.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    items: Vec<RequiredItem>,
    lots: Vec<Lot>,
    sellers: Vec<Seller>,
    by_key: AHashMap<ItemKey, ItemIdx>,
}

impl Catalog {
    #[inline]
    pub fn items(&self) -> &[RequiredItem] {
        &self.items
    }
    #[inline]
    pub fn lots(&self) -> &[Lot] {
        &self.lots
    }
    #[inline]
    pub fn sellers(&self) -> &[Seller] {
        &self.sellers
    }
    #[inline]
    pub fn n_items(&self) -> usize {
        self.items.len()
    }
    #[inline]
    pub fn n_sellers(&self) -> usize {
        self.sellers.len()
    }

    pub fn item_index(&self, key: &ItemKey) -> Option<ItemIdx> {
        self.by_key.get(key).copied()
    }

    pub fn seller_index(&self, store: &str) -> Option<SellerIdx> {
        self.sellers.iter().position(|s| s.store == store)
    }

    /// Items that no eligible seller offers at all.
    pub fn unsatisfiable_items(&self) -> impl Iterator<Item = &RequiredItem> + '_ {
        self.items.iter().filter(|it| it.lots.is_empty())
    }
}

// -------------------------------------------------------------------------------------
// Builder
// -------------------------------------------------------------------------------------

/// Handle to a store registered with a [`CatalogBuilder`]. Only meaningful for
/// the builder that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StoreRef(usize);

struct PendingLot {
    seq: usize,
    item: ItemIdx,
    unit_price: f64,
    quantity: u32,
    condition: Condition,
}

struct PendingStore {
    store: String,
    login: String,
    lots: Vec<PendingLot>,
}

#[derive(Default)]
pub struct CatalogBuilder {
    items: Vec<RequiredItem>,
    by_key: AHashMap<ItemKey, ItemIdx>,
    stores: Vec<PendingStore>,
    by_store: AHashMap<String, usize>,
    next_seq: usize,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a wanted item. Identities must be unique.
    pub fn add_item(&mut self, mut item: RequiredItem) -> Result<ItemIdx, CatalogError> {
        if item.quantity == 0 {
            return Err(CatalogError::ZeroQuantity(item.key.to_string()));
        }
        if self.by_key.contains_key(&item.key) {
            return Err(CatalogError::DuplicateItem(item.key.to_string()));
        }
        item.lots.clear();
        item.average_price = None;
        let idx = self.items.len();
        self.by_key.insert(item.key.clone(), idx);
        self.items.push(item);
        Ok(idx)
    }

    /// Register a store, or return the existing handle for the same name.
    pub fn add_seller(&mut self, store: &str, login: &str) -> StoreRef {
        if let Some(&pos) = self.by_store.get(store) {
            return StoreRef(pos);
        }
        let pos = self.stores.len();
        self.by_store.insert(store.to_string(), pos);
        self.stores.push(PendingStore {
            store: store.to_string(),
            login: login.to_string(),
            lots: Vec::new(),
        });
        StoreRef(pos)
    }

    /// Attach a lot to a store. Returns `Ok(false)` when the lot is ignored:
    /// it targets an unknown item, or it has nothing to sell.
    pub fn add_lot(
        &mut self,
        store: StoreRef,
        item: ItemIdx,
        unit_price: f64,
        quantity: u32,
        condition: Condition,
    ) -> Result<bool, CatalogError> {
        let Some(pending) = self.stores.get_mut(store.0) else {
            warn!(store = store.0, "lot for unregistered store ignored");
            return Ok(false);
        };
        let Some(wanted) = self.items.get(item) else {
            warn!(store = %pending.store, item, "lot for unknown item ignored");
            return Ok(false);
        };
        if !unit_price.is_finite() || unit_price < 0.0 {
            return Err(CatalogError::InvalidPrice {
                item: wanted.key.to_string(),
                store: pending.store.clone(),
                price: unit_price,
            });
        }
        if quantity == 0 {
            return Ok(false);
        }
        pending.lots.push(PendingLot {
            seq: self.next_seq,
            item,
            unit_price,
            quantity,
            condition,
        });
        self.next_seq += 1;
        Ok(true)
    }

    /// Freeze the catalog. Stores offering fewer than `seller_min_lots` lots
    /// (and stores with none) are dropped; lot order follows insertion order.
    pub fn build(self, seller_min_lots: usize) -> Catalog {
        let CatalogBuilder {
            mut items,
            by_key,
            stores,
            ..
        } = self;
        let min_lots = seller_min_lots.max(1);

        let mut sellers: Vec<Seller> = Vec::new();
        let mut staged: Vec<(SellerIdx, PendingLot)> = Vec::new();
        for store in stores {
            if store.lots.len() < min_lots {
                continue;
            }
            let s = sellers.len();
            sellers.push(Seller {
                store: store.store,
                login: store.login,
                lots: Vec::new(),
                coverage: CoverageSet::default(),
            });
            staged.extend(store.lots.into_iter().map(|l| (s, l)));
        }
        staged.sort_unstable_by_key(|(_, l)| l.seq);

        let mut lots: Vec<Lot> = Vec::with_capacity(staged.len());
        for (seller, p) in staged {
            let idx = lots.len();
            lots.push(Lot {
                item: p.item,
                seller,
                unit_price: p.unit_price,
                quantity: p.quantity,
                condition: p.condition,
            });
            items[p.item].lots.push(idx);
            sellers[seller].lots.push(idx);
        }

        for item in &mut items {
            if item.lots.is_empty() {
                warn!(item = %item.key, "no eligible lots; no basket can be complete");
                continue;
            }
            let total: f64 = item.lots.iter().map(|&l| lots[l].unit_price).sum();
            item.average_price = Some(total / item.lots.len() as f64);
        }

        let n_items = items.len();
        for seller in &mut sellers {
            seller.coverage = CoverageSet::from_lots(n_items, &seller.lots, &lots);
        }

        Catalog {
            items,
            lots,
            sellers,
            by_key,
        }
    }
}
