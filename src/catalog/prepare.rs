use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{Catalog, CatalogBuilder, ItemKey, RawCatalog, RequiredItem};
use crate::error::CatalogError;

/// Seller and lot eligibility rules applied before the search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrepareConfig {
    /// Sellers with fewer eligible lots than this are left out of the search.
    pub seller_min_lots: usize,
    /// If set, only these stores are eligible.
    pub allow: Option<Vec<String>>,
    /// Stores that are never eligible.
    pub deny: Vec<String>,
    /// Drop lots whose condition differs from the item's required condition.
    pub match_condition: bool,
    /// Drop lots priced above the item's maximum price.
    pub enforce_max_price: bool,
}

impl Default for PrepareConfig {
    fn default() -> Self {
        Self {
            seller_min_lots: 1,
            allow: None,
            deny: Vec::new(),
            match_condition: true,
            enforce_max_price: true,
        }
    }
}

struct Eligibility<'a> {
    directory: AHashMap<&'a str, &'a str>,
    allow: Option<AHashSet<&'a str>>,
    deny: AHashSet<&'a str>,
}

impl<'a> Eligibility<'a> {
    fn new(raw: &'a RawCatalog, cfg: &'a PrepareConfig) -> Self {
        Self {
            directory: raw
                .stores
                .iter()
                .map(|s| (s.name.as_str(), s.login.as_str()))
                .collect(),
            allow: cfg
                .allow
                .as_ref()
                .map(|a| a.iter().map(String::as_str).collect()),
            deny: cfg.deny.iter().map(String::as_str).collect(),
        }
    }

    /// Login handle for an eligible store, `None` if the store is excluded.
    fn login<'s>(&self, store: &'s str) -> Option<&'s str>
    where
        'a: 's,
    {
        if self.deny.contains(store) {
            return None;
        }
        if let Some(allow) = &self.allow {
            if !allow.contains(store) {
                return None;
            }
        }
        if self.directory.is_empty() {
            return Some(store);
        }
        self.directory.get(store).copied()
    }
}

/// Filter the raw catalog down to eligible lots and sellers and build the
/// immutable search context.
pub fn prepare(raw: RawCatalog, cfg: &PrepareConfig) -> Result<Catalog, CatalogError> {
    let rules = Eligibility::new(&raw, cfg);
    let mut builder = CatalogBuilder::new();

    for it in &raw.items {
        let key = ItemKey::new(it.part.as_str(), it.color.as_str());
        let mut wanted = RequiredItem::new(key, it.quantity);
        if let Some(name) = &it.name {
            wanted.name = name.clone();
        }
        if let Some(color_name) = &it.color_name {
            wanted.color_name = color_name.clone();
        }
        wanted.max_price = it.max_price;
        wanted.condition = it.condition;
        wanted.offered = it.offers.len();
        let price_cap = it
            .max_price
            .filter(|&p| cfg.enforce_max_price && p > 0.0);
        let item = builder.add_item(wanted)?;

        let mut kept = 0usize;
        for offer in &it.offers {
            let Some(login) = rules.login(&offer.store) else {
                continue;
            };
            if cfg.match_condition && it.condition.is_some_and(|c| c != offer.condition) {
                continue;
            }
            if price_cap.is_some_and(|cap| offer.price > cap) {
                continue;
            }
            let store = builder.add_seller(&offer.store, login);
            if builder.add_lot(store, item, offer.price, offer.quantity, offer.condition)? {
                kept += 1;
            }
        }
        let offered = it.offers.len();
        if kept < offered {
            warn!(
                part = %it.part,
                color = %it.color,
                kept,
                offered,
                dropped = offered - kept,
                "lots dropped"
            );
        } else {
            info!(part = %it.part, color = %it.color, kept, offered, "eligible lots");
        }
    }

    let catalog = builder.build(cfg.seller_min_lots);
    info!(
        items = catalog.n_items(),
        sellers = catalog.n_sellers(),
        lots = catalog.lots().len(),
        "catalog prepared"
    );
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::parse_catalog;
    use tracing_test::traced_test;

    #[test]
    #[traced_test]
    fn dropped_lots_are_warned_kept_lots_reported() {
        let raw = parse_catalog(
            r#"{"items": [
                {"part": "1", "color": "0", "quantity": 1, "condition": "new", "offers": [
                    {"store": "A", "quantity": 1, "price": 1.0, "condition": "new"},
                    {"store": "B", "quantity": 1, "price": 0.5, "condition": "used"}
                ]},
                {"part": "2", "color": "0", "quantity": 1, "offers": [
                    {"store": "A", "quantity": 1, "price": 1.0, "condition": "new"}
                ]}
            ]}"#,
        )
        .unwrap();
        prepare(raw, &PrepareConfig::default()).unwrap();

        logs_assert(|lines: &[&str]| {
            let warned: Vec<_> = lines
                .iter()
                .filter(|l| l.contains("WARN") && l.contains("lots dropped"))
                .collect();
            match warned.as_slice() {
                [line] if line.contains("kept=1") && line.contains("offered=2") => Ok(()),
                other => Err(format!("expected one drop warning, got {other:?}")),
            }
        });
        logs_assert(|lines: &[&str]| {
            if lines
                .iter()
                .any(|l| l.contains("INFO") && l.contains("eligible lots") && l.contains("kept=1"))
            {
                Ok(())
            } else {
                Err("no eligible-lots line".to_string())
            }
        });
    }
}
