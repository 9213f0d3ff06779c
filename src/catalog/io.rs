use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use super::Condition;
use crate::error::CatalogError;

/// Catalog as delivered by the upstream provider, before any filtering.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawCatalog {
    /// Store directory (name → login). When non-empty, only listed stores are
    /// eligible.
    #[serde(default)]
    pub stores: Vec<RawStore>,
    pub items: Vec<RawItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawStore {
    pub name: String,
    pub login: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawItem {
    pub part: String,
    pub color: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub color_name: Option<String>,
    pub quantity: u32,
    #[serde(default)]
    pub max_price: Option<f64>,
    #[serde(default)]
    pub condition: Option<Condition>,
    #[serde(default)]
    pub offers: Vec<RawOffer>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawOffer {
    pub store: String,
    pub quantity: u32,
    pub price: f64,
    pub condition: Condition,
}

pub fn read_catalog(path: &Path) -> Result<RawCatalog, CatalogError> {
    let f = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(f))?)
}

pub fn parse_catalog(text: &str) -> Result<RawCatalog, CatalogError> {
    Ok(serde_json::from_str(text)?)
}
