//! Cheapest seller-combination search.
//!
//! Given a wanted list and every seller's lots, find for each basket size
//! `1..=max_sellers` the cheapest combinations of sellers that can supply the
//! whole list. Combinations are enumerated on one thread, prefiltered by item
//! coverage and evaluated greedily by a pool of workers feeding per-size
//! leaderboards.

pub mod catalog;
pub mod cli;
pub mod config;
pub mod enumeration;
pub mod error;
pub mod matching;
pub mod report;
pub mod runtime;

pub use catalog::{Catalog, CatalogBuilder, PrepareConfig, prepare, read_catalog};
pub use cli::Cli;
pub use config::AppConfig;
pub use error::{CatalogError, ConfigError, EvalError, SearchError};
pub use matching::{SearchConfig, SearchOutcome, WatermarkPolicy, run_search};
pub use report::{OutputFormat, Report, export_dir};
