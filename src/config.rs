//! Layered application configuration.
//!
//! Precedence, lowest first: built-in defaults, the TOML file named by
//! `--config`, `CHEAPCART_<SECTION>__<KEY>` environment variables, then
//! explicit command-line flags.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::Cli;
use crate::catalog::PrepareConfig;
use crate::matching::SearchConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub catalog: PrepareConfig,
}

impl AppConfig {
    /// Defaults, then `file` if given, then the environment.
    ///
    /// ```bash
    /// export CHEAPCART_SEARCH__MAX_RESULTS=50
    /// export CHEAPCART_CATALOG__SELLER_MIN_LOTS=3
    /// ```
    pub fn from_sources(file: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = config::Config::builder();

        config = config.add_source(config::Config::try_from(&Self::default())?);

        if let Some(path) = file {
            if !path.exists() {
                anyhow::bail!("config file {} does not exist", path.display());
            }
            config = config.add_source(config::File::from(path));
        }

        config = config.add_source(
            config::Environment::with_prefix("CHEAPCART")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        Ok(config.build()?.try_deserialize()?)
    }

    /// Full resolution for the binary: file and environment, then CLI flags.
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let mut cfg = Self::from_sources(cli.config.as_deref())?;
        cfg.apply_cli(cli);
        Ok(cfg)
    }

    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(n) = cli.max_sellers {
            self.search.max_sellers = n;
        }
        if let Some(n) = cli.max_results {
            self.search.max_results = n;
        }
        if let Some(n) = cli.workers {
            self.search.workers = n;
        }
        if let Some(p) = cli.policy {
            self.search.policy = p;
        }
        if let Some(n) = cli.min_lots {
            self.catalog.seller_min_lots = n;
        }
        if cli.quiet {
            self.search.progress = false;
        }
    }
}
