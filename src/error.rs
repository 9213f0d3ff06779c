use thiserror::Error;

/// Run parameters rejected before any search starts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("max_sellers must be at least 1 (got {0})")]
    MaxSellers(usize),

    #[error("max_results must be at least 1 (got {0})")]
    MaxResults(usize),

    #[error("workers must be at least 1 (got {0})")]
    Workers(usize),

    #[error("channel_capacity must be at least 1 (got {0})")]
    ChannelCapacity(usize),
}

/// Failures while loading or preparing the catalog. All of these abort before
/// the search begins.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Two wanted-list lines share the same part/colour identity.
    #[error("duplicate wanted item `{0}`")]
    DuplicateItem(String),

    #[error("wanted item `{0}` must require a positive quantity")]
    ZeroQuantity(String),

    #[error("offer for `{item}` from `{store}` has invalid price {price}")]
    InvalidPrice {
        item: String,
        store: String,
        price: f64,
    },

    #[error("catalog I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("catalog parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Worker-local faults while evaluating one combination. The combination is
/// dropped and the worker keeps consuming.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("combination references unknown seller index {0}")]
    UnknownSeller(usize),

    #[error("allocated quantity overflowed for item index {0}")]
    QuantityOverflow(usize),

    #[error("evaluation panicked")]
    Panicked,
}

#[derive(Error, Debug)]
pub enum SearchError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}
