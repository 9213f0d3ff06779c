use clap::Parser;
use std::path::PathBuf;

use crate::matching::WatermarkPolicy;
use crate::report::OutputFormat;

/// Find the cheapest combinations of sellers that fill a wanted list.
#[derive(Parser, Debug)]
#[command(name = "cheapcart", version)]
pub struct Cli {
    /// Catalog JSON: wanted items and the offers for each.
    pub catalog: PathBuf,

    /// Largest number of sellers per basket.
    pub max_sellers: Option<usize>,

    /// Path to a TOML configuration file.
    #[arg(short, long, env = "CHEAPCART_CONFIG")]
    pub config: Option<PathBuf>,

    /// Ranked baskets kept per basket size.
    #[arg(short = 'n', long)]
    pub max_results: Option<usize>,

    /// Evaluation threads.
    #[arg(short = 'j', long)]
    pub workers: Option<usize>,

    /// Ignore sellers offering fewer lots than this.
    #[arg(long)]
    pub min_lots: Option<usize>,

    #[arg(long, value_enum)]
    pub policy: Option<WatermarkPolicy>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Write the report here instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Also export a results directory under this root.
    #[arg(long)]
    pub export_dir: Option<PathBuf>,

    /// Hide progress bars.
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    pub fn import() -> Result<Self, clap::Error> {
        Self::try_parse()
    }
}
