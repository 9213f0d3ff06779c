use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, BufWriter, Write};

use cheapcart::{AppConfig, Cli, Report, export_dir, prepare, read_catalog, run_search};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt as _, util::SubscriberInitExt as _};

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::import().unwrap_or_else(|e| e.exit());
    let AppConfig { search, catalog } = AppConfig::load(&cli)?;
    search.validate()?;

    info!(path = %cli.catalog.display(), "reading catalog");
    let raw = read_catalog(&cli.catalog)
        .with_context(|| format!("read catalog {}", cli.catalog.display()))?;
    let cat = prepare(raw, &catalog).context("prepare catalog")?;

    let outcome = run_search(&cat, &search)?;
    let report = Report::build(&cat, &outcome);

    match &cli.output {
        Some(path) => {
            let mut out = BufWriter::new(
                File::create(path).with_context(|| format!("create {}", path.display()))?,
            );
            report.write(cli.format, &mut out)?;
            out.flush()?;
        }
        None => {
            let mut out = io::stdout().lock();
            report.write(cli.format, &mut out)?;
            out.flush()?;
        }
    }

    if let Some(root) = &cli.export_dir {
        let stem = cli
            .catalog
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("results");
        let dir = export_dir(root, stem, &report)
            .with_context(|| format!("export results under {}", root.display()))?;
        eprintln!("results exported to {}", dir.display());
    }
    Ok(())
}
