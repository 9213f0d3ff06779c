//! Rendering finalized leaderboards for people and for tools.
//!
//! A [`Report`] is a self-contained, serializable view of one search: the
//! wanted list it ran against, the ranked baskets per cardinality and the run
//! statistics. It renders as plain text or JSON, and can be exported as a
//! directory of text files.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::catalog::{Catalog, Condition};
use crate::matching::{SearchOutcome, ValidatedCandidate};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WantedLine {
    pub key: String,
    pub name: String,
    pub color_name: String,
    pub quantity: u32,
    pub max_price: Option<f64>,
    pub condition: Option<Condition>,
    pub offered: usize,
    pub eligible_lots: usize,
    pub average_price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationLine {
    pub item: String,
    pub name: String,
    pub color_name: String,
    pub condition: Condition,
    pub quantity: u32,
    pub unit_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SellerLine {
    pub store: String,
    pub login: String,
    pub subtotal: f64,
    pub items: u32,
    pub lots: u32,
    pub allocations: Vec<AllocationLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// 1-based position within its cardinality.
    pub rank: usize,
    pub sequence: u64,
    pub cost: f64,
    pub sellers: Vec<SellerLine>,
}

impl Entry {
    fn stores(&self) -> String {
        self.sellers
            .iter()
            .map(|s| s.store.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tier {
    pub cardinality: usize,
    pub considered: u64,
    pub admissible: u64,
    /// Combinations that satisfied every wanted item.
    pub complete: usize,
    /// Entries the leaderboard held before truncation.
    pub retained: usize,
    pub entries: Vec<Entry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub workers: usize,
    pub evaluated: u64,
    pub complete: u64,
    pub admitted: u64,
    pub faults: u64,
    pub elapsed_secs: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub wanted: Vec<WantedLine>,
    pub tiers: Vec<Tier>,
    pub run: RunSummary,
}

fn entry(catalog: &Catalog, rank: usize, cand: &ValidatedCandidate) -> Entry {
    let sellers = cand
        .subtotals
        .iter()
        .map(|sub| {
            let seller = &catalog.sellers()[sub.seller];
            let allocations = cand
                .allocations
                .iter()
                .filter(|a| a.seller == sub.seller)
                .map(|a| {
                    let item = &catalog.items()[a.item];
                    AllocationLine {
                        item: item.key.to_string(),
                        name: item.name.clone(),
                        color_name: item.color_name.clone(),
                        condition: catalog.lots()[a.lot].condition,
                        quantity: a.quantity,
                        unit_price: a.unit_price,
                    }
                })
                .collect();
            SellerLine {
                store: seller.store.clone(),
                login: seller.login.clone(),
                subtotal: sub.cost,
                items: sub.items,
                lots: sub.lots,
                allocations,
            }
        })
        .collect();
    Entry {
        rank,
        sequence: cand.sequence,
        cost: cand.cost,
        sellers,
    }
}

impl Report {
    pub fn build(catalog: &Catalog, outcome: &SearchOutcome) -> Self {
        let wanted = catalog
            .items()
            .iter()
            .map(|it| WantedLine {
                key: it.key.to_string(),
                name: it.name.clone(),
                color_name: it.color_name.clone(),
                quantity: it.quantity,
                max_price: it.max_price,
                condition: it.condition,
                offered: it.offered,
                eligible_lots: it.lots.len(),
                average_price: it.average_price,
            })
            .collect();

        let tiers = outcome
            .rankings
            .iter()
            .map(|r| {
                let counts = outcome
                    .stats
                    .tiers
                    .iter()
                    .find(|t| t.cardinality == r.cardinality)
                    .copied()
                    .unwrap_or_default();
                Tier {
                    cardinality: r.cardinality,
                    considered: counts.considered,
                    admissible: counts.admissible,
                    complete: r.complete,
                    retained: r.retained,
                    entries: r
                        .entries
                        .iter()
                        .enumerate()
                        .map(|(j, c)| entry(catalog, j + 1, c))
                        .collect(),
                }
            })
            .collect();

        let s = &outcome.stats;
        Report {
            wanted,
            tiers,
            run: RunSummary {
                workers: s.workers,
                evaluated: s.evaluated,
                complete: s.complete,
                admitted: s.admitted,
                faults: s.faults,
                elapsed_secs: s.elapsed.as_secs_f64(),
            },
        }
    }

    pub fn write(&self, format: OutputFormat, out: &mut impl Write) -> io::Result<()> {
        match format {
            OutputFormat::Text => self.write_text(out),
            OutputFormat::Json => self.write_json(out),
        }
    }

    pub fn write_json(&self, out: &mut impl Write) -> io::Result<()> {
        serde_json::to_writer_pretty(&mut *out, self)?;
        writeln!(out)
    }

    /// Summary per cardinality followed by every entry's breakdown.
    pub fn write_text(&self, out: &mut impl Write) -> io::Result<()> {
        self.write_result_list(out)?;
        for tier in &self.tiers {
            for e in &tier.entries {
                writeln!(out)?;
                writeln!(out, "== {} sellers, #{} ==", tier.cardinality, e.rank)?;
                write_entry(e, out)?;
            }
        }
        writeln!(
            out,
            "\n{} combinations evaluated, {} complete, {} faults, {:.2}s on {} workers",
            self.run.evaluated,
            self.run.complete,
            self.run.faults,
            self.run.elapsed_secs,
            self.run.workers
        )
    }

    fn write_result_list(&self, out: &mut impl Write) -> io::Result<()> {
        for tier in &self.tiers {
            writeln!(
                out,
                "{} sellers: {} valid combinations found",
                tier.cardinality, tier.complete
            )?;
            if tier.entries.is_empty() {
                writeln!(out, "  No results")?;
            }
            for e in &tier.entries {
                writeln!(out, "  {:>3}. {} ({:.2})", e.rank, e.stores(), e.cost)?;
            }
        }
        Ok(())
    }

    fn write_wanted_list(&self, out: &mut impl Write) -> io::Result<()> {
        writeln!(out, "part\tquantity\tmax price\tlots\taverage price")?;
        for w in &self.wanted {
            writeln!(
                out,
                "{} - {} ({})\t{}\t{}\t{}/{}\t{}",
                w.key,
                w.name,
                w.color_name,
                w.quantity,
                w.max_price.map_or_else(|| "-".to_string(), |p| format!("{p:.2}")),
                w.eligible_lots,
                w.offered,
                w.average_price
                    .map_or_else(|| "-".to_string(), |p| format!("{p:.2}")),
            )?;
        }
        Ok(())
    }
}

fn write_entry(e: &Entry, out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "total {:.2}", e.cost)?;
    for s in &e.sellers {
        writeln!(
            out,
            "{} [{}]: {:.2} for {} items in {} lots",
            s.store, s.login, s.subtotal, s.items, s.lots
        )?;
        for a in &s.allocations {
            writeln!(
                out,
                "    {:>4} x {} {} ({}, {}) @ {:.2}",
                a.quantity, a.item, a.name, a.color_name, a.condition, a.unit_price
            )?;
        }
    }
    Ok(())
}

/// First free directory among `root/stem`, `root/stem~1`, `root/stem~2`, ...
fn fresh_dir(root: &Path, stem: &str) -> io::Result<PathBuf> {
    fs::create_dir_all(root)?;
    let base = stem.split('~').next().unwrap_or(stem);
    let mut candidate = root.join(stem);
    let mut counter = 1usize;
    loop {
        match fs::create_dir(&candidate) {
            Ok(()) => return Ok(candidate),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                candidate = root.join(format!("{base}~{counter}"));
                counter += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Write the report into a new results directory under `root` and return its
/// path. Never overwrites an earlier export.
pub fn export_dir(root: &Path, stem: &str, report: &Report) -> io::Result<PathBuf> {
    let dir = fresh_dir(root, stem)?;

    let mut list = io::BufWriter::new(fs::File::create(dir.join("resultlist.txt"))?);
    report.write_result_list(&mut list)?;
    list.flush()?;

    let mut wanted = io::BufWriter::new(fs::File::create(dir.join("wantedlist.txt"))?);
    report.write_wanted_list(&mut wanted)?;
    wanted.flush()?;

    for tier in &report.tiers {
        for (j, e) in tier.entries.iter().enumerate() {
            let mut f = io::BufWriter::new(fs::File::create(
                dir.join(format!("{}-{}.txt", tier.cardinality, j)),
            )?);
            write_entry(e, &mut f)?;
            f.flush()?;
        }
    }

    info!(dir = %dir.display(), "results exported");
    Ok(dir)
}
