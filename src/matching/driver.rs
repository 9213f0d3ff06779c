use serde::{Deserialize, Serialize};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU8, AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::channel::WorkChannel;
use super::leaderboard::{Leaderboard, Ranking, WatermarkPolicy};
use super::solve::Evaluator;
use super::types::{Combination, Evaluation};
use crate::catalog::Catalog;
use crate::enumeration::{self, TierCounts};
use crate::error::{ConfigError, EvalError, SearchError};
use crate::runtime;

// -------------------------------------------------------------------------------------
// Run configuration
// -------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Largest basket size searched.
    pub max_sellers: usize,
    /// Results kept per basket size.
    pub max_results: usize,
    /// Evaluation threads.
    pub workers: usize,
    /// Bound on combinations queued between generator and workers.
    pub channel_capacity: usize,
    pub policy: WatermarkPolicy,
    /// Draw progress bars while enumerating.
    pub progress: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_sellers: 3,
            max_results: 20,
            workers: runtime::default_workers(),
            channel_capacity: 1000,
            policy: WatermarkPolicy::default(),
            progress: true,
        }
    }
}

impl SearchConfig {
    /// Quiet configuration with the three required scalars set.
    pub fn new(max_sellers: usize, max_results: usize, workers: usize) -> Self {
        Self {
            max_sellers,
            max_results,
            workers,
            progress: false,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_sellers == 0 {
            return Err(ConfigError::MaxSellers(self.max_sellers));
        }
        if self.max_results == 0 {
            return Err(ConfigError::MaxResults(self.max_results));
        }
        if self.workers == 0 {
            return Err(ConfigError::Workers(self.workers));
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::ChannelCapacity(self.channel_capacity));
        }
        Ok(())
    }
}

// -------------------------------------------------------------------------------------
// Lifecycle
// -------------------------------------------------------------------------------------

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunPhase {
    Idle = 0,
    /// Generator enumerating while workers evaluate.
    Searching = 1,
    /// Channel shut down; workers finishing what is queued.
    Draining = 2,
    /// Every worker reported; leaderboards being ranked.
    Finalizing = 3,
    Done = 4,
}

impl RunPhase {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => RunPhase::Idle,
            1 => RunPhase::Searching,
            2 => RunPhase::Draining,
            3 => RunPhase::Finalizing,
            _ => RunPhase::Done,
        }
    }
}

/// Monotonic run phase plus the worker completion count. The worker that
/// brings the count to the pool size moves the run to `Finalizing`.
pub struct RunTracker {
    phase: AtomicU8,
    finished: AtomicUsize,
    workers: usize,
}

impl RunTracker {
    pub fn new(workers: usize) -> Self {
        Self {
            phase: AtomicU8::new(RunPhase::Idle as u8),
            finished: AtomicUsize::new(0),
            workers,
        }
    }

    pub fn phase(&self) -> RunPhase {
        RunPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    /// Move forward to `to`; never moves backwards.
    pub fn advance(&self, to: RunPhase) {
        let prev = RunPhase::from_u8(self.phase.fetch_max(to as u8, Ordering::AcqRel));
        if prev < to {
            debug!(from = ?prev, to = ?to, "run phase");
        }
    }

    /// Record one worker's exit. Returns `true` for the last one.
    pub fn worker_finished(&self) -> bool {
        let done = self.finished.fetch_add(1, Ordering::AcqRel) + 1;
        if done == self.workers {
            self.advance(RunPhase::Finalizing);
            true
        } else {
            false
        }
    }

    pub fn finished_workers(&self) -> usize {
        self.finished.load(Ordering::Acquire)
    }
}

// -------------------------------------------------------------------------------------
// Results
// -------------------------------------------------------------------------------------

#[derive(Default)]
struct Counters {
    evaluated: AtomicU64,
    complete: AtomicU64,
    admitted: AtomicU64,
    faults: AtomicU64,
}

#[derive(Debug, Clone)]
pub struct SearchStats {
    pub tiers: Vec<TierCounts>,
    /// Combinations popped and evaluated by workers.
    pub evaluated: u64,
    /// Evaluated combinations that satisfied every item.
    pub complete: u64,
    /// Complete combinations let through by the watermark.
    pub admitted: u64,
    /// Combinations dropped on a worker-local fault.
    pub faults: u64,
    pub workers: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// One ranking per basket size, `1..=max_sellers`.
    pub rankings: Vec<Ranking>,
    pub stats: SearchStats,
}

impl SearchOutcome {
    pub fn ranking(&self, cardinality: usize) -> Option<&Ranking> {
        self.rankings.iter().find(|r| r.cardinality == cardinality)
    }
}

// -------------------------------------------------------------------------------------
// Driver
// -------------------------------------------------------------------------------------

fn consume(
    worker: usize,
    catalog: &Catalog,
    channel: &WorkChannel<Combination>,
    board: &Leaderboard,
    tracker: &RunTracker,
    counters: &Counters,
) {
    let mut evaluator = Evaluator::new(catalog);
    let mut handled = 0u64;

    while let Some(combo) = channel.pop() {
        handled += 1;
        counters.evaluated.fetch_add(1, Ordering::Relaxed);

        // the evaluator resets its scratch on entry, so a panic cannot poison it
        let outcome = catch_unwind(AssertUnwindSafe(|| evaluator.evaluate(&combo)))
            .unwrap_or(Err(EvalError::Panicked));
        match outcome {
            Ok(Evaluation::Complete(cand)) => {
                counters.complete.fetch_add(1, Ordering::Relaxed);
                if board.admit(cand) {
                    counters.admitted.fetch_add(1, Ordering::Relaxed);
                }
            }
            Ok(Evaluation::Incomplete { .. }) => {}
            Err(err) => {
                counters.faults.fetch_add(1, Ordering::Relaxed);
                warn!(
                    worker,
                    cardinality = combo.cardinality,
                    sequence = combo.sequence,
                    %err,
                    "combination dropped"
                );
            }
        }
    }

    debug!(worker, handled, "worker drained");
    if tracker.worker_finished() {
        debug!(worker, "last worker finished");
    }
}

/// Search every basket size `1..=max_sellers` for the cheapest complete
/// seller combinations.
///
/// The calling thread enumerates combinations and feeds the bounded channel;
/// `workers` pool threads evaluate them and offer complete ones to the
/// leaderboard. Once the generator has shut the channel and every worker has
/// drained it, each leaderboard is sorted and truncated to `max_results`.
pub fn run_search(catalog: &Catalog, config: &SearchConfig) -> Result<SearchOutcome, SearchError> {
    config.validate()?;
    let t0 = Instant::now();

    let pool = runtime::worker_pool(config.workers)?;
    let channel = WorkChannel::bounded(config.channel_capacity);
    let board = Leaderboard::new(config.max_sellers, config.max_results, config.policy);
    let tracker = RunTracker::new(config.workers);
    let counters = Counters::default();

    let tiers = {
        let (channel, board, tracker, counters) = (&channel, &board, &tracker, &counters);
        pool.in_place_scope(|scope| {
            for worker in 0..config.workers {
                scope.spawn(move |_| consume(worker, catalog, channel, board, tracker, counters));
            }
            tracker.advance(RunPhase::Searching);
            let tiers =
                enumeration::feed_channel(catalog, config.max_sellers, config.progress, channel);
            tracker.advance(RunPhase::Draining);
            tiers
        })
    };
    debug_assert_eq!(tracker.finished_workers(), config.workers);
    tracker.advance(RunPhase::Finalizing);

    let rankings = board.into_rankings();
    for r in &rankings {
        info!(
            cardinality = r.cardinality,
            complete = r.complete,
            retained = r.retained,
            ranked = r.entries.len(),
            best = r.entries.first().map(|c| c.cost),
            "valid combinations"
        );
    }

    let stats = SearchStats {
        tiers,
        evaluated: counters.evaluated.load(Ordering::Relaxed),
        complete: counters.complete.load(Ordering::Relaxed),
        admitted: counters.admitted.load(Ordering::Relaxed),
        faults: counters.faults.load(Ordering::Relaxed),
        workers: config.workers,
        elapsed: t0.elapsed(),
    };
    tracker.advance(RunPhase::Done);
    info!(
        evaluated = stats.evaluated,
        complete = stats.complete,
        faults = stats.faults,
        secs = stats.elapsed.as_secs_f64(),
        "search finished"
    );

    Ok(SearchOutcome { rankings, stats })
}
