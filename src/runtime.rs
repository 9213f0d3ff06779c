use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use tracing::{info, warn};

// -------------------------------------------------------------------------------------
// Worker count
// -------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadConfig {
    pub count: usize,
    pub source: String,
}

const ENV_HINTS: [&str; 6] = [
    "CHEAPCART_THREADS",
    "RAYON_NUM_THREADS",
    "SLURM_CPUS_PER_TASK",
    "SLURM_CPUS_ON_NODE",
    "PBS_NP",
    "OMP_NUM_THREADS",
];

fn parse_env_threads(keys: &[&str]) -> Option<ThreadConfig> {
    for &key in keys {
        if let Ok(v) = std::env::var(key) {
            if let Ok(val) = v.trim().parse::<usize>() {
                if val > 0 {
                    return Some(ThreadConfig {
                        count: val,
                        source: key.to_string(),
                    });
                }
            }
        }
    }
    None
}

/// First positive hint from the environment, else the machine's parallelism.
pub fn detect_thread_config() -> ThreadConfig {
    if let Some(cfg) = parse_env_threads(&ENV_HINTS) {
        return cfg;
    }

    let fallback = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .max(1);

    ThreadConfig {
        count: fallback,
        source: "available_parallelism".to_string(),
    }
}

pub fn default_workers() -> usize {
    detect_thread_config().count
}

/// Dedicated pool for one search run. Its threads block on the work channel,
/// so it must not be the global rayon pool.
pub fn worker_pool(workers: usize) -> Result<ThreadPool, ThreadPoolBuildError> {
    let pool = ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("cheapcart-worker-{i}"))
        .build()?;
    info!(workers, "worker pool ready");
    Ok(pool)
}

// -------------------------------------------------------------------------------------
// Memory tracking (leaderboards may outgrow the result limit)
// -------------------------------------------------------------------------------------

const KB: u64 = 1024;
const MB: u64 = KB * 1024;
const GB: u64 = MB * 1024;

fn parse_budget_var(var: &str, multiplier: u64) -> Option<u64> {
    let raw = std::env::var(var).ok()?;
    if raw.trim().is_empty() {
        return None;
    }
    raw.trim()
        .parse::<u64>()
        .ok()
        .map(|v| v.saturating_mul(multiplier))
}

/// Advisory RSS ceiling from `CHEAPCART_MAX_RSS_{BYTES,MB,GB}`.
pub fn memory_budget_bytes() -> Option<u64> {
    parse_budget_var("CHEAPCART_MAX_RSS_BYTES", 1)
        .or_else(|| parse_budget_var("CHEAPCART_MAX_RSS_MB", MB))
        .or_else(|| parse_budget_var("CHEAPCART_MAX_RSS_GB", GB))
}

pub fn current_rss_bytes() -> Option<u64> {
    let contents = std::fs::read_to_string("/proc/self/statm").ok()?;
    let mut parts = contents.split_whitespace();
    let _total = parts.next()?;
    let resident_pages: u64 = parts.next()?.parse().ok()?;
    // SAFETY: sysconf has no preconditions and only reads a constant.
    let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if page_size <= 0 {
        return None;
    }
    Some(resident_pages.saturating_mul(page_size as u64))
}

fn bytes_to_gib(bytes: u64) -> f64 {
    bytes as f64 / GB as f64
}

/// Log resident memory after a cardinality; warn (never abort) over budget.
pub fn report_memory(cardinality: usize, budget: Option<u64>) {
    let Some(rss) = current_rss_bytes() else {
        return;
    };
    match budget {
        Some(limit) if rss > limit => {
            warn!(
                cardinality,
                rss_gib = bytes_to_gib(rss),
                limit_gib = bytes_to_gib(limit),
                "resident memory over budget (CHEAPCART_MAX_RSS_*)"
            );
        }
        _ => {
            info!(cardinality, rss_gib = bytes_to_gib(rss), "memory");
        }
    }
}
