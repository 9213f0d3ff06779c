pub mod channel;
pub mod driver;
pub mod leaderboard;
pub mod solve;
pub mod types;

pub use channel::{ShutdownGuard, WorkChannel};
pub use driver::{RunPhase, RunTracker, SearchConfig, SearchOutcome, SearchStats, run_search};
pub use leaderboard::{Leaderboard, Ranking, WatermarkPolicy};
pub use solve::Evaluator;
pub use types::*;
