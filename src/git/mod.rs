//! Git history access.
//!
//! Commit history mining and the per-repository incremental state that
//! makes repeated loads resume where the previous one stopped.

mod miner;
mod state;

pub use miner::{CommitInfo, HistoryMiner, MineOptions};
pub use state::{HighWaterMark, IncrementalState};
