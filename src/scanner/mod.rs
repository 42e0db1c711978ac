//! Scan orchestration: navigation passes, filtering and parse task
//! scheduling.
//!
//! The navigation thread drives one pass at a time (light cones, relics,
//! characters) as a step-wise state machine. Each captured item becomes a
//! parse task on its own worker thread; all tasks are joined once navigation
//! ends, whether it completed, was interrupted or failed.

pub mod cancel;
pub mod config;
pub mod context;
pub mod filter;
pub mod inventory;
pub mod nav;
pub mod orchestrator;
pub mod progress;
pub mod retry;
pub mod roster;
pub mod tasks;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use crate::error::Result;
use crate::layout::ScreenLayout;
use crate::parser::ParseContext;

pub use cancel::CancellationToken;
pub use config::{Hotkeys, ScanConfig, ScanMode, load_config};
pub use context::ScanContext;
pub use filter::FilterEvaluator;
pub use nav::{Navigator, Timing};
pub use orchestrator::{Outcome, ScanEnv, run_scan};
pub use progress::{LogProgress, ProgressEvent, ProgressSink};
pub use tasks::ScanTaskSet;

/// Read-only state shared by the passes of one scan.
pub struct LoopContext {
    pub config: ScanConfig,
    pub hotkeys: Hotkeys,
    pub layout: &'static ScreenLayout,
    pub parse: ParseContext,
    pub filter: FilterEvaluator,
    pub progress: Arc<dyn ProgressSink>,
}

/// What a pass leaves behind. The task set is returned even when the pass
/// failed so already-spawned tasks can still be joined.
pub struct PassOutput {
    pub tasks: ScanTaskSet,
    pub unresolved_duplicates: usize,
    pub result: Result<()>,
}
