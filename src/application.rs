//! Application layer module
//!
//! The target catalogue plus the two drivers that run it: the snapshot
//! orchestrator and the watermark scheduler.

pub mod orchestrator;
pub mod scheduler;
pub mod targets;

// Re-export commonly used items for convenience
pub use orchestrator::SyncOrchestrator;
pub use scheduler::{DrainSummary, SchedulerState, WatermarkScheduler};
pub use targets::{builtin_targets, WEEKLY_REVIEW_TARGET};
