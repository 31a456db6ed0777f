//! Enquiry Sync - Tabular scrape and incremental synchronization engine
//!
//! Signs in to the Motorist back office, lifts the labeled enquiry tables
//! out of its listing views, and keeps a local SQLite dataset in step:
//! listing targets are snapshotted wholesale, the weekly sales review is
//! drained incrementally week by week behind a watermark.

// Module declarations
pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;

// Re-export the run surface for easier access
pub use application::SyncOrchestrator;
pub use domain::SyncReport;
pub use infrastructure::{AppConfig, ConfigManager};
