//! Domain module - Core data model of the sync engine
//!
//! Sections, records, week buckets, and run reports: the vocabulary shared
//! by the extraction, scheduling, and persistence layers. Nothing in here
//! touches the network or the database.
//!
//! Modern Rust module organization (Rust 2018+ style):
//! - Each module is its own file in the domain/ directory
//! - Public exports are defined here for convenience

pub mod period;
pub mod record;
pub mod report;
pub mod section;

// Re-export commonly used items for convenience
pub use period::{outstanding_buckets, remote_now, WeekBucket, BUCKET_DAYS};
pub use record::RawRecord;
pub use report::{SyncReport, TargetOutcome, TargetReport};
pub use section::{ColumnRole, ColumnSpec, SectionLocator, SectionSpec, TargetKind, TargetSpec};
