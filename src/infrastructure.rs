//! Infrastructure layer: HTTP session, extraction, persistence, configuration
//!
//! Everything that touches the outside world lives here: the authenticated
//! back-office session, the table extraction and normalization pipeline, the
//! SQLite-backed dataset, and configuration plus logging setup.

pub mod config;
pub mod dataset_store;
pub mod http_session;
pub mod logging;
pub mod normalizer;
pub mod paginator;
pub mod sync_error;
pub mod table_extractor;

// Re-export commonly used items
pub use config::{AppConfig, ConfigManager, Credentials, backoffice};
pub use dataset_store::{DatasetStats, DatasetStore, SheetVariant, SheetWrite};
pub use http_session::{HttpSession, PageFetcher};
pub use logging::{get_log_directory, init_logging, init_logging_with_config};
pub use paginator::{PaginationHarvest, Paginator, SectionHarvest};
pub use sync_error::{AuthError, FetchError, StoreError, SyncError, SyncResult};
pub use table_extractor::{ExtractionOutcome, TableExtractor};
