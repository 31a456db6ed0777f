//! Error taxonomy for scrape and sync operations
//!
//! Severity follows the run model: authentication errors abort the whole
//! run, store errors fail the current target, fetch errors degrade a single
//! page or period. Anything below run-fatal is absorbed at its component
//! boundary and surfaces through the run report instead of unwinding.

use thiserror::Error;

/// Errors establishing or verifying an authenticated session. Always fatal
/// to the run: no scraping may proceed without a session.
#[derive(Error, Debug, Clone)]
pub enum AuthError {
    #[error("Credentials are not configured: {hint}")]
    CredentialsMissing { hint: String },

    #[error("Login page unreachable: status {status}")]
    LoginPageUnreachable { status: u16 },

    #[error("Login form has no '{field}' input")]
    TokenFieldMissing { field: String },

    #[error("Login request failed: {message}")]
    Transport { message: String },

    #[error("Login not accepted: marker '{marker}' absent from response (status {status})")]
    MarkerAbsent { marker: String, status: u16 },
}

impl AuthError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn token_field_missing(field: &str) -> Self {
        Self::TokenFieldMissing {
            field: field.to_string(),
        }
    }
}

/// Errors fetching a single authorized page. Callers decide whether this is
/// fatal (prerequisite page) or skippable (one page of a pagination run, one
/// bucket of a drain).
#[derive(Error, Debug, Clone)]
pub enum FetchError {
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Request to {url} timed out after {timeout_seconds}s")]
    Timeout { url: String, timeout_seconds: u64 },

    #[error("Request to {url} failed: {message}")]
    Transport { url: String, message: String },
}

impl FetchError {
    pub fn status(status: u16, url: &str) -> Self {
        Self::Status {
            status,
            url: url.to_string(),
        }
    }

    pub fn transport(url: &str, message: impl Into<String>) -> Self {
        Self::Transport {
            url: url.to_string(),
            message: message.into(),
        }
    }
}

/// Errors from the persisted dataset.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Sheet '{name}' not found in {variant} variant")]
    SheetNotFound { variant: String, name: String },

    #[error("Stored cells are not valid JSON in sheet '{sheet}': {message}")]
    CorruptCells { sheet: String, message: String },

    #[error("Period '{label}' already synced for target '{target}'")]
    PeriodAlreadySynced { target: String, label: String },

    #[error("Watermark label '{label}' is not parsable as a week period")]
    WatermarkUnparsable { label: String },

    #[error("Storage setup failed: {message}")]
    Setup { message: String },
}

impl StoreError {
    pub fn setup(message: impl Into<String>) -> Self {
        Self::Setup {
            message: message.into(),
        }
    }

    pub fn corrupt_cells(sheet: &str, message: impl Into<String>) -> Self {
        Self::CorruptCells {
            sheet: sheet.to_string(),
            message: message.into(),
        }
    }
}

/// Top-level run errors. Only these terminate a run early; everything else
/// is reported per target.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl SyncError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
