//! Application configuration
//!
//! JSON config file under the user config directory, nested sections with
//! serde defaults. Site addressing (paths, form field names, the success
//! marker) lives in the `backoffice` constants module; everything an
//! operator may want to change (base URL, timeouts, sync window, storage
//! location) goes through `AppConfig`. Credentials are never compiled in:
//! they come from the config file or the `ENQUIRY_SYNC_EMAIL` /
//! `ENQUIRY_SYNC_PASSWORD` environment variables, the latter winning.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::infrastructure::sync_error::AuthError;

/// Default values for every tunable.
pub mod defaults {
    pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;
    pub const REQUESTS_PER_SECOND: u32 = 2;
    pub const BACKFILL_WEEKS: u32 = 52;
    pub const WATERMARK_FALLBACK_SHEET: &str = "New";
    pub const LOG_LEVEL: &str = "info";
    pub const DATABASE_FILE: &str = "enquiry_sync.db";
    pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
        AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
}

/// Remote back-office addressing and form contract.
pub mod backoffice {
    use chrono::NaiveDate;

    pub const BASE_URL: &str = "https://www.motorist.sg";
    pub const LOGIN_PATH: &str = "/admin-login";

    /// Hidden input carrying the CSRF token on the login form.
    pub const TOKEN_FIELD: &str = "authenticity_token";
    pub const EMAIL_FIELD: &str = "user_admin[email]";
    pub const PASSWORD_FIELD: &str = "user_admin[password]";

    /// Marker present in the post-login body only for authenticated sessions.
    pub const SUCCESS_MARKER: &str = "Logout";

    /// Distinctive class on the weekly review table.
    pub const REVIEW_TABLE_CLASS: &str = "table-striped";

    pub fn login_url(base: &str) -> String {
        format!("{}{}", base.trim_end_matches('/'), LOGIN_PATH)
    }

    /// Paginated enquiry listing, one filter id per scrape target.
    pub fn listing_url(base: &str, filter: u8, page: u32) -> String {
        format!(
            "{}/enquiry/sales?cso_id=&filter={}&page={}&state_id=",
            base.trim_end_matches('/'),
            filter,
            page
        )
    }

    /// Date-ranged weekly review view. The site expects dd/mm/yyyy.
    pub fn review_url(base: &str, start: NaiveDate, end: NaiveDate) -> String {
        format!(
            "{}/review/sales?filter=2&show_only_month=true&start={}&end={}&state_id=",
            base.trim_end_matches('/'),
            start.format("%d/%m/%Y"),
            end.format("%d/%m/%Y")
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    pub base_url: String,
    pub user_agent: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: backoffice::BASE_URL.to_string(),
            user_agent: defaults::USER_AGENT.to_string(),
        }
    }
}

/// Login identity, resolved at run time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialsConfig {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Concrete credentials after file/environment resolution.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl CredentialsConfig {
    pub const EMAIL_ENV: &'static str = "ENQUIRY_SYNC_EMAIL";
    pub const PASSWORD_ENV: &'static str = "ENQUIRY_SYNC_PASSWORD";

    /// Environment variables override file values.
    pub fn resolve(&self) -> Result<Credentials, AuthError> {
        let email = std::env::var(Self::EMAIL_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| self.email.clone());
        let password = std::env::var(Self::PASSWORD_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| self.password.clone());

        match (email, password) {
            (Some(email), Some(password)) => Ok(Credentials { email, password }),
            _ => Err(AuthError::CredentialsMissing {
                hint: format!(
                    "set {} and {} or fill the credentials section of the config file",
                    Self::EMAIL_ENV,
                    Self::PASSWORD_ENV
                ),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub request_timeout_seconds: u64,
    pub requests_per_second: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_seconds: defaults::REQUEST_TIMEOUT_SECONDS,
            requests_per_second: defaults::REQUESTS_PER_SECOND,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Week window pulled on the very first run against an empty dataset.
    pub backfill_weeks: u32,
    /// What to do when the fallback watermark label cannot be parsed:
    /// `true` re-runs the backfill window, `false` fails the target.
    pub full_resync_on_unparsable: bool,
    /// Consolidated sheet whose last row carries the fallback watermark.
    pub watermark_fallback_sheet: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            backfill_weeks: defaults::BACKFILL_WEEKS,
            full_resync_on_unparsable: false,
            watermark_fallback_sheet: defaults::WATERMARK_FALLBACK_SHEET.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite file backing the dataset. Defaults to the user data directory.
    pub database_path: Option<PathBuf>,
}

impl StorageConfig {
    pub fn resolved_database_path(&self) -> PathBuf {
        self.database_path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("enquiry-sync")
                .join(defaults::DATABASE_FILE)
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub console_output: bool,
    pub file_output: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            console_output: true,
            file_output: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Loads and persists the JSON config file.
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine user config directory"))?
            .join("enquiry-sync");
        Ok(Self {
            config_path: config_dir.join("config.json"),
        })
    }

    pub fn with_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    pub fn config_path(&self) -> &PathBuf {
        &self.config_path
    }

    /// Create a default config file on first run, then load it.
    pub fn initialize_on_first_run(&self) -> Result<AppConfig> {
        if !self.config_path.exists() {
            let default_config = AppConfig::default();
            self.save_config(&default_config)?;
            info!(
                "Created default configuration at {}",
                self.config_path.display()
            );
            return Ok(default_config);
        }
        self.load_config()
    }

    pub fn load_config(&self) -> Result<AppConfig> {
        let content = std::fs::read_to_string(&self.config_path).with_context(|| {
            format!("Failed to read config file {}", self.config_path.display())
        })?;
        let config: AppConfig = serde_json::from_str(&content).with_context(|| {
            format!("Failed to parse config file {}", self.config_path.display())
        })?;
        Ok(config)
    }

    pub fn save_config(&self, config: &AppConfig) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory {}", parent.display())
            })?;
        }
        let content =
            serde_json::to_string_pretty(config).context("Failed to serialize configuration")?;
        std::fs::write(&self.config_path, content).with_context(|| {
            format!("Failed to write config file {}", self.config_path.display())
        })?;
        Ok(())
    }
}
