pub mod loader;

pub use loader::{ConfigError, ConfigLoader};

use crate::session::Credentials;
use std::path::PathBuf;

pub const DEFAULT_TARGET_ACTIVITY: &str = "Pool Swim";

#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: Credentials,
    /// Substring matched against the activity list entries.
    pub target_activity: String,
    pub sheets: SheetsConfig,
    pub browser: BrowserOptions,
}

/// Destination spreadsheet. Checked only when publishing.
#[derive(Clone, Default)]
pub struct SheetsConfig {
    pub service_account_key_base64: Option<String>,
    pub spreadsheet_id: Option<String>,
}

impl SheetsConfig {
    /// Key and spreadsheet id, or the name of the first missing variable.
    pub fn require(&self) -> Result<(&str, &str), ConfigError> {
        let key = self
            .service_account_key_base64
            .as_deref()
            .ok_or(ConfigError::Missing(loader::SERVICE_ACCOUNT_KEY_VAR))?;
        let sheet_id = self
            .spreadsheet_id
            .as_deref()
            .ok_or(ConfigError::Missing(loader::SHEET_ID_VAR))?;
        Ok((key, sheet_id))
    }
}

impl std::fmt::Debug for SheetsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SheetsConfig")
            .field(
                "service_account_key_base64",
                &self.service_account_key_base64.as_ref().map(|_| "<redacted>"),
            )
            .field("spreadsheet_id", &self.spreadsheet_id)
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct BrowserOptions {
    /// Run headed instead of headless.
    pub visible: bool,
    pub chrome_bin: Option<PathBuf>,
    /// Persistent profile directory. A throwaway one is used when unset.
    pub user_data_dir: Option<PathBuf>,
}
