use super::{BrowserOptions, Config, DEFAULT_TARGET_ACTIVITY, SheetsConfig};
use crate::session::Credentials;
use std::path::PathBuf;
use thiserror::Error;

pub const EMAIL_VAR: &str = "GARMIN_EMAIL";
pub const PASSWORD_VAR: &str = "GARMIN_PASSWORD";
pub const TARGET_ACTIVITY_VAR: &str = "GARMIN_TARGET_ACTIVITY_TYPE_STRING";
pub const SERVICE_ACCOUNT_KEY_VAR: &str = "SERVICE_ACCOUNT_KEY_BASE64";
pub const SHEET_ID_VAR: &str = "GOOGLE_SHEET_ID";
pub const CHROME_BIN_VAR: &str = "CHROME_BIN";
pub const USER_DATA_DIR_VAR: &str = "SWIMSPLIT_USER_DATA_DIR";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("GARMIN_EMAIL and GARMIN_PASSWORD environment variables must be set")]
    MissingCredentials,
    #[error("Missing {0}")]
    Missing(&'static str),
    #[error("Invalid service account key: {0}")]
    InvalidKey(String),
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from the process environment.
    pub fn from_env() -> Result<Config, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load through `lookup`; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Config, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let (Some(email), Some(password)) = (get(EMAIL_VAR), get(PASSWORD_VAR)) else {
            return Err(ConfigError::MissingCredentials);
        };

        Ok(Config {
            credentials: Credentials { email, password },
            target_activity: get(TARGET_ACTIVITY_VAR)
                .unwrap_or_else(|| DEFAULT_TARGET_ACTIVITY.to_string()),
            sheets: SheetsConfig {
                service_account_key_base64: get(SERVICE_ACCOUNT_KEY_VAR),
                spreadsheet_id: get(SHEET_ID_VAR),
            },
            browser: BrowserOptions {
                visible: false,
                chrome_bin: get(CHROME_BIN_VAR).map(PathBuf::from),
                user_data_dir: get(USER_DATA_DIR_VAR).map(PathBuf::from),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_requires_credentials() {
        let err = ConfigLoader::from_lookup(lookup(&[(EMAIL_VAR, "me@example.com")])).unwrap_err();
        assert_eq!(err, ConfigError::MissingCredentials);

        let err = ConfigLoader::from_lookup(lookup(&[
            (EMAIL_VAR, "me@example.com"),
            (PASSWORD_VAR, ""),
        ]))
        .unwrap_err();
        assert_eq!(err, ConfigError::MissingCredentials);
    }

    #[test]
    fn test_defaults() {
        let config = ConfigLoader::from_lookup(lookup(&[
            (EMAIL_VAR, "me@example.com"),
            (PASSWORD_VAR, "secret"),
        ]))
        .unwrap();
        assert_eq!(config.target_activity, "Pool Swim");
        assert!(config.sheets.service_account_key_base64.is_none());
        assert!(config.browser.chrome_bin.is_none());
        assert!(!config.browser.visible);
    }

    #[test]
    fn test_sheets_checked_lazily() {
        let config = ConfigLoader::from_lookup(lookup(&[
            (EMAIL_VAR, "me@example.com"),
            (PASSWORD_VAR, "secret"),
            (SERVICE_ACCOUNT_KEY_VAR, "e30="),
        ]))
        .unwrap();
        assert_eq!(
            config.sheets.require().unwrap_err(),
            ConfigError::Missing(SHEET_ID_VAR)
        );
    }

    #[test]
    fn test_overrides() {
        let config = ConfigLoader::from_lookup(lookup(&[
            (EMAIL_VAR, "me@example.com"),
            (PASSWORD_VAR, "secret"),
            (TARGET_ACTIVITY_VAR, "Open Water Swim"),
            (SHEET_ID_VAR, "sheet-1"),
            (SERVICE_ACCOUNT_KEY_VAR, "e30="),
            (CHROME_BIN_VAR, "/usr/bin/chromium"),
        ]))
        .unwrap();
        assert_eq!(config.target_activity, "Open Water Swim");
        assert_eq!(config.sheets.require().unwrap(), ("e30=", "sheet-1"));
        assert_eq!(
            config.browser.chrome_bin,
            Some(PathBuf::from("/usr/bin/chromium"))
        );
    }
}
