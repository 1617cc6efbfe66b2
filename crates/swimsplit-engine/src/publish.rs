//! Publishing the report to a dated spreadsheet tab.

use crate::config::{ConfigError, SheetsConfig};
use async_trait::async_trait;
use swimsplit_common::parse_rows;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum SheetsError {
    #[error("A sheet with the name \"{0}\" already exists")]
    AlreadyExists(String),
    #[error("Sheets API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Invalid URL: {0}")]
    Url(String),
}

/// The two spreadsheet calls the publisher needs, bound to one spreadsheet.
#[async_trait]
pub trait SheetsApi: Send + Sync {
    async fn add_sheet(&self, title: &str) -> Result<(), SheetsError>;

    /// Write `rows` starting at `range` (e.g. `2025-04-13!A1`).
    async fn update_values(&self, range: &str, rows: &[Vec<String>]) -> Result<(), SheetsError>;
}

/// Builds a [`SheetsApi`] from configuration at publish time, so missing
/// spreadsheet settings only fail the publish step.
pub trait SheetsConnector: Send + Sync {
    fn connect(&self, config: &SheetsConfig) -> Result<Box<dyn SheetsApi>, PublishError>;
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Failed to create sheet tab \"{title}\": {source}")]
    CreateTab { title: String, source: SheetsError },
    #[error("Failed to write values to \"{title}\": {source}")]
    Write { title: String, source: SheetsError },
}

/// Tab name tried when `title` is taken.
pub fn fallback_title(title: &str) -> String {
    format!("{}-2", title)
}

/// Create a tab named `date` and write the report rows from `A1`.
///
/// A name collision is retried once as `<date>-2`. Returns the title of the
/// tab that was written.
pub async fn publish_report(
    api: &dyn SheetsApi,
    report_text: &str,
    date: &str,
) -> Result<String, PublishError> {
    let rows = parse_rows(report_text);

    let title = match api.add_sheet(date).await {
        Ok(()) => date.to_string(),
        Err(SheetsError::AlreadyExists(_)) => {
            let fallback = fallback_title(date);
            warn!(
                "Sheet \"{}\" already exists. Trying \"{}\"...",
                date, fallback
            );
            api.add_sheet(&fallback)
                .await
                .map_err(|source| PublishError::CreateTab {
                    title: fallback.clone(),
                    source,
                })?;
            fallback
        }
        Err(source) => {
            return Err(PublishError::CreateTab {
                title: date.to_string(),
                source,
            });
        }
    };

    api.update_values(&format!("{}!A1", title), &rows)
        .await
        .map_err(|source| PublishError::Write {
            title: title.clone(),
            source,
        })?;

    info!("Uploaded to Google Sheet tab: {}", title);
    Ok(title)
}
