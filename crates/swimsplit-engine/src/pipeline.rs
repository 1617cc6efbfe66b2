//! The one-shot run: login, fetch, aggregate, publish.

use crate::backend::Backend;
use crate::config::Config;
use crate::error::{RunError, RunOutcome};
use crate::fetch::SplitsSource;
use crate::publish::{SheetsConnector, publish_report};
use crate::session::{SessionOptions, acquire_session};
use swimsplit_common::{build_report, serialize_report};
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Skip the spreadsheet step and only return the report.
    pub publish: bool,
    pub session: SessionOptions,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            publish: true,
            session: SessionOptions::default(),
        }
    }
}

pub struct Pipeline<'a> {
    splits: &'a dyn SplitsSource,
    sheets: &'a dyn SheetsConnector,
    options: RunOptions,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        splits: &'a dyn SplitsSource,
        sheets: &'a dyn SheetsConnector,
        options: RunOptions,
    ) -> Self {
        Self {
            splits,
            sheets,
            options,
        }
    }

    /// Run every stage; the first failure ends the run.
    pub async fn run<B: Backend + ?Sized>(&self, backend: &mut B, config: &Config) -> RunOutcome {
        info!("Starting run");
        match self.execute(backend, config).await {
            Ok(outcome) => {
                info!("Run finished successfully");
                outcome
            }
            Err(e) => {
                error!("Run failed ({}): {}", e.category(), e);
                e.into()
            }
        }
    }

    async fn execute<B: Backend + ?Sized>(
        &self,
        backend: &mut B,
        config: &Config,
    ) -> Result<RunOutcome, RunError> {
        let acquired = acquire_session(
            backend,
            &config.credentials,
            &config.target_activity,
            &self.options.session,
        )
        .await?;

        info!("Fetching splits for activity ID: {}", acquired.activity_id);
        let splits = self
            .splits
            .fetch_splits(&acquired.session, &acquired.activity_id)
            .await?;

        let report = build_report(splits.laps(), &acquired.activity_id);
        if report.is_placeholder() {
            warn!("API returned data, but no laps (lapDTOs) were found in the response.");
        }
        let text = serialize_report(&report);

        let sheet_title = if self.options.publish {
            let api = self.sheets.connect(&config.sheets)?;
            Some(publish_report(api.as_ref(), &text, &splits.date_key()).await?)
        } else {
            info!("Publishing disabled; skipping spreadsheet upload");
            None
        };

        Ok(RunOutcome::Success {
            activity_id: acquired.activity_id,
            report: text,
            laps: splits.lap_dtos.unwrap_or_default(),
            sheet_title,
        })
    }
}
