use crate::config::ConfigError;
use crate::fetch::FetchError;
use crate::publish::PublishError;
use crate::session::SessionError;
use serde::Serialize;
use std::fmt;
use swimsplit_common::RawLap;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCategory {
    #[serde(rename = "ConfigurationError")]
    Configuration,
    #[serde(rename = "SessionAcquisitionError")]
    SessionAcquisition,
    #[serde(rename = "FetchError")]
    Fetch,
    #[serde(rename = "PublishError")]
    Publish,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCategory::Configuration => "ConfigurationError",
            ErrorCategory::SessionAcquisition => "SessionAcquisitionError",
            ErrorCategory::Fetch => "FetchError",
            ErrorCategory::Publish => "PublishError",
        };
        f.write_str(name)
    }
}

/// Any error that ends a run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Publish(#[from] PublishError),
}

impl RunError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            RunError::Config(_) | RunError::Publish(PublishError::Config(_)) => {
                ErrorCategory::Configuration
            }
            RunError::Session(_) => ErrorCategory::SessionAcquisition,
            RunError::Fetch(_) => ErrorCategory::Fetch,
            RunError::Publish(_) => ErrorCategory::Publish,
        }
    }
}

/// Result of one run, printed as JSON by the binary.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Success {
        activity_id: String,
        report: String,
        laps: Vec<RawLap>,
        /// Tab the report was written to; unset when publishing was skipped.
        #[serde(skip_serializing_if = "Option::is_none")]
        sheet_title: Option<String>,
    },
    Failure {
        category: ErrorCategory,
        message: String,
    },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Success { .. })
    }
}

impl From<RunError> for RunOutcome {
    fn from(err: RunError) -> Self {
        RunOutcome::Failure {
            category: err.category(),
            message: err.to_string(),
        }
    }
}
