use serde::Serialize;
use tracing::{error, info};

use crate::gateway::{GatewayError, RecordStore};
use crate::model::SchoolRecord;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Connection,
    DataFetch,
}

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Stage::Connection => "connection",
            Stage::DataFetch => "data fetch",
        }
    }
}

/// Error details as the service reported them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorDetails {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl From<&GatewayError> for ErrorDetails {
    fn from(err: &GatewayError) -> Self {
        match err {
            GatewayError::Remote {
                status,
                message,
                code,
                details,
                hint,
            } => ErrorDetails {
                message: message.clone(),
                status: Some(*status),
                code: code.clone(),
                details: details.clone(),
                hint: hint.clone(),
            },
            other => ErrorDetails {
                message: other.to_string(),
                status: None,
                code: None,
                details: None,
                hint: None,
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DiagnosticOutcome {
    Success { count: u64, records: Vec<SchoolRecord> },
    Failed { stage: Stage, error: ErrorDetails },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DiagnosticReport {
    pub table_url: String,
    #[serde(flatten)]
    pub outcome: DiagnosticOutcome,
}

impl DiagnosticReport {
    pub fn status_line(&self) -> String {
        match &self.outcome {
            DiagnosticOutcome::Success { records, .. } => {
                format!("Success! Found {} schools", records.len())
            }
            DiagnosticOutcome::Failed { stage, .. } => format!("{} failed", capitalize(stage.label())),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, DiagnosticOutcome::Success { .. })
    }
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Connectivity check: a count query first, then a full select. Stops at the
/// first failing stage.
pub async fn run(store: &dyn RecordStore, table_url: impl Into<String>) -> DiagnosticReport {
    let table_url = table_url.into();
    info!(%table_url, "testing database connection");

    let count = match store.count().await {
        Ok(count) => count,
        Err(e) => {
            error!(error = %e, "connection test failed");
            return DiagnosticReport {
                table_url,
                outcome: DiagnosticOutcome::Failed {
                    stage: Stage::Connection,
                    error: ErrorDetails::from(&e),
                },
            };
        }
    };
    info!(count, "connection successful, testing data fetch");

    match store.list_all(None).await {
        Ok(records) => {
            info!(fetched = records.len(), "database test successful");
            DiagnosticReport {
                table_url,
                outcome: DiagnosticOutcome::Success { count, records },
            }
        }
        Err(e) => {
            error!(error = %e, "data fetch failed");
            DiagnosticReport {
                table_url,
                outcome: DiagnosticOutcome::Failed {
                    stage: Stage::DataFetch,
                    error: ErrorDetails::from(&e),
                },
            }
        }
    }
}
