//! Progress events emitted while a scan runs
//!
//! Events are purely observational: consumers such as console renderers may
//! drop them without affecting the scan.

use serde::{Deserialize, Serialize};

/// Lifecycle state of one check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CheckStatus {
    Started,
    Completed { findings: usize },
    Failed { message: String },
}

/// A single progress notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub check_name: String,
    #[serde(flatten)]
    pub status: CheckStatus,
}

impl ProgressEvent {
    pub fn started(check_name: impl Into<String>) -> Self {
        Self {
            check_name: check_name.into(),
            status: CheckStatus::Started,
        }
    }

    pub fn completed(check_name: impl Into<String>, findings: usize) -> Self {
        Self {
            check_name: check_name.into(),
            status: CheckStatus::Completed { findings },
        }
    }

    pub fn failed(check_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            check_name: check_name.into(),
            status: CheckStatus::Failed {
                message: message.into(),
            },
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self.status, CheckStatus::Started)
    }
}
