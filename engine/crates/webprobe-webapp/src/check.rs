//! Check trait and metadata - the interface all web checks implement

use crate::client::{HttpResponse, ProbeClient};
use crate::ScanConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::Url;
use webprobe_core::{Finding, ProbeError, Severity, Target};

/// Result of executing a check
pub type CheckResult = webprobe_core::Result<Vec<Finding>>;

/// The trait that all checks must implement.
///
/// A check receives a shared, read-only context and returns its findings.
/// Probe failures for individual URLs are normally swallowed by the check;
/// returning `Err` fails the whole check and is recorded as a check error.
#[async_trait]
pub trait Check: Send + Sync {
    /// Registry name (e.g. "header_checks")
    fn name(&self) -> &str;

    /// Get the check metadata
    fn metadata(&self) -> &CheckMetadata;

    /// Execute the check against the given context
    async fn run(&self, ctx: &CheckContext) -> CheckResult;
}

/// Groups checks for listing and filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckCategory {
    Headers,
    ServerInfo,
    Files,
    Methods,
    Cookies,
    Misc,
    Custom,
}

impl std::fmt::Display for CheckCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CheckCategory::Headers => "headers",
            CheckCategory::ServerInfo => "server_info",
            CheckCategory::Files => "files",
            CheckCategory::Methods => "methods",
            CheckCategory::Cookies => "cookies",
            CheckCategory::Misc => "misc",
            CheckCategory::Custom => "custom",
        };
        write!(f, "{}", s)
    }
}

/// Metadata describing a check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckMetadata {
    /// Registry name
    pub name: String,

    /// Detailed description
    pub description: String,

    pub category: CheckCategory,

    /// Highest severity this check can report
    pub severity: Severity,

    #[serde(default)]
    pub references: Vec<String>,

    /// Tags for filtering/grouping
    #[serde(default)]
    pub tags: Vec<String>,
}

impl CheckMetadata {
    pub fn new(name: impl Into<String>, category: CheckCategory, severity: Severity) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            category,
            severity,
            references: Vec::new(),
            tags: Vec::new(),
        }
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.references.push(reference.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }
}

/// Context passed to checks during execution.
///
/// Shared by every check in a scan; nothing in it is mutable from a check.
#[derive(Debug, Clone)]
pub struct CheckContext {
    /// HTTP client bound to the target
    pub client: Arc<ProbeClient>,

    /// The target being scanned
    pub target: Target,

    /// Scan configuration
    pub config: Arc<ScanConfig>,
}

impl CheckContext {
    pub fn new(client: Arc<ProbeClient>, target: Target, config: ScanConfig) -> Self {
        Self {
            client,
            target,
            config: Arc::new(config),
        }
    }

    pub fn from_shared(client: Arc<ProbeClient>, target: Target, config: Arc<ScanConfig>) -> Self {
        Self {
            client,
            target,
            config,
        }
    }

    /// GET a path relative to the target
    pub async fn get(&self, path: &str) -> Result<HttpResponse, ProbeError> {
        self.client.get(path).await
    }

    /// GET a path, logging and swallowing failures
    pub async fn try_get(&self, path: &str) -> Option<HttpResponse> {
        match self.client.get(path).await {
            Ok(response) => Some(response),
            Err(e) => {
                tracing::debug!("probe of {} failed: {}", path, e);
                None
            }
        }
    }

    /// Absolute URL string for a path, falling back to base + path
    pub fn url_for(&self, path: &str) -> String {
        self.target
            .join(path)
            .map(|u: Url| u.to_string())
            .unwrap_or_else(|_| format!("{}{}", self.target.base(), path))
    }

    pub fn is_cancelled(&self) -> bool {
        self.client.is_cancelled()
    }
}
