//! WebProbe WebApp - Probing a web server for misconfigurations
//!
//! This crate provides:
//! - `ScanConfig`: per-scan settings shared read-only by every check
//! - `ProbeClient`: rate-limited, cancellable HTTP client used by checks
//! - `Check`: the trait every check implements
//! - Security header analysis and the built-in checks
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use webprobe_core::Target;
//! use webprobe_webapp::{checks::HeaderChecks, Check, CheckContext, ProbeClient, ScanConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let target = Target::parse("https://example.com").unwrap();
//!     let config = ScanConfig::default().with_delay_ms(0);
//!     let client = ProbeClient::new(&target, &config, CancellationToken::new()).unwrap();
//!     let ctx = CheckContext::new(Arc::new(client), target, config);
//!
//!     for finding in HeaderChecks::new().run(&ctx).await.unwrap() {
//!         println!("{}: {}", finding.severity, finding.description);
//!     }
//! }
//! ```

pub mod check;
pub mod checks;
pub mod client;
pub mod headers;
pub mod ratelimit;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use check::{Check, CheckCategory, CheckContext, CheckMetadata, CheckResult};
pub use client::{HttpResponse, ProbeClient, ProbeRequest, ReqwestTransport, Transport};
pub use headers::{HeaderAnalysis, HeaderCheckStatus, HeaderIssue, HeaderStatus, SecurityHeaders};
pub use ratelimit::RateLimiter;

use serde::{Deserialize, Serialize};
use std::time::Duration;
use webprobe_core::{Error, Result};

/// Selection keyword meaning "every registered check"
pub const ALL_CHECKS: &str = "all";

/// Scan configuration.
///
/// Constructed once from external input and never mutated while a scan runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Worker pool size (at least 1)
    pub threads: usize,
    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,
    /// Minimum spacing between requests from one client (ms)
    pub request_delay_ms: u64,
    /// Verify TLS certificates
    pub verify_tls: bool,
    /// Proxy URL for all requests
    pub proxy: Option<String>,
    /// User agent string
    pub user_agent: String,
    /// Custom headers to include
    pub custom_headers: Vec<(String, String)>,
    /// Follow redirects
    pub follow_redirects: bool,
    /// Maximum redirects to follow
    pub max_redirects: u32,
    /// Checks to run, empty (or "all") meaning every registered check
    pub checks: Vec<String>,
    /// Checks removed from the selection after resolution
    pub excluded_checks: Vec<String>,
    /// Global deadline for the whole scan (ms)
    pub scan_timeout_ms: Option<u64>,
    /// How long in-flight checks may keep running after cancellation (ms)
    pub grace_period_ms: u64,
    /// Request the target once before dispatching checks
    pub preflight: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            threads: 10,
            timeout_ms: 30_000,
            request_delay_ms: 100,
            verify_tls: true,
            proxy: None,
            user_agent: format!("WebProbe/{} (Security Scanner)", env!("CARGO_PKG_VERSION")),
            custom_headers: Vec::new(),
            follow_redirects: true,
            max_redirects: 10,
            checks: Vec::new(),
            excluded_checks: Vec::new(),
            scan_timeout_ms: None,
            grace_period_ms: 5_000,
            preflight: true,
        }
    }
}

impl ScanConfig {
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_timeout_ms(mut self, timeout: u64) -> Self {
        self.timeout_ms = timeout;
        self
    }

    pub fn with_delay_ms(mut self, delay: u64) -> Self {
        self.request_delay_ms = delay;
        self
    }

    pub fn with_verify_tls(mut self, verify: bool) -> Self {
        self.verify_tls = verify;
        self
    }

    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_headers.push((name.into(), value.into()));
        self
    }

    pub fn with_checks<I, S>(mut self, checks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.checks = checks.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_excluded<I, S>(mut self, checks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_checks = checks.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_scan_timeout_ms(mut self, timeout: u64) -> Self {
        self.scan_timeout_ms = Some(timeout);
        self
    }

    pub fn with_grace_period_ms(mut self, grace: u64) -> Self {
        self.grace_period_ms = grace;
        self
    }

    pub fn with_preflight(mut self, enabled: bool) -> Self {
        self.preflight = enabled;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn scan_timeout(&self) -> Option<Duration> {
        self.scan_timeout_ms.map(Duration::from_millis)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    /// The explicit check selection, or empty when only "all" was asked for.
    ///
    /// Names listed next to "all" are kept so the registry can still reject
    /// unknown ones.
    pub fn selected_checks(&self) -> Vec<String> {
        if self.checks.iter().all(|c| c.trim().eq_ignore_ascii_case(ALL_CHECKS)) {
            return Vec::new();
        }
        self.checks.clone()
    }

    /// Reject configurations a scan cannot start with
    pub fn validate(&self) -> Result<()> {
        if self.threads == 0 {
            return Err(invalid("threads", "must be at least 1"));
        }
        if self.timeout_ms == 0 {
            return Err(invalid("timeout_ms", "must be greater than zero"));
        }
        if self.user_agent.trim().is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }
        if self.follow_redirects && self.max_redirects == 0 {
            return Err(invalid("max_redirects", "must be at least 1 when following redirects"));
        }
        if let Some(proxy) = &self.proxy {
            let parsed = url::Url::parse(proxy).map_err(|e| invalid("proxy", &e.to_string()))?;
            if !matches!(parsed.scheme(), "http" | "https" | "socks5" | "socks5h") {
                return Err(invalid("proxy", "scheme must be http, https or socks5"));
            }
        }
        for (name, value) in &self.custom_headers {
            reqwest::header::HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| invalid("custom_headers", &format!("invalid header name '{}'", name)))?;
            reqwest::header::HeaderValue::from_str(value)
                .map_err(|_| invalid("custom_headers", &format!("invalid value for '{}'", name)))?;
        }
        if self.scan_timeout_ms == Some(0) {
            return Err(invalid("scan_timeout_ms", "must be greater than zero when set"));
        }
        Ok(())
    }
}

fn invalid(key: &str, message: &str) -> Error {
    Error::InvalidConfig {
        key: key.to_string(),
        message: message.to_string(),
    }
}

/// OWASP Top 10 2021 categories referenced by findings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OwaspCategory {
    /// A01:2021 - Broken Access Control
    A01BrokenAccessControl,
    /// A02:2021 - Cryptographic Failures
    A02CryptographicFailures,
    /// A05:2021 - Security Misconfiguration
    A05SecurityMisconfiguration,
    /// A06:2021 - Vulnerable and Outdated Components
    A06VulnerableComponents,
}

impl OwaspCategory {
    pub fn code(&self) -> &'static str {
        match self {
            Self::A01BrokenAccessControl => "A01:2021",
            Self::A02CryptographicFailures => "A02:2021",
            Self::A05SecurityMisconfiguration => "A05:2021",
            Self::A06VulnerableComponents => "A06:2021",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::A01BrokenAccessControl => "Broken Access Control",
            Self::A02CryptographicFailures => "Cryptographic Failures",
            Self::A05SecurityMisconfiguration => "Security Misconfiguration",
            Self::A06VulnerableComponents => "Vulnerable and Outdated Components",
        }
    }

    /// Reference string attached to findings
    pub fn reference(&self) -> String {
        format!("OWASP {} {}", self.code(), self.name())
    }
}
