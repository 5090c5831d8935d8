//! Default pages and https downgrade

use crate::check::{Check, CheckCategory, CheckContext, CheckMetadata, CheckResult};
use crate::OwaspCategory;
use async_trait::async_trait;
use tracing::debug;
use webprobe_core::{Finding, Severity};

const DEFAULT_PAGES: &[&str] = &[
    "/default.aspx",
    "/default.asp",
    "/index.asp",
    "/index.aspx",
    "/test.php",
    "/test.asp",
    "/test.aspx",
    "/test.html",
    "/phpinfo.php",
    "/server-status",
    "/server-info",
    "/welcome.php",
    "/hello.php",
    "/example.php",
];

const DEFAULT_PAGE_INDICATORS: &[&str] = &[
    "welcome",
    "test page",
    "default page",
    "phpinfo",
    "server status",
    "apache",
    "nginx",
    "iis",
    "test script",
    "example page",
];

/// Default/test pages and SSL stripping
pub struct MiscChecks {
    metadata: CheckMetadata,
}

impl MiscChecks {
    pub const NAME: &'static str = "misc_checks";

    pub fn new() -> Self {
        Self {
            metadata: CheckMetadata::new(Self::NAME, CheckCategory::Misc, Severity::High)
                .with_description("Default or test pages and plain-http downgrade of https targets")
                .with_tag("active"),
        }
    }

    async fn check_default_pages(&self, ctx: &CheckContext) -> Vec<Finding> {
        let mut findings = Vec::new();

        for &page in DEFAULT_PAGES {
            if ctx.is_cancelled() {
                break;
            }
            let Some(response) = ctx.try_get(page).await else { continue };
            if response.status != 200 || response.is_binary() {
                continue;
            }

            let content = response.body.to_lowercase();
            let matched: Vec<&str> = DEFAULT_PAGE_INDICATORS
                .iter()
                .copied()
                .filter(|i| content.contains(i))
                .collect();
            if matched.is_empty() {
                continue;
            }

            findings.push(
                Finding::builder(Self::NAME, ctx.url_for(page))
                    .title("default_page_exposed")
                    .description(format!("Default or test page exposed: {}", page))
                    .severity(Severity::Low)
                    .evidence(format!(
                        "Status: {}\nContent contains: {}",
                        response.status,
                        matched.join(" | ")
                    ))
                    .recommendation(format!("Remove or replace default page {}", page))
                    .reference(OwaspCategory::A05SecurityMisconfiguration.reference())
                    .build(),
            );
        }

        findings
    }

    /// An https target whose http counterpart redirects to another http URL
    async fn check_ssl_stripping(&self, ctx: &CheckContext) -> Option<Finding> {
        if !ctx.target.is_https() {
            return None;
        }

        let http_url = ctx.target.with_scheme("http").ok()?;
        let response = match ctx.client.get_no_redirect(http_url.as_str()).await {
            Ok(response) => response,
            Err(e) => {
                debug!("plain http probe failed: {}", e);
                return None;
            }
        };

        if !matches!(response.status, 301 | 302 | 303 | 307 | 308) {
            return None;
        }
        let location = response.header("location")?;
        if !location.to_lowercase().starts_with("http://") {
            return None;
        }

        Some(
            Finding::builder(Self::NAME, ctx.target.base())
                .title("ssl_stripping_vulnerable")
                .description("Potential SSL stripping vulnerability")
                .severity(Severity::High)
                .evidence(format!("HTTP URL redirects to: {}", location))
                .recommendation("Ensure all HTTP requests redirect to HTTPS permanently")
                .reference(OwaspCategory::A02CryptographicFailures.reference())
                .build(),
        )
    }
}

impl Default for MiscChecks {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Check for MiscChecks {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn metadata(&self) -> &CheckMetadata {
        &self.metadata
    }

    async fn run(&self, ctx: &CheckContext) -> CheckResult {
        let mut findings = self.check_default_pages(ctx).await;
        findings.extend(self.check_ssl_stripping(ctx).await);
        Ok(findings)
    }
}
