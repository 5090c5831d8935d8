//! Dangerous HTTP method detection

use crate::check::{Check, CheckCategory, CheckContext, CheckMetadata, CheckResult};
use crate::OwaspCategory;
use async_trait::async_trait;
use tracing::debug;
use webprobe_core::{Finding, Severity};

const DANGEROUS_METHODS: &[&str] = &["PUT", "DELETE", "PATCH", "TRACE", "OPTIONS"];

/// Statuses meaning the method is refused or not routed
const REFUSED_STATUSES: &[u16] = &[400, 401, 403, 404, 405, 501];

/// Sends each dangerous method to the base URL
pub struct HttpMethodChecks {
    metadata: CheckMetadata,
}

impl HttpMethodChecks {
    pub const NAME: &'static str = "http_method_checks";

    pub fn new() -> Self {
        Self {
            metadata: CheckMetadata::new(Self::NAME, CheckCategory::Methods, Severity::High)
                .with_description("Dangerous HTTP methods accepted by the server")
                .with_reference(OwaspCategory::A05SecurityMisconfiguration.reference())
                .with_tag("active"),
        }
    }
}

impl Default for HttpMethodChecks {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Check for HttpMethodChecks {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn metadata(&self) -> &CheckMetadata {
        &self.metadata
    }

    async fn run(&self, ctx: &CheckContext) -> CheckResult {
        let mut findings = Vec::new();
        let url = ctx.target.base();

        for &method in DANGEROUS_METHODS {
            if ctx.is_cancelled() {
                break;
            }
            let response = match ctx.client.request(method, &url).await {
                Ok(response) => response,
                Err(e) => {
                    debug!("{} probe failed: {}", method, e);
                    continue;
                }
            };

            if !REFUSED_STATUSES.contains(&response.status) {
                findings.push(
                    Finding::builder(Self::NAME, &url)
                        .title("dangerous_method_allowed")
                        .description(format!("Dangerous HTTP method allowed: {}", method))
                        .severity(Severity::Medium)
                        .evidence(format!("Method: {}\nStatus: {}", method, response.status))
                        .recommendation(format!(
                            "Disable {} method in web server configuration if not required",
                            method
                        ))
                        .build(),
                );
            }

            if method == "TRACE" && response.status == 200 {
                findings.push(
                    Finding::builder(Self::NAME, &url)
                        .title("trace_method_enabled")
                        .description("TRACE method enabled - potential for XSS attacks")
                        .severity(Severity::High)
                        .evidence("TRACE method allows attackers to steal cookies and other headers")
                        .recommendation("Disable TRACE method in web server configuration")
                        .reference("CWE-693")
                        .build(),
                );
            }
        }

        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::test_support::context;
    use crate::testing::{ScriptedResponse, ScriptedTransport};

    #[tokio::test]
    async fn test_allowed_methods() {
        let (ctx, transport) = context(
            "http://example.com",
            ScriptedTransport::new()
                .fallback(405)
                .respond_to("TRACE", "/", ScriptedResponse::new(200))
                .respond_to("OPTIONS", "/", ScriptedResponse::new(204))
                .respond_to("DELETE", "/", ScriptedResponse::new(403)),
        );

        let findings = HttpMethodChecks::new().run(&ctx).await.unwrap();
        let descriptions: Vec<_> = findings.iter().map(|f| f.description.as_str()).collect();

        assert_eq!(
            descriptions,
            vec![
                "Dangerous HTTP method allowed: TRACE",
                "TRACE method enabled - potential for XSS attacks",
                "Dangerous HTTP method allowed: OPTIONS",
            ]
        );
        assert_eq!(findings[1].severity, Severity::High);
        assert_eq!(transport.request_count(), 5);
    }
}
