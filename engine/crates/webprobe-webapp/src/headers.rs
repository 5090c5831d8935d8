//! Security header analysis

use crate::client::HttpResponse;
use crate::OwaspCategory;
use serde::{Deserialize, Serialize};
use webprobe_core::{Finding, Severity};

/// Security header analysis result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeaderAnalysis {
    /// X-Frame-Options
    pub x_frame_options: HeaderStatus,
    /// X-Content-Type-Options
    pub x_content_type_options: HeaderStatus,
    /// Strict-Transport-Security
    pub hsts: HeaderStatus,
    /// Content-Security-Policy (or its report-only variant)
    pub csp: HeaderStatus,
    /// X-XSS-Protection
    pub x_xss_protection: HeaderStatus,
    /// Referrer-Policy
    pub referrer_policy: HeaderStatus,
    /// Permissions-Policy
    pub permissions_policy: HeaderStatus,
}

/// Status of a security header
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeaderStatus {
    /// Header name
    pub name: String,
    /// Header value if present
    pub value: Option<String>,
    pub status: HeaderCheckStatus,
    /// Problem worth reporting, if any
    pub issue: Option<HeaderIssue>,
}

/// Header check status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeaderCheckStatus {
    /// Header is present and correctly configured
    Present,
    /// Header is missing
    Missing,
    /// Header has insecure value
    Insecure,
}

/// A reportable header problem
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeaderIssue {
    /// Short rule identifier, used as the finding title
    pub rule: String,
    pub severity: Severity,
    pub description: String,
    pub evidence: String,
    pub recommendation: String,
}

impl HeaderStatus {
    fn present(name: &str, value: &str) -> Self {
        Self {
            name: name.into(),
            value: Some(value.to_string()),
            status: HeaderCheckStatus::Present,
            issue: None,
        }
    }

    fn missing(name: &str, required: bool, recommendation: &str) -> Self {
        let issue = required.then(|| HeaderIssue {
            rule: "missing_security_header".into(),
            severity: Severity::Medium,
            description: format!("Missing security header: {}", name),
            evidence: "Header not present in response".into(),
            recommendation: recommendation.into(),
        });
        Self {
            name: name.into(),
            value: None,
            status: HeaderCheckStatus::Missing,
            issue,
        }
    }

    fn insecure(name: &str, value: &str, issue: HeaderIssue) -> Self {
        Self {
            name: name.into(),
            value: Some(value.to_string()),
            status: HeaderCheckStatus::Insecure,
            issue: Some(issue),
        }
    }
}

/// Security headers analyzer
pub struct SecurityHeaders;

impl SecurityHeaders {
    /// Analyze security headers from an HTTP response.
    ///
    /// HSTS is only required when the response was served over https.
    pub fn analyze(response: &HttpResponse, https: bool) -> HeaderAnalysis {
        HeaderAnalysis {
            x_frame_options: Self::check_x_frame_options(response),
            x_content_type_options: Self::check_x_content_type_options(response),
            hsts: Self::check_hsts(response, https),
            csp: Self::check_csp(response),
            x_xss_protection: Self::check_optional(response, "X-XSS-Protection"),
            referrer_policy: Self::check_optional(response, "Referrer-Policy"),
            permissions_policy: Self::check_optional(response, "Permissions-Policy"),
        }
    }

    fn check_x_frame_options(response: &HttpResponse) -> HeaderStatus {
        const NAME: &str = "X-Frame-Options";

        match response.header(NAME) {
            Some(v) => {
                let v_upper = v.trim().to_uppercase();
                if v_upper == "DENY" || v_upper == "SAMEORIGIN" {
                    HeaderStatus::present(NAME, v)
                } else {
                    HeaderStatus::insecure(
                        NAME,
                        v,
                        HeaderIssue {
                            rule: "weak_x_frame_options".into(),
                            severity: Severity::Low,
                            description: format!("Weak X-Frame-Options value: {}", v_upper),
                            evidence: format!("X-Frame-Options: {}", v),
                            recommendation: "Set to 'DENY' or 'SAMEORIGIN'".into(),
                        },
                    )
                }
            }
            None => HeaderStatus::missing(NAME, true, "Set to DENY or SAMEORIGIN"),
        }
    }

    fn check_x_content_type_options(response: &HttpResponse) -> HeaderStatus {
        const NAME: &str = "X-Content-Type-Options";

        match response.header(NAME) {
            Some(v) if v.trim().eq_ignore_ascii_case("nosniff") => HeaderStatus::present(NAME, v),
            Some(v) => HeaderStatus::insecure(
                NAME,
                v,
                HeaderIssue {
                    rule: "weak_x_content_type_options".into(),
                    severity: Severity::Low,
                    description: format!("Unexpected X-Content-Type-Options value: {}", v),
                    evidence: format!("X-Content-Type-Options: {}", v),
                    recommendation: "Set to nosniff".into(),
                },
            ),
            None => HeaderStatus::missing(NAME, true, "Set to nosniff"),
        }
    }

    fn check_hsts(response: &HttpResponse, https: bool) -> HeaderStatus {
        const NAME: &str = "Strict-Transport-Security";

        match response.header(NAME) {
            Some(v) => {
                let lowered = v.to_lowercase();
                let max_age = lowered
                    .split(';')
                    .map(str::trim)
                    .find_map(|p| p.strip_prefix("max-age="))
                    .map(|age| age.trim_matches('"').trim());

                match max_age {
                    None => HeaderStatus::insecure(
                        NAME,
                        v,
                        HeaderIssue {
                            rule: "weak_hsts".into(),
                            severity: Severity::Medium,
                            description: "HSTS header missing max-age directive".into(),
                            evidence: format!("Strict-Transport-Security: {}", v),
                            recommendation: "Include max-age directive (e.g., max-age=31536000)".into(),
                        },
                    ),
                    Some(age) if age.parse::<u64>().map(|a| a == 0).unwrap_or(false) => {
                        HeaderStatus::insecure(
                            NAME,
                            v,
                            HeaderIssue {
                                rule: "hsts_disabled".into(),
                                severity: Severity::High,
                                description: "HSTS is disabled (max-age=0)".into(),
                                evidence: format!("Strict-Transport-Security: {}", v),
                                recommendation: "Remove max-age=0 or set appropriate max-age value".into(),
                            },
                        )
                    }
                    Some(_) => HeaderStatus::present(NAME, v),
                }
            }
            None => HeaderStatus::missing(NAME, https, "Set with appropriate max-age"),
        }
    }

    fn check_csp(response: &HttpResponse) -> HeaderStatus {
        const NAME: &str = "Content-Security-Policy";
        let value = response.header(NAME);
        let report_only = response.header("content-security-policy-report-only");

        match (value, report_only) {
            (Some(v), _) => {
                if v.contains("'unsafe-inline'") || v.contains("'unsafe-eval'") {
                    HeaderStatus::insecure(
                        NAME,
                        v,
                        HeaderIssue {
                            rule: "permissive_csp".into(),
                            severity: Severity::Medium,
                            description: "CSP contains unsafe directives".into(),
                            evidence: format!("Content-Security-Policy: {}", v),
                            recommendation: "Remove 'unsafe-inline' and 'unsafe-eval' from CSP".into(),
                        },
                    )
                } else {
                    HeaderStatus::present(NAME, v)
                }
            }
            (None, Some(v)) => HeaderStatus::insecure(
                NAME,
                v,
                HeaderIssue {
                    rule: "csp_report_only".into(),
                    severity: Severity::Low,
                    description: "CSP is deployed in report-only mode".into(),
                    evidence: format!("Content-Security-Policy-Report-Only: {}", v),
                    recommendation: "Enforce the policy with a Content-Security-Policy header".into(),
                },
            ),
            (None, None) => HeaderStatus::missing(NAME, false, "Implement appropriate CSP policy"),
        }
    }

    fn check_optional(response: &HttpResponse, name: &str) -> HeaderStatus {
        match response.header(name) {
            Some(v) => HeaderStatus::present(name, v),
            None => HeaderStatus::missing(name, false, ""),
        }
    }
}

impl HeaderAnalysis {
    fn statuses(&self) -> [&HeaderStatus; 7] {
        [
            &self.x_frame_options,
            &self.x_content_type_options,
            &self.hsts,
            &self.csp,
            &self.x_xss_protection,
            &self.referrer_policy,
            &self.permissions_policy,
        ]
    }

    /// Convert analysis to findings attributed to `check_name`
    pub fn to_findings(&self, check_name: &str, url: &str) -> Vec<Finding> {
        self.statuses()
            .into_iter()
            .filter_map(|header| header.issue.as_ref())
            .map(|issue| {
                Finding::builder(check_name, url)
                    .title(&issue.rule)
                    .description(&issue.description)
                    .severity(issue.severity)
                    .evidence(&issue.evidence)
                    .recommendation(&issue.recommendation)
                    .reference(OwaspCategory::A05SecurityMisconfiguration.reference())
                    .build()
            })
            .collect()
    }

    /// Get security score (0-100)
    pub fn score(&self) -> u32 {
        let headers = [
            (&self.csp, 20),
            (&self.x_frame_options, 20),
            (&self.x_content_type_options, 15),
            (&self.hsts, 20),
            (&self.referrer_policy, 10),
            (&self.permissions_policy, 10),
            (&self.x_xss_protection, 5),
        ];

        let mut score = 0;
        for (header, weight) in headers {
            match header.status {
                HeaderCheckStatus::Present => score += weight,
                HeaderCheckStatus::Missing => {}
                HeaderCheckStatus::Insecure => score += weight / 2,
            }
        }

        score
    }
}
