//! Cookie attribute checks

use crate::check::{Check, CheckCategory, CheckContext, CheckMetadata, CheckResult};
use crate::OwaspCategory;
use async_trait::async_trait;
use webprobe_core::{Finding, Severity};

/// A `Set-Cookie` header split into name and attribute flags
#[derive(Debug, PartialEq, Eq)]
struct SetCookie {
    name: String,
    secure: bool,
    http_only: bool,
    same_site: bool,
}

impl SetCookie {
    fn parse(header: &str) -> Option<Self> {
        let mut parts = header.split(';');
        let (name, _value) = parts.next()?.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        let mut cookie = SetCookie {
            name: name.to_string(),
            secure: false,
            http_only: false,
            same_site: false,
        };
        for attr in parts {
            let key = attr.split('=').next().unwrap_or_default().trim();
            if key.eq_ignore_ascii_case("secure") {
                cookie.secure = true;
            } else if key.eq_ignore_ascii_case("httponly") {
                cookie.http_only = true;
            } else if key.eq_ignore_ascii_case("samesite") {
                cookie.same_site = true;
            }
        }
        Some(cookie)
    }

    fn issues(&self, https: bool) -> Vec<&'static str> {
        let mut issues = Vec::new();
        if https && !self.secure {
            issues.push("Missing Secure flag");
        }
        if !self.http_only {
            issues.push("Missing HttpOnly flag");
        }
        if !self.same_site {
            issues.push("Missing SameSite attribute");
        }
        issues
    }
}

/// Inspects cookies set by the base URL
pub struct CookieChecks {
    metadata: CheckMetadata,
}

impl CookieChecks {
    pub const NAME: &'static str = "cookie_checks";

    pub fn new() -> Self {
        Self {
            metadata: CheckMetadata::new(Self::NAME, CheckCategory::Cookies, Severity::Medium)
                .with_description("Cookies missing Secure, HttpOnly or SameSite attributes")
                .with_reference(OwaspCategory::A05SecurityMisconfiguration.reference())
                .with_tag("passive"),
        }
    }
}

impl Default for CookieChecks {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Check for CookieChecks {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn metadata(&self) -> &CheckMetadata {
        &self.metadata
    }

    async fn run(&self, ctx: &CheckContext) -> CheckResult {
        let url = ctx.target.base();
        let response = ctx.get(&url).await?;
        let https = ctx.target.is_https();

        let findings = response
            .header_all("set-cookie")
            .filter_map(SetCookie::parse)
            .filter_map(|cookie| {
                let issues = cookie.issues(https);
                if issues.is_empty() {
                    return None;
                }
                Some(
                    Finding::builder(Self::NAME, &url)
                        .title("insecure_cookie")
                        .description(format!("Insecure cookie: {}", cookie.name))
                        .severity(Severity::Medium)
                        // value withheld, it may be a live session token
                        .evidence(format!("Issues: {}\nCookie: {}=[redacted]", issues.join(", "), cookie.name))
                        .recommendation("Set Secure, HttpOnly, and SameSite attributes on cookies")
                        .build(),
                )
            })
            .collect();

        Ok(findings)
    }
}
