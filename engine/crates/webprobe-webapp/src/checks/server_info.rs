//! Server fingerprinting and version disclosure

use super::{exposure_evidence, NotFoundBaseline};
use crate::check::{Check, CheckCategory, CheckContext, CheckMetadata, CheckResult};
use crate::client::HttpResponse;
use crate::OwaspCategory;
use async_trait::async_trait;
use regex::Regex;
use tracing::debug;
use webprobe_core::{Finding, Severity};

/// Known server signatures: (server, version patterns, vulnerable versions)
const SERVER_SIGNATURES: &[(&str, &[&str], &[(&str, &str)])] = &[
    (
        "Apache",
        &[r"(?i)Apache/([\d.]+)", r"(?i)Apache[/ ]?([\d.]+)"],
        &[
            ("2.4.49", "Path traversal vulnerability (CVE-2021-41773)"),
            ("2.4.50", "Path traversal vulnerability (CVE-2021-42013)"),
        ],
    ),
    (
        "nginx",
        &[r"(?i)nginx/([\d.]+)", r"(?i)nginx[/ ]?([\d.]+)"],
        &[
            ("1.20.0", "Request smuggling vulnerability"),
            ("1.21.0", "Request smuggling vulnerability"),
        ],
    ),
    ("IIS", &[r"(?i)Microsoft-IIS/([\d.]+)", r"(?i)IIS/([\d.]+)"], &[]),
    ("Tomcat", &[r"(?i)Apache-Coyote/([\d.]+)", r"(?i)Tomcat/([\d.]+)"], &[]),
];

const SERVER_FILES: &[&str] = &[
    "/server-status",
    "/server-info",
    "/phpinfo.php",
    "/test.php",
    "/info.php",
    "/wp-config.php",
    "/.env",
    "/.git/config",
    "/.svn/entries",
    "/WEB-INF/web.xml",
    "/META-INF/MANIFEST.MF",
];

const VERSION_PATHS: &[&str] = &[
    "/version",
    "/api/version",
    "/status",
    "/health",
    "/readme.txt",
    "/changelog.txt",
    "/VERSION",
    "/version.json",
];

const VERSION_PATTERNS: &[&str] = &[
    r"version[\s:]+(\d[\d.]*)",
    r"\bv(\d[\d.]*)",
    r"release[\s:]+(\d[\d.]*)",
    r"build[\s:]+(\d[\d.]*)",
];

/// Version strings reported per path and pattern
const MAX_VERSIONS_PER_PATTERN: usize = 3;

struct Signature {
    server: &'static str,
    patterns: Vec<Regex>,
    vulnerable: &'static [(&'static str, &'static str)],
}

/// Detects server software and version leaks
pub struct ServerInfoChecks {
    metadata: CheckMetadata,
    signatures: Vec<Signature>,
    version_patterns: Vec<Regex>,
}

impl ServerInfoChecks {
    pub const NAME: &'static str = "server_info_checks";

    pub fn new() -> Self {
        let signatures = SERVER_SIGNATURES
            .iter()
            .map(|&(server, patterns, vulnerable)| Signature {
                server,
                patterns: patterns.iter().filter_map(|p| Regex::new(p).ok()).collect(),
                vulnerable,
            })
            .collect();

        Self {
            metadata: CheckMetadata::new(Self::NAME, CheckCategory::ServerInfo, Severity::High)
                .with_description("Server fingerprinting, known-vulnerable versions and version disclosure")
                .with_reference(OwaspCategory::A06VulnerableComponents.reference())
                .with_tag("fingerprint"),
            signatures,
            version_patterns: VERSION_PATTERNS
                .iter()
                .filter_map(|p| Regex::new(p).ok())
                .collect(),
        }
    }

    fn analyze_server_header(&self, url: &str, server_header: &str) -> Vec<Finding> {
        let mut findings = Vec::new();
        let evidence = format!("Server: {}", server_header);

        for signature in &self.signatures {
            let version = signature
                .patterns
                .iter()
                .find_map(|re| re.captures(server_header))
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string());

            let Some(version) = version else { continue };

            let known = signature
                .vulnerable
                .iter()
                .find(|(v, _)| *v == version)
                .map(|(_, desc)| *desc);

            let finding = match known {
                Some(desc) => Finding::builder(Self::NAME, url)
                    .title("vulnerable_server_version")
                    .description(format!(
                        "Vulnerable {} version detected: {} - {}",
                        signature.server, version, desc
                    ))
                    .severity(Severity::High)
                    .recommendation(format!("Upgrade {} to a patched version", signature.server))
                    .reference(OwaspCategory::A06VulnerableComponents.reference()),
                None => Finding::builder(Self::NAME, url)
                    .title("server_version_detected")
                    .description(format!("{} version {} detected", signature.server, version))
                    .severity(Severity::Info),
            };
            findings.push(finding.evidence(&evidence).build());
        }

        if findings.is_empty() {
            findings.push(
                Finding::builder(Self::NAME, url)
                    .title("server_info_disclosure")
                    .description(format!("Server header reveals information: {}", server_header))
                    .severity(Severity::Low)
                    .evidence(evidence)
                    .recommendation("Configure server to hide or obfuscate server information")
                    .build(),
            );
        }

        findings
    }

    fn check_headers(&self, url: &str, response: &HttpResponse) -> Vec<Finding> {
        let mut findings = Vec::new();

        if let Some(server) = response.header("server") {
            findings.extend(self.analyze_server_header(url, server));
        }

        if let Some(powered_by) = response.header("x-powered-by") {
            findings.push(
                Finding::builder(Self::NAME, url)
                    .title("powered_by_disclosure")
                    .description(format!("X-Powered-By header reveals technology: {}", powered_by))
                    .severity(Severity::Low)
                    .evidence(format!("X-Powered-By: {}", powered_by))
                    .recommendation("Remove or obfuscate X-Powered-By header")
                    .build(),
            );
        }

        if let Some(aspnet) = response.header("x-aspnet-version") {
            findings.push(
                Finding::builder(Self::NAME, url)
                    .title("aspnet_version_disclosure")
                    .description(format!("ASP.NET version disclosed: {}", aspnet))
                    .severity(Severity::Low)
                    .evidence(format!("X-AspNet-Version: {}", aspnet))
                    .recommendation("Configure ASP.NET to hide version information")
                    .build(),
            );
        }

        findings
    }

    async fn check_server_files(&self, ctx: &CheckContext, baseline: &NotFoundBaseline) -> Vec<Finding> {
        let mut findings = Vec::new();

        for path in SERVER_FILES {
            if ctx.is_cancelled() {
                break;
            }
            let Some(response) = ctx.try_get(path).await else { continue };
            if !baseline.is_hit(&response) || response.is_binary() {
                continue;
            }

            let lowered = path.to_lowercase();
            let severity = if ["config", "env", "web.xml"].iter().any(|c| lowered.contains(c)) {
                Severity::High
            } else {
                Severity::Medium
            };

            findings.push(
                Finding::builder(Self::NAME, ctx.url_for(path))
                    .title("sensitive_file_exposed")
                    .description(format!("Sensitive file exposed: {}", path))
                    .severity(severity)
                    .evidence(exposure_evidence(&response, 200))
                    .recommendation(format!("Remove or protect access to {}", path))
                    .reference(OwaspCategory::A05SecurityMisconfiguration.reference())
                    .build(),
            );
        }

        findings
    }

    async fn check_version_disclosure(&self, ctx: &CheckContext, baseline: &NotFoundBaseline) -> Vec<Finding> {
        let mut findings = Vec::new();

        for path in VERSION_PATHS {
            if ctx.is_cancelled() {
                break;
            }
            let Some(response) = ctx.try_get(path).await else { continue };
            if !baseline.is_hit(&response) {
                continue;
            }

            let content = response.body.to_lowercase();
            for pattern in &self.version_patterns {
                for caps in pattern.captures_iter(&content).take(MAX_VERSIONS_PER_PATTERN) {
                    let Some(version) = caps.get(1) else { continue };
                    findings.push(
                        Finding::builder(Self::NAME, ctx.url_for(path))
                            .title("version_disclosure")
                            .description(format!("Version information disclosed: {}", version.as_str()))
                            .severity(Severity::Low)
                            .evidence(format!("Found in: {}\nPattern: {}", path, pattern.as_str()))
                            .recommendation("Review and remove unnecessary version disclosures")
                            .build(),
                    );
                }
            }
        }

        findings
    }
}

impl Default for ServerInfoChecks {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Check for ServerInfoChecks {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn metadata(&self) -> &CheckMetadata {
        &self.metadata
    }

    async fn run(&self, ctx: &CheckContext) -> CheckResult {
        let mut findings = Vec::new();
        let url = ctx.target.base();

        match ctx.get(&url).await {
            Ok(response) => findings.extend(self.check_headers(&url, &response)),
            Err(e) => debug!("server header probe failed: {}", e),
        }

        let baseline = NotFoundBaseline::learn(ctx).await;
        findings.extend(self.check_server_files(ctx, &baseline).await);
        findings.extend(self.check_version_disclosure(ctx, &baseline).await);

        Ok(findings)
    }
}
