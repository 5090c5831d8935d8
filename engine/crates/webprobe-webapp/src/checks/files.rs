//! File and directory enumeration

use super::{exposure_evidence, NotFoundBaseline};
use crate::check::{Check, CheckCategory, CheckContext, CheckMetadata, CheckResult};
use crate::client::HttpResponse;
use crate::OwaspCategory;
use async_trait::async_trait;
use std::collections::HashMap;
use webprobe_core::{Finding, Severity};

/// Files that should never be reachable
const CRITICAL_FILES: &[&str] = &[
    ".env",
    ".git/config",
    ".svn/entries",
    "web.config",
    "application.properties",
    "database.properties",
    "wp-config.php",
    "config.php",
    "settings.php",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileCategory {
    Backup,
    Config,
    Admin,
    Log,
    Source,
    Temporary,
    Documentation,
}

impl FileCategory {
    fn label(&self) -> &'static str {
        match self {
            FileCategory::Backup => "backup_files",
            FileCategory::Config => "config_files",
            FileCategory::Admin => "admin_panels",
            FileCategory::Log => "log_files",
            FileCategory::Source => "source_code",
            FileCategory::Temporary => "temporary_files",
            FileCategory::Documentation => "documentation",
        }
    }

    fn severity(&self) -> Severity {
        match self {
            FileCategory::Backup | FileCategory::Config => Severity::High,
            FileCategory::Admin | FileCategory::Source => Severity::Medium,
            _ => Severity::Low,
        }
    }

    fn recommendation(&self, path: &str) -> String {
        match self {
            FileCategory::Backup => format!("Remove backup file {} from web directory or restrict access", path),
            FileCategory::Config => format!("Move configuration file {} outside web root or restrict access", path),
            FileCategory::Admin => format!(
                "Secure admin panel at {} with proper authentication and access controls",
                path
            ),
            FileCategory::Log => format!("Move log file {} outside web root or restrict access", path),
            FileCategory::Source => format!("Remove or protect source code repository files/directories at {}", path),
            _ => format!("Review and secure access to {}", path),
        }
    }
}

const COMMON_FILES: &[(FileCategory, &[&str])] = &[
    (
        FileCategory::Backup,
        &[
            "backup.sql", "backup.tar.gz", "backup.zip", "db.sql", "database.sql", "dump.sql",
            ".backup", ".bak", ".old", ".orig", "www.sql", "site.sql", "data.sql",
        ],
    ),
    (
        FileCategory::Config,
        &[
            "config.php", "config.inc.php", "config.ini", "settings.php", "database.php", "db.php",
            "configuration.php", "config.json", "settings.json", "web.config",
            "application.properties", ".env", ".env.local", ".env.production",
        ],
    ),
    (
        FileCategory::Admin,
        &[
            "admin/", "admin.php", "administrator/", "adminpanel/", "cpanel/", "controlpanel/",
            "manage/", "manager/", "admin-login.php", "admin_login.php", "login.php",
        ],
    ),
    (
        FileCategory::Log,
        &[
            "error.log", "access.log", "debug.log", "error_log", "access_log", "debug_log",
            "logs/error.log", "logs/access.log",
        ],
    ),
    (
        FileCategory::Source,
        &[
            ".git/", ".svn/", ".hg/", ".bzr/", ".gitignore", ".gitattributes", "composer.json",
            "package.json", "requirements.txt", "htaccess", ".htaccess",
        ],
    ),
    (
        FileCategory::Temporary,
        &[
            "tmp/", "temp/", "cache/", "logs/", "session/", "sessions/", "upload/", "uploads/",
            "files/", "images/",
        ],
    ),
    (
        FileCategory::Documentation,
        &[
            "readme.txt", "README.txt", "readme.md", "README.md", "changelog.txt", "CHANGELOG.txt",
            "changelog.md", "install.txt", "INSTALL.txt", "install.md", "license.txt",
            "LICENSE.txt", "license.md",
        ],
    ),
];

const LISTING_DIRS: &[&str] = &[
    "backup/", "backups/", "old/", "archive/", "tmp/", "temp/", "cache/", "logs/", "upload/",
    "uploads/", "files/", "images/", "css/", "js/", "assets/", "static/",
];

const LISTING_INDICATORS: &[&str] = &[
    "index of /",
    "<title>index of",
    "parent directory",
    "directory listing for",
];

/// Enumerates exposed files and browsable directories
pub struct FileChecks {
    metadata: CheckMetadata,
}

/// Responses already fetched during one run, keyed by path
type ResponseCache = HashMap<&'static str, Option<HttpResponse>>;

impl FileChecks {
    pub const NAME: &'static str = "file_checks";

    pub fn new() -> Self {
        Self {
            metadata: CheckMetadata::new(Self::NAME, CheckCategory::Files, Severity::Critical)
                .with_description("Exposed configuration, backup, source and log files; directory listing")
                .with_reference(OwaspCategory::A01BrokenAccessControl.reference())
                .with_reference(OwaspCategory::A05SecurityMisconfiguration.reference())
                .with_tag("enumeration"),
        }
    }

    /// GET a path once per run
    async fn fetch<'c>(
        ctx: &CheckContext,
        cache: &'c mut ResponseCache,
        path: &'static str,
    ) -> Option<&'c HttpResponse> {
        if !cache.contains_key(path) {
            let response = ctx.try_get(path).await;
            cache.insert(path, response);
        }
        cache.get(path).and_then(Option::as_ref)
    }

    async fn check_critical_files(
        &self,
        ctx: &CheckContext,
        baseline: &NotFoundBaseline,
        cache: &mut ResponseCache,
    ) -> Vec<Finding> {
        let mut findings = Vec::new();

        for &path in CRITICAL_FILES {
            if ctx.is_cancelled() {
                break;
            }
            let Some(response) = Self::fetch(ctx, cache, path).await else { continue };
            if !baseline.is_hit(response) {
                continue;
            }

            findings.push(
                Finding::builder(Self::NAME, ctx.url_for(path))
                    .title("critical_file_exposed")
                    .description(format!("Critical configuration file exposed: {}", path))
                    .severity(Severity::Critical)
                    .evidence(exposure_evidence(response, 500))
                    .recommendation(format!(
                        "Immediately secure or remove {} from web accessible directory",
                        path
                    ))
                    .reference(OwaspCategory::A05SecurityMisconfiguration.reference())
                    .build(),
            );
        }

        findings
    }

    async fn check_common_files(
        &self,
        ctx: &CheckContext,
        baseline: &NotFoundBaseline,
        cache: &mut ResponseCache,
    ) -> Vec<Finding> {
        let mut findings = Vec::new();

        for &(category, files) in COMMON_FILES {
            for &path in files {
                if ctx.is_cancelled() {
                    return findings;
                }
                // already reported as critical
                if CRITICAL_FILES.contains(&path) {
                    continue;
                }
                let Some(response) = Self::fetch(ctx, cache, path).await else { continue };
                if !baseline.is_hit(response) || response.is_binary() {
                    continue;
                }

                findings.push(
                    Finding::builder(Self::NAME, ctx.url_for(path))
                        .title("vulnerable_file_exposed")
                        .description(format!("Potentially sensitive file exposed: {}", path))
                        .severity(category.severity())
                        .evidence(format!(
                            "Category: {}\n{}",
                            category.label(),
                            exposure_evidence(response, 200)
                        ))
                        .recommendation(category.recommendation(path))
                        .build(),
                );
            }
        }

        findings
    }

    async fn check_directory_listing(&self, ctx: &CheckContext, cache: &mut ResponseCache) -> Vec<Finding> {
        let mut findings = Vec::new();

        for &dir in LISTING_DIRS {
            if ctx.is_cancelled() {
                break;
            }
            let Some(response) = Self::fetch(ctx, cache, dir).await else { continue };
            if response.status != 200 || response.is_binary() {
                continue;
            }

            let content = response.body.to_lowercase();
            if LISTING_INDICATORS.iter().any(|i| content.contains(i)) {
                findings.push(
                    Finding::builder(Self::NAME, ctx.url_for(dir))
                        .title("directory_listing_enabled")
                        .description(format!("Directory listing enabled: {}", dir))
                        .severity(Severity::Medium)
                        .evidence(format!("Directory contents visible\nStatus: {}", response.status))
                        .recommendation(format!(
                            "Disable directory listing in web server configuration or add index file to {}",
                            dir
                        ))
                        .reference(OwaspCategory::A01BrokenAccessControl.reference())
                        .build(),
                );
            }
        }

        findings
    }
}

impl Default for FileChecks {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Check for FileChecks {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn metadata(&self) -> &CheckMetadata {
        &self.metadata
    }

    async fn run(&self, ctx: &CheckContext) -> CheckResult {
        let baseline = NotFoundBaseline::learn(ctx).await;
        let mut cache = ResponseCache::new();

        let mut findings = self.check_critical_files(ctx, &baseline, &mut cache).await;
        findings.extend(self.check_common_files(ctx, &baseline, &mut cache).await);
        findings.extend(self.check_directory_listing(ctx, &mut cache).await);

        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::test_support::context;
    use crate::testing::{ScriptedResponse, ScriptedTransport};

    #[tokio::test]
    async fn test_target_query_does_not_leak_into_file_paths() {
        let (ctx, transport) = context(
            "http://example.com/app?lang=en",
            ScriptedTransport::new().route("/app", 200, "app home"),
        );

        let findings = FileChecks::new().run(&ctx).await.unwrap();

        assert!(findings.is_empty(), "unexpected findings: {:?}", findings);
        assert!(transport.requests().iter().all(|r| !r.contains("lang=en")));
    }

    #[tokio::test]
    async fn test_exposed_files_by_category() {
        let (ctx, transport) = context(
            "http://example.com",
            ScriptedTransport::new()
                .route("/.env", 200, "APP_KEY=abc")
                .route("/backup.sql", 200, "CREATE TABLE users")
                .route("/admin/", 200, "<h1>Admin</h1>")
                .route("/README.md", 200, "# readme")
                .respond(
                    "/backup.zip",
                    ScriptedResponse::new(200).header("Content-Type", "application/octet-stream"),
                )
                .route("/uploads/", 200, "<html><title>Index of /uploads</title></html>"),
        );

        let findings = FileChecks::new().run(&ctx).await.unwrap();
        let severity_of = |desc: &str| {
            findings
                .iter()
                .find(|f| f.description == desc)
                .map(|f| f.severity)
        };

        assert_eq!(
            severity_of("Critical configuration file exposed: .env"),
            Some(Severity::Critical)
        );
        // .env is not reported twice
        assert_eq!(findings.iter().filter(|f| f.url.ends_with("/.env")).count(), 1);
        assert_eq!(
            severity_of("Potentially sensitive file exposed: backup.sql"),
            Some(Severity::High)
        );
        assert_eq!(
            severity_of("Potentially sensitive file exposed: admin/"),
            Some(Severity::Medium)
        );
        assert_eq!(
            severity_of("Potentially sensitive file exposed: README.md"),
            Some(Severity::Low)
        );
        assert_eq!(severity_of("Potentially sensitive file exposed: backup.zip"), None);
        assert_eq!(
            severity_of("Directory listing enabled: uploads/"),
            Some(Severity::Medium)
        );

        // "uploads/" is fetched once even though two rules look at it
        let uploads = transport
            .requests()
            .iter()
            .filter(|r| r.ends_with("/uploads/"))
            .count();
        assert_eq!(uploads, 1);
    }

    #[tokio::test]
    async fn test_soft_404_server_reports_nothing() {
        let (ctx, _) = context(
            "http://example.com",
            ScriptedTransport::new().fallback(200),
        );

        let findings = FileChecks::new().run(&ctx).await.unwrap();
        assert!(findings.is_empty(), "{:?}", findings);
    }

    #[tokio::test]
    async fn test_relative_paths_follow_base_path() {
        let (ctx, transport) = context(
            "http://example.com/app/",
            ScriptedTransport::new().route("/app/.git/config", 200, "[core]"),
        );

        let findings = FileChecks::new().run(&ctx).await.unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].url, "http://example.com/app/.git/config");
        assert!(transport.requests().iter().any(|r| r == "GET http://example.com/app/.git/config"));
    }
}
