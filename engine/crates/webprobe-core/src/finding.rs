//! Finding definitions - issues reported by checks

use crate::severity::Severity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A vulnerability or misconfiguration finding.
///
/// Findings are immutable once built. Two findings describe the same issue
/// when their [`FindingKey`] is equal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// Unique finding ID
    pub id: Uuid,

    /// Registry name of the check that generated this finding
    pub check_name: String,

    /// URL the issue was observed on
    pub url: String,

    /// Short rule identifier within the check (e.g. "missing_security_header")
    pub title: String,
    pub description: String,
    pub severity: Severity,

    /// Evidence and remediation
    pub evidence: String,
    pub recommendation: String,
    #[serde(default)]
    pub references: Vec<String>,

    pub detected_at: DateTime<Utc>,
}

/// Deduplication identity of a finding: `(check_name, url, description)`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FindingKey {
    pub check_name: String,
    pub url: String,
    pub description: String,
}

impl Finding {
    /// Create a new finding builder
    pub fn builder(check_name: impl Into<String>, url: impl Into<String>) -> FindingBuilder {
        FindingBuilder::new(check_name, url)
    }

    /// Identity used when aggregating findings
    pub fn key(&self) -> FindingKey {
        FindingKey {
            check_name: self.check_name.clone(),
            url: self.url.clone(),
            description: self.description.clone(),
        }
    }
}

/// Builder for constructing findings
#[derive(Debug)]
pub struct FindingBuilder {
    finding: Finding,
}

impl FindingBuilder {
    pub fn new(check_name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            finding: Finding {
                id: Uuid::new_v4(),
                check_name: check_name.into(),
                url: url.into(),
                title: String::new(),
                description: String::new(),
                severity: Severity::Info,
                evidence: String::new(),
                recommendation: String::new(),
                references: Vec::new(),
                detected_at: Utc::now(),
            },
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.finding.title = title.into();
        self
    }

    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.finding.description = desc.into();
        self
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.finding.severity = severity;
        self
    }

    pub fn evidence(mut self, evidence: impl Into<String>) -> Self {
        self.finding.evidence = evidence.into();
        self
    }

    pub fn recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.finding.recommendation = recommendation.into();
        self
    }

    pub fn reference(mut self, reference: impl Into<String>) -> Self {
        self.finding.references.push(reference.into());
        self
    }

    pub fn build(self) -> Finding {
        self.finding
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finding_builder() {
        let finding = Finding::builder("header_checks", "http://example.com")
            .title("missing_security_header")
            .description("Missing security header: X-Frame-Options")
            .severity(Severity::Medium)
            .evidence("Header not present in response")
            .recommendation("Set to DENY or SAMEORIGIN")
            .reference("OWASP A05:2021")
            .build();

        assert_eq!(finding.severity, Severity::Medium);
        assert_eq!(finding.check_name, "header_checks");
        assert_eq!(finding.references, vec!["OWASP A05:2021"]);
    }

    #[test]
    fn test_key_ignores_severity_and_evidence() {
        let a = Finding::builder("c", "http://x/")
            .description("same")
            .severity(Severity::Low)
            .evidence("one")
            .build();
        let b = Finding::builder("c", "http://x/")
            .description("same")
            .severity(Severity::High)
            .evidence("two")
            .build();

        assert_ne!(a.id, b.id);
        assert_eq!(a.key(), b.key());
    }
}
