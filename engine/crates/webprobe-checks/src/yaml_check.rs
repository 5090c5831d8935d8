//! YAML-based probe check definitions
//!
//! ```yaml
//! name: exposed_actuator
//! description: Spring Boot actuator endpoints are reachable
//! severity: high
//! probes:
//!   - method: GET
//!     path: /actuator/env
//!     match_status: 200
//!     match_body: '"propertySources"'
//! recommendation: Restrict actuator endpoints to the management network
//! ```

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;
use webprobe_core::{Finding, Severity};
use webprobe_webapp::{Check, CheckCategory, CheckContext, CheckMetadata, CheckResult, HttpResponse};

/// A check defined in YAML format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YamlCheckDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub severity: Severity,
    pub probes: Vec<ProbeDefinition>,
    #[serde(default)]
    pub recommendation: Option<String>,
    #[serde(default)]
    pub references: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// One request and the conditions under which its response is a finding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeDefinition {
    #[serde(default = "default_method")]
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub match_status: Option<u16>,
    /// Regular expression searched in the response body
    #[serde(default)]
    pub match_body: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

fn default_method() -> String {
    "GET".to_string()
}

/// Reason a definition was rejected
#[derive(Debug, thiserror::Error)]
pub enum DefinitionError {
    #[error("parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("{0}")]
    Invalid(String),
}

struct CompiledProbe {
    definition: ProbeDefinition,
    body: Option<Regex>,
}

impl CompiledProbe {
    fn matches(&self, response: &HttpResponse) -> bool {
        let status_ok = self
            .definition
            .match_status
            .map_or(true, |s| s == response.status);
        let body_ok = self.body.as_ref().map_or(true, |re| re.is_match(&response.body));
        status_ok && body_ok
    }
}

/// A check loaded from YAML definition
pub struct YamlCheck {
    definition: YamlCheckDefinition,
    probes: Vec<CompiledProbe>,
    metadata: CheckMetadata,
}

impl YamlCheck {
    /// Parse and validate a YAML check definition
    pub fn from_yaml(yaml: &str) -> Result<Self, DefinitionError> {
        let definition: YamlCheckDefinition = serde_yaml::from_str(yaml)?;
        Self::from_definition(definition)
    }

    pub fn from_definition(definition: YamlCheckDefinition) -> Result<Self, DefinitionError> {
        let name = definition.name.trim();
        if name.is_empty() {
            return Err(DefinitionError::Invalid("name must not be empty".into()));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(DefinitionError::Invalid(format!(
                "name '{}' may only contain letters, digits, '_' and '-'",
                name
            )));
        }
        if definition.probes.is_empty() {
            return Err(DefinitionError::Invalid("at least one probe is required".into()));
        }

        let mut probes = Vec::with_capacity(definition.probes.len());
        for probe in &definition.probes {
            if probe.match_status.is_none() && probe.match_body.is_none() {
                return Err(DefinitionError::Invalid(format!(
                    "probe '{}' needs match_status or match_body",
                    probe.path
                )));
            }
            if probe.method.trim().is_empty() || !probe.method.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(DefinitionError::Invalid(format!("invalid method '{}'", probe.method)));
            }
            let body = probe
                .match_body
                .as_deref()
                .map(Regex::new)
                .transpose()
                .map_err(|e| DefinitionError::Invalid(format!("bad match_body for '{}': {}", probe.path, e)))?;
            probes.push(CompiledProbe {
                definition: probe.clone(),
                body,
            });
        }

        let mut metadata = CheckMetadata::new(name, CheckCategory::Custom, definition.severity)
            .with_description(&definition.description)
            .with_tag("plugin");
        for tag in &definition.tags {
            metadata = metadata.with_tag(tag);
        }
        for reference in &definition.references {
            metadata = metadata.with_reference(reference);
        }

        Ok(Self {
            definition,
            probes,
            metadata,
        })
    }

    pub fn definition(&self) -> &YamlCheckDefinition {
        &self.definition
    }

    fn create_finding(&self, url: String, probe: &ProbeDefinition, response: &HttpResponse) -> Finding {
        let summary = if self.definition.description.is_empty() {
            self.metadata.name.clone()
        } else {
            self.definition.description.clone()
        };

        let mut builder = Finding::builder(&self.metadata.name, url)
            .title(probe.title.clone().unwrap_or_else(|| self.metadata.name.clone()))
            .description(format!("{} ({} {})", summary, probe.method.to_uppercase(), probe.path))
            .severity(self.definition.severity)
            .evidence(format!(
                "Status: {}\nPreview: {}",
                response.status,
                response.body_preview(200)
            ));

        if let Some(recommendation) = &self.definition.recommendation {
            builder = builder.recommendation(recommendation);
        }
        for reference in &self.definition.references {
            builder = builder.reference(reference);
        }

        builder.build()
    }
}

#[async_trait]
impl Check for YamlCheck {
    fn name(&self) -> &str {
        &self.metadata.name
    }

    fn metadata(&self) -> &CheckMetadata {
        &self.metadata
    }

    async fn run(&self, ctx: &CheckContext) -> CheckResult {
        let mut findings = Vec::new();

        for probe in &self.probes {
            if ctx.is_cancelled() {
                break;
            }
            let def = &probe.definition;
            let response = match ctx.client.request(&def.method, &def.path).await {
                Ok(response) => response,
                Err(e) => {
                    debug!("{}: {} {} failed: {}", self.name(), def.method, def.path, e);
                    continue;
                }
            };

            if probe.matches(&response) {
                let url = ctx
                    .client
                    .resolve(&def.path)
                    .map(|u| u.to_string())
                    .unwrap_or_else(|_| ctx.url_for(&def.path));
                findings.push(self.create_finding(url, def, &response));
            }
        }

        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;
    use webprobe_core::Target;
    use webprobe_webapp::testing::ScriptedTransport;
    use webprobe_webapp::{ProbeClient, ScanConfig};

    const ACTUATOR: &str = r#"
name: exposed_actuator
description: Spring Boot actuator endpoints are reachable
severity: high
probes:
  - path: /actuator/env
    match_status: 200
    match_body: '"propertySources"'
  - method: get
    path: /actuator/health
    match_status: 200
    title: actuator_health
recommendation: Restrict actuator endpoints to the management network
references:
  - CWE-215
"#;

    fn context(transport: ScriptedTransport) -> CheckContext {
        let target = Target::parse("http://example.com").unwrap();
        let config = ScanConfig::default().with_delay_ms(0);
        let client = ProbeClient::with_transport(&target, &config, Arc::new(transport), CancellationToken::new());
        CheckContext::new(Arc::new(client), target, config)
    }

    #[test]
    fn test_parse_yaml_check() {
        let check = YamlCheck::from_yaml(ACTUATOR).unwrap();
        assert_eq!(check.name(), "exposed_actuator");
        assert_eq!(check.metadata().severity, Severity::High);
        assert_eq!(check.metadata().category, CheckCategory::Custom);
        assert_eq!(check.definition().probes[0].method, "GET");
        assert!(check.metadata().has_tag("plugin"));
    }

    #[test]
    fn test_invalid_definitions() {
        let no_matcher = "name: x\nseverity: low\nprobes:\n  - path: /a\n";
        assert!(matches!(YamlCheck::from_yaml(no_matcher), Err(DefinitionError::Invalid(_))));

        let bad_regex = "name: x\nseverity: low\nprobes:\n  - path: /a\n    match_body: '('\n";
        assert!(matches!(YamlCheck::from_yaml(bad_regex), Err(DefinitionError::Invalid(_))));

        let bad_name = "name: 'has space'\nseverity: low\nprobes:\n  - path: /a\n    match_status: 200\n";
        assert!(YamlCheck::from_yaml(bad_name).is_err());

        let bad_severity = "name: x\nseverity: urgent\nprobes: []\n";
        assert!(matches!(YamlCheck::from_yaml(bad_severity), Err(DefinitionError::Parse(_))));
    }

    #[tokio::test]
    async fn test_every_matcher_must_match() {
        let check = YamlCheck::from_yaml(ACTUATOR).unwrap();
        let ctx = context(
            ScriptedTransport::new()
                .route("/actuator/env", 200, "{\"status\":\"UP\"}")
                .route("/actuator/health", 200, "{\"status\":\"UP\"}"),
        );

        let findings = check.run(&ctx).await.unwrap();

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].check_name, "exposed_actuator");
        assert_eq!(findings[0].title, "actuator_health");
        assert_eq!(findings[0].url, "http://example.com/actuator/health");
        assert_eq!(
            findings[0].description,
            "Spring Boot actuator endpoints are reachable (GET /actuator/health)"
        );
        assert_eq!(findings[0].references, vec!["CWE-215"]);
    }
}
