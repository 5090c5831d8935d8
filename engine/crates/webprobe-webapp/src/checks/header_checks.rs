//! Security header checks

use crate::check::{Check, CheckCategory, CheckContext, CheckMetadata, CheckResult};
use crate::headers::SecurityHeaders;
use crate::OwaspCategory;
use async_trait::async_trait;
use tracing::debug;
use webprobe_core::Severity;

/// Reports missing or weak security headers on the target's base URL
pub struct HeaderChecks {
    metadata: CheckMetadata,
}

impl HeaderChecks {
    pub const NAME: &'static str = "header_checks";

    pub fn new() -> Self {
        Self {
            metadata: CheckMetadata::new(Self::NAME, CheckCategory::Headers, Severity::High)
                .with_description("Missing or misconfigured security headers")
                .with_reference(OwaspCategory::A05SecurityMisconfiguration.reference())
                .with_tag("passive"),
        }
    }
}

impl Default for HeaderChecks {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Check for HeaderChecks {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn metadata(&self) -> &CheckMetadata {
        &self.metadata
    }

    async fn run(&self, ctx: &CheckContext) -> CheckResult {
        let url = ctx.target.base();
        let response = ctx.get(&url).await?;

        let analysis = SecurityHeaders::analyze(&response, ctx.target.is_https());
        debug!("header score for {}: {}", url, analysis.score());

        Ok(analysis.to_findings(Self::NAME, &url))
    }
}
