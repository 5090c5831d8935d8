//! Built-in web checks
//!
//! Listed here in the order they are registered by default.

mod cookies;
mod files;
mod header_checks;
mod methods;
mod misc;
mod server_info;

pub use cookies::CookieChecks;
pub use files::FileChecks;
pub use header_checks::HeaderChecks;
pub use methods::HttpMethodChecks;
pub use misc::MiscChecks;
pub use server_info::ServerInfoChecks;

use crate::check::CheckContext;
use crate::client::HttpResponse;

/// Path that should never exist, used to learn how the server answers misses
const NOT_FOUND_PROBE: &str = "/.webprobe-404-probe-7f3a";

/// How the target answers a request for a nonexistent path.
///
/// Servers that return 200 for everything (soft 404) would otherwise make
/// every enumerated path look exposed.
#[derive(Debug, Default)]
pub(crate) struct NotFoundBaseline {
    soft_404_body: Option<String>,
}

impl NotFoundBaseline {
    pub(crate) async fn learn(ctx: &CheckContext) -> Self {
        match ctx.try_get(NOT_FOUND_PROBE).await {
            Some(response) if response.status == 200 => {
                tracing::debug!("{} answers 200 for missing paths", ctx.target);
                Self {
                    soft_404_body: Some(response.body),
                }
            }
            _ => Self::default(),
        }
    }

    /// Whether a response shows the path really exists
    pub(crate) fn is_hit(&self, response: &HttpResponse) -> bool {
        if response.status != 200 {
            return false;
        }
        match &self.soft_404_body {
            Some(body) => response.body.trim() != body.trim(),
            None => true,
        }
    }
}

/// Evidence block shared by the file enumeration checks
pub(crate) fn exposure_evidence(response: &HttpResponse, preview_len: usize) -> String {
    let content_type = response.content_type();
    let preview = if response.is_binary() {
        "[Binary content]".to_string()
    } else {
        response.body_preview(preview_len)
    };
    format!(
        "Status: {}\nContent-Type: {}\nPreview: {}",
        response.status, content_type, preview
    )
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::check::CheckContext;
    use crate::client::ProbeClient;
    use crate::testing::ScriptedTransport;
    use crate::ScanConfig;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;
    use webprobe_core::Target;

    /// Context over a scripted transport with no request delay
    pub fn context(target: &str, transport: ScriptedTransport) -> (CheckContext, Arc<ScriptedTransport>) {
        let target = Target::parse(target).unwrap();
        let config = ScanConfig::default().with_delay_ms(0);
        let transport = Arc::new(transport);
        let client = ProbeClient::with_transport(&target, &config, transport.clone(), CancellationToken::new());
        (CheckContext::new(Arc::new(client), target, config), transport)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::context;
    use super::*;
    use crate::testing::ScriptedTransport;

    #[tokio::test]
    async fn test_soft_404_baseline() {
        let (ctx, _) = context(
            "http://example.com",
            ScriptedTransport::new()
                .route(NOT_FOUND_PROBE, 200, "<html>Not here</html>")
                .route("/real", 200, "real content"),
        );

        let baseline = NotFoundBaseline::learn(&ctx).await;
        let fake = ctx.get("/fake").await.unwrap();
        let real = ctx.get("/real").await.unwrap();

        // fallback is 404, so "/fake" is not a hit either way
        assert!(!baseline.is_hit(&fake));
        assert!(baseline.is_hit(&real));

        let same = HttpResponse {
            status: 200,
            body: "<html>Not here</html>\n".into(),
            ..Default::default()
        };
        assert!(!baseline.is_hit(&same));
    }
}
